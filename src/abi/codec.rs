//! Argument packing and return unpacking.
//!
//! Arguments arrive as strings from the run document. They are parsed into
//! [`Token`]s against the target [`ParamType`], packed with the standard
//! head/tail layout, and return data is unpacked back into tokens that
//! render to the same string forms.

use num_bigint::{BigInt, BigUint, Sign};
use sha3::{Digest, Keccak256};

use super::types::ParamType;
use super::AbiError;
use crate::domain::Value;

const WORD: usize = 32;

/// A typed ABI value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(BigUint),
    Int(BigInt),
    Bool(bool),
    Address([u8; 20]),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<Token>),
}

/// First four bytes of the Keccak-256 hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

// ============================================================================
// Parsing arguments
// ============================================================================

/// Parse one argument string as a value of `kind`
pub fn parse_arg(kind: &ParamType, raw: &str) -> Result<Token, AbiError> {
    let invalid = || AbiError::InvalidValue {
        kind: kind.to_string(),
        value: raw.to_string(),
    };
    let text = raw.trim();

    match kind {
        ParamType::Uint(bits) => {
            let value = parse_biguint(text).ok_or_else(invalid)?;
            if value.bits() > *bits as u64 {
                return Err(invalid());
            }
            Ok(Token::Uint(value))
        }
        ParamType::Int(bits) => {
            let value: BigInt = text.parse().map_err(|_| invalid())?;
            let bound = BigInt::from(1) << (bits - 1);
            if value >= bound || value < -bound {
                return Err(invalid());
            }
            Ok(Token::Int(value))
        }
        ParamType::Bool => match text {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            _ => Err(invalid()),
        },
        ParamType::Address => {
            let bytes = hex::decode(pad_odd(strip_hex_prefix(text))).map_err(|_| invalid())?;
            if bytes.len() > 20 {
                return Err(invalid());
            }
            let mut address = [0u8; 20];
            address[20 - bytes.len()..].copy_from_slice(&bytes);
            Ok(Token::Address(address))
        }
        ParamType::String => Ok(Token::String(raw.to_string())),
        ParamType::Bytes => Ok(Token::Bytes(parse_bytes(raw).ok_or_else(invalid)?)),
        ParamType::FixedBytes(len) => {
            let bytes = parse_bytes(raw).ok_or_else(invalid)?;
            if bytes.len() > *len {
                return Err(invalid());
            }
            Ok(Token::FixedBytes(bytes))
        }
        ParamType::Array(inner) => {
            let items = split_list(text).ok_or_else(invalid)?;
            let tokens = items
                .iter()
                .map(|item| parse_arg(inner, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Token::Array(tokens))
        }
        ParamType::FixedArray(inner, len) => {
            let items = split_list(text).ok_or_else(invalid)?;
            if items.len() != *len {
                return Err(AbiError::ArrayLength {
                    expected: *len,
                    got: items.len(),
                });
            }
            let tokens = items
                .iter()
                .map(|item| parse_arg(inner, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Token::Array(tokens))
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

fn pad_odd(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

fn parse_biguint(text: &str) -> Option<BigUint> {
    match text.strip_prefix("0x") {
        Some(hex_digits) => BigUint::parse_bytes(hex_digits.as_bytes(), 16),
        None => text.parse().ok(),
    }
}

/// `0x`-prefixed input is hex, anything else is taken as UTF-8 text
fn parse_bytes(raw: &str) -> Option<Vec<u8>> {
    match raw.trim().strip_prefix("0x") {
        Some(hex_digits) => hex::decode(pad_odd(hex_digits)).ok(),
        None => Some(raw.as_bytes().to_vec()),
    }
}

/// Split `[a, b, [c, d]]` into its top-level items, unquoting each.
pub fn split_list(text: &str) -> Option<Vec<String>> {
    let inner = text.trim().strip_prefix('[')?.strip_suffix(']')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for c in inner.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            '[' if !quoted => {
                depth += 1;
                current.push(c);
            }
            ']' if !quoted => {
                depth = depth.checked_sub(1)?;
                current.push(c);
            }
            ',' if !quoted && depth == 0 => {
                items.push(unquote(&current));
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if quoted || depth != 0 {
        return None;
    }
    items.push(unquote(&current));
    Some(items)
}

fn unquote(item: &str) -> String {
    let item = item.trim();
    item.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(item)
        .to_string()
}

// ============================================================================
// Encoding
// ============================================================================

/// Pack a sequence of tokens with the head/tail layout
pub fn encode(kinds: &[ParamType], tokens: &[Token]) -> Vec<u8> {
    let head_size: usize = kinds.iter().map(ParamType::head_size).sum();
    let mut head = Vec::with_capacity(head_size);
    let mut tail = Vec::new();

    for (kind, token) in kinds.iter().zip(tokens) {
        if kind.is_dynamic() {
            head.extend_from_slice(&usize_word(head_size + tail.len()));
            tail.extend(encode_single(kind, token));
        } else {
            head.extend(encode_single(kind, token));
        }
    }

    head.extend(tail);
    head
}

fn encode_single(kind: &ParamType, token: &Token) -> Vec<u8> {
    match (kind, token) {
        (_, Token::Uint(value)) => left_pad(&value.to_bytes_be()),
        (_, Token::Int(value)) => int_word(value).to_vec(),
        (_, Token::Bool(b)) => usize_word(usize::from(*b)).to_vec(),
        (_, Token::Address(address)) => left_pad(address),
        (_, Token::FixedBytes(bytes)) => right_pad(bytes),
        (_, Token::Bytes(bytes)) => {
            let mut out = usize_word(bytes.len()).to_vec();
            out.extend(right_pad(bytes));
            out
        }
        (_, Token::String(s)) => {
            let mut out = usize_word(s.len()).to_vec();
            out.extend(right_pad(s.as_bytes()));
            out
        }
        (ParamType::Array(inner), Token::Array(items)) => {
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode(&vec![(**inner).clone(); items.len()], items));
            out
        }
        (ParamType::FixedArray(inner, len), Token::Array(items)) => {
            encode(&vec![(**inner).clone(); *len], items)
        }
        (_, Token::Array(items)) => {
            let mut out = usize_word(items.len()).to_vec();
            for item in items {
                out.extend(encode_single(kind, item));
            }
            out
        }
    }
}

fn usize_word(n: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(n as u64).to_be_bytes());
    word
}

fn left_pad(bytes: &[u8]) -> Vec<u8> {
    let mut word = vec![0u8; WORD.saturating_sub(bytes.len())];
    word.extend_from_slice(bytes);
    word
}

fn right_pad(bytes: &[u8]) -> Vec<u8> {
    let padded_len = bytes.len().div_ceil(WORD) * WORD;
    let mut out = bytes.to_vec();
    out.resize(padded_len, 0);
    out
}

/// Two's complement in a 256-bit word
fn int_word(value: &BigInt) -> [u8; WORD] {
    let (sign, magnitude) = value.to_bytes_be();
    let fill = if sign == Sign::Minus { 0xff } else { 0x00 };
    let mut word = [fill; WORD];

    if sign == Sign::Minus {
        let modulus: BigInt = BigInt::from(1) << 256;
        let (_, twos) = (modulus + value).to_bytes_be();
        word[WORD - twos.len()..].copy_from_slice(&twos);
    } else {
        word[WORD - magnitude.len()..].copy_from_slice(&magnitude);
    }
    word
}

// ============================================================================
// Decoding
// ============================================================================

/// Unpack return data laid out for `kinds`
pub fn decode(kinds: &[ParamType], data: &[u8]) -> Result<Vec<Token>, AbiError> {
    let mut tokens = Vec::with_capacity(kinds.len());
    let mut offset = 0;

    for kind in kinds {
        let token = if kind.is_dynamic() {
            let start = read_usize(data, offset)?;
            decode_single(kind, data, start)?
        } else {
            decode_single(kind, data, offset)?
        };
        tokens.push(token);
        offset += kind.head_size();
    }

    Ok(tokens)
}

fn decode_single(kind: &ParamType, data: &[u8], at: usize) -> Result<Token, AbiError> {
    match kind {
        ParamType::Uint(_) => Ok(Token::Uint(BigUint::from_bytes_be(word(data, at)?))),
        ParamType::Int(_) => {
            let raw = word(data, at)?;
            let unsigned = BigInt::from_bytes_be(Sign::Plus, raw);
            if raw[0] & 0x80 != 0 {
                Ok(Token::Int(unsigned - (BigInt::from(1) << 256)))
            } else {
                Ok(Token::Int(unsigned))
            }
        }
        ParamType::Bool => Ok(Token::Bool(word(data, at)?.iter().any(|b| *b != 0))),
        ParamType::Address => {
            let mut address = [0u8; 20];
            address.copy_from_slice(&word(data, at)?[12..]);
            Ok(Token::Address(address))
        }
        ParamType::FixedBytes(len) => Ok(Token::FixedBytes(word(data, at)?[..*len].to_vec())),
        ParamType::Bytes => Ok(Token::Bytes(read_dynamic(data, at)?.to_vec())),
        ParamType::String => {
            let bytes = read_dynamic(data, at)?;
            Ok(Token::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        ParamType::Array(inner) => {
            let len = read_usize(data, at)?;
            let body = at
                .checked_add(WORD)
                .and_then(|start| data.get(start..))
                .ok_or(AbiError::Truncated)?;
            // Every element needs at least one head word in the body
            match len.checked_mul(inner.head_size().max(WORD)) {
                Some(needed) if needed <= body.len() => {}
                _ => return Err(AbiError::Truncated),
            }
            Ok(Token::Array(decode(&vec![(**inner).clone(); len], body)?))
        }
        ParamType::FixedArray(inner, len) => {
            let body = data.get(at..).ok_or(AbiError::Truncated)?;
            Ok(Token::Array(decode(&vec![(**inner).clone(); *len], body)?))
        }
    }
}

fn word(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    at.checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or(AbiError::Truncated)
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let raw = word(data, at)?;
    if raw[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::Truncated);
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf)).map_err(|_| AbiError::Truncated)
}

fn read_dynamic(data: &[u8], at: usize) -> Result<&[u8], AbiError> {
    let len = read_usize(data, at)?;
    at.checked_add(WORD)
        .and_then(|start| Some(start..start.checked_add(len)?))
        .and_then(|range| data.get(range))
        .ok_or(AbiError::Truncated)
}

// ============================================================================
// Rendering
// ============================================================================

impl Token {
    /// Human form: decimal integers, bare upper-case hex addresses, trimmed
    /// text for byte arrays, `[a,b]` for arrays
    pub fn render(&self) -> String {
        match self {
            Token::Uint(value) => value.to_string(),
            Token::Int(value) => value.to_string(),
            Token::Bool(b) => b.to_string(),
            Token::Address(address) => hex::encode_upper(address),
            Token::String(s) => s.clone(),
            Token::Bytes(bytes) | Token::FixedBytes(bytes) => render_bytes(bytes),
            Token::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Token::render).collect();
                format!("[{}]", rendered.join(","))
            }
        }
    }

    /// Typed value recorded alongside the rendering
    pub fn to_value(&self) -> Value {
        match self {
            Token::Uint(value) => i64::try_from(value)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Str(value.to_string())),
            Token::Int(value) => i64::try_from(value)
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Str(value.to_string())),
            Token::Bool(b) => Value::Bool(*b),
            Token::Array(items) => Value::List(items.iter().map(Token::to_value).collect()),
            other => Value::Str(other.render()),
        }
    }
}

fn render_bytes(bytes: &[u8]) -> String {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| *b != 0).map_or(start, |i| i + 1);
    let trimmed = &bytes[start..end];

    match std::str::from_utf8(trimmed) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("0x{}", hex::encode(trimmed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[u64]) -> Vec<u8> {
        let mut data = Vec::new();
        for value in values {
            let mut word = [0u8; WORD];
            word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
            data.extend_from_slice(&word);
        }
        data
    }

    #[test]
    fn test_oversized_array_length_is_truncated() {
        let kinds = vec![ParamType::Array(Box::new(ParamType::Uint(256)))];
        for len in [u64::MAX, 1 << 40, 3] {
            let data = words(&[32, len, 7]);
            assert_eq!(decode(&kinds, &data), Err(AbiError::Truncated));
        }

        let data = words(&[32, 1, 7]);
        assert_eq!(
            decode(&kinds, &data).unwrap(),
            vec![Token::Array(vec![Token::Uint(BigUint::from(7u32))])]
        );
    }

    #[test]
    fn test_oversized_offsets_are_truncated() {
        let kinds = vec![ParamType::String];
        for offset in [u64::MAX, u64::MAX - 16, 1 << 40] {
            let data = words(&[offset, 0]);
            assert_eq!(decode(&kinds, &data), Err(AbiError::Truncated));
        }

        // Length running past the end of the data
        let data = words(&[32, u64::MAX - 16]);
        assert_eq!(decode(&kinds, &data), Err(AbiError::Truncated));
    }

    #[test]
    fn test_known_selector() {
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_encode_static_uint() {
        let kinds = vec![ParamType::Uint(256)];
        let tokens = vec![parse_arg(&kinds[0], "5").unwrap()];
        let encoded = encode(&kinds, &tokens);
        assert_eq!(encoded.len(), 32);
        assert_eq!(encoded[31], 5);
    }

    #[test]
    fn test_encode_negative_int_is_twos_complement() {
        let token = parse_arg(&ParamType::Int(8), "-1").unwrap();
        let encoded = encode(&[ParamType::Int(8)], &[token]);
        assert!(encoded.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_encode_string_layout() {
        let kinds = vec![ParamType::String];
        let tokens = vec![parse_arg(&kinds[0], "hello").unwrap()];
        let encoded = encode(&kinds, &tokens);
        // offset, length, one padded word of data
        assert_eq!(encoded.len(), 96);
        assert_eq!(encoded[31], 32);
        assert_eq!(encoded[63], 5);
        assert_eq!(&encoded[64..69], b"hello");
    }

    #[test]
    fn test_out_of_range_integers_are_rejected() {
        assert!(parse_arg(&ParamType::Uint(8), "256").is_err());
        assert!(parse_arg(&ParamType::Uint(8), "-1").is_err());
        assert!(parse_arg(&ParamType::Int(8), "128").is_err());
        assert!(parse_arg(&ParamType::Int(8), "-128").is_ok());
    }

    #[test]
    fn test_fixed_array_length_is_checked() {
        let kind: ParamType = "uint8[3]".parse().unwrap();
        assert_eq!(
            parse_arg(&kind, "[1,2]"),
            Err(AbiError::ArrayLength {
                expected: 3,
                got: 2
            })
        );
    }

    #[test]
    fn test_split_list_handles_nesting_and_quotes() {
        assert_eq!(
            split_list(r#"[1, "a,b", [2,3]]"#).unwrap(),
            vec!["1".to_string(), "a,b".to_string(), "[2,3]".to_string()]
        );
        assert_eq!(split_list("[]").unwrap(), Vec::<String>::new());
        assert!(split_list("1,2").is_none());
    }

    #[test]
    fn test_decode_truncated_data() {
        let result = decode(&[ParamType::Uint(256)], &[0u8; 10]);
        assert_eq!(result, Err(AbiError::Truncated));
    }

    #[test]
    fn test_render_trims_fixed_bytes() {
        let kind = ParamType::FixedBytes(32);
        let token = parse_arg(&kind, "marmot").unwrap();
        let decoded = decode(&[kind.clone()], &encode(&[kind], &[token])).unwrap();
        assert_eq!(decoded[0].render(), "marmot");
    }
}
