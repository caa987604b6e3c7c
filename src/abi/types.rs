//! Contract ABI parameter types.

use std::fmt;
use std::str::FromStr;

use super::AbiError;

/// A Solidity parameter type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    /// Unsigned integer of the given bit width
    Uint(usize),

    /// Signed integer of the given bit width
    Int(usize),

    Bool,

    Address,

    String,

    Bytes,

    /// `bytesN`
    FixedBytes(usize),

    /// `T[]`
    Array(Box<ParamType>),

    /// `T[N]`
    FixedArray(Box<ParamType>, usize),
}

impl ParamType {
    /// Whether the encoding lives in the tail section
    pub fn is_dynamic(&self) -> bool {
        match self {
            ParamType::String | ParamType::Bytes | ParamType::Array(_) => true,
            ParamType::FixedArray(inner, _) => inner.is_dynamic(),
            _ => false,
        }
    }

    /// Bytes this type occupies in the head section
    pub fn head_size(&self) -> usize {
        match self {
            ParamType::FixedArray(inner, len) if !self.is_dynamic() => inner.head_size() * len,
            _ => 32,
        }
    }

    /// Whether values of this type are written as bracketed lists
    pub fn is_list(&self) -> bool {
        matches!(self, ParamType::Array(_) | ParamType::FixedArray(..))
    }
}

impl FromStr for ParamType {
    type Err = AbiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let unknown = || AbiError::UnknownType(s.to_string());

        if let Some(body) = s.strip_suffix(']') {
            let open = body.rfind('[').ok_or_else(unknown)?;
            let inner: ParamType = body[..open].parse()?;
            let size = &body[open + 1..];
            return if size.is_empty() {
                Ok(ParamType::Array(Box::new(inner)))
            } else {
                let len = size.parse().map_err(|_| unknown())?;
                Ok(ParamType::FixedArray(Box::new(inner), len))
            };
        }

        match s {
            "bool" => return Ok(ParamType::Bool),
            "address" => return Ok(ParamType::Address),
            "string" => return Ok(ParamType::String),
            "bytes" => return Ok(ParamType::Bytes),
            "uint" => return Ok(ParamType::Uint(256)),
            "int" => return Ok(ParamType::Int(256)),
            _ => {}
        }

        let sized = |prefix: &str| -> Option<usize> { s.strip_prefix(prefix)?.parse().ok() };

        if let Some(bits) = sized("uint") {
            if bits > 0 && bits <= 256 && bits % 8 == 0 {
                return Ok(ParamType::Uint(bits));
            }
        } else if let Some(bits) = sized("int") {
            if bits > 0 && bits <= 256 && bits % 8 == 0 {
                return Ok(ParamType::Int(bits));
            }
        } else if let Some(len) = sized("bytes") {
            if len > 0 && len <= 32 {
                return Ok(ParamType::FixedBytes(len));
            }
        }

        Err(unknown())
    }
}

/// Canonical form, as used in function signatures
impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Uint(bits) => write!(f, "uint{}", bits),
            ParamType::Int(bits) => write!(f, "int{}", bits),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Address => f.write_str("address"),
            ParamType::String => f.write_str("string"),
            ParamType::Bytes => f.write_str("bytes"),
            ParamType::FixedBytes(len) => write!(f, "bytes{}", len),
            ParamType::Array(inner) => write!(f, "{}[]", inner),
            ParamType::FixedArray(inner, len) => write!(f, "{}[{}]", inner, len),
        }
    }
}
