//! Contract ABI handling.
//!
//! This module contains:
//! - Abi: the JSON interface description emitted by the compiler
//! - ParamType: Solidity parameter types
//! - codec: argument packing and return unpacking
//!
//! The job runner only needs two operations from here: [`Abi::encode_call`]
//! to turn a function name and argument strings into call data, and
//! [`Abi::decode_return`] to turn return bytes into recorded results.

pub mod codec;
pub mod types;

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::{JobOutput, JobResults, Value};

pub use codec::Token;
pub use types::ParamType;

/// Errors raised while encoding or decoding against an ABI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("Invalid ABI definition: {0}")]
    InvalidSpec(String),

    #[error("Could not find an ABI for {0}")]
    NotFound(String),

    #[error("Function {0} was not found in the ABI")]
    UnknownFunction(String),

    #[error("Unsupported ABI type: {0}")]
    UnknownType(String),

    #[error("Function {function} expects {expected} arguments, got {got}")]
    ArgumentCount {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("Length of array does not match, expected {expected} got {got}")]
    ArrayLength { expected: usize, got: usize },

    #[error("Invalid value {value:?} for type {kind}")]
    InvalidValue { kind: String, value: String },

    #[error("Return data is too short to decode")]
    Truncated,
}

/// One entry of an ABI JSON array
#[derive(Debug, Clone, Deserialize)]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub inputs: Vec<AbiParam>,

    #[serde(default)]
    pub outputs: Vec<AbiParam>,
}

fn default_entry_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,
}

/// A parsed contract interface
#[derive(Debug, Clone, Default)]
pub struct Abi {
    entries: Vec<AbiEntry>,
}

impl Abi {
    /// Parse an ABI JSON document; an empty document is an empty ABI
    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Vec<AbiEntry> =
            serde_json::from_str(json).map_err(|e| AbiError::InvalidSpec(e.to_string()))?;
        Ok(Self { entries })
    }

    /// Look up a function by name
    pub fn function(&self, name: &str) -> Option<&AbiEntry> {
        self.entries
            .iter()
            .find(|e| e.entry_type == "function" && e.name == name)
    }

    pub fn constructor(&self) -> Option<&AbiEntry> {
        self.entries.iter().find(|e| e.entry_type == "constructor")
    }

    pub fn has_fallback(&self) -> bool {
        self.entries.iter().any(|e| e.entry_type == "fallback")
    }

    /// Call data for `function(args...)`.
    ///
    /// An empty function name targets the fallback function, which takes no
    /// arguments and is invoked with empty call data.
    pub fn encode_call(&self, function: &str, args: &[String]) -> Result<Vec<u8>, AbiError> {
        if function.is_empty() {
            if self.has_fallback() && args.is_empty() {
                return Ok(Vec::new());
            }
            return Err(AbiError::UnknownFunction("(fallback)".to_string()));
        }

        let entry = self
            .function(function)
            .ok_or_else(|| AbiError::UnknownFunction(function.to_string()))?;
        let kinds = param_types(&entry.inputs)?;
        let tokens = parse_args(function, &kinds, args)?;

        let signature = format!(
            "{}({})",
            function,
            kinds.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        );
        let mut data = codec::selector(&signature).to_vec();
        data.extend(codec::encode(&kinds, &tokens));
        Ok(data)
    }

    /// Packed constructor arguments, appended to deploy bytecode
    pub fn encode_constructor(&self, args: &[String]) -> Result<Vec<u8>, AbiError> {
        let inputs = self.constructor().map(|c| c.inputs.as_slice()).unwrap_or(&[]);
        let kinds = param_types(inputs)?;
        let tokens = parse_args("constructor", &kinds, args)?;
        Ok(codec::encode(&kinds, &tokens))
    }

    /// Decode the return data of `function` into job results.
    ///
    /// Each output becomes a named result (unnamed outputs are keyed by
    /// position). The full result is the single output's rendering, or
    /// `(a, b, ...)` when there are several.
    pub fn decode_return(&self, function: &str, data: &[u8]) -> Result<JobResults, AbiError> {
        let entry = self
            .function(function)
            .ok_or_else(|| AbiError::UnknownFunction(function.to_string()))?;
        let kinds = param_types(&entry.outputs)?;
        let tokens = codec::decode(&kinds, data)?;

        let outputs: Vec<(String, JobOutput)> = entry
            .outputs
            .iter()
            .zip(&tokens)
            .enumerate()
            .map(|(i, (param, token))| {
                let name = if param.name.is_empty() {
                    i.to_string()
                } else {
                    param.name.clone()
                };
                (name, JobOutput::new(token.render(), token.to_value()))
            })
            .collect();

        let full_result = match outputs.as_slice() {
            [] => JobOutput::text(""),
            [(_, only)] => only.clone(),
            many => {
                let rendered: Vec<&str> =
                    many.iter().map(|(_, o)| o.string_result.as_str()).collect();
                JobOutput::new(
                    format!("({})", rendered.join(", ")),
                    Value::List(many.iter().map(|(_, o)| o.actual_result.clone()).collect()),
                )
            }
        };

        let named: BTreeMap<String, JobOutput> = outputs.into_iter().collect();
        Ok(JobResults::single(full_result).with_named(named))
    }
}

fn param_types(params: &[AbiParam]) -> Result<Vec<ParamType>, AbiError> {
    params.iter().map(|p| p.kind.parse()).collect()
}

fn parse_args(function: &str, kinds: &[ParamType], args: &[String]) -> Result<Vec<Token>, AbiError> {
    if kinds.len() != args.len() {
        return Err(AbiError::ArgumentCount {
            function: function.to_string(),
            expected: kinds.len(),
            got: args.len(),
        });
    }
    kinds
        .iter()
        .zip(args)
        .map(|(kind, arg)| codec::parse_arg(kind, arg))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STORAGE_ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"initial","type":"uint256"}]},
        {"type":"function","name":"set","inputs":[{"name":"x","type":"uint256"}],"outputs":[]},
        {"type":"function","name":"get","inputs":[],"outputs":[{"name":"","type":"uint256"}]},
        {"type":"function","name":"info","inputs":[],"outputs":[
            {"name":"owner","type":"address"},{"name":"count","type":"uint8"}]},
        {"type":"fallback"}
    ]"#;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_encode_call_prefixes_selector() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let data = abi.encode_call("set", &args(&["7"])).unwrap();
        assert_eq!(&data[..4], &codec::selector("set(uint256)"));
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 7);
    }

    #[test]
    fn test_argument_count_mismatch() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let err = abi.encode_call("set", &[]).unwrap_err();
        assert!(matches!(err, AbiError::ArgumentCount { expected: 1, got: 0, .. }));
    }

    #[test]
    fn test_unknown_function_is_named() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let err = abi.encode_call("missing", &[]).unwrap_err();
        assert_eq!(err, AbiError::UnknownFunction("missing".to_string()));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_fallback_call_has_empty_data() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        assert_eq!(abi.encode_call("", &[]).unwrap(), Vec::<u8>::new());

        let without_fallback = Abi::from_json(r#"[{"type":"function","name":"f"}]"#).unwrap();
        assert!(without_fallback.encode_call("", &[]).is_err());
    }

    #[test]
    fn test_decode_single_unnamed_output() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let mut data = vec![0u8; 32];
        data[31] = 42;
        let results = abi.decode_return("get", &data).unwrap();
        assert_eq!(results.full_result.string_result, "42");
        assert_eq!(results.full_result.actual_result, Value::Int(42));
        assert_eq!(results.named_results["0"].string_result, "42");
    }

    #[test]
    fn test_decode_multiple_outputs_renders_tuple() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let mut data = vec![0u8; 64];
        data[12..32].copy_from_slice(&[0xAB; 20]);
        data[63] = 3;
        let results = abi.decode_return("info", &data).unwrap();
        let owner = "AB".repeat(20);
        assert_eq!(results.full_result.string_result, format!("({}, 3)", owner));
        assert_eq!(results.named_results["owner"].string_result, owner);
        assert_eq!(results.named_results["count"].string_result, "3");
    }

    #[test]
    fn test_constructor_args() {
        let abi = Abi::from_json(STORAGE_ABI).unwrap();
        let packed = abi.encode_constructor(&args(&["1"])).unwrap();
        assert_eq!(packed.len(), 32);
        assert!(Abi::default().encode_constructor(&[]).unwrap().is_empty());
    }
}
