//! Values carried through a run.
//!
//! A `Value` is whatever a job document or a job result can hold. A
//! `JobOutput` pairs the string rendering used for interpolation with the
//! underlying typed value, and `JobResults` is what a job records once it
//! has executed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A loosely typed value from a job document or a job result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),

    Int(i64),

    Float(f64),

    Str(String),

    List(Vec<Value>),

    Map(BTreeMap<String, Value>),

    /// Raw bytes, serialized as a hex string
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),

    Null,
}

impl Value {
    /// Short type name used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Bytes(_) => "bytes",
            Value::Null => "null",
        }
    }

    /// Borrow the inner string, if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&hex::encode_upper(b)),
            Value::Null => Ok(()),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

/// One rendered result: the interpolation-facing string and the typed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Rendering used when this result is interpolated into a string field
    pub string_result: String,

    /// The underlying typed value
    pub actual_result: Value,
}

impl JobOutput {
    pub fn new(string_result: impl Into<String>, actual_result: Value) -> Self {
        Self {
            string_result: string_result.into(),
            actual_result,
        }
    }

    /// A plain string result whose rendering and value agree
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        Self {
            string_result: s.clone(),
            actual_result: Value::Str(s),
        }
    }
}

/// Everything a job records in the result table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResults {
    /// The job's single canonical output
    pub full_result: JobOutput,

    /// Per-field outputs, keyed by output name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_results: BTreeMap<String, JobOutput>,
}

impl JobResults {
    /// Results with only a full result
    pub fn single(full_result: JobOutput) -> Self {
        Self {
            full_result,
            named_results: BTreeMap::new(),
        }
    }

    /// Results holding one plain string
    pub fn text(s: impl Into<String>) -> Self {
        Self::single(JobOutput::text(s))
    }

    /// Results for a job that produced nothing
    pub fn empty() -> Self {
        Self::text("")
    }

    /// Attach named per-field outputs
    pub fn with_named(mut self, named: BTreeMap<String, JobOutput>) -> Self {
        self.named_results = named;
        self
    }
}

impl From<JobOutput> for JobResults {
    fn from(output: JobOutput) -> Self {
        Self::single(output)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_yaml_scalars() {
        let values: Vec<Value> = serde_yaml::from_str("[5, true, abc, [1, two]]").unwrap();
        assert_eq!(values[0], Value::Int(5));
        assert_eq!(values[1], Value::Bool(true));
        assert_eq!(values[2], Value::Str("abc".to_string()));
        assert_eq!(
            values[3],
            Value::List(vec![Value::Int(1), Value::Str("two".to_string())])
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Bytes(vec![0xab, 0x01]).to_string(), "AB01");
        let list = Value::List(vec![Value::Str("a".into()), Value::Int(2)]);
        assert_eq!(list.to_string(), r#"["a",2]"#);
    }

    #[test]
    fn test_job_results_serialization_skips_empty_named() {
        let results = JobResults::text("DEADBEEF");
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["full_result"]["string_result"], "DEADBEEF");
        assert!(json.get("named_results").is_none());
    }
}
