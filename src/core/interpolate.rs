//! Resolving `$job[.field]` references.
//!
//! Every job's pre-process step passes its user-supplied fields through
//! here. Literals come back unchanged; references are looked up in the
//! result table; lists resolve element by element.

use crate::domain::{JobOutput, Value, VarRef};

use super::error::JobError;
use super::results::ResultTable;

/// Resolve an arbitrary document value into a rendered result
pub fn resolve(value: &Value, results: &ResultTable) -> Result<JobOutput, JobError> {
    match value {
        Value::Str(s) => resolve_text(s, results),
        Value::Bool(b) => Ok(JobOutput::new(b.to_string(), Value::Bool(*b))),
        Value::Int(i) => Ok(JobOutput::new(i.to_string(), Value::Int(*i))),
        Value::Bytes(bytes) => Ok(JobOutput::new(
            hex::encode_upper(bytes),
            Value::Bytes(bytes.clone()),
        )),
        Value::List(items) => {
            let actual = items
                .iter()
                .map(|item| resolve(item, results).map(|o| o.actual_result))
                .collect::<Result<Vec<_>, _>>()?;
            let list = Value::List(actual);
            let rendered = serde_json::to_string(&list)
                .map_err(|e| JobError::UnsupportedType(e.to_string()))?;
            Ok(JobOutput::new(rendered, list))
        }
        other => Err(JobError::UnsupportedType(other.type_name().to_string())),
    }
}

/// Resolve a string, which is either a literal or a reference
pub fn resolve_text(text: &str, results: &ResultTable) -> Result<JobOutput, JobError> {
    match VarRef::parse(text) {
        Some(reference) => results.lookup(&reference).cloned(),
        None => Ok(JobOutput::text(text)),
    }
}

/// Resolve a string field to its string rendering
pub fn resolve_str(text: &str, results: &ResultTable) -> Result<String, JobError> {
    if !VarRef::is_reference(text) {
        return Ok(text.to_string());
    }
    resolve_text(text, results).map(|o| o.string_result)
}

/// Resolve a string field in place
pub fn resolve_in_place(field: &mut String, results: &ResultTable) -> Result<(), JobError> {
    if VarRef::is_reference(field) {
        *field = resolve_str(field, results)?;
    }
    Ok(())
}

/// Resolve the address part of `Name:Address` library links.
///
/// Links are separated by commas or whitespace.
pub fn resolve_libraries(libraries: &str, results: &ResultTable) -> Result<String, JobError> {
    let mut resolved = Vec::new();
    for link in libraries
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|l| !l.is_empty())
    {
        match link.split_once(':') {
            Some((name, address)) => {
                let address = resolve_str(address, results)?;
                resolved.push(format!("{}:{}", name, address));
            }
            None => resolved.push(link.to_string()),
        }
    }
    Ok(resolved.join(","))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::domain::JobResults;

    fn table() -> ResultTable {
        let mut table = ResultTable::new();
        table.record(
            "a",
            JobResults::single(JobOutput::new("5", Value::Int(5))),
        );
        let mut named = BTreeMap::new();
        named.insert("owner".to_string(), JobOutput::text("ABCD"));
        table.record("info", JobResults::text("(ABCD, 3)").with_named(named));
        table
    }

    #[test]
    fn test_literal_is_unchanged() {
        let results = table();
        for literal in ["hello", "a", "5", "", "info.owner"] {
            assert_eq!(resolve_str(literal, &results).unwrap(), literal);
        }
    }

    #[test]
    fn test_reference_resolves_to_recorded_result() {
        let results = table();
        let output = resolve(&Value::Str("$a".to_string()), &results).unwrap();
        assert_eq!(output.string_result, "5");
        assert_eq!(output.actual_result, Value::Int(5));
        assert_eq!(resolve_str("$info.owner", &results).unwrap(), "ABCD");
    }

    #[test]
    fn test_single_character_field_resolves_whole_job() {
        let results = table();
        assert_eq!(resolve_str("$info.x", &results).unwrap(), "(ABCD, 3)");
        let output = resolve(&Value::Str("$a.x".to_string()), &results).unwrap();
        assert_eq!(output.actual_result, Value::Int(5));
    }

    #[test]
    fn test_missing_job_is_unresolved() {
        let err = resolve_str("$later", &table()).unwrap_err();
        match err {
            JobError::UnresolvedReference { job, field } => {
                assert_eq!(job, "later");
                assert_eq!(field, None);
            }
            other => panic!("Expected UnresolvedReference, got {:?}", other),
        }
    }

    #[test]
    fn test_list_resolves_elementwise() {
        let value = Value::List(vec![
            Value::Str("$a".to_string()),
            Value::Str("x".to_string()),
            Value::Bool(true),
        ]);
        let output = resolve(&value, &table()).unwrap();
        assert_eq!(output.string_result, r#"[5,"x",true]"#);
        assert_eq!(
            output.actual_result,
            Value::List(vec![Value::Int(5), Value::Str("x".to_string()), Value::Bool(true)])
        );
    }

    #[test]
    fn test_unsupported_types() {
        assert!(matches!(
            resolve(&Value::Float(1.5), &table()),
            Err(JobError::UnsupportedType(_))
        ));
        assert!(matches!(
            resolve(&Value::Null, &table()),
            Err(JobError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_library_links() {
        let mut results = table();
        results.record("lib", JobResults::text("1234ABCD"));
        assert_eq!(
            resolve_libraries("Math:$lib, Strings:FFFF", &results).unwrap(),
            "Math:1234ABCD,Strings:FFFF"
        );
    }
}
