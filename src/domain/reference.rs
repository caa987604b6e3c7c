//! Variable references.
//!
//! A reference is written `$job` or `$job.field`. The job part names an
//! earlier job in the run; the optional field part names one of that job's
//! named results.

use std::fmt;

/// A parsed `$job[.field]` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    /// Name of the job whose results are referenced
    pub job: String,

    /// Named result of that job, if the reference targets one field
    pub field: Option<String>,
}

impl VarRef {
    /// Parse a string as a reference.
    ///
    /// Returns `None` for anything not starting with `$`; such strings are
    /// literals. The job name ends at the first `.`. A field of fewer than
    /// two characters is ignored and the reference targets the whole job.
    pub fn parse(input: &str) -> Option<Self> {
        let body = input.strip_prefix('$')?;

        let (job, field) = match body.split_once('.') {
            Some((job, field)) if field.chars().count() > 1 => (job, Some(field.to_string())),
            Some((job, _)) => (job, None),
            None => (body, None),
        };

        Some(Self {
            job: job.to_string(),
            field,
        })
    }

    /// Whether a string would parse as a reference
    pub fn is_reference(input: &str) -> bool {
        input.starts_with('$')
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "${}.{}", self.job, field),
            None => write!(f, "${}", self.job),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_not_a_reference() {
        assert_eq!(VarRef::parse("hello"), None);
        assert_eq!(VarRef::parse(""), None);
        assert!(!VarRef::is_reference("5"));
    }

    #[test]
    fn test_whole_job_reference() {
        let r = VarRef::parse("$deployStorage").unwrap();
        assert_eq!(r.job, "deployStorage");
        assert_eq!(r.field, None);
        assert_eq!(r.to_string(), "$deployStorage");
    }

    #[test]
    fn test_field_reference_splits_on_first_dot() {
        let r = VarRef::parse("$getInfo.owner.name").unwrap();
        assert_eq!(r.job, "getInfo");
        assert_eq!(r.field.as_deref(), Some("owner.name"));
    }

    #[test]
    fn test_trailing_dot_means_no_field() {
        let r = VarRef::parse("$a.").unwrap();
        assert_eq!(r.job, "a");
        assert_eq!(r.field, None);
        assert_eq!(r.to_string(), "$a");
    }

    #[test]
    fn test_single_character_field_is_ignored() {
        let r = VarRef::parse("$a.x").unwrap();
        assert_eq!(r.job, "a");
        assert_eq!(r.field, None);

        let r = VarRef::parse("$a.xy").unwrap();
        assert_eq!(r.field.as_deref(), Some("xy"));
    }
}
