//! The result table.
//!
//! Maps job names to the results they recorded, remembering the order in
//! which they were recorded so exports list jobs the way they ran.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::domain::{JobOutput, JobResults, VarRef};

use super::error::JobError;

/// Recorded results for one run
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    order: Vec<String>,
    entries: HashMap<String, JobResults>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job's results. Re-recording a name replaces the old entry
    /// and moves it to the end.
    pub fn record(&mut self, name: &str, results: JobResults) {
        if self.entries.insert(name.to_string(), results).is_some() {
            self.order.retain(|n| n != name);
        }
        self.order.push(name.to_string());
    }

    /// Drop a job's results entirely
    pub fn clear(&mut self, name: &str) -> Option<JobResults> {
        let removed = self.entries.remove(name);
        if removed.is_some() {
            self.order.retain(|n| n != name);
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&JobResults> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Entries in the order they were recorded
    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobResults)> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|r| (name.as_str(), r)))
    }

    /// The output a reference points at
    pub fn lookup(&self, reference: &VarRef) -> Result<&JobOutput, JobError> {
        let results = self
            .entries
            .get(&reference.job)
            .ok_or_else(|| JobError::UnresolvedReference {
                job: reference.job.clone(),
                field: None,
            })?;

        match &reference.field {
            None => Ok(&results.full_result),
            Some(field) => {
                results
                    .named_results
                    .get(field)
                    .ok_or_else(|| JobError::UnresolvedReference {
                        job: reference.job.clone(),
                        field: Some(field.clone()),
                    })
            }
        }
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, results) in self.iter() {
            map.serialize_entry(name, results)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn test_record_keeps_execution_order() {
        let mut table = ResultTable::new();
        table.record("b", JobResults::text("2"));
        table.record("a", JobResults::text("1"));

        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_rerecord_moves_to_end() {
        let mut table = ResultTable::new();
        table.record("x", JobResults::text("old"));
        table.record("y", JobResults::text("y"));
        table.record("x", JobResults::text("new"));

        let names: Vec<&str> = table.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["y", "x"]);
        assert_eq!(table.get("x").unwrap().full_result.string_result, "new");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_lookup_named_field() {
        let mut table = ResultTable::new();
        let mut named = BTreeMap::new();
        named.insert("owner".to_string(), JobOutput::text("ABCD"));
        table.record("info", JobResults::text("(ABCD, 3)").with_named(named));

        let owner = VarRef::parse("$info.owner").unwrap();
        assert_eq!(table.lookup(&owner).unwrap().string_result, "ABCD");

        let missing = VarRef::parse("$info.count").unwrap();
        assert!(matches!(
            table.lookup(&missing),
            Err(JobError::UnresolvedReference { field: Some(_), .. })
        ));
    }

    #[test]
    fn test_serializes_in_order() {
        let mut table = ResultTable::new();
        table.record("second", JobResults::text("2"));
        table.record("first", JobResults::text("1"));
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.find("second").unwrap() < json.find("first").unwrap());
    }
}
