//! Run documents.
//!
//! A run document is a YAML file with a top-level `jobs:` list. Each entry
//! is decoded into a [`Job`] with exactly one kind.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::Job;

/// A parsed run document
#[derive(Debug, Clone, Deserialize)]
pub struct JobDocument {
    /// Jobs in execution order
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl JobDocument {
    /// Load a run document from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read job file: {}", path.display()))?;

        Self::from_yaml(&content)
            .with_context(|| format!("Invalid job file: {}", path.display()))
    }

    /// Parse a run document from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse job YAML")
    }

    /// Validate the document as a whole
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            anyhow::bail!("Job file must declare at least one job");
        }
        Ok(())
    }

    /// Names in declaration order, duplicates included
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }
}
