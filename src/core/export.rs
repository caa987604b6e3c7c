//! Writing recorded results to disk.
//!
//! Exports are a projection of the result table: CSV with one `name,result`
//! row per job, or indented JSON with the run summary and the results keyed
//! by job name. Files are written through a temp file and renamed into place.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::domain::RunSummary;

use super::results::ResultTable;

/// Export file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    /// File written when no explicit path is given
    pub fn default_file_name(self) -> &'static str {
        match self {
            OutputFormat::Json => "jobs_output.json",
            OutputFormat::Csv => "jobs_output.csv",
        }
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    summary: &'a RunSummary,
    results: &'a ResultTable,
}

/// `name,result` rows in execution order
pub fn render_csv(results: &ResultTable) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for (name, job_results) in results.iter() {
        writer
            .write_record([name, job_results.full_result.string_result.as_str()])
            .context("Failed to write CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Indented JSON with the run summary and the result table
pub fn render_json(summary: &RunSummary, results: &ResultTable) -> Result<String> {
    serde_json::to_string_pretty(&JsonExport { summary, results })
        .context("Failed to serialize results")
}

/// Write the results to `path` in `format`
pub fn write_results(
    path: &Path,
    format: OutputFormat,
    summary: &RunSummary,
    results: &ResultTable,
) -> Result<()> {
    let content = match format {
        OutputFormat::Json => render_json(summary, results)?,
        OutputFormat::Csv => render_csv(results)?,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let mut file = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    file.write_all(content.as_bytes())
        .context("Failed to write results")?;
    file.persist(path)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;

    info!(path = %path.display(), jobs = results.len(), "Results written");
    Ok(())
}
