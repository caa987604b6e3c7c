//! The job engine.
//!
//! This module contains:
//! - ResultTable: Recorded results by job name
//! - Interpolate: `$job[.field]` resolution
//! - RunContext: Active account, defaults, collaborators
//! - Finalize: Sign, broadcast and extract transaction results
//! - JobRunner: Sequential execution and duplicate-name policy
//! - Document: Run document loading
//! - Export: CSV/JSON result files

pub mod context;
pub mod document;
pub mod error;
pub mod export;
pub mod finalize;
pub mod interpolate;
pub mod results;
pub mod runner;

// Re-export commonly used types
pub use context::{normalize_address, AccountOverride, RunContext, RunDefaults, RunPaths};
pub use document::JobDocument;
pub use error::JobError;
pub use export::{write_results, OutputFormat};
pub use finalize::{finalize, sign_and_broadcast, Facet};
pub use results::ResultTable;
pub use runner::{Confirm, DuplicatePolicy, JobFailure, JobRunner, StdinConfirm};
