//! Domain types for the chainpm job runner.
//!
//! This module contains the core data structures:
//! - Job: Declared operations and their kinds
//! - Value: Values, rendered results and recorded job results
//! - VarRef: `$job[.field]` references between jobs
//! - Run: Execution summary

pub mod job;
pub mod reference;
pub mod run;
pub mod value;

// Re-export commonly used types
pub use job::{Job, JobDefinitionError, JobKind};
pub use reference::VarRef;
pub use run::{JobRecord, JobStatus, RunState, RunSummary};
pub use value::{JobOutput, JobResults, Value};
