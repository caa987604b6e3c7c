//! chainpm - Deployment job runner for blockchain projects
//!
//! Reads a YAML list of jobs (compile and deploy contracts, call them, move
//! value, query chain state, assert on results) and executes it against a
//! running chain node, one job at a time.
//!
//! # Architecture
//!
//! The engine is built around a result table:
//! - Every job records its result under its name
//! - Later jobs reference earlier results as `$name` or `$name.field`
//! - The first failing job stops the run; recorded results are kept and
//!   can still be exported
//!
//! # Modules
//!
//! - `domain`: Data structures (Job, JobKind, Value, JobResults, RunSummary)
//! - `core`: Engine (ResultTable, RunContext, JobRunner, finalization, export)
//! - `jobs`: Pre-process and execute logic for every job kind
//! - `abi`: Contract ABI encoding and decoding
//! - `adapters`: Chain node, key-signing daemon and compiler clients
//! - `config`: Config file and environment resolution
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run epm.yaml in the current directory
//! chainpm run
//!
//! # Run a job file as a specific account, exporting results
//! chainpm run deploy.yaml --address 1A2B3C --output json
//!
//! # Show resolved configuration
//! chainpm config
//! ```

pub mod abi;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod jobs;

// Re-export main types at crate root for convenience
pub use core::{JobDocument, JobError, JobFailure, JobRunner, ResultTable, RunContext};
pub use domain::{Job, JobKind, JobResults, RunState, RunSummary, Value};

// Collaborator interfaces
pub use adapters::{Compiler, KeyClient, NodeClient};
