//! Errors raised while pre-processing or executing a job.
//!
//! Any of these aborts the run; the runner wraps them in a
//! [`JobFailure`](super::runner::JobFailure) naming the failing job.

use thiserror::Error;

use crate::abi::AbiError;
use crate::adapters::{keys, ClientError};

#[derive(Debug, Error)]
pub enum JobError {
    /// A `$job` or `$job.field` reference could not be satisfied
    #[error("{}", describe_unresolved(.job, .field.as_deref()))]
    UnresolvedReference { job: String, field: Option<String> },

    /// A value of a type that cannot be interpolated
    #[error("Unsupported value type for interpolation: {0}")]
    UnsupportedType(String),

    #[error(transparent)]
    Abi(#[from] AbiError),

    /// Signing, broadcast or query failure reported by the chain
    #[error("Chain interaction failed: {0}")]
    ChainInteraction(String),

    #[error(
        "Could not reach the key-signing daemon at {url}. Start the keys service (or point \
         --keys-url / CHAINPM_KEYS_URL at a running one) and run the job list again"
    )]
    KeysUnreachable { url: String },

    /// Malformed job or missing required field
    #[error("Invalid job: {0}")]
    Validation(String),

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("Assertion failed: {key} {relation} {val}")]
    AssertionFailed {
        key: String,
        relation: String,
        val: String,
    },

    /// A transaction finished without the facet the job asked for
    #[error("No {0} was returned by the chain")]
    NoResult(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not read CSV data: {0}")]
    Csv(#[from] csv::Error),
}

fn describe_unresolved(job: &str, field: Option<&str>) -> String {
    match field {
        Some(field) => format!("Could not find results for field {} of job {}", field, job),
        None => format!("Could not find results for job {}", job),
    }
}

impl From<ClientError> for JobError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable { service, url, .. } if service == keys::SERVICE => {
                JobError::KeysUnreachable { url }
            }
            other => JobError::ChainInteraction(other.to_string()),
        }
    }
}
