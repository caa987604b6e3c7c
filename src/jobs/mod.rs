//! Job kind implementations.
//!
//! This module contains:
//! - JobHandler: The two-phase (pre-process, execute) contract every kind implements
//! - util: account, set
//! - transact: send, register, permission, bond, unbond, rebond
//! - contracts: compile, deploy, call
//! - query: query-contract, query-account, query-name, query-vals, assert
//! - state: dump-state, restore-state

pub mod contracts;
pub mod query;
pub mod state;
pub mod transact;
pub mod util;

use async_trait::async_trait;
use tracing::warn;

use crate::core::interpolate::resolve_str;
use crate::core::{JobError, RunContext};
use crate::domain::{JobKind, JobResults, Value};

/// The capability set of a job kind
#[async_trait]
pub trait JobHandler: Send {
    /// Account the job signs as, when it overrides the active one
    fn source(&self) -> Option<&str> {
        None
    }

    /// Resolve references, fill in defaults and validate
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError>;

    /// Perform the job's effect and return what to record
    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError>;
}

/// The handler for a job's kind
pub fn handler(kind: &mut JobKind) -> &mut dyn JobHandler {
    match kind {
        JobKind::Account(job) => job,
        JobKind::Set(job) => job,
        JobKind::Compile(job) => job,
        JobKind::Deploy(job) => job,
        JobKind::Send(job) => job,
        JobKind::Register(job) => job,
        JobKind::Permission(job) => job,
        JobKind::Bond(job) => job,
        JobKind::Unbond(job) => job,
        JobKind::Rebond(job) => job,
        JobKind::Call(job) => job,
        JobKind::DumpState(job) => job,
        JobKind::RestoreState(job) => job,
        JobKind::QueryContract(job) => job,
        JobKind::QueryAccount(job) => job,
        JobKind::QueryName(job) => job,
        JobKind::QueryVals(job) => job,
        JobKind::Assert(job) => job,
    }
}

// ============================================================================
// Pre-processing helpers
// ============================================================================

pub(crate) fn use_default(field: &mut String, default: &str) {
    if field.is_empty() {
        *field = default.to_string();
    }
}

pub(crate) fn require(kind: &str, field: &str, value: &str) -> Result<(), JobError> {
    if value.is_empty() {
        return Err(JobError::Validation(format!(
            "{} job requires a {} field",
            kind, field
        )));
    }
    Ok(())
}

pub(crate) fn parse_u64(field: &str, value: &str) -> Result<u64, JobError> {
    value.trim().parse().map_err(|_| {
        JobError::Validation(format!(
            "{} must be a non-negative integer, got '{}'",
            field, value
        ))
    })
}

/// An empty nonce lets the node pick the account's next sequence
pub(crate) fn parse_nonce(value: &str) -> Result<Option<u64>, JobError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    parse_u64("nonce", value).map(Some)
}

/// Resolve a `source`-like field, falling back to the active account
pub(crate) fn resolve_source(source: &mut String, ctx: &RunContext) -> Result<(), JobError> {
    *source = resolve_str(source, &ctx.results)?;
    use_default(source, &ctx.account);
    if source.is_empty() {
        return Err(JobError::Validation(
            "no signing account: add an account job or pass --address".to_string(),
        ));
    }
    Ok(())
}

/// Split call input into a function name and resolved argument strings.
///
/// `data` is normally a list of arguments next to an explicit `function`.
/// Two older forms are still accepted with a warning: a call whose `data` is
/// a single space-delimited string starting with the function name, and a
/// deploy whose constructor arguments are a space-delimited string.
pub(crate) fn input_data(
    function: &str,
    data: Option<&Value>,
    ctx: &RunContext,
    constructor: bool,
) -> Result<(String, Vec<String>), JobError> {
    let missing_function = || {
        JobError::Validation(
            "the job's data must be paired with a function field".to_string(),
        )
    };

    if function.is_empty() && !constructor {
        return match data {
            None => Ok((String::new(), Vec::new())),
            Some(Value::Str(text)) => {
                warn!("Naming the contract function inside `data` is deprecated; use `function` with a `data` list");
                let mut words = text.split_whitespace();
                let function = words.next().unwrap_or_default().to_string();
                let args = words
                    .map(|w| resolve_str(w, &ctx.results))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((function, args))
            }
            Some(_) => Err(missing_function()),
        };
    }

    let args = match data {
        None => Vec::new(),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| argument(item, ctx))
            .collect::<Result<Vec<_>, _>>()?,
        Some(Value::Str(text)) if constructor => {
            warn!("Space-delimited constructor arguments are deprecated; declare them as a list");
            text.split_whitespace()
                .map(|w| resolve_str(w, &ctx.results))
                .collect::<Result<Vec<_>, _>>()?
        }
        Some(scalar @ (Value::Int(_) | Value::Bool(_))) if constructor => {
            vec![scalar.to_string()]
        }
        Some(_) => return Err(missing_function()),
    };

    Ok((function.to_string(), args))
}

/// One call argument rendered as the string the ABI codec parses
fn argument(item: &Value, ctx: &RunContext) -> Result<String, JobError> {
    match item {
        Value::Str(s) => resolve_str(s, &ctx.results),
        Value::Bool(_) | Value::Int(_) | Value::Float(_) => Ok(item.to_string()),
        Value::List(elements) => {
            let parts = elements
                .iter()
                .map(|e| argument(e, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", parts.join(",")))
        }
        other => Err(JobError::UnsupportedType(other.type_name().to_string())),
    }
}
