//! The job runner.
//!
//! Executes a job list strictly in document order. Each job moves through
//! `Declared → PreProcessed → Executed → Recorded`; the first failure stops
//! the run and hands back the summary together with the error. Results
//! already recorded stay in the context's result table.

use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::job::{Account, Set};
use crate::domain::{Job, JobKind, JobResults, JobStatus, RunSummary, Value};
use crate::jobs;

use super::context::RunContext;
use super::error::JobError;

/// Name of the synthetic account job injected for a default address
pub const DEFAULT_ACCOUNT_JOB: &str = "defaultAddr";

/// What to do when a job's name was already recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Ask before overwriting; declining skips the job
    #[default]
    Prompt,

    /// Overwrite without asking
    Overwrite,

    /// Skip without asking
    Skip,
}

/// Answers overwrite prompts
pub trait Confirm: Send {
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Prompt on stderr, read the answer from stdin
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&mut self, prompt: &str) -> bool {
        eprint!("{} [y/N]: ", prompt);
        let _ = std::io::stderr().flush();

        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

/// A run aborted by a failing job
#[derive(Debug, Error)]
#[error("Job {job} failed: {source}")]
pub struct JobFailure {
    /// Name of the job that failed
    pub job: String,

    #[source]
    pub source: JobError,

    /// State of the run when it stopped
    pub summary: RunSummary,
}

/// Sequential job executor
pub struct JobRunner {
    policy: DuplicatePolicy,

    confirm: Box<dyn Confirm>,

    default_address: Option<String>,

    default_sets: Vec<(String, String)>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

impl JobRunner {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            policy,
            confirm: Box::new(StdinConfirm),
            default_address: None,
            default_sets: Vec::new(),
        }
    }

    /// Replace the prompt used under [`DuplicatePolicy::Prompt`]
    pub fn with_confirm(mut self, confirm: impl Confirm + 'static) -> Self {
        self.confirm = Box::new(confirm);
        self
    }

    /// Switch to this account before any declared job runs
    pub fn with_default_address(mut self, address: Option<String>) -> Self {
        self.default_address = address.filter(|a| !a.is_empty());
        self
    }

    /// Record these `key=value` pairs before any declared job runs
    pub fn with_default_sets(mut self, sets: Vec<(String, String)>) -> Self {
        self.default_sets = sets;
        self
    }

    /// The job list that will actually run: the default account job, then
    /// one `set` job per default pair, then the declared jobs
    pub fn prepare(&self, jobs: Vec<Job>) -> Vec<Job> {
        let mut prepared = Vec::with_capacity(jobs.len() + self.default_sets.len() + 1);

        if let Some(address) = &self.default_address {
            prepared.push(Job::new(
                DEFAULT_ACCOUNT_JOB,
                JobKind::Account(Account {
                    address: address.clone(),
                }),
            ));
        }

        for (key, value) in &self.default_sets {
            prepared.push(Job::new(
                key.clone(),
                JobKind::Set(Set {
                    val: Some(Value::Str(value.clone())),
                    resolved: None,
                }),
            ));
        }

        prepared.extend(jobs);
        prepared
    }

    /// Execute a job list against `ctx`
    #[instrument(skip(self, ctx, jobs), fields(chain_id = %ctx.chain_id))]
    pub async fn run(
        &mut self,
        ctx: &mut RunContext,
        jobs: Vec<Job>,
    ) -> Result<RunSummary, JobFailure> {
        let jobs = self.prepare(jobs);
        let mut summary = RunSummary::new(Uuid::new_v4(), ctx.chain_id.clone());
        info!(run_id = %summary.id, jobs = jobs.len(), "Starting job run");

        for mut job in jobs {
            let index = summary.declare(&job.name, job.kind.kind_name());

            if ctx.results.contains(&job.name) {
                if !self.allow_overwrite(&job.name) {
                    warn!(job = %job.name, "Duplicate job name, skipping job");
                    summary.advance(index, JobStatus::Skipped);
                    continue;
                }
                debug!(job = %job.name, "Dropping previous results of duplicate job");
                ctx.results.clear(&job.name);
            }

            match run_job(ctx, &job.name, &mut job.kind, &mut summary, index).await {
                Ok(results) => {
                    debug!(job = %job.name, result = %results.full_result.string_result, "Job recorded");
                    ctx.results.record(&job.name, results);
                    summary.advance(index, JobStatus::Recorded);
                }
                Err(e) => {
                    error!(job = %job.name, error = %e, "Job failed");
                    summary.fail(index, e.to_string());
                    return Err(JobFailure {
                        job: job.name,
                        source: e,
                        summary,
                    });
                }
            }
        }

        summary.complete();
        info!(
            run_id = %summary.id,
            recorded = summary.recorded_count(),
            "Job run completed"
        );
        Ok(summary)
    }

    fn allow_overwrite(&mut self, name: &str) -> bool {
        match self.policy {
            DuplicatePolicy::Overwrite => true,
            DuplicatePolicy::Skip => false,
            DuplicatePolicy::Prompt => self.confirm.confirm(&format!(
                "Job {} was already run. Overwrite its results?",
                name
            )),
        }
    }
}

async fn run_job(
    ctx: &mut RunContext,
    name: &str,
    kind: &mut JobKind,
    summary: &mut RunSummary,
    index: usize,
) -> Result<JobResults, JobError> {
    let kind_name = kind.kind_name();
    let handler = jobs::handler(kind);

    handler.pre_process(ctx)?;
    summary.advance(index, JobStatus::PreProcessed);

    info!(job = %name, kind = kind_name, "Executing job");
    let source = handler.source().map(str::to_owned);
    let results = {
        let mut scope = ctx.override_account(source.as_deref());
        handler.execute(&mut scope).await?
    };
    summary.advance(index, JobStatus::Executed);

    Ok(results)
}
