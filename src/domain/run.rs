//! Run state.
//!
//! A RunSummary represents a single execution of a job document: which jobs
//! were declared, how far each one got, and how the run ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of one execution of a job list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Chain the run executed against
    pub chain_id: String,

    /// Current state of the run
    pub state: RunState,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run completed (if applicable)
    pub completed_at: Option<DateTime<Utc>>,

    /// Every job the run saw, in execution order
    pub jobs: Vec<JobRecord>,
}

impl RunSummary {
    /// Create a new run
    pub fn new(id: Uuid, chain_id: String) -> Self {
        Self {
            id,
            chain_id,
            state: RunState::Running,
            started_at: Utc::now(),
            completed_at: None,
            jobs: Vec::new(),
        }
    }

    /// Register a job as declared; returns its position in the summary
    pub fn declare(&mut self, name: &str, kind: &str) -> usize {
        self.jobs.push(JobRecord {
            name: name.to_string(),
            kind: kind.to_string(),
            status: JobStatus::Declared,
            error: None,
        });
        self.jobs.len() - 1
    }

    /// Move a declared job to a new status
    pub fn advance(&mut self, index: usize, status: JobStatus) {
        if let Some(record) = self.jobs.get_mut(index) {
            record.status = status;
        }
    }

    /// Mark a job and the run as failed
    pub fn fail(&mut self, index: usize, error: String) {
        if let Some(record) = self.jobs.get_mut(index) {
            record.status = JobStatus::Failed;
            record.error = Some(error.clone());
        }
        self.state = RunState::Failed {
            job: self
                .jobs
                .get(index)
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            error,
        };
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run as completed
    pub fn complete(&mut self) {
        self.state = RunState::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    /// Number of jobs whose results were recorded
    pub fn recorded_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|r| r.status == JobStatus::Recorded)
            .count()
    }

    /// Status of the most recent job with this name
    pub fn status_of(&self, name: &str) -> Option<JobStatus> {
        self.jobs.iter().rev().find(|r| r.name == name).map(|r| r.status)
    }
}

/// What happened to one declared job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,

    pub kind: String,

    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-job lifecycle: `Declared -> PreProcessed -> Executed -> Recorded`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Declared,

    PreProcessed,

    Executed,

    Recorded,

    /// Duplicate name and the overwrite was declined
    Skipped,

    Failed,
}

/// State of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Completed successfully
    Completed,

    /// Stopped at the first failing job
    Failed { job: String, error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_creation() {
        let run_id = Uuid::new_v4();
        let run = RunSummary::new(run_id, "test-chain".to_string());

        assert_eq!(run.id, run_id);
        assert_eq!(run.chain_id, "test-chain");
        assert!(run.is_running());
    }

    #[test]
    fn test_job_lifecycle() {
        let mut run = RunSummary::new(Uuid::new_v4(), String::new());
        let first = run.declare("setStorage", "set");
        run.advance(first, JobStatus::PreProcessed);
        run.advance(first, JobStatus::Executed);
        run.advance(first, JobStatus::Recorded);
        let second = run.declare("deploy", "deploy");
        run.fail(second, "boom".to_string());

        assert_eq!(run.recorded_count(), 1);
        assert_eq!(run.status_of("deploy"), Some(JobStatus::Failed));
        assert_eq!(
            run.state,
            RunState::Failed {
                job: "deploy".to_string(),
                error: "boom".to_string()
            }
        );
        assert!(run.completed_at.is_some());
    }
}
