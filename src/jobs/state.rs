//! Chain state dumps and restores.
//!
//! Only file targets are supported; IPFS targets are rejected at
//! pre-process time.

use async_trait::async_trait;
use tracing::info;

use crate::core::interpolate::resolve_in_place;
use crate::core::{JobError, RunContext};
use crate::domain::job::{DumpState, RestoreState};
use crate::domain::JobResults;

use super::{require, JobHandler};

fn reject_ipfs(kind: &str, ipfs: bool) -> Result<(), JobError> {
    if ipfs {
        return Err(JobError::Validation(format!(
            "{} job cannot use IPFS; use a file instead",
            kind
        )));
    }
    Ok(())
}

#[async_trait]
impl JobHandler for DumpState {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        reject_ipfs("dump-state", self.to_ipfs)?;
        resolve_in_place(&mut self.file, &ctx.results)?;
        require("dump-state", "file", &self.file)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let state = ctx.node.dump_state(self.include_validators).await?;
        let content = serde_json::to_string_pretty(&state)
            .map_err(|e| JobError::ChainInteraction(format!("unreadable state dump: {}", e)))?;

        tokio::fs::write(&self.file, content).await?;
        info!(file = %self.file, "State dumped");
        Ok(JobResults::text(self.file.clone()))
    }
}

#[async_trait]
impl JobHandler for RestoreState {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        reject_ipfs("restore-state", self.from_ipfs)?;
        resolve_in_place(&mut self.file, &ctx.results)?;
        require("restore-state", "file", &self.file)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let content = tokio::fs::read_to_string(&self.file).await?;
        let state: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            JobError::Validation(format!("{} is not a valid state dump: {}", self.file, e))
        })?;

        ctx.node.restore_state(state).await?;
        info!(file = %self.file, "State restored");
        Ok(JobResults::text(self.file.clone()))
    }
}
