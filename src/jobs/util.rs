//! Jobs that only touch the run context: `account` and `set`.

use async_trait::async_trait;
use tracing::info;

use crate::core::interpolate::{resolve, resolve_in_place};
use crate::core::{normalize_address, JobError, RunContext};
use crate::domain::job::{Account, Set};
use crate::domain::JobResults;

use super::{require, JobHandler};

#[async_trait]
impl JobHandler for Account {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_in_place(&mut self.address, &ctx.results)?;
        self.address = normalize_address(&self.address);
        require("account", "address", &self.address)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let public_key = ctx.keys.public_key(&self.address).await?;
        ctx.set_account(self.address.clone(), public_key);
        info!(account = %self.address, "Active account changed");
        Ok(JobResults::text(self.address.clone()))
    }
}

#[async_trait]
impl JobHandler for Set {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        let val = self
            .val
            .as_ref()
            .ok_or_else(|| JobError::Validation("set job requires a val field".to_string()))?;
        self.resolved = Some(resolve(val, &ctx.results)?);
        Ok(())
    }

    async fn execute(&mut self, _ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let output = self
            .resolved
            .take()
            .ok_or_else(|| JobError::Validation("set job was not pre-processed".to_string()))?;
        Ok(output.into())
    }
}
