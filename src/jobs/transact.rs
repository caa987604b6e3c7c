//! Plain transaction jobs: send, register, permission, bond, unbond, rebond.
//!
//! Each resolves its fields, builds a [`TxRequest`] and hands it to the
//! finalizer. The recorded result is the transaction hash.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::adapters::{TxBody, TxRequest};
use crate::core::interpolate::{resolve_in_place, resolve_str};
use crate::core::{finalize, normalize_address, Facet, JobError, RunContext};
use crate::domain::job::{Bond, Permission, Rebond, RegisterName, SendValue, Unbond};
use crate::domain::JobResults;

use super::{parse_nonce, parse_u64, require, resolve_source, use_default, JobHandler};

// ============================================================================
// Send
// ============================================================================

#[async_trait]
impl JobHandler for SendValue {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        resolve_in_place(&mut self.destination, &ctx.results)?;
        resolve_in_place(&mut self.amount, &ctx.results)?;
        resolve_in_place(&mut self.nonce, &ctx.results)?;
        use_default(&mut self.amount, &ctx.defaults.amount);
        require("send", "destination", &self.destination)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let request = TxRequest::new(
            normalize_address(&self.source),
            parse_nonce(&self.nonce)?,
            TxBody::Send {
                to: normalize_address(&self.destination),
                amount: parse_u64("amount", &self.amount)?,
            },
        );
        let hash = finalize(ctx, request, Facet::Hash).await?;
        Ok(JobResults::text(hash))
    }
}

// ============================================================================
// Name registry
// ============================================================================

#[async_trait]
impl JobHandler for RegisterName {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        for field in [
            &mut self.name,
            &mut self.data,
            &mut self.data_file,
            &mut self.amount,
            &mut self.fee,
            &mut self.nonce,
        ] {
            resolve_in_place(field, &ctx.results)?;
        }
        use_default(&mut self.amount, &ctx.defaults.amount);
        use_default(&mut self.fee, &ctx.defaults.fee);

        if self.data_file.is_empty() {
            require("register", "name", &self.name)?;
        }
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let fee = parse_u64("fee", &self.fee)?;
        let mut nonce = parse_nonce(&self.nonce)?;

        if self.data_file.is_empty() {
            let request = TxRequest::new(
                normalize_address(&self.source),
                nonce,
                TxBody::Name {
                    name: self.name.clone(),
                    data: self.data.clone(),
                    amount: parse_u64("amount", &self.amount)?,
                    fee,
                },
            );
            let hash = finalize(ctx, request, Facet::Hash).await?;
            return Ok(JobResults::text(hash));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.data_file)?;

        let mut last_hash = None;
        for record in reader.records() {
            let record = record?;
            let name = resolve_str(record.get(0).unwrap_or_default(), &ctx.results)?;
            if name.is_empty() {
                continue;
            }
            let data = resolve_str(record.get(1).unwrap_or_default(), &ctx.results)?;
            let amount = match record.get(2).filter(|a| !a.is_empty()) {
                Some(amount) => resolve_str(amount, &ctx.results)?,
                None => self.amount.clone(),
            };

            debug!(%name, "Registering name from data file");
            let request = TxRequest::new(
                normalize_address(&self.source),
                nonce,
                TxBody::Name {
                    name,
                    data,
                    amount: parse_u64("amount", &amount)?,
                    fee,
                },
            );
            last_hash = Some(finalize(ctx, request, Facet::Hash).await?);
            nonce = nonce.map(|n| n + 1);
        }

        let hash = last_hash.ok_or_else(|| {
            JobError::Validation(format!("data file {} has no names to register", self.data_file))
        })?;
        Ok(JobResults::text(hash))
    }
}

// ============================================================================
// Permissions
// ============================================================================

impl Permission {
    /// Transaction arguments for the action
    fn arguments(&self) -> Result<Vec<String>, JobError> {
        let args = match self.action.as_str() {
            "set_global" => vec![self.permission.clone(), self.value.clone()],
            "set_base" => vec![
                self.target.clone(),
                self.permission.clone(),
                self.value.clone(),
            ],
            "unset_base" => vec![self.target.clone(), self.permission.clone()],
            "add_role" | "rm_role" => vec![self.target.clone(), self.role.clone()],
            other => {
                return Err(JobError::Validation(format!(
                    "unknown permission action '{}' (expected set_base, unset_base, set_global, add_role or rm_role)",
                    other
                )))
            }
        };
        Ok(args)
    }
}

#[async_trait]
impl JobHandler for Permission {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        for field in [
            &mut self.action,
            &mut self.permission,
            &mut self.value,
            &mut self.target,
            &mut self.role,
            &mut self.nonce,
        ] {
            resolve_in_place(field, &ctx.results)?;
        }

        require("permission", "action", &self.action)?;
        if self.action != "set_global" {
            require("permission", "target", &self.target)?;
            self.target = normalize_address(&self.target);
        }
        self.arguments().map(|_| ())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let request = TxRequest::new(
            normalize_address(&self.source),
            parse_nonce(&self.nonce)?,
            TxBody::Permission {
                action: self.action.clone(),
                args: self.arguments()?,
            },
        );
        let hash = finalize(ctx, request, Facet::Hash).await?;
        info!(action = %self.action, "Permission changed");
        Ok(JobResults::text(hash))
    }
}

// ============================================================================
// Validators
// ============================================================================

#[async_trait]
impl JobHandler for Bond {
    fn source(&self) -> Option<&str> {
        Some(&self.account)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.account, ctx)?;
        resolve_in_place(&mut self.pub_key, &ctx.results)?;
        resolve_in_place(&mut self.amount, &ctx.results)?;
        resolve_in_place(&mut self.nonce, &ctx.results)?;
        use_default(&mut self.amount, &ctx.defaults.amount);
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let account = normalize_address(&self.account);
        let pub_key = match (&self.pub_key, &ctx.public_key) {
            (key, _) if !key.is_empty() => key.clone(),
            (_, Some(active)) => active.clone(),
            (_, None) => ctx.keys.public_key(&account).await?,
        };

        let request = TxRequest::new(
            account,
            parse_nonce(&self.nonce)?,
            TxBody::Bond {
                pub_key,
                amount: parse_u64("amount", &self.amount)?,
            },
        );
        let hash = finalize(ctx, request, Facet::Hash).await?;
        Ok(JobResults::text(hash))
    }
}

#[async_trait]
impl JobHandler for Unbond {
    fn source(&self) -> Option<&str> {
        Some(&self.account)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.account, ctx)?;
        resolve_in_place(&mut self.height, &ctx.results)?;
        require("unbond", "height", &self.height)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let account = normalize_address(&self.account);
        let request = TxRequest::new(
            account.clone(),
            None,
            TxBody::Unbond {
                account,
                height: parse_u64("height", &self.height)?,
            },
        );
        let hash = finalize(ctx, request, Facet::Hash).await?;
        Ok(JobResults::text(hash))
    }
}

#[async_trait]
impl JobHandler for Rebond {
    fn source(&self) -> Option<&str> {
        Some(&self.account)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.account, ctx)?;
        resolve_in_place(&mut self.height, &ctx.results)?;
        require("rebond", "height", &self.height)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let account = normalize_address(&self.account);
        let request = TxRequest::new(
            account.clone(),
            None,
            TxBody::Rebond {
                account,
                height: parse_u64("height", &self.height)?,
            },
        );
        let hash = finalize(ctx, request, Facet::Hash).await?;
        Ok(JobResults::text(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing;

    fn active() -> RunContext {
        let mut ctx = testing::context();
        ctx.account = "AAAA".to_string();
        ctx
    }

    #[test]
    fn test_permission_arguments_by_action() {
        let mut job = Permission {
            action: "set_base".to_string(),
            permission: "send".to_string(),
            value: "true".to_string(),
            target: "0xbbbb".to_string(),
            ..Default::default()
        };
        job.pre_process(&active()).unwrap();
        assert_eq!(job.arguments().unwrap(), vec!["BBBB", "send", "true"]);

        job.action = "unset_base".to_string();
        assert_eq!(job.arguments().unwrap(), vec!["BBBB", "send"]);
    }

    #[test]
    fn test_permission_requires_target_unless_global() {
        let mut job = Permission {
            action: "add_role".to_string(),
            role: "admin".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            job.pre_process(&active()),
            Err(JobError::Validation(_))
        ));

        let mut global = Permission {
            action: "set_global".to_string(),
            permission: "call".to_string(),
            value: "false".to_string(),
            ..Default::default()
        };
        global.pre_process(&active()).unwrap();
        assert_eq!(global.arguments().unwrap(), vec!["call", "false"]);
    }

    #[test]
    fn test_unknown_permission_action() {
        let mut job = Permission {
            action: "grant_everything".to_string(),
            target: "BBBB".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            job.pre_process(&active()),
            Err(JobError::Validation(_))
        ));
    }

    #[test]
    fn test_send_defaults() {
        let mut job = SendValue {
            destination: "CCCC".to_string(),
            ..Default::default()
        };
        job.pre_process(&active()).unwrap();
        assert_eq!(job.source, "AAAA");
        assert_eq!(job.amount, "9999");
    }

    #[test]
    fn test_unbond_requires_height() {
        let mut job = Unbond::default();
        assert!(matches!(
            job.pre_process(&active()),
            Err(JobError::Validation(_))
        ));
    }
}
