//! Read-only jobs and assertions.

use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::info;

use crate::core::interpolate::{resolve_in_place, resolve_str};
use crate::core::{normalize_address, JobError, RunContext};
use crate::domain::job::{Assert, QueryAccount, QueryContract, QueryName, QueryVals};
use crate::domain::{JobOutput, JobResults, Value};

use super::contracts::{call_data, decode_output};
use super::{input_data, require, resolve_source, JobHandler};

const ACCOUNT_FIELDS: &[&str] = &[
    "address",
    "balance",
    "sequence",
    "code",
    "permissions.base",
    "permissions.set",
];

const NAME_FIELDS: &[&str] = &["name", "owner", "data", "expires"];

const VALIDATOR_FIELDS: &[&str] = &["bonded_validators", "unbonding_validators"];

fn check_field(kind: &str, field: &str, allowed: &[&str]) -> Result<(), JobError> {
    if allowed.contains(&field) {
        return Ok(());
    }
    Err(JobError::Validation(format!(
        "{} (expected one of: {})",
        unknown_field(kind, field),
        allowed.join(", ")
    )))
}

fn unknown_field(kind: &str, field: &str) -> String {
    format!("{} job cannot query field '{}'", kind, field)
}

fn number(n: u64) -> JobOutput {
    match i64::try_from(n) {
        Ok(i) => JobOutput::new(n.to_string(), Value::Int(i)),
        Err(_) => JobOutput::text(n.to_string()),
    }
}

// ============================================================================
// Contracts
// ============================================================================

#[async_trait]
impl JobHandler for QueryContract {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.source, ctx)?;
        resolve_in_place(&mut self.destination, &ctx.results)?;
        resolve_in_place(&mut self.abi, &ctx.results)?;
        self.function = resolve_str(&self.function, &ctx.results)?;
        require("query-contract", "destination", &self.destination)?;
        self.destination = normalize_address(&self.destination);

        let (function, args) = input_data(&self.function, self.data.as_ref(), ctx, false)?;
        self.function = function;
        self.args = args;
        Ok(())
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let location = if self.abi.is_empty() {
            &self.destination
        } else {
            &self.abi
        };
        let (abi, data) = call_data(ctx, location, &self.function, &self.args)?;

        let returned = ctx
            .node
            .simulate_call(&normalize_address(&self.source), &self.destination, &data)
            .await?;
        decode_output(abi.as_ref(), &self.function, &returned)
    }
}

// ============================================================================
// Chain state
// ============================================================================

#[async_trait]
impl JobHandler for QueryAccount {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_source(&mut self.account, ctx)?;
        resolve_in_place(&mut self.field, &ctx.results)?;
        self.account = normalize_address(&self.account);
        check_field("query-account", &self.field, ACCOUNT_FIELDS)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let info = ctx.node.account(&self.account).await?.ok_or_else(|| {
            JobError::ChainInteraction(format!("account {} does not exist", self.account))
        })?;

        let output = match self.field.as_str() {
            "address" => JobOutput::text(normalize_address(&info.address)),
            "balance" => number(info.balance),
            "sequence" => number(info.sequence),
            "code" => JobOutput::new(hex::encode_upper(&info.code), Value::Bytes(info.code)),
            "permissions.base" => number(info.permissions.base),
            "permissions.set" => number(info.permissions.set),
            other => return Err(JobError::Validation(unknown_field("query-account", other))),
        };
        Ok(output.into())
    }
}

#[async_trait]
impl JobHandler for QueryName {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_in_place(&mut self.name, &ctx.results)?;
        resolve_in_place(&mut self.field, &ctx.results)?;
        require("query-name", "name", &self.name)?;
        check_field("query-name", &self.field, NAME_FIELDS)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let entry = ctx.node.name_entry(&self.name).await?.ok_or_else(|| {
            JobError::ChainInteraction(format!("name {} is not registered", self.name))
        })?;

        let output = match self.field.as_str() {
            "name" => JobOutput::text(entry.name),
            "owner" => JobOutput::text(normalize_address(&entry.owner)),
            "data" => JobOutput::text(entry.data),
            "expires" => number(entry.expires),
            other => return Err(JobError::Validation(unknown_field("query-name", other))),
        };
        Ok(output.into())
    }
}

#[async_trait]
impl JobHandler for QueryVals {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_in_place(&mut self.field, &ctx.results)?;
        check_field("query-vals", &self.field, VALIDATOR_FIELDS)
    }

    async fn execute(&mut self, ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let validators = ctx.node.validators().await?;
        let addresses: Vec<String> = if self.field == "bonded_validators" {
            validators.bonded
        } else {
            validators.unbonding
        }
        .iter()
        .map(|a| normalize_address(a))
        .collect();

        let list = Value::List(addresses.iter().cloned().map(Value::Str).collect());
        Ok(JobOutput::new(addresses.join(","), list).into())
    }
}

// ============================================================================
// Assert
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl Relation {
    fn parse(relation: &str) -> Option<Self> {
        Some(match relation {
            "eq" | "==" => Relation::Eq,
            "ne" | "!=" => Relation::Ne,
            "ge" | ">=" => Relation::Ge,
            "gt" | ">" => Relation::Gt,
            "le" | "<=" => Relation::Le,
            "lt" | "<" => Relation::Lt,
            _ => return None,
        })
    }

    fn holds(self, key: &str, val: &str) -> Result<bool, JobError> {
        Ok(match self {
            Relation::Eq => key == val,
            Relation::Ne => key != val,
            Relation::Ge => compare(key, val)?.is_ge(),
            Relation::Gt => compare(key, val)?.is_gt(),
            Relation::Le => compare(key, val)?.is_le(),
            Relation::Lt => compare(key, val)?.is_lt(),
        })
    }
}

/// Ordering relations compare integers
fn compare(key: &str, val: &str) -> Result<Ordering, JobError> {
    let parse = |s: &str| {
        s.trim().parse::<i128>().map_err(|_| {
            JobError::Validation(format!(
                "ordering assertions compare integers, got '{}'",
                s
            ))
        })
    };
    Ok(parse(key)?.cmp(&parse(val)?))
}

#[async_trait]
impl JobHandler for Assert {
    fn pre_process(&mut self, ctx: &RunContext) -> Result<(), JobError> {
        resolve_in_place(&mut self.key, &ctx.results)?;
        resolve_in_place(&mut self.val, &ctx.results)?;
        self.relation = self.relation.trim().to_string();
        Relation::parse(&self.relation)
            .map(|_| ())
            .ok_or_else(|| JobError::Validation(format!("unknown relation '{}'", self.relation)))
    }

    async fn execute(&mut self, _ctx: &mut RunContext) -> Result<JobResults, JobError> {
        let relation = Relation::parse(&self.relation)
            .ok_or_else(|| JobError::Validation(format!("unknown relation '{}'", self.relation)))?;

        if !relation.holds(&self.key, &self.val)? {
            return Err(JobError::AssertionFailed {
                key: self.key.clone(),
                relation: self.relation.clone(),
                val: self.val.clone(),
            });
        }

        info!(key = %self.key, relation = %self.relation, val = %self.val, "Assertion passed");
        Ok(JobResults::text("passed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing;

    fn assert_job(key: &str, relation: &str, val: &str) -> Assert {
        Assert {
            key: key.to_string(),
            relation: relation.to_string(),
            val: val.to_string(),
        }
    }

    #[tokio::test]
    async fn test_assert_relations() {
        let mut ctx = testing::context();
        ctx.results.record("count", JobResults::text("10"));

        for (relation, val) in [("eq", "10"), ("!=", "11"), ("gt", "9"), ("<=", "10")] {
            let mut job = assert_job("$count", relation, val);
            job.pre_process(&ctx).unwrap();
            let results = job.execute(&mut ctx).await.unwrap();
            assert_eq!(results.full_result.string_result, "passed");
        }
    }

    #[tokio::test]
    async fn test_assert_failure() {
        let mut ctx = testing::context();
        let mut job = assert_job("hello", "==", "world");
        job.pre_process(&ctx).unwrap();
        assert!(matches!(
            job.execute(&mut ctx).await,
            Err(JobError::AssertionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_ordering_needs_integers() {
        let mut ctx = testing::context();
        let mut job = assert_job("abc", "lt", "5");
        job.pre_process(&ctx).unwrap();
        assert!(matches!(
            job.execute(&mut ctx).await,
            Err(JobError::Validation(_))
        ));
    }

    #[test]
    fn test_unknown_relation() {
        let ctx = testing::context();
        let mut job = assert_job("1", "approximately", "1");
        assert!(job.pre_process(&ctx).is_err());
    }

    #[test]
    fn test_query_fields_are_checked() {
        let mut ctx = testing::context();
        ctx.account = "AAAA".to_string();

        let mut ok = QueryAccount {
            account: String::new(),
            field: "balance".to_string(),
        };
        ok.pre_process(&ctx).unwrap();
        assert_eq!(ok.account, "AAAA");

        let mut bad = QueryVals {
            field: "everyone".to_string(),
        };
        assert!(matches!(bad.pre_process(&ctx), Err(JobError::Validation(_))));
    }
}
