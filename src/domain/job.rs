//! Job definitions as declared in a run document.
//!
//! Every entry in the document's `jobs:` list has a `name` and exactly one
//! kind key (`set`, `deploy`, `call`, ...). Deserialization goes through
//! [`RawJob`], which counts the populated kinds and turns the entry into a
//! [`Job`] carrying a single [`JobKind`] variant.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::value::{JobOutput, Value};

/// A named job with exactly one kind
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawJob")]
pub struct Job {
    /// Name under which the job's results are recorded
    pub name: String,

    /// What the job does
    pub kind: JobKind,
}

impl Job {
    pub fn new(name: impl Into<String>, kind: JobKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// One variant per job kind
#[derive(Debug, Clone)]
pub enum JobKind {
    Account(Account),
    Set(Set),
    Compile(Compile),
    Deploy(Deploy),
    Send(SendValue),
    Register(RegisterName),
    Permission(Permission),
    Bond(Bond),
    Unbond(Unbond),
    Rebond(Rebond),
    Call(Call),
    DumpState(DumpState),
    RestoreState(RestoreState),
    QueryContract(QueryContract),
    QueryAccount(QueryAccount),
    QueryName(QueryName),
    QueryVals(QueryVals),
    Assert(Assert),
}

impl JobKind {
    /// The document key for this kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            JobKind::Account(_) => "account",
            JobKind::Set(_) => "set",
            JobKind::Compile(_) => "compile",
            JobKind::Deploy(_) => "deploy",
            JobKind::Send(_) => "send",
            JobKind::Register(_) => "register",
            JobKind::Permission(_) => "permission",
            JobKind::Bond(_) => "bond",
            JobKind::Unbond(_) => "unbond",
            JobKind::Rebond(_) => "rebond",
            JobKind::Call(_) => "call",
            JobKind::DumpState(_) => "dump-state",
            JobKind::RestoreState(_) => "restore-state",
            JobKind::QueryContract(_) => "query-contract",
            JobKind::QueryAccount(_) => "query-account",
            JobKind::QueryName(_) => "query-name",
            JobKind::QueryVals(_) => "query-vals",
            JobKind::Assert(_) => "assert",
        }
    }
}

// ============================================================================
// Job kinds
// ============================================================================

/// Switch the active signing account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "lenient::string")]
    pub address: String,
}

/// Record an arbitrary value under the job's name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Set {
    pub val: Option<Value>,

    #[serde(skip)]
    pub resolved: Option<JobOutput>,
}

/// Compile contract sources without deploying them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Compile {
    pub files: Vec<String>,

    #[serde(deserialize_with = "lenient::string")]
    pub version: String,

    /// `Name:Address` pairs, comma separated
    #[serde(deserialize_with = "lenient::string")]
    pub libraries: String,

    /// `prefix=path` import remappings
    pub remappings: Vec<String>,
}

/// Compile (or read a prebuilt binary) and deploy contracts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Deploy {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    /// Path to the contract source, or to a `.bin` file for a raw deploy
    #[serde(deserialize_with = "lenient::string")]
    pub contract: String,

    /// Contract to deploy from the file; `all` deploys every contract
    #[serde(deserialize_with = "lenient::string")]
    pub instance: String,

    #[serde(deserialize_with = "lenient::string")]
    pub libraries: String,

    /// Constructor arguments
    pub data: Option<Value>,

    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,

    #[serde(deserialize_with = "lenient::string")]
    pub fee: String,

    #[serde(deserialize_with = "lenient::string")]
    pub gas: String,

    /// Write the compiled bytecode to the bin path
    #[serde(deserialize_with = "lenient::flag")]
    pub save: bool,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,

    #[serde(skip)]
    pub args: Vec<String>,
}

/// Transfer value between accounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendValue {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    #[serde(deserialize_with = "lenient::string")]
    pub destination: String,

    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,
}

/// Register an entry in the chain's name registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterName {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    #[serde(deserialize_with = "lenient::string")]
    pub name: String,

    #[serde(deserialize_with = "lenient::string")]
    pub data: String,

    /// CSV file of `name,data[,amount]` rows to register in bulk
    #[serde(deserialize_with = "lenient::string")]
    pub data_file: String,

    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,

    #[serde(deserialize_with = "lenient::string")]
    pub fee: String,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,
}

/// Change account permissions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Permission {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    /// One of `set_base`, `unset_base`, `set_global`, `add_role`, `rm_role`
    #[serde(deserialize_with = "lenient::string")]
    pub action: String,

    #[serde(deserialize_with = "lenient::string")]
    pub permission: String,

    #[serde(deserialize_with = "lenient::string")]
    pub value: String,

    #[serde(deserialize_with = "lenient::string")]
    pub target: String,

    #[serde(deserialize_with = "lenient::string")]
    pub role: String,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,
}

/// Bond an account as a validator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bond {
    #[serde(deserialize_with = "lenient::string")]
    pub pub_key: String,

    #[serde(deserialize_with = "lenient::string")]
    pub account: String,

    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Unbond {
    #[serde(deserialize_with = "lenient::string")]
    pub account: String,

    #[serde(deserialize_with = "lenient::string")]
    pub height: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Rebond {
    #[serde(deserialize_with = "lenient::string")]
    pub account: String,

    #[serde(deserialize_with = "lenient::string")]
    pub height: String,
}

/// Send a transaction calling a contract function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Call {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    #[serde(deserialize_with = "lenient::string")]
    pub destination: String,

    /// Function to call; empty means the fallback function
    #[serde(deserialize_with = "lenient::string")]
    pub function: String,

    pub data: Option<Value>,

    #[serde(deserialize_with = "lenient::string")]
    pub amount: String,

    #[serde(deserialize_with = "lenient::string")]
    pub fee: String,

    #[serde(deserialize_with = "lenient::string")]
    pub gas: String,

    #[serde(deserialize_with = "lenient::string")]
    pub nonce: String,

    /// ABI location, when it differs from the destination
    #[serde(deserialize_with = "lenient::string")]
    pub abi: String,

    /// `tx` records the transaction hash instead of the return value
    #[serde(deserialize_with = "lenient::string")]
    pub save: String,

    #[serde(skip)]
    pub args: Vec<String>,
}

/// Dump the chain state to a file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DumpState {
    #[serde(deserialize_with = "lenient::flag")]
    pub include_validators: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub to_ipfs: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub to_file: bool,

    #[serde(deserialize_with = "lenient::string")]
    pub ipfs_host: String,

    #[serde(deserialize_with = "lenient::string")]
    pub file: String,
}

/// Restore the chain state from a file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RestoreState {
    #[serde(deserialize_with = "lenient::flag")]
    pub from_ipfs: bool,

    #[serde(deserialize_with = "lenient::flag")]
    pub from_file: bool,

    #[serde(deserialize_with = "lenient::string")]
    pub ipfs_host: String,

    #[serde(deserialize_with = "lenient::string")]
    pub file: String,
}

/// Simulated (read-only) contract call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryContract {
    #[serde(deserialize_with = "lenient::string")]
    pub source: String,

    #[serde(deserialize_with = "lenient::string")]
    pub destination: String,

    #[serde(deserialize_with = "lenient::string")]
    pub function: String,

    pub data: Option<Value>,

    #[serde(deserialize_with = "lenient::string")]
    pub abi: String,

    #[serde(skip)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryAccount {
    #[serde(deserialize_with = "lenient::string")]
    pub account: String,

    /// `address`, `balance`, `sequence`, `code`, `permissions.base` or `permissions.set`
    #[serde(deserialize_with = "lenient::string")]
    pub field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryName {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,

    #[serde(deserialize_with = "lenient::string")]
    pub field: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryVals {
    /// `bonded_validators` or `unbonding_validators`
    #[serde(deserialize_with = "lenient::string")]
    pub field: String,
}

/// Compare two values and fail the run if the relation does not hold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Assert {
    #[serde(deserialize_with = "lenient::string")]
    pub key: String,

    #[serde(deserialize_with = "lenient::string")]
    pub relation: String,

    #[serde(deserialize_with = "lenient::string")]
    pub val: String,
}

// ============================================================================
// Document decoding
// ============================================================================

/// Why a declared job could not be turned into a [`Job`]
#[derive(Debug, Error)]
pub enum JobDefinitionError {
    #[error("Job at this position has no name")]
    MissingName,

    #[error("Job {0} does not declare a job kind")]
    NoKind(String),

    #[error("Job {name} declares more than one job kind ({kinds}); exactly one is allowed")]
    MultipleKinds { name: String, kinds: String },
}

/// A job entry as it appears in the document, before validation
#[derive(Debug, Deserialize)]
pub struct RawJob {
    #[serde(default, deserialize_with = "lenient::string")]
    name: String,

    /// Deprecated wrapper that nests the kind one level down
    #[serde(default)]
    job: Option<RawKinds>,

    #[serde(flatten)]
    kinds: RawKinds,
}

#[derive(Debug, Default, Deserialize)]
struct RawKinds {
    account: Option<Account>,
    set: Option<Set>,
    compile: Option<Compile>,
    deploy: Option<Deploy>,
    send: Option<SendValue>,
    register: Option<RegisterName>,
    permission: Option<Permission>,
    bond: Option<Bond>,
    unbond: Option<Unbond>,
    rebond: Option<Rebond>,
    call: Option<Call>,
    #[serde(rename = "dump-state")]
    dump_state: Option<DumpState>,
    #[serde(rename = "restore-state")]
    restore_state: Option<RestoreState>,
    #[serde(rename = "query-contract")]
    query_contract: Option<QueryContract>,
    #[serde(rename = "query-account")]
    query_account: Option<QueryAccount>,
    #[serde(rename = "query-name")]
    query_name: Option<QueryName>,
    #[serde(rename = "query-vals")]
    query_vals: Option<QueryVals>,
    #[serde(rename = "assert")]
    assertion: Option<Assert>,
}

impl RawKinds {
    fn into_kinds(self) -> Vec<JobKind> {
        let mut kinds = Vec::new();
        kinds.extend(self.account.map(JobKind::Account));
        kinds.extend(self.set.map(JobKind::Set));
        kinds.extend(self.compile.map(JobKind::Compile));
        kinds.extend(self.deploy.map(JobKind::Deploy));
        kinds.extend(self.send.map(JobKind::Send));
        kinds.extend(self.register.map(JobKind::Register));
        kinds.extend(self.permission.map(JobKind::Permission));
        kinds.extend(self.bond.map(JobKind::Bond));
        kinds.extend(self.unbond.map(JobKind::Unbond));
        kinds.extend(self.rebond.map(JobKind::Rebond));
        kinds.extend(self.call.map(JobKind::Call));
        kinds.extend(self.dump_state.map(JobKind::DumpState));
        kinds.extend(self.restore_state.map(JobKind::RestoreState));
        kinds.extend(self.query_contract.map(JobKind::QueryContract));
        kinds.extend(self.query_account.map(JobKind::QueryAccount));
        kinds.extend(self.query_name.map(JobKind::QueryName));
        kinds.extend(self.query_vals.map(JobKind::QueryVals));
        kinds.extend(self.assertion.map(JobKind::Assert));
        kinds
    }
}

impl TryFrom<RawJob> for Job {
    type Error = JobDefinitionError;

    fn try_from(raw: RawJob) -> Result<Self, Self::Error> {
        if raw.name.trim().is_empty() {
            return Err(JobDefinitionError::MissingName);
        }

        let mut kinds = raw.kinds.into_kinds();
        if let Some(legacy) = raw.job {
            warn!(
                job = %raw.name,
                "The `job:` wrapper is deprecated; declare the job kind directly under the job entry"
            );
            kinds.extend(legacy.into_kinds());
        }

        match kinds.len() {
            0 => Err(JobDefinitionError::NoKind(raw.name)),
            1 => Ok(Job {
                name: raw.name,
                kind: kinds.remove(0),
            }),
            _ => Err(JobDefinitionError::MultipleKinds {
                name: raw.name,
                kinds: kinds
                    .iter()
                    .map(JobKind::kind_name)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Run documents are written by hand, so scalar fields accept numbers and
/// booleans as well as strings.
mod lenient {
    use serde::{Deserialize, Deserializer};

    use crate::domain::value::Value;

    pub fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(String::new()),
            Some(Value::Str(s)) => Ok(s),
            Some(v @ (Value::Bool(_) | Value::Int(_) | Value::Float(_))) => Ok(v.to_string()),
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a scalar, found a {}",
                other.type_name()
            ))),
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(b),
            Some(Value::Str(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" => Ok(true),
                "false" | "no" | "" => Ok(false),
                _ => Err(serde::de::Error::custom(format!("expected a boolean, found {:?}", s))),
            },
            Some(other) => Err(serde::de::Error::custom(format!(
                "expected a boolean, found a {}",
                other.type_name()
            ))),
        }
    }
}
