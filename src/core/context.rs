//! Per-run execution context.
//!
//! The context is created once per run and handed by `&mut` to every job:
//! the active signing account, defaults, collaborator handles, paths, the
//! result table and the ABIs seen so far.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::abi::{Abi, AbiError};
use crate::adapters::{Compiler, KeyClient, NodeClient};

use super::error::JobError;
use super::results::ResultTable;

/// Values used when a job leaves a field empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDefaults {
    pub amount: String,

    pub fee: String,

    pub gas: String,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            amount: "9999".to_string(),
            fee: "1234".to_string(),
            gas: "1111111111".to_string(),
        }
    }
}

/// Filesystem locations used by contract jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Where contract sources are looked up
    pub contracts: PathBuf,

    /// Where ABIs are saved and read
    pub abi: PathBuf,

    /// Where compiled bytecode is saved
    pub bin: PathBuf,
}

impl Default for RunPaths {
    fn default() -> Self {
        Self {
            contracts: PathBuf::from("./contracts"),
            abi: PathBuf::from("./abi"),
            bin: PathBuf::from("./bin"),
        }
    }
}

/// State shared by all jobs of one run
pub struct RunContext {
    /// Active signing account (upper-case hex, no prefix)
    pub account: String,

    /// Cached public key of the active account
    pub public_key: Option<String>,

    pub chain_id: String,

    pub defaults: RunDefaults,

    pub paths: RunPaths,

    pub node: Arc<dyn NodeClient>,

    pub keys: Arc<dyn KeyClient>,

    pub compiler: Arc<dyn Compiler>,

    pub results: ResultTable,

    /// ABI JSON by contract name or address
    abis: HashMap<String, String>,
}

impl RunContext {
    pub fn new(
        node: Arc<dyn NodeClient>,
        keys: Arc<dyn KeyClient>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Self {
            account: String::new(),
            public_key: None,
            chain_id: String::new(),
            defaults: RunDefaults::default(),
            paths: RunPaths::default(),
            node,
            keys,
            compiler,
            results: ResultTable::new(),
            abis: HashMap::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: RunDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_paths(mut self, paths: RunPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Ask the node which chain it serves
    pub async fn fetch_chain_id(&mut self) -> Result<(), JobError> {
        self.chain_id = self.node.chain_id().await?;
        info!(chain_id = %self.chain_id, "Connected to chain");
        Ok(())
    }

    /// Switch the active account for the rest of the run
    pub fn set_account(&mut self, address: String, public_key: String) {
        self.account = address;
        self.public_key = Some(public_key);
    }

    /// Scope a job's execution to `source`.
    ///
    /// When `source` is set and differs from the active account, the cached
    /// public key is cleared until the returned guard drops, so signing
    /// resolves the key for `source` instead.
    pub fn override_account(&mut self, source: Option<&str>) -> AccountOverride<'_> {
        let saved = match source {
            Some(source) if !source.is_empty() && normalize_address(source) != self.account => {
                debug!(%source, active = %self.account, "Account override");
                Some(self.public_key.take())
            }
            _ => None,
        };
        AccountOverride { ctx: self, saved }
    }

    // ------------------------------------------------------------------------
    // ABIs
    // ------------------------------------------------------------------------

    /// Save an ABI under a name (contract name or address)
    pub fn save_abi(&mut self, key: &str, abi_json: &str) -> Result<(), JobError> {
        std::fs::create_dir_all(&self.paths.abi)?;
        let location = self.paths.abi.join(key);
        debug!(path = %location.display(), "Saving ABI");
        std::fs::write(&location, abi_json)?;
        self.abis.insert(key.to_string(), abi_json.to_string());
        Ok(())
    }

    /// Load an ABI by name, from this run's cache, the ABI path, or as a
    /// literal path
    pub fn load_abi(&self, location: &str) -> Result<Abi, JobError> {
        if let Some(json) = self.abis.get(location) {
            return Ok(Abi::from_json(json)?);
        }

        let candidates = [self.paths.abi.join(location), PathBuf::from(location)];
        match candidates.iter().find(|p| p.is_file()) {
            Some(path) => {
                let json = std::fs::read_to_string(path)?;
                Ok(Abi::from_json(&json)?)
            }
            None => Err(AbiError::NotFound(location.to_string()).into()),
        }
    }
}

/// Canonical address form: no `0x` prefix, upper-case hex
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .to_uppercase()
}

/// Guard returned by [`RunContext::override_account`]; restores the cached
/// public key when dropped
pub struct AccountOverride<'a> {
    ctx: &'a mut RunContext,
    saved: Option<Option<String>>,
}

impl AccountOverride<'_> {
    /// Whether this scope overrides the active account
    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }
}

impl Deref for AccountOverride<'_> {
    type Target = RunContext;

    fn deref(&self) -> &RunContext {
        &*self.ctx
    }
}

impl DerefMut for AccountOverride<'_> {
    fn deref_mut(&mut self) -> &mut RunContext {
        &mut *self.ctx
    }
}

impl Drop for AccountOverride<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.saved.take() {
            self.ctx.public_key = key;
        }
    }
}
