//! In-memory collaborators for integration tests.
//!
//! FakeNode records every transaction it is asked to build and behaves like
//! a chain where every contract echoes its arguments back.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use chainpm::adapters::{
    AccountInfo, ClientError, CompileRequest, CompileResponse, CompiledObject, Compiler,
    KeyClient, NameEntry, NodeClient, TxBody, TxReceipt, TxRequest, UnsignedTx, ValidatorSet,
};
use chainpm::core::{RunContext, RunPaths};

/// Destination that makes the fake node reject a transaction
pub const REJECTED: &str = "DEAD";

#[derive(Default)]
pub struct FakeNode {
    /// Every built transaction with the public key it was built for
    pub requests: Mutex<Vec<(TxRequest, String)>>,
}

impl FakeNode {
    pub fn requests(&self) -> Vec<(TxRequest, String)> {
        self.requests.lock().unwrap().clone()
    }

    /// Address the n-th transaction (1-based) deploys to
    pub fn deployed_address(n: usize) -> String {
        hex::encode_upper([n as u8; 20])
    }
}

fn echo(data: &[u8]) -> Option<Vec<u8>> {
    data.get(4..).filter(|rest| !rest.is_empty()).map(<[u8]>::to_vec)
}

#[async_trait]
impl NodeClient for FakeNode {
    async fn chain_id(&self) -> Result<String, ClientError> {
        Ok("test-chain".to_string())
    }

    async fn build_tx(
        &self,
        request: &TxRequest,
        public_key: &str,
    ) -> Result<UnsignedTx, ClientError> {
        let mut requests = self.requests.lock().unwrap();
        requests.push((request.clone(), public_key.to_string()));
        Ok(UnsignedTx {
            tx: serde_json::json!({ "index": requests.len() }),
            sign_bytes: request.from.as_bytes().to_vec(),
        })
    }

    async fn broadcast(
        &self,
        tx: UnsignedTx,
        _signature: &[u8],
    ) -> Result<TxReceipt, ClientError> {
        let index = tx.tx["index"].as_u64().unwrap_or_default() as usize;
        let (request, _) = self.requests.lock().unwrap()[index - 1].clone();

        let mut receipt = TxReceipt {
            hash: vec![index as u8; 32],
            ..Default::default()
        };
        match request.body {
            TxBody::Send { to, .. } if to == REJECTED => {
                return Err(ClientError::Rpc {
                    service: "chain node",
                    message: "account DEAD rejects transfers".to_string(),
                })
            }
            TxBody::Call { to: None, .. } => {
                receipt.address = Some(vec![index as u8; 20]);
            }
            TxBody::Call { to: Some(_), data, .. } => {
                receipt.return_data = echo(&data);
            }
            _ => {}
        }
        Ok(receipt)
    }

    async fn simulate_call(
        &self,
        _from: &str,
        _to: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        Ok(echo(data).unwrap_or_default())
    }

    async fn account(&self, address: &str) -> Result<Option<AccountInfo>, ClientError> {
        if address == REJECTED {
            return Ok(None);
        }
        Ok(Some(AccountInfo {
            address: address.to_string(),
            balance: 1000,
            sequence: 3,
            ..Default::default()
        }))
    }

    async fn name_entry(&self, name: &str) -> Result<Option<NameEntry>, ClientError> {
        Ok(Some(NameEntry {
            name: name.to_string(),
            owner: "AAAA".to_string(),
            data: "registered data".to_string(),
            expires: 500,
        }))
    }

    async fn validators(&self) -> Result<ValidatorSet, ClientError> {
        Ok(ValidatorSet {
            bonded: vec!["0x1111".to_string(), "2222".to_string()],
            unbonding: Vec::new(),
        })
    }

    async fn dump_state(&self, include_validators: bool) -> Result<serde_json::Value, ClientError> {
        Ok(serde_json::json!({ "accounts": [], "validators": include_validators }))
    }

    async fn restore_state(&self, _state: serde_json::Value) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Key daemon whose public keys are `PUB<address>`
#[derive(Default)]
pub struct FakeKeys {
    /// Addresses whose public key was looked up
    pub lookups: Mutex<Vec<String>>,
}

impl FakeKeys {
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyClient for FakeKeys {
    async fn public_key(&self, address: &str) -> Result<String, ClientError> {
        self.lookups.lock().unwrap().push(address.to_string());
        Ok(format!("PUB{}", address))
    }

    async fn sign(&self, _address: &str, _message: &[u8]) -> Result<Vec<u8>, ClientError> {
        Ok(vec![7; 64])
    }
}

/// Compiler returning a fixed set of contracts
#[derive(Default)]
pub struct FakeCompiler {
    pub objects: Vec<CompiledObject>,
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, _request: &CompileRequest) -> Result<CompileResponse, ClientError> {
        Ok(CompileResponse {
            objects: self.objects.clone(),
            ..Default::default()
        })
    }
}

pub fn contract(name: &str, abi: &str) -> CompiledObject {
    CompiledObject {
        name: name.to_string(),
        bytecode: "6060604052".to_string(),
        abi: abi.to_string(),
    }
}

/// A run context wired to fakes, with paths inside `dir`
pub struct Harness {
    pub ctx: RunContext,
    pub node: Arc<FakeNode>,
    pub keys: Arc<FakeKeys>,
}

impl Harness {
    pub fn new(dir: &TempDir) -> Self {
        Self::with_contracts(dir, Vec::new())
    }

    pub fn with_contracts(dir: &TempDir, objects: Vec<CompiledObject>) -> Self {
        let node = Arc::new(FakeNode::default());
        let keys = Arc::new(FakeKeys::default());
        let compiler = Arc::new(FakeCompiler { objects });

        let mut ctx = RunContext::new(node.clone(), keys.clone(), compiler).with_paths(RunPaths {
            contracts: dir.path().join("contracts"),
            abi: dir.path().join("abi"),
            bin: dir.path().join("bin"),
        });
        ctx.chain_id = "test-chain".to_string();
        ctx.set_account("AAAA".to_string(), "PUBAAAA".to_string());

        Self { ctx, node, keys }
    }
}
