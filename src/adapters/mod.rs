//! Adapter interfaces for external services.
//!
//! The runner talks to three collaborators, each behind an async trait so
//! the HTTP clients here can be swapped for in-memory fakes:
//! - NodeClient: builds, broadcasts and queries transactions on the chain
//! - KeyClient: the key-signing daemon
//! - Compiler: the contract compiler service

pub mod compilers;
pub mod keys;
pub mod node;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use compilers::HttpCompiler;
pub use keys::HttpKeyClient;
pub use node::HttpNodeClient;

/// Failure talking to a collaborator
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached at all
    #[error("{service} is unreachable at {url}: {message}")]
    Unreachable {
        service: &'static str,
        url: String,
        message: String,
    },

    /// The service answered with an error
    #[error("{service} returned an error: {message}")]
    Rpc {
        service: &'static str,
        message: String,
    },

    /// The service answered with something we could not read
    #[error("Malformed response from {service}: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    /// Classify a transport failure
    pub fn from_transport(service: &'static str, url: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            ClientError::Unreachable {
                service,
                url: url.to_string(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ClientError::Malformed {
                service,
                message: err.to_string(),
            }
        } else {
            ClientError::Rpc {
                service,
                message: err.to_string(),
            }
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// A transaction to build, before nonce and signature are filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    /// Chain the transaction is signed for
    #[serde(default)]
    pub chain_id: String,

    /// Address of the signing account
    pub from: String,

    /// Explicit nonce; the node uses the account sequence when absent
    pub nonce: Option<u64>,

    pub body: TxBody,
}

impl TxRequest {
    pub fn new(from: impl Into<String>, nonce: Option<u64>, body: TxBody) -> Self {
        Self {
            chain_id: String::new(),
            from: from.into(),
            nonce,
            body,
        }
    }
}

/// Transaction payload, one variant per supported transaction kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TxBody {
    Send {
        to: String,
        amount: u64,
    },

    /// Contract call, or a deploy when `to` is absent
    Call {
        to: Option<String>,
        #[serde(with = "hex_payload")]
        data: Vec<u8>,
        amount: u64,
        gas: u64,
        fee: u64,
    },

    Name {
        name: String,
        data: String,
        amount: u64,
        fee: u64,
    },

    Permission {
        action: String,
        args: Vec<String>,
    },

    Bond {
        pub_key: String,
        amount: u64,
    },

    Unbond {
        account: String,
        height: u64,
    },

    Rebond {
        account: String,
        height: u64,
    },
}

/// A transaction built by the node, ready to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    /// Node-specific transaction body, returned as-is on broadcast
    pub tx: serde_json::Value,

    /// Bytes the signer must sign
    #[serde(with = "hex_payload")]
    pub sign_bytes: Vec<u8>,
}

/// What the node reports once a transaction is included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    #[serde(with = "hex_payload")]
    pub hash: Vec<u8>,

    /// Address of a created contract
    #[serde(default, with = "hex_option")]
    pub address: Option<Vec<u8>>,

    /// Raw return data of a contract call
    #[serde(default, with = "hex_option")]
    pub return_data: Option<Vec<u8>>,

    #[serde(default, with = "hex_option")]
    pub block_hash: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPermissions {
    /// Base permission flags
    pub base: u64,

    /// Which of the base flags are explicitly set
    pub set: u64,

    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub address: String,

    pub balance: u64,

    pub sequence: u64,

    #[serde(default, with = "hex_payload")]
    pub code: Vec<u8>,

    #[serde(default)]
    pub permissions: AccountPermissions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    pub name: String,

    pub owner: String,

    pub data: String,

    pub expires: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub bonded: Vec<String>,

    pub unbonding: Vec<String>,
}

/// The chain node
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Identifier of the chain the node serves
    async fn chain_id(&self) -> Result<String, ClientError>;

    /// Build a transaction for signing
    async fn build_tx(&self, request: &TxRequest, public_key: &str)
        -> Result<UnsignedTx, ClientError>;

    /// Broadcast a signed transaction and wait for it to be included
    async fn broadcast(
        &self,
        tx: UnsignedTx,
        signature: &[u8],
    ) -> Result<TxReceipt, ClientError>;

    /// Run a call without creating a transaction
    async fn simulate_call(&self, from: &str, to: &str, data: &[u8])
        -> Result<Vec<u8>, ClientError>;

    async fn account(&self, address: &str) -> Result<Option<AccountInfo>, ClientError>;

    async fn name_entry(&self, name: &str) -> Result<Option<NameEntry>, ClientError>;

    async fn validators(&self) -> Result<ValidatorSet, ClientError>;

    async fn dump_state(&self, include_validators: bool)
        -> Result<serde_json::Value, ClientError>;

    async fn restore_state(&self, state: serde_json::Value) -> Result<(), ClientError>;
}

// ============================================================================
// Keys
// ============================================================================

/// The key-signing daemon
#[async_trait]
pub trait KeyClient: Send + Sync {
    /// Public key for an address, hex encoded
    async fn public_key(&self, address: &str) -> Result<String, ClientError>;

    /// Sign a message with the key for an address
    async fn sign(&self, address: &str, message: &[u8]) -> Result<Vec<u8>, ClientError>;
}

// ============================================================================
// Compiler
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Source files to compile
    pub files: Vec<PathBuf>,

    /// Compiler version, when a specific one is wanted
    pub version: Option<String>,

    /// `Name:Address` library links
    pub libraries: String,

    /// `prefix=path` import remappings
    pub remappings: Vec<String>,
}

/// One compiled contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledObject {
    #[serde(alias = "objectname")]
    pub name: String,

    /// Hex-encoded bytecode; empty for interfaces and abstract contracts
    #[serde(default)]
    pub bytecode: String,

    /// ABI JSON
    #[serde(default)]
    pub abi: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    /// Compiled contracts in source order
    #[serde(default)]
    pub objects: Vec<CompiledObject>,

    #[serde(default)]
    pub warning: String,

    #[serde(default)]
    pub error: String,
}

/// The contract compiler service
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileResponse, ClientError>;
}

mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

mod hex_option {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => serializer.serialize_some(&hex::encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) if !s.is_empty() => hex::decode(s.trim_start_matches("0x"))
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_hex_fields() {
        let receipt: TxReceipt =
            serde_json::from_str(r#"{"hash":"0xabcd","address":"","return_data":"01"}"#).unwrap();
        assert_eq!(receipt.hash, vec![0xab, 0xcd]);
        assert_eq!(receipt.address, None);
        assert_eq!(receipt.return_data, Some(vec![1]));
        assert_eq!(receipt.block_hash, None);
    }

    #[test]
    fn test_tx_body_is_tagged() {
        let body = TxBody::Send {
            to: "AB".to_string(),
            amount: 5,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "send");
        assert_eq!(json["amount"], 5);
    }

    #[test]
    fn test_compiled_object_accepts_objectname() {
        let obj: CompiledObject =
            serde_json::from_str(r#"{"objectname":"Storage","bytecode":"6060","abi":"[]"}"#)
                .unwrap();
        assert_eq!(obj.name, "Storage");
    }
}
