//! JSON-RPC client for the chain node.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    AccountInfo, ClientError, NameEntry, NodeClient, TxReceipt, TxRequest, UnsignedTx,
    ValidatorSet,
};

const SERVICE: &str = "chain node";

/// Node client speaking JSON-RPC 2.0 over HTTP
pub struct HttpNodeClient {
    /// RPC endpoint
    url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct ChainIdResult {
    chain_id: String,
}

#[derive(Debug, Deserialize)]
struct CallResult {
    #[serde(rename = "return")]
    return_data: String,
}

impl HttpNodeClient {
    /// Create a new node client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Invoke one RPC method
    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, ClientError> {
        debug!(method, "Node RPC request");

        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "id": "chainpm",
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))?;

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))?;

        if let Some(err) = body.error {
            return Err(ClientError::Rpc {
                service: SERVICE,
                message: format!("{} (code {})", err.message, err.code),
            });
        }

        Ok(body.result)
    }

    /// Invoke an RPC method whose result is mandatory
    async fn require<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, ClientError> {
        self.request(method, params)
            .await?
            .ok_or_else(|| ClientError::Malformed {
                service: SERVICE,
                message: format!("{} returned no result", method),
            })
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn chain_id(&self) -> Result<String, ClientError> {
        let result: ChainIdResult = self.require("chain_id", serde_json::json!({})).await?;
        Ok(result.chain_id)
    }

    async fn build_tx(
        &self,
        request: &TxRequest,
        public_key: &str,
    ) -> Result<UnsignedTx, ClientError> {
        self.require(
            "build_tx",
            serde_json::json!({
                "request": request,
                "pub_key": public_key,
            }),
        )
        .await
    }

    async fn broadcast(&self, tx: UnsignedTx, signature: &[u8]) -> Result<TxReceipt, ClientError> {
        self.require(
            "broadcast_tx",
            serde_json::json!({
                "tx": tx.tx,
                "signature": hex::encode(signature),
                "wait": true,
            }),
        )
        .await
    }

    async fn simulate_call(
        &self,
        from: &str,
        to: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, ClientError> {
        let result: CallResult = self
            .require(
                "call",
                serde_json::json!({
                    "from": from,
                    "address": to,
                    "data": hex::encode(data),
                }),
            )
            .await?;

        hex::decode(result.return_data.trim_start_matches("0x")).map_err(|e| {
            ClientError::Malformed {
                service: SERVICE,
                message: e.to_string(),
            }
        })
    }

    async fn account(&self, address: &str) -> Result<Option<AccountInfo>, ClientError> {
        self.request("get_account", serde_json::json!({ "address": address }))
            .await
    }

    async fn name_entry(&self, name: &str) -> Result<Option<NameEntry>, ClientError> {
        self.request("get_name", serde_json::json!({ "name": name }))
            .await
    }

    async fn validators(&self) -> Result<ValidatorSet, ClientError> {
        self.require("list_validators", serde_json::json!({})).await
    }

    async fn dump_state(&self, include_validators: bool) -> Result<serde_json::Value, ClientError> {
        self.require(
            "dump_state",
            serde_json::json!({ "include_validators": include_validators }),
        )
        .await
    }

    async fn restore_state(&self, state: serde_json::Value) -> Result<(), ClientError> {
        let _: Option<serde_json::Value> = self
            .request("restore_state", serde_json::json!({ "state": state }))
            .await?;
        Ok(())
    }
}
