//! HTTP client for the key-signing daemon.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ClientError, KeyClient};

pub const SERVICE: &str = "keys daemon";

/// Key-signing daemon client
pub struct HttpKeyClient {
    /// Daemon base URL
    url: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from the keys daemon
#[derive(Debug, Deserialize)]
struct KeysResponse {
    #[serde(default)]
    result: String,
    #[serde(default)]
    error: String,
}

impl HttpKeyClient {
    /// Create a new keys client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Build endpoint URL
    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), method)
    }

    async fn post(&self, method: &str, body: serde_json::Value) -> Result<String, ClientError> {
        let url = self.endpoint(method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))?;

        let result: KeysResponse = response
            .json()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))?;

        if !result.error.is_empty() {
            return Err(ClientError::Rpc {
                service: SERVICE,
                message: result.error,
            });
        }

        Ok(result.result)
    }
}

#[async_trait]
impl KeyClient for HttpKeyClient {
    async fn public_key(&self, address: &str) -> Result<String, ClientError> {
        self.post("pub", serde_json::json!({ "addr": address })).await
    }

    async fn sign(&self, address: &str, message: &[u8]) -> Result<Vec<u8>, ClientError> {
        let signature = self
            .post(
                "sign",
                serde_json::json!({
                    "addr": address,
                    "msg": hex::encode(message),
                }),
            )
            .await?;

        hex::decode(signature.trim_start_matches("0x")).map_err(|e| ClientError::Malformed {
            service: SERVICE,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = HttpKeyClient::new("http://localhost:4767/");
        assert_eq!(client.endpoint("sign"), "http://localhost:4767/sign");
    }
}
