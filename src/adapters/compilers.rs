//! HTTP client for the contract compiler service.
//!
//! Sources are read locally and shipped inline, so the compiler service
//! does not need access to the project directory.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{ClientError, CompileRequest, CompileResponse, Compiler};

const SERVICE: &str = "compiler";

/// Compiler service client
pub struct HttpCompiler {
    /// Service base URL
    url: String,
    /// HTTP client
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct SourceFile {
    name: String,
    content: String,
}

impl HttpCompiler {
    /// Create a new compiler client
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn compile_url(&self) -> String {
        format!("{}/compile", self.url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Compiler for HttpCompiler {
    async fn compile(&self, request: &CompileRequest) -> Result<CompileResponse, ClientError> {
        let mut sources = Vec::with_capacity(request.files.len());
        for path in &request.files {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ClientError::Rpc {
                    service: SERVICE,
                    message: format!("Failed to read {}: {}", path.display(), e),
                })?;
            sources.push(SourceFile {
                name: path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string(),
                content,
            });
        }

        debug!(files = sources.len(), "Requesting compilation");

        let url = self.compile_url();
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "files": sources,
                "version": request.version,
                "libraries": request.libraries,
                "remappings": request.remappings,
            }))
            .send()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))?;

        response
            .json()
            .await
            .map_err(|e| ClientError::from_transport(SERVICE, &self.url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_url() {
        let compiler = HttpCompiler::new("http://127.0.0.1:9099");
        assert_eq!(compiler.compile_url(), "http://127.0.0.1:9099/compile");
    }
}
