//! Registry client for the etcd v2 keys HTTP API.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::config::RegistryConfig;
use crate::error::RegistryError;
use crate::registry::{KeyNode, Registry, Timeout};

/// etcd error code for a missing key.
pub const ECODE_KEY_NOT_FOUND: u64 = 100;

#[derive(Debug, Deserialize)]
struct GetResponse {
    node: KeyNode,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: Option<String>,
}

/// etcd client over HTTP.
#[derive(Debug, Clone)]
pub struct EtcdRegistry {
    client: Client,
    endpoint: String,
}

impl EtcdRegistry {
    /// Create a client for the given endpoint (e.g. `http://127.0.0.1:4001`).
    ///
    /// `connect_timeout` only bounds connection setup; wrap the client in
    /// [`Timeout`](crate::registry::Timeout) to bound whole calls.
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn keys_url(&self, key: &str) -> String {
        format!("{}/v2/keys{}", self.endpoint, key)
    }

    async fn send(
        &self,
        key: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, RegistryError> {
        let http = |source| RegistryError::Http {
            key: key.to_string(),
            source,
        };
        let response = request.send().await.map_err(http)?;
        let status = response.status();
        let body = response.text().await.map_err(http)?;
        trace!(key, %status, "etcd response");

        if status.is_success() {
            Ok(body)
        } else {
            Err(decode_error(key, status, &body))
        }
    }
}

/// Connect to the configured endpoint, bounding every call by the registry
/// timeout.
pub fn connect(config: &RegistryConfig) -> Result<Arc<dyn Registry>, reqwest::Error> {
    let etcd = EtcdRegistry::new(&config.endpoint, config.timeout())?;
    Ok(Arc::new(Timeout::new(etcd, config.timeout())))
}

/// Map an etcd error response onto a [`RegistryError`].
fn decode_error(key: &str, status: StatusCode, body: &str) -> RegistryError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if err.error_code == ECODE_KEY_NOT_FOUND => RegistryError::NotFound {
            key: key.to_string(),
        },
        Ok(err) => RegistryError::Server {
            key: key.to_string(),
            code: err.error_code,
            message: match err.cause {
                Some(cause) => format!("{} ({})", err.message, cause),
                None => err.message,
            },
        },
        Err(_) if status == StatusCode::NOT_FOUND => RegistryError::NotFound {
            key: key.to_string(),
        },
        Err(_) => RegistryError::Malformed {
            key: key.to_string(),
            reason: format!("HTTP {status}: {}", body.trim()),
        },
    }
}

/// Extract the node from a successful GET body.
fn decode_get(key: &str, body: &str) -> Result<KeyNode, RegistryError> {
    serde_json::from_str::<GetResponse>(body)
        .map(|r| r.node)
        .map_err(|e| RegistryError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl Registry for EtcdRegistry {
    async fn get(&self, key: &str, recursive: bool) -> Result<KeyNode, RegistryError> {
        let request = self.client.get(self.keys_url(key)).query(&[
            ("recursive", if recursive { "true" } else { "false" }),
            ("sorted", "true"),
        ]);
        let body = self.send(key, request).await?;
        decode_get(key, &body)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RegistryError> {
        let mut form = vec![("value", value.to_string())];
        if let Some(ttl) = ttl {
            form.push(("ttl", ttl.as_secs().max(1).to_string()));
        }
        let request = self.client.put(self.keys_url(key)).form(&form);
        self.send(key, request).await.map(|_| ())
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        let request = self.client.delete(self.keys_url(key));
        self.send(key, request).await.map(|_| ())
    }
}
