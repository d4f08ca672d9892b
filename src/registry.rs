//! Registry client interface.
//!
//! The registry is a hierarchical key-value store with TTL expiry and
//! "list children" reads (etcd's v2 keys API). Everything in this crate talks
//! to it through the [`Registry`] trait so the concrete client can be swapped
//! for [`MemoryRegistry`](crate::memory::MemoryRegistry) in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;

use crate::error::RegistryError;
use crate::metrics::{self, Timer};

/// A node in the registry tree, shaped like etcd's response node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyNode {
    /// Full key path.
    pub key: String,
    /// Stored value. `None` for directories.
    #[serde(default)]
    pub value: Option<String>,
    /// Whether this node is a directory.
    #[serde(default)]
    pub dir: bool,
    /// Children, populated for a directory read.
    #[serde(default)]
    pub nodes: Vec<KeyNode>,
}

impl KeyNode {
    /// Build a leaf node.
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            dir: false,
            nodes: Vec::new(),
        }
    }

    /// Build a directory node with the given children.
    pub fn directory(key: impl Into<String>, nodes: Vec<KeyNode>) -> Self {
        Self {
            key: key.into(),
            value: None,
            dir: true,
            nodes,
        }
    }
}

/// Minimal operations needed against the registry.
///
/// Implementations must be safe to share between concurrent DNS queries.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Read a key. With `recursive`, a directory's children are included.
    async fn get(&self, key: &str, recursive: bool) -> Result<KeyNode, RegistryError>;

    /// Write a value, replacing any previous one and refreshing its expiry.
    /// `ttl` of `None` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<(), RegistryError>;

    /// Delete a key.
    async fn delete(&self, key: &str) -> Result<(), RegistryError>;
}

/// Join key segments into an absolute registry path.
///
/// Empty segments are dropped, so `key_path("/", &["nodes", "web1"])` and
/// `key_path("/svc/", &["nodes", "web1"])` both produce clean paths.
pub fn key_path(prefix: &str, segments: &[&str]) -> String {
    let mut path = String::new();
    let parts = prefix
        .split('/')
        .chain(segments.iter().flat_map(|s| s.split('/')))
        .filter(|p| !p.is_empty() && *p != ".");
    for part in parts {
        path.push('/');
        path.push_str(part);
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

/// Wraps a registry so that every call is bounded by `timeout`.
///
/// An expired call is reported as [`RegistryError::Timeout`], which callers
/// treat like any other non-"not found" registry failure.
pub struct Timeout<R> {
    inner: R,
    timeout: Duration,
}

impl<R> Timeout<R> {
    /// Wrap `inner` with the given per-call limit.
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = Result<T, RegistryError>>,
    ) -> Result<T, RegistryError> {
        let timer = Timer::start();
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout {
                key: key.to_string(),
                timeout: self.timeout,
            }),
        };
        metrics::record_registry_op(op, &result, timer.elapsed());
        result
    }
}

#[async_trait]
impl<R: Registry> Registry for Timeout<R> {
    async fn get(&self, key: &str, recursive: bool) -> Result<KeyNode, RegistryError> {
        self.bounded("get", key, self.inner.get(key, recursive)).await
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RegistryError> {
        self.bounded("set", key, self.inner.set(key, value, ttl))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.bounded("delete", key, self.inner.delete(key)).await
    }
}
