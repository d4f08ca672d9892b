//! In-process registry with TTL expiry.
//!
//! Behaves like etcd's v2 keys API for the subset of operations this crate
//! uses: directories are implied by key paths, children are listed in key
//! order, and keys written with a TTL disappear once it elapses.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::RegistryError;
use crate::registry::{key_path, KeyNode, Registry};

/// etcd error code for writing a value onto a directory.
const ECODE_NOT_FILE: u64 = 102;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: RwLock<BTreeMap<String, Entry>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
}

/// Thread-safe in-memory registry. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<Inner>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value without expiry, bypassing the call counters.
    pub fn insert(&self, key: &str, value: impl Into<String>) {
        self.inner.entries.write().insert(
            key_path(key, &[]),
            Entry {
                value: value.into(),
                expires_at: None,
            },
        );
    }

    /// Current value of a live key, bypassing the call counters.
    pub fn value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.inner
            .entries
            .read()
            .get(&key_path(key, &[]))
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone())
    }

    /// Whether a live key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    /// Number of `get` calls served.
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::Relaxed)
    }

    /// Number of `set` calls served.
    pub fn writes(&self) -> usize {
        self.inner.writes.load(Ordering::Relaxed)
    }

    /// Number of `delete` calls served.
    pub fn deletes(&self) -> usize {
        self.inner.deletes.load(Ordering::Relaxed)
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.inner.entries.write().retain(|_, e| e.is_live(now));
    }

    /// Build the directory node at `dir` from entries below it.
    fn directory(
        entries: &BTreeMap<String, Entry>,
        dir: &str,
        recursive: bool,
    ) -> Option<KeyNode> {
        let base = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };

        let mut nodes: Vec<KeyNode> = Vec::new();
        for (key, entry) in entries.range(base.clone()..) {
            let Some(rest) = key.strip_prefix(&base) else {
                break;
            };
            match rest.split_once('/') {
                None => nodes.push(KeyNode::leaf(key.clone(), entry.value.clone())),
                Some((child, _)) => {
                    let child_key = format!("{base}{child}");
                    if nodes.last().is_some_and(|n| n.key == child_key) {
                        continue;
                    }
                    let child_node = if recursive {
                        Self::directory(entries, &child_key, true)
                            .unwrap_or_else(|| KeyNode::directory(child_key.clone(), Vec::new()))
                    } else {
                        KeyNode::directory(child_key, Vec::new())
                    };
                    nodes.push(child_node);
                }
            }
        }

        if nodes.is_empty() {
            None
        } else {
            Some(KeyNode::directory(dir, nodes))
        }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn get(&self, key: &str, recursive: bool) -> Result<KeyNode, RegistryError> {
        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        self.purge_expired();

        let key = key_path(key, &[]);
        let entries = self.inner.entries.read();
        if let Some(entry) = entries.get(&key) {
            return Ok(KeyNode::leaf(key, entry.value.clone()));
        }
        Self::directory(&entries, &key, recursive).ok_or(RegistryError::NotFound { key })
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), RegistryError> {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.purge_expired();

        let key = key_path(key, &[]);
        let mut entries = self.inner.entries.write();
        let dir_prefix = format!("{key}/");
        let is_dir = entries
            .range(dir_prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&dir_prefix));
        if is_dir {
            return Err(RegistryError::Server {
                key,
                code: ECODE_NOT_FILE,
                message: "Not a file".to_string(),
            });
        }

        entries.insert(
            key,
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RegistryError> {
        self.inner.deletes.fetch_add(1, Ordering::Relaxed);
        self.purge_expired();

        let key = key_path(key, &[]);
        match self.inner.entries.write().remove(&key) {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotFound { key }),
        }
    }
}
