use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("state store unavailable: {0}")]
    Unavailable(String),
}

/// Durable key-value store backing the monitor state.
///
/// `set` returning `Ok` means the value is durable; callers treat every
/// completed write as a flush.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StateStoreError>;
}

/// Process-local store. Used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, Value>>,
    fail_writes: AtomicBool,
    failing_keys: std::sync::RwLock<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes to `key` fail; other keys are unaffected.
    pub fn fail_writes_to(&self, key: &str) {
        if let Ok(mut keys) = self.failing_keys.write() {
            keys.insert(key.to_string());
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StateStoreError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StateStoreError> {
        let key_failing = self
            .failing_keys
            .read()
            .map(|keys| keys.contains(key))
            .unwrap_or(false);
        if self.fail_writes.load(Ordering::SeqCst) || key_failing {
            return Err(StateStoreError::Unavailable(format!(
                "write to '{}' rejected",
                key
            )));
        }
        self.values.write().await.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
