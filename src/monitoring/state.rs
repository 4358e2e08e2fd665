use serde_json::{json, Value};

use super::first_run::FirstRunTracker;
use super::seen_listings::SeenListingStore;
use super::state_store::{StateStore, StateStoreError};

pub const SEEN_LISTINGS_KEY: &str = "seenListings";
pub const FIRST_RUN_KEYWORDS_KEY: &str = "firstRunKeywords";
pub const FIRST_RUN_KEY: &str = "firstRun";

/// Mutable monitor state, owned by the orchestrator and lent to the pipeline
/// for the duration of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    pub seen: SeenListingStore,
    pub first_run: FirstRunTracker,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing keys mean a fresh install. Malformed values are logged and
    /// treated as empty rather than failing startup.
    pub async fn load(store: &dyn StateStore) -> Result<Self, StateStoreError> {
        let seen_ids = string_list(store.get(SEEN_LISTINGS_KEY).await?, SEEN_LISTINGS_KEY);
        let completed = string_list(
            store.get(FIRST_RUN_KEYWORDS_KEY).await?,
            FIRST_RUN_KEYWORDS_KEY,
        );
        let global_first_run = match store.get(FIRST_RUN_KEY).await? {
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                tracing::warn!("Ignoring malformed '{}' value: {}", FIRST_RUN_KEY, other);
                true
            }
            None => true,
        };

        let state = Self {
            seen: SeenListingStore::from_ids(seen_ids),
            first_run: FirstRunTracker::from_persisted(completed, global_first_run),
        };

        tracing::info!(
            "Loaded {} seen listings, {} baselined keywords",
            state.seen.size(),
            state.first_run.completed_keywords().len()
        );

        Ok(state)
    }

    pub async fn flush_seen(&self, store: &dyn StateStore) -> Result<(), StateStoreError> {
        store
            .set(SEEN_LISTINGS_KEY, json!(self.seen.snapshot()))
            .await
    }

    pub async fn flush_first_run(&self, store: &dyn StateStore) -> Result<(), StateStoreError> {
        store
            .set(
                FIRST_RUN_KEYWORDS_KEY,
                json!(self.first_run.completed_keywords()),
            )
            .await?;
        store
            .set(FIRST_RUN_KEY, json!(!self.first_run.all_complete()))
            .await
    }
}

fn string_list(value: Option<Value>, key: &str) -> Vec<String> {
    match value {
        None => Vec::new(),
        Some(value) => match serde_json::from_value::<Vec<String>>(value) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("Ignoring malformed '{}' value: {}", key, e);
                Vec::new()
            }
        },
    }
}
