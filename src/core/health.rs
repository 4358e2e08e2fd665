use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub state_store: bool,
    pub listing_source: bool,
    /// State flushes that failed since the last batch that flushed cleanly.
    pub recent_flush_failures: u64,
    #[serde(flatten)]
    pub extra: HashMap<String, bool>,
}

impl ComponentHealth {
    /// `unhealthy` until persisted state has loaded. Failed flushes leave the
    /// in-memory state authoritative, so they only degrade, as does a failing
    /// listing source.
    pub fn overall(&self) -> &'static str {
        if !self.state_store {
            "unhealthy"
        } else if !self.listing_source || self.recent_flush_failures > 0 {
            "degraded"
        } else {
            "healthy"
        }
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        match key {
            "state_store" => Some(self.state_store),
            "listing_source" => Some(self.listing_source),
            _ => self.extra.get(key).copied(),
        }
    }
}

#[derive(Clone)]
pub struct HealthChecker {
    start_time: std::time::Instant,
    status: Arc<RwLock<ComponentHealth>>,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            status: Arc::new(RwLock::new(ComponentHealth {
                state_store: false,
                listing_source: false,
                recent_flush_failures: 0,
                extra: HashMap::new(),
            })),
        }
    }

    pub async fn get_status(&self) -> HealthStatus {
        let components = self.status.read().await.clone();

        HealthStatus {
            status: components.overall().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            components,
        }
    }

    /// Record the flush failures of one batch; a clean batch clears the count.
    pub async fn record_flush_failures(&self, failures: usize) {
        let mut status = self.status.write().await;
        if failures == 0 {
            status.recent_flush_failures = 0;
        } else {
            status.recent_flush_failures += failures as u64;
        }
    }

    pub async fn update_component(&self, component: &str, healthy: bool) {
        let mut status = self.status.write().await;
        match component {
            "state_store" => status.state_store = healthy,
            "listing_source" => status.listing_source = healthy,
            _ => {
                status.extra.insert(component.to_string(), healthy);
            }
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_follows_components() {
        let checker = HealthChecker::new();
        assert_eq!(checker.get_status().await.status, "unhealthy");

        checker.update_component("state_store", true).await;
        assert_eq!(checker.get_status().await.status, "degraded");

        checker.update_component("listing_source", true).await;
        checker.update_component("notifier", false).await;

        let status = checker.get_status().await;
        assert_eq!(status.status, "healthy");
        assert_eq!(status.components.get("notifier"), Some(false));
        assert_eq!(status.components.get("state_store"), Some(true));
    }

    #[tokio::test]
    async fn test_flush_failures_degrade_until_clean_batch() {
        let checker = HealthChecker::new();
        checker.update_component("state_store", true).await;
        checker.update_component("listing_source", true).await;

        checker.record_flush_failures(2).await;
        checker.record_flush_failures(1).await;
        let status = checker.get_status().await;
        assert_eq!(status.status, "degraded");
        assert_eq!(status.components.recent_flush_failures, 3);

        checker.record_flush_failures(0).await;
        assert_eq!(checker.get_status().await.status, "healthy");
    }
}
