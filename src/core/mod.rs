pub mod config;
pub mod event_bus;
pub mod health;
pub mod logging;
pub mod metrics;

pub use self::config::{AppConfig, ConfigError, MonitoringMode, ServiceConfig, Settings};
pub use event_bus::{EventBus, MonitorEvent};
pub use health::{HealthChecker, HealthStatus};
pub use metrics::MonitorMetrics;
