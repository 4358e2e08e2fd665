use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;

use crate::matching::{normalize, Product};
use crate::scanner::AlertFilters;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
    pub database_path: String,
    pub snapshot_dir: String,
    pub health_port: u16,
    pub poll_min_secs: u64,
    pub poll_max_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            database_path: "data/monitor.db".to_string(),
            snapshot_dir: "data/snapshots".to_string(),
            health_port: 3000,
            poll_min_secs: 15,
            poll_max_secs: 25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringMode {
    /// Active inside the configured daily window.
    #[default]
    Auto,
    Manual,
    Always,
}

/// User-facing monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub location: String,
    pub keywords: Vec<String>,
    pub excluded_words: Vec<String>,
    pub products: Vec<Product>,
    pub fixed_lat: f64,
    pub fixed_lon: f64,
    pub monitoring_mode: MonitoringMode,
    pub start_time: String,
    pub end_time: String,
    pub mode_only_preferred: bool,
    pub near_good_deals: bool,
    pub good_deals: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            telegram_chat_id: String::new(),
            location: "melbourne".to_string(),
            keywords: Vec::new(),
            excluded_words: Vec::new(),
            products: Vec::new(),
            fixed_lat: -37.8136,
            fixed_lon: 144.9631,
            monitoring_mode: MonitoringMode::Auto,
            start_time: "06:30".to_string(),
            end_time: "22:00".to_string(),
            mode_only_preferred: false,
            near_good_deals: true,
            good_deals: false,
        }
    }
}

impl Settings {
    pub fn alert_filters(&self) -> AlertFilters {
        AlertFilters {
            only_preferred: self.mode_only_preferred,
            near_or_good: self.near_good_deals,
            good_only: self.good_deals,
        }
    }

    /// Manual mode leaves starting to an explicit user request.
    pub fn auto_start(&self) -> bool {
        self.monitoring_mode != MonitoringMode::Manual
    }

    pub fn notifier_configured(&self) -> bool {
        !self.telegram_token.is_empty() && !self.telegram_chat_id.is_empty()
    }

    /// Trim list entries, drop blanks and repeated keywords.
    pub fn sanitize(&mut self) {
        let mut keywords: Vec<String> = Vec::with_capacity(self.keywords.len());
        for keyword in self.keywords.iter().map(|k| k.trim()) {
            if !keyword.is_empty() && !keywords.iter().any(|k| k == keyword) {
                keywords.push(keyword.to_string());
            }
        }
        self.keywords = keywords;

        self.excluded_words = self
            .excluded_words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (idx, product) in self.products.iter().enumerate() {
            let field = format!("settings.products[{}]", idx);
            if normalize(&product.name).is_empty() {
                return Err(ConfigError::invalid(
                    field,
                    format!("name '{}' has no letters or digits", product.name),
                ));
            }
            for (label, price) in [("min_price", product.min_price), ("max_price", product.max_price)] {
                if !price.is_finite() || price < 0.0 {
                    return Err(ConfigError::invalid(
                        format!("{}.{}", field, label),
                        format!("{} is not a non-negative price", price),
                    ));
                }
            }
            if product.min_price > product.max_price {
                return Err(ConfigError::invalid(
                    field,
                    format!(
                        "min_price {} exceeds max_price {}",
                        product.min_price, product.max_price
                    ),
                ));
            }
        }

        for (label, value) in [("settings.start_time", &self.start_time), ("settings.end_time", &self.end_time)] {
            if NaiveTime::parse_from_str(value, "%H:%M").is_err() {
                return Err(ConfigError::invalid(label, format!("'{}' is not HH:MM", value)));
            }
        }

        if !(-90.0..=90.0).contains(&self.fixed_lat) {
            return Err(ConfigError::invalid("settings.fixed_lat", "outside [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&self.fixed_lon) {
            return Err(ConfigError::invalid("settings.fixed_lon", "outside [-180, 180]"));
        }

        Ok(())
    }
}

impl AppConfig {
    /// Layered load: `.env`, then the TOML file named by `MONITOR_CONFIG`
    /// (default `monitor.toml`, optional), then `MONITOR__SECTION__FIELD`
    /// environment variables.
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let path = env::var("MONITOR_CONFIG").unwrap_or_else(|_| "monitor.toml".to_string());

        let raw = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("settings.keywords")
                    .with_list_parse_key("settings.excluded_words"),
            )
            .build()
            .map_err(ConfigError::from)?;

        let mut config: AppConfig = raw.try_deserialize().map_err(ConfigError::from)?;
        config.settings.sanitize();
        config.validate()?;

        if !config.settings.notifier_configured() {
            tracing::warn!("Telegram token or chat id missing; alerts will only be logged");
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.poll_min_secs > self.service.poll_max_secs {
            return Err(ConfigError::invalid(
                "service.poll_min_secs",
                format!(
                    "{} exceeds poll_max_secs {}",
                    self.service.poll_min_secs, self.service.poll_max_secs
                ),
            ));
        }
        self.settings.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        let filters = config.settings.alert_filters();
        assert!(filters.near_or_good && !filters.good_only && !filters.only_preferred);
    }

    #[test]
    fn test_sanitize_trims_and_dedupes() {
        let mut settings = Settings {
            keywords: vec![" iPhone ".into(), "".into(), "iPhone".into(), "iPad".into()],
            excluded_words: vec!["Warranty".into(), "   ".into(), " Shop ".into()],
            ..Settings::default()
        };
        settings.sanitize();
        assert_eq!(settings.keywords, vec!["iPhone", "iPad"]);
        assert_eq!(settings.excluded_words, vec!["Warranty", "Shop"]);
    }

    #[test]
    fn test_rejects_inverted_price_range() {
        let settings = Settings {
            products: vec![Product::new("iPhone 12", 500.0, 300.0, true)],
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_rejects_unmatchable_product_name() {
        let settings = Settings {
            products: vec![Product::new("!!!", 0.0, 300.0, false)],
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_clock_time() {
        let settings = Settings {
            start_time: "6.30am".to_string(),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("settings.start_time"));
    }

    #[test]
    fn test_rejects_inverted_poll_window() {
        let config = AppConfig {
            service: ServiceConfig {
                poll_min_secs: 30,
                poll_max_secs: 10,
                ..ServiceConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_settings_deserialize_with_original_product_keys() {
        let json = r#"{
            "keywords": ["iPhone"],
            "products": [{"name": "iPhone 11", "minPrice": 100, "maxPrice": 200, "preferred": true}],
            "good_deals": true
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.products[0].max_price, 200.0);
        assert!(settings.good_deals);
        assert_eq!(settings.location, "melbourne");
        assert_eq!(settings.monitoring_mode, MonitoringMode::Auto);
    }

    #[test]
    fn test_only_manual_mode_waits_for_start() {
        assert!(Settings::default().auto_start());
        for (mode, expected) in [
            (MonitoringMode::Always, true),
            (MonitoringMode::Manual, false),
        ] {
            let settings = Settings {
                monitoring_mode: mode,
                ..Settings::default()
            };
            assert_eq!(settings.auto_start(), expected);
        }
    }
}
