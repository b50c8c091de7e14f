//! Typed view over the merged config JSON.
//!
//! Every key has a default so an empty config is valid. Unknown keys are
//! ignored here; [`crate::report_unused_keys`] is the place that flags them.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::secrets::DEFAULT_DATABASE_URL_ENV;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8898".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Name of the env var holding the connection URL.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory the product-images bucket is written to.
    pub root_dir: String,
    /// URL prefix under which stored objects are served.
    pub public_base_url: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root_dir: "./var/product-images".to_string(),
            public_base_url: "http://127.0.0.1:8898/media/product-images".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub default_limit: i64,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionSettings {
    pub max_rows: usize,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self { max_rows: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub channel_capacity: usize,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontSettings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub storage: StorageSettings,
    pub catalog: CatalogSettings,
    pub submission: SubmissionSettings,
    pub realtime: RealtimeSettings,
}

impl StorefrontSettings {
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let s: StorefrontSettings = serde_json::from_value(config_json.clone())
            .context("config does not match storefront settings schema")?;
        s.validate()?;
        Ok(s)
    }

    fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            bail!("CONFIG_INVALID database.max_connections must be > 0");
        }
        if self.catalog.default_limit <= 0 {
            bail!("CONFIG_INVALID catalog.default_limit must be > 0");
        }
        if self.submission.max_rows == 0 {
            bail!("CONFIG_INVALID submission.max_rows must be > 0");
        }
        if self.realtime.channel_capacity == 0 {
            bail!("CONFIG_INVALID realtime.channel_capacity must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_defaults() {
        let s = StorefrontSettings::from_config_json(&serde_json::json!({})).unwrap();
        assert_eq!(s, StorefrontSettings::default());
        assert_eq!(s.server.bind_addr, "127.0.0.1:8898");
        assert_eq!(s.database.url_env, "SF_DATABASE_URL");
        assert_eq!(s.submission.max_rows, 50);
    }

    #[test]
    fn partial_section_keeps_sibling_defaults() {
        let s = StorefrontSettings::from_config_json(&serde_json::json!({
            "database": {"max_connections": 3}
        }))
        .unwrap();
        assert_eq!(s.database.max_connections, 3);
        assert_eq!(s.database.url_env, "SF_DATABASE_URL");
    }

    #[test]
    fn zero_capacity_is_refused() {
        let err = StorefrontSettings::from_config_json(&serde_json::json!({
            "realtime": {"channel_capacity": 0}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }
}
