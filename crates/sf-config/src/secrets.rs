//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"SF_DATABASE_URL"`).
//! - At startup, callers invoke [`resolve_secrets`] once and pass the result
//!   into constructors.
//! - `Debug` output of [`ResolvedSecrets`] **redacts** values.
//! - Error messages reference the env var **NAME**, never the value.
//!
//! # Mode-aware enforcement
//! - `DAEMON`: the database URL is **required**.
//! - `CLI`:    optional; commands that need the database fail later with context.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ConfigMode;

pub const DEFAULT_DATABASE_URL_ENV: &str = "SF_DATABASE_URL";

/// All runtime-resolved secrets for one process.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the env var the URL was read from.
    pub database_url_env: String,
    /// `None` if the named env var was absent or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url_env", &self.database_url_env)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// Read a non-empty string value at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Returns `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve secrets from the environment for `mode`.
///
/// # Errors
/// `SECRETS_MISSING` naming the env var when a required value is absent.
pub fn resolve_secrets(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let database_url_env = read_str_at(config_json, "/database/url_env")
        .unwrap_or_else(|| DEFAULT_DATABASE_URL_ENV.to_string());
    let database_url = resolve_env(&database_url_env);

    if mode == ConfigMode::Daemon && database_url.is_none() {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' (database url) is not set or empty",
            mode.as_str(),
            database_url_env,
        );
    }

    Ok(ResolvedSecrets {
        database_url_env,
        database_url,
    })
}
