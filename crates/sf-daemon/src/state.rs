//! Shared runtime state for sf-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The workflow carries
//! the backend and object store; the feed is the same one the backend
//! publishes to, surfaced to clients as SSE.

use serde::{Deserialize, Serialize};
use sf_workflow::{ChangeFeed, Workflow};

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: String,
    pub version: String,
}

#[derive(Clone)]
pub struct AppState {
    pub workflow: Workflow,
    /// Change feed the backend publishes to.
    pub feed: ChangeFeed,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(workflow: Workflow, feed: ChangeFeed) -> Self {
        Self {
            workflow,
            feed,
            build: BuildInfo {
                service: "sf-daemon".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
