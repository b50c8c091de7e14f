use std::collections::HashMap;
use std::sync::Arc;

use sf_catalog::Capabilities;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ports::{Backend, StoreResult};

/// Session-scoped capability cache.
///
/// Roles are read from the identity store the first time a user is seen and
/// reused until [`CapabilityService::invalidate`] (sign-out).
#[derive(Clone)]
pub struct CapabilityService {
    backend: Arc<dyn Backend>,
    cache: Arc<RwLock<HashMap<Uuid, Capabilities>>>,
}

impl CapabilityService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn resolve(&self, user_id: Uuid) -> StoreResult<Capabilities> {
        if let Some(c) = self.cache.read().await.get(&user_id) {
            return Ok(*c);
        }
        let roles = self.backend.roles_for(user_id).await?;
        let caps = Capabilities::from_roles(&roles);
        self.cache.write().await.insert(user_id, caps);
        Ok(caps)
    }

    pub async fn invalidate(&self, user_id: Uuid) {
        self.cache.write().await.remove(&user_id);
    }

    pub async fn cached_sessions(&self) -> usize {
        self.cache.read().await.len()
    }
}
