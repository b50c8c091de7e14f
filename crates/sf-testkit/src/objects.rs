//! Object stores for tests.

use std::collections::HashMap;

use sf_workflow::{ObjectStore, StoreError, StoreResult};
use tokio::sync::Mutex;

pub const MEMORY_BASE_URL: &str = "memory://product-images";

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn content_type(&self, name: &str) -> Option<String> {
        self.objects.lock().await.get(name).map(|(ct, _)| ct.clone())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> StoreResult<()> {
        self.objects
            .lock()
            .await
            .insert(name.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn get(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.objects.lock().await.get(name).map(|(_, b)| b.clone()))
    }

    fn public_url(&self, name: &str) -> String {
        format!("{MEMORY_BASE_URL}/{name}")
    }
}

/// Refuses every upload.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingObjectStore;

#[async_trait::async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, name: &str, _bytes: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        Err(StoreError::Backend(format!("upload of {name} refused")))
    }

    async fn get(&self, _name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn public_url(&self, name: &str) -> String {
        format!("{MEMORY_BASE_URL}/{name}")
    }
}
