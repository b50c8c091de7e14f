use std::io::ErrorKind;
use std::path::PathBuf;

use crate::ports::{ObjectStore, StoreError, StoreResult};

/// Filesystem-backed public bucket: one file per object under `root`.
#[derive(Debug, Clone)]
pub struct LocalDirStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalDirStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    fn path_for(&self, name: &str) -> StoreResult<PathBuf> {
        // Flat namespace only.
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::Backend(format!("invalid object name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalDirStore {
    async fn put(&self, name: &str, bytes: Vec<u8>, _content_type: &str) -> StoreResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::Backend(format!("create bucket dir: {e}")))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| StoreError::Backend(format!("write {name}: {e}")))
    }

    async fn get(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Backend(format!("read {name}: {e}"))),
        }
    }

    fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), name)
    }
}
