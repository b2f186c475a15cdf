//! Object storage for uploaded audio payloads.
//!
//! Every upload is stored under a key derived from its job id, so the
//! worker that runs the job can find it without any other bookkeeping.
//! Backends come from `object_store`: local filesystem for deployments,
//! in-memory for tests.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use transcriber_core::JobId;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendConfig {
    Filesystem { root: PathBuf },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all object keys.
    pub prefix: Option<String>,
}

const DEFAULT_FS_ROOT: &str = "./data/uploads";

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `STORAGE_BACKEND`: `filesystem` (default) or `memory`
    /// - `STORAGE_FS_ROOT`: upload directory (default `./data/uploads`)
    /// - `STORAGE_PREFIX`: optional key prefix
    pub fn from_env() -> Result<Self, StorageError> {
        let backend = std::env::var("STORAGE_BACKEND").ok().and_then(non_empty);
        let prefix = std::env::var("STORAGE_PREFIX").ok().and_then(non_empty);

        let cfg = match backend.as_deref() {
            None | Some("filesystem") | Some("fs") => {
                let root = std::env::var("STORAGE_FS_ROOT")
                    .ok()
                    .and_then(non_empty)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FS_ROOT));
                Self::filesystem(root)
            }
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported STORAGE_BACKEND={other} (expected filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// Object key of the upload for a job, e.g. `01J...Z.ogg`.
pub fn upload_key(id: JobId, extension: &str) -> String {
    format!("{}.{}", id, extension.trim_start_matches('.'))
}

#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            StorageBackendConfig::Filesystem { root } => {
                std::fs::create_dir_all(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as Arc<dyn ObjectStore>)
            }
            StorageBackendConfig::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as Arc<dyn ObjectStore>)
            }
        };

        tracing::info!("Upload storage: {}", kind.as_str());

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(non_empty),
        })
    }

    fn to_path(&self, key: &str) -> Result<Path, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() || key.split('/').any(|part| part == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let joined = match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{key}"),
            _ => key.to_string(),
        };

        Ok(Path::from(joined))
    }

    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = self.to_path(key)?;
        let res = match self.store.get(&path).await {
            Ok(res) => res,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(res.bytes().await?)
    }

    /// Remove an object. Removing a missing object is not an error.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.to_path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.get_bytes(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[tokio::test]
    async fn in_memory_round_trip() -> Result<(), StorageError> {
        let storage = Storage::new(StorageConfig::memory())?;
        let key = upload_key(JobId::new(), "ogg");

        storage.put_bytes(&key, Bytes::from("OggS")).await?;
        assert!(storage.exists(&key).await?);
        assert_eq!(storage.get_bytes(&key).await?, Bytes::from("OggS"));

        storage.delete(&key).await?;
        assert!(!storage.exists(&key).await?);
        assert!(matches!(
            storage.get_bytes(&key).await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete(&key).await?;
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_uses_prefix() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let storage = Storage::new(StorageConfig::filesystem(dir.path()).with_prefix("incoming/"))?;
        let id = JobId::new();
        let key = upload_key(id, ".ogg");

        storage.put_bytes(&key, Bytes::from_static(b"audio")).await?;
        let on_disk = dir.path().join("incoming").join(format!("{id}.ogg"));
        assert_eq!(std::fs::read(&on_disk)?, b"audio");

        storage.delete(&key).await?;
        assert!(!on_disk.exists());
        Ok(())
    }

    #[test]
    fn rejects_traversal_keys() {
        let storage = Storage::new(StorageConfig::memory()).expect("memory storage");
        assert!(matches!(
            storage.to_path("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.to_path("/"), Err(StorageError::InvalidKey(_))));
    }
}
