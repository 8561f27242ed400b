// src/object_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Pluggable object-store abstraction used by the mirror engine.
// Backends: AWS S3 (type = "s3"), MinIO (type = "minio"), local directory (type = "file")

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};

use crate::config::{StorageConfig, StorageType};
use crate::file_store::FileSystemObjectStore;
use crate::s3_store::S3ObjectStore;

/// Metadata for one stored object, as reported by a backend listing or HEAD.
///
/// `fingerprint` is the provider's ETag (or equivalent). It is only ever
/// compared for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub size: u64,
    pub fingerprint: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size: u64, fingerprint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size,
            fingerprint: fingerprint.into(),
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, ts: DateTime<Utc>) -> Self {
        self.last_modified = Some(ts);
        self
    }
}

/// ObjectStore trait for pluggable storage backends.
///
/// Keys are bucket-relative; each store is bound to exactly one bucket
/// (or root directory) at construction time.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object whose key starts with `prefix`, recursively.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>>;

    /// HEAD-like lookup. `Ok(None)` means the object does not exist.
    async fn stat(&self, key: &str) -> Result<Option<ObjectDescriptor>>;

    /// Open a streaming read of the object body.
    async fn get(&self, key: &str) -> Result<ByteStream>;

    /// Store `body` (of `size` bytes) at `key`, replacing any existing object.
    async fn put(&self, key: &str, body: ByteStream, size: u64) -> Result<()>;

    /// Bucket (or root directory) this store is bound to. Used for logging.
    fn bucket(&self) -> &str;
}

/// Build the backend selected by `cfg.storage_type`.
pub async fn store_for_config(cfg: &StorageConfig) -> Result<Box<dyn ObjectStore>> {
    let store: Box<dyn ObjectStore> = match cfg.storage_type {
        StorageType::S3 => Box::new(
            S3ObjectStore::aws(cfg)
                .await
                .with_context(|| format!("failed to create S3 client for bucket {}", cfg.bucket))?,
        ),
        StorageType::Minio => Box::new(
            S3ObjectStore::minio(cfg)
                .with_context(|| format!("failed to create MinIO client for bucket {}", cfg.bucket))?,
        ),
        StorageType::File => Box::new(FileSystemObjectStore::new(&cfg.bucket)),
    };
    Ok(store)
}
