// src/file_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// FileSystemObjectStore: a local directory exposed through the ObjectStore interface.
//
// Key mapping: `<root>/<key>`, with `/` as the separator on every platform.
// Fingerprints are the quoted hex MD5 of the content, the same shape S3 reports
// for single-part uploads, so a file tree mirrored from S3 compares equal.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use crate::object_store::{ObjectDescriptor, ObjectStore};

const HASH_BUF_SIZE: usize = 256 * 1024;
const TMP_SUFFIX: &str = ".s3mirror.tmp";

/// Removes a partially written temp file unless the put committed it.
/// Runs on error returns and when the put future is dropped mid-write.
struct TempFileGuard {
    path: PathBuf,
    committed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, committed: false }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.committed && std::fs::remove_file(&self.path).is_ok() {
            debug!("Removed partial file {}", self.path.display());
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileSystemObjectStore {
    root: PathBuf,
    name: String,
}

impl FileSystemObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let name = root.display().to_string();
        Self { root, name }
    }

    /// Map a key to a path under the root, rejecting anything that could escape it.
    fn key_to_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            bail!("empty object key");
        }
        let rel = Path::new(key);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            bail!("object key {key:?} is not a plain relative path");
        }
        Ok(self.root.join(rel))
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect();
        Some(parts.join("/"))
    }

    async fn fingerprint(path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).await?;
        let mut ctx = md5::Context::new();
        let mut buf = vec![0u8; HASH_BUF_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            ctx.consume(&buf[..n]);
        }
        Ok(format!("\"{:x}\"", ctx.compute()))
    }

    async fn descriptor(&self, key: String, path: &Path) -> Result<ObjectDescriptor> {
        let meta = fs::metadata(path).await?;
        let last_modified = meta.modified().ok().map(DateTime::<Utc>::from);
        Ok(ObjectDescriptor {
            key,
            size: meta.len(),
            fingerprint: Self::fingerprint(path).await?,
            last_modified,
        })
    }

    /// Collect every regular file under `dir`, skipping our own temp files.
    async fn collect_files(&self, dir: PathBuf, out: &mut Vec<PathBuf>) -> Result<()> {
        let mut stack = vec![dir];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e).with_context(|| format!("read_dir failed for {}", dir.display())),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    stack.push(path);
                } else if file_type.is_file() && !path.to_string_lossy().ends_with(TMP_SUFFIX) {
                    out.push(path);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FileSystemObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>> {
        if !fs::try_exists(&self.root).await? {
            bail!("root directory {} does not exist", self.root.display());
        }
        let mut paths = Vec::new();
        self.collect_files(self.root.clone(), &mut paths).await?;

        let mut objects = Vec::new();
        for path in paths {
            let Some(key) = self.path_to_key(&path) else { continue };
            if key.starts_with(prefix) {
                objects.push(self.descriptor(key, &path).await?);
            }
        }
        debug!("Listed {} files under {}/{}", objects.len(), self.name, prefix);
        Ok(objects)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectDescriptor>> {
        let path = self.key_to_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(self.descriptor(key.to_owned(), &path).await?)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("stat failed for {}", path.display())),
        }
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let path = self.key_to_path(key)?;
        ByteStream::from_path(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))
    }

    /// Streams into a sibling temp file, then renames over the destination.
    async fn put(&self, key: &str, body: ByteStream, size: u64) -> Result<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = TempFileGuard::new(PathBuf::from(tmp));

        let written = async {
            let mut file = fs::File::create(&tmp.path).await?;
            let reader = body.into_async_read();
            tokio::pin!(reader);
            let n = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

        if written != size {
            bail!("short write for {}: expected {} bytes, got {}", path.display(), size, written);
        }
        fs::rename(&tmp.path, &path)
            .await
            .with_context(|| format!("failed to rename into {}", path.display()))?;
        tmp.commit();
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}
