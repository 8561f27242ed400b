// tests/common/mod.rs
//
// In-memory ObjectStore used by the mirror tests, with fault injection hooks.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use s3mirror::{ByteStream, MirrorConfig, ObjectDescriptor, ObjectStore, StorageConfig};

#[derive(Default)]
pub struct MemoryStore {
    name: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    fail_list: bool,
    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
    fail_stat: HashSet<String>,
    forbid_put: bool,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub stats: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    /// Insert an object whose fingerprint is derived from its content.
    pub fn with_object(self, key: &str, data: &[u8]) -> Self {
        let fp = fingerprint_of(data);
        self.objects.lock().unwrap().insert(key.to_string(), (data.to_vec(), fp));
        self
    }

    /// Insert an object with an explicit fingerprint.
    pub fn with_fingerprint(self, key: &str, data: &[u8], fp: &str) -> Self {
        self.objects.lock().unwrap().insert(key.to_string(), (data.to_vec(), fp.to_string()));
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_get(mut self, key: &str) -> Self {
        self.fail_get.insert(key.to_string());
        self
    }

    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_put.insert(key.to_string());
        self
    }

    pub fn failing_stat(mut self, key: &str) -> Self {
        self.fail_stat.insert(key.to_string());
        self
    }

    /// Any put() call is a test failure.
    pub fn read_only(mut self) -> Self {
        self.forbid_put = true;
        self
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|(d, _)| d.clone())
    }
}

pub fn fingerprint_of(data: &[u8]) -> String {
    format!("\"{:x}\"", md5::compute(data))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>> {
        if self.fail_list {
            bail!("injected list failure");
        }
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, (d, fp))| ObjectDescriptor::new(k.clone(), d.len() as u64, fp.clone()))
            .collect())
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectDescriptor>> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        if self.fail_stat.contains(key) {
            bail!("injected stat failure (403 Forbidden)");
        }
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .get(key)
            .map(|(d, fp)| ObjectDescriptor::new(key, d.len() as u64, fp.clone())))
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_get.contains(key) {
            bail!("injected get failure");
        }
        let data = match self.objects.lock().unwrap().get(key) {
            Some((d, _)) => d.clone(),
            None => bail!("no such key: {key}"),
        };
        Ok(ByteStream::from(data))
    }

    async fn put(&self, key: &str, body: ByteStream, size: u64) -> Result<()> {
        assert!(!self.forbid_put, "put({key}) called on a read-only store");
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.contains(key) {
            bail!("injected put failure");
        }
        let data = body.collect().await?.into_bytes().to_vec();
        assert_eq!(data.len() as u64, size, "size mismatch for {key}");
        let fp = fingerprint_of(&data);
        self.objects.lock().unwrap().insert(key.to_string(), (data, fp));
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.name
    }
}

/// A validated-looking config for in-memory runs.
pub fn test_config(workers: usize, source_prefix: &str, target_prefix: &str) -> MirrorConfig {
    MirrorConfig {
        source: StorageConfig {
            bucket: "src".into(),
            prefix: source_prefix.into(),
            ..Default::default()
        },
        target: StorageConfig {
            bucket: "dst".into(),
            prefix: target_prefix.into(),
            ..Default::default()
        },
        workers,
        dry_run: false,
        verbose: false,
    }
}
