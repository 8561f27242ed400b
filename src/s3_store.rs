// src/s3_store.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// ObjectStore over the AWS SDK, shared by the AWS S3 and MinIO flavors.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::{ByteStream, DateTime as AwsDateTime};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::StorageConfig;
use crate::object_store::{ObjectDescriptor, ObjectStore};
use crate::s3_client::{aws_s3_client, minio_s3_client};

/// Which S3-compatible service a store talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Flavor {
    Aws,
    Minio,
}

/// S3 adapter bound to a single bucket.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    flavor: S3Flavor,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>, flavor: S3Flavor) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            flavor,
        }
    }

    pub async fn aws(cfg: &StorageConfig) -> Result<Self> {
        let client = aws_s3_client(cfg).await?;
        Ok(Self::new(client, cfg.bucket.clone(), S3Flavor::Aws))
    }

    pub fn minio(cfg: &StorageConfig) -> Result<Self> {
        let client = minio_s3_client(cfg)?;
        Ok(Self::new(client, cfg.bucket.clone(), S3Flavor::Minio))
    }
}

fn to_chrono(ts: Option<&AwsDateTime>) -> Option<DateTime<Utc>> {
    ts.and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    /// Paginated ListObjectsV2 (no delimiter, so it is recursive).
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>> {
        let mut objects = Vec::new();
        let mut cont: Option<String> = None;
        loop {
            let mut req = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &cont {
                req = req.continuation_token(token);
            }
            let resp = req
                .send()
                .await
                .with_context(|| format!("list_objects_v2 failed for s3://{}/{}", self.bucket, prefix))?;
            for obj in resp.contents() {
                let Some(key) = obj.key() else { continue };
                objects.push(ObjectDescriptor {
                    key: key.to_owned(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    fingerprint: obj.e_tag().unwrap_or_default().to_owned(),
                    last_modified: to_chrono(obj.last_modified()),
                });
            }
            match resp.next_continuation_token() {
                Some(token) => cont = Some(token.to_string()),
                None => break,
            }
        }
        debug!("Listed {} objects under s3://{}/{}", objects.len(), self.bucket, prefix);
        Ok(objects)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectDescriptor>> {
        let resp = self.client.head_object().bucket(&self.bucket).key(key).send().await;
        match resp {
            Ok(head) => Ok(Some(ObjectDescriptor {
                key: key.to_owned(),
                size: head.content_length().unwrap_or(0).max(0) as u64,
                fingerprint: head.e_tag().unwrap_or_default().to_owned(),
                last_modified: to_chrono(head.last_modified()),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("head_object failed for s3://{}/{}", self.bucket, key)),
        }
    }

    async fn get(&self, key: &str) -> Result<ByteStream> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("get_object failed for s3://{}/{}", self.bucket, key))?;
        Ok(resp.body)
    }

    async fn put(&self, key: &str, body: ByteStream, size: u64) -> Result<()> {
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(size as i64)
            .body(body);
        if self.flavor == S3Flavor::Minio {
            req = req.content_type("application/octet-stream");
        }
        req.send()
            .await
            .with_context(|| format!("put_object failed for s3://{}/{}", self.bucket, key))?;
        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
