// src/s3_client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! S3 client construction for the two S3-compatible flavors.
//!
//! AWS S3 goes through the default provider chain (env, profile, IMDS) for
//! credentials, with the region taken from the config. MinIO gets an explicit
//! endpoint, static credentials and path-style addressing.

use anyhow::{bail, Result};
use aws_config::meta::region::RegionProviderChain;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use std::{env, time::Duration};
use tracing::debug;

use crate::config::{StorageConfig, DEFAULT_REGION};

/// Operation timeout, overridable for very large objects.
fn get_operation_timeout() -> Duration {
    env::var("S3MIRROR_OPERATION_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(600))
}

fn timeout_config() -> TimeoutConfig {
    TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(5))
        .operation_timeout(get_operation_timeout())
        .build()
}

/// Client for AWS S3 proper.
pub async fn aws_s3_client(cfg: &StorageConfig) -> Result<Client> {
    let configured = (!cfg.region.is_empty()).then(|| Region::new(cfg.region.clone()));
    let region = RegionProviderChain::first_try(configured)
        .or_default_provider()
        .or_else(Region::new(DEFAULT_REGION));

    let sdk_cfg = aws_config::defaults(BehaviorVersion::latest())
        .region(region)
        .timeout_config(timeout_config())
        .load()
        .await;

    debug!("Built AWS S3 client for bucket {} (region {:?})", cfg.bucket, sdk_cfg.region());
    Ok(Client::new(&sdk_cfg))
}

/// Client for a MinIO (or other S3-compatible) endpoint with static credentials.
pub fn minio_s3_client(cfg: &StorageConfig) -> Result<Client> {
    if cfg.endpoint.is_empty() {
        bail!("MinIO endpoint is empty");
    }
    let endpoint = cfg.endpoint_url();
    let region = if cfg.region.is_empty() { DEFAULT_REGION } else { cfg.region.as_str() };

    let credentials = Credentials::new(
        cfg.access_key_id.clone(),
        cfg.secret_access_key.clone(),
        None,
        None,
        "s3mirror-static",
    );

    // Path-style (endpoint/bucket) is what S3-compatible services expect.
    let s3_config = aws_sdk_s3::config::Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .endpoint_url(&endpoint)
        .credentials_provider(credentials)
        .timeout_config(timeout_config())
        .force_path_style(true)
        .build();

    debug!("Built MinIO client for bucket {} at {}", cfg.bucket, endpoint);
    Ok(Client::from_conf(s3_config))
}
