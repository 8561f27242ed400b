// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: mirror engine, storage backends and configuration.

pub mod config;
pub mod file_store;
pub mod mirror;
pub mod object_store;
pub mod s3_client;
pub mod s3_store;

pub use config::{ConfigError, MirrorConfig, StorageConfig, StorageType};
pub use file_store::FileSystemObjectStore;
pub use mirror::{MirrorJob, MirrorOutcome, MirrorService, MirrorStats, TransferError};
pub use object_store::{store_for_config, ObjectDescriptor, ObjectStore};
pub use s3_store::{S3Flavor, S3ObjectStore};

// Re-exported so callers implementing ObjectStore do not need a direct aws-sdk-s3 dependency.
pub use aws_sdk_s3::primitives::ByteStream;
