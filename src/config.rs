// src/config.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Mirror configuration: TOML file, defaults, command-line overrides and validation.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_WORKERS: usize = 10;
pub const MAX_WORKERS: usize = 100;
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{side}: bucket cannot be empty")]
    EmptyBucket { side: &'static str },

    #[error("{side}: {field} is required for MinIO")]
    MissingMinioField {
        side: &'static str,
        field: &'static str,
    },

    #[error("workers must be between 1 and 100, got {0}")]
    Workers(usize),
}

/// Backend kind for one side of the mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    S3,
    Minio,
    File,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::S3 => write!(f, "s3"),
            StorageType::Minio => write!(f, "minio"),
            StorageType::File => write!(f, "file"),
        }
    }
}

/// Settings for one storage endpoint (source or target).
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// Bucket name; for `type = "file"` the root directory.
    pub bucket: String,
    pub region: String,
    /// MinIO endpoint, `host:port` or a full URL.
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    /// Source side: listing filter. Target side: prepended to every key.
    pub prefix: String,
}

// Hand-written so secrets never end up in logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("storage_type", &self.storage_type)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl StorageConfig {
    /// Endpoint as a URL. A bare `host:port` gets a scheme picked from `use_ssl`.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else if self.use_ssl {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }

    fn apply_defaults(&mut self) {
        if self.storage_type == StorageType::S3 && self.region.is_empty() {
            self.region = DEFAULT_REGION.to_string();
        }
    }

    fn validate(&self, side: &'static str) -> Result<(), ConfigError> {
        if self.bucket.is_empty() {
            return Err(ConfigError::EmptyBucket { side });
        }
        if self.storage_type == StorageType::Minio {
            let required = [
                ("endpoint", &self.endpoint),
                ("access_key_id", &self.access_key_id),
                ("secret_access_key", &self.secret_access_key),
            ];
            for (field, value) in required {
                if value.is_empty() {
                    return Err(ConfigError::MissingMinioField { side, field });
                }
            }
        }
        Ok(())
    }
}

/// Runtime parameters for one mirror run. Read-only once the engine starts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub source: StorageConfig,
    pub target: StorageConfig,
    pub workers: usize,
    pub dry_run: bool,
    pub verbose: bool,
}

impl MirrorConfig {
    /// Load from a TOML file and fill in defaults. Does not validate.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let mut cfg: MirrorConfig = toml::from_str(text)?;
        cfg.apply_defaults();
        Ok(cfg)
    }

    fn apply_defaults(&mut self) {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        self.source.apply_defaults();
        self.target.apply_defaults();
    }

    /// Command-line flags win over the file; a zero worker count means "not given".
    pub fn apply_overrides(&mut self, workers: usize, dry_run: bool, verbose: bool) {
        if workers > 0 {
            self.workers = workers;
        }
        if dry_run {
            self.dry_run = true;
        }
        if verbose {
            self.verbose = true;
        }
    }

    /// Default `EnvFilter` directives: dependencies stay at `warn`, this
    /// crate and the binary log at `info` (`debug` from `-vv` upward).
    pub fn log_filter(&self, verbosity: u8) -> String {
        let level = if verbosity >= 2 { "debug" } else { "info" };
        format!("warn,s3mirror={level},s3_mirror={level}")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate("source")?;
        self.target.validate("target")?;
        if !(1..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::Workers(self.workers));
        }
        Ok(())
    }
}
