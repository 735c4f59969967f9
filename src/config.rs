//! Application configuration: defaults, TOML file and `SIMSVC__*`
//! environment overrides, layered in that order.

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub auth: AuthSettings,
    pub api: ApiConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// "postgres" or "memory" (embedded/test mode).
    pub backend: String,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// "rabbitmq" or "memory".
    pub backend: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "local" or "memory".
    pub backend: String,
    /// Root directory for the local backend.
    pub root: String,
    /// Base URL presigned download links point at; typically the API's
    /// public address.
    pub public_base_url: String,
    pub presign_secret: String,
    pub presign_ttl_seconds: u64,
    /// Serialized parameter documents above this size move to the blob store.
    pub inline_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    pub token_secret: String,
    pub token_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub enabled: bool,
    pub max_attempts: u32,
    pub retry_delay_seconds: u64,
    pub poll_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                backend: "postgres".to_string(),
                url: "postgresql://localhost/simsvc".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
            },
            queue: QueueConfig {
                backend: "rabbitmq".to_string(),
                url: "amqp://localhost:5672".to_string(),
            },
            storage: StorageConfig {
                backend: "local".to_string(),
                root: "data/blobs".to_string(),
                public_base_url: "http://localhost:8080".to_string(),
                presign_secret: "change-me".to_string(),
                presign_ttl_seconds: 3600,
                inline_limit_bytes: 100 * 1024,
            },
            auth: AuthSettings {
                token_secret: "change-me".to_string(),
                token_ttl_seconds: 1800,
            },
            api: ApiConfig {
                enabled: true,
                bind_address: "0.0.0.0:8080".to_string(),
            },
            worker: WorkerConfig {
                enabled: true,
                max_attempts: 3,
                retry_delay_seconds: 60,
                poll_interval_ms: 500,
            },
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?);

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                anyhow::bail!("config file not found: {path}");
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            for path in ["config/simsvc.toml", "simsvc.toml", "/etc/simsvc/config.toml"] {
                if Path::new(path).exists() {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(Environment::with_prefix("SIMSVC").separator("__"));

        builder
            .build()
            .context("failed to assemble configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}
