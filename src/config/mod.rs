//! Configuration management for secpsign
//!
//! Supports loading configuration from:
//! - Built-in defaults
//! - Config file (secpsign.toml or an explicit path)
//! - Environment variables (SECPSIGN_*)

use crate::errors::{Result, SignerError};
use crate::keystore::{KdfParams, DEFAULT_KEY_PREFIX};
use crate::security::new_secret_string;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    pub storage: StorageConfig,

    /// Security configuration
    pub security: SecurityConfig,

    /// Key cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Which storage backend holds key records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    File,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BackendKind,

    /// Directory for the encrypted file backend
    pub path: Option<PathBuf>,

    /// Prefix for key records, must end in `/`
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            path: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Environment variable holding the file backend's master password
    pub master_password_env: String,

    /// Argon2id memory cost in KiB
    pub kdf_memory_kib: u32,

    /// Argon2id passes
    pub kdf_iterations: u32,

    /// Argon2id lanes
    pub kdf_parallelism: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let kdf = KdfParams::default();
        Self {
            master_password_env: "SECPSIGN_MASTER_PASSWORD".to_string(),
            kdf_memory_kib: kdf.memory_kib,
            kdf_iterations: kdf.iterations,
            kdf_parallelism: kdf.parallelism,
        }
    }
}

impl SecurityConfig {
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.kdf_memory_kib,
            iterations: self.kdf_iterations,
            parallelism: self.kdf_parallelism,
        }
    }
}

/// Key cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset (e.g. "info")
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())
            .map_err(|e| SignerError::ConfigError(e.to_string()))?;

        let mut builder = config::Config::builder().add_source(defaults);

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        } else {
            builder = builder
                .add_source(config::File::with_name("secpsign").required(false))
                .add_source(config::File::with_name("/etc/secpsign/config").required(false));
        }

        // SECPSIGN_STORAGE__BACKEND, SECPSIGN_CACHE__ENABLED, ...
        builder = builder.add_source(
            config::Environment::with_prefix("SECPSIGN")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SignerError::ConfigError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == BackendKind::File && self.storage.path.is_none() {
            return Err(SignerError::ConfigError(
                "file backend selected but storage.path not set".to_string(),
            ));
        }

        if self.storage.key_prefix.is_empty() || !self.storage.key_prefix.ends_with('/') {
            return Err(SignerError::ConfigError(format!(
                "storage.key_prefix must be non-empty and end in '/', got {:?}",
                self.storage.key_prefix
            )));
        }

        let security = &self.security;
        if security.kdf_memory_kib == 0 || security.kdf_iterations == 0 || security.kdf_parallelism == 0
        {
            return Err(SignerError::ConfigError(
                "KDF parameters must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Read the master password from the configured environment variable
    pub fn master_password(&self) -> Result<SecretString> {
        let var = &self.security.master_password_env;
        match env::var(var) {
            Ok(password) if !password.is_empty() => Ok(new_secret_string(password)),
            _ => Err(SignerError::ConfigError(format!(
                "{} environment variable not set",
                var
            ))),
        }
    }
}
