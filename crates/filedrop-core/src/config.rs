//! Configuration module
//!
//! This module provides configuration for the HTTP server, the storage backend and the
//! upload pipeline. Values come from the process environment (after loading `.env`).

use std::env;

use crate::constants::DEFAULT_CUSTOM_HEADER_PREFIX;
use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_UPLOAD_SIZE_MB: u64 = 100;
const MAX_FORM_FIELD_BYTES: usize = 64 * 1024;
const LOCAL_STORAGE_PATH: &str = "./data/files";
const LOCAL_STORAGE_BASE_URL: &str = "http://localhost:3000/files";

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// File service configuration
#[derive(Clone, Debug)]
pub struct FileServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Upload pipeline configuration
    pub custom_header_prefix: String,
    pub max_upload_size_bytes: u64,
    pub max_form_field_bytes: usize,
    // Static API keys; empty means every caller is allowed anonymously
    pub api_keys: Vec<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<FileServiceConfig>);

impl Config {
    fn inner(&self) -> &FileServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, test fixtures).
    pub fn from_source<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = FileServiceConfig::from_source(lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> &str {
        &self.inner().local_storage_path
    }

    pub fn local_storage_base_url(&self) -> &str {
        &self.inner().local_storage_base_url
    }

    pub fn custom_header_prefix(&self) -> &str {
        &self.inner().custom_header_prefix
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.inner().max_upload_size_bytes
    }

    pub fn max_form_field_bytes(&self) -> usize {
        self.inner().max_form_field_bytes
    }

    pub fn api_keys(&self) -> &[String] {
        &self.inner().api_keys
    }
}

fn is_production_name(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl FileServiceConfig {
    pub fn from_source<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let server_port = match lookup("SERVER_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid SERVER_PORT '{}': {}", raw, e))?,
            None => SERVER_PORT,
        };

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let max_upload_size_mb = lookup("MAX_UPLOAD_SIZE_MB")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(MAX_UPLOAD_SIZE_MB);
        let max_upload_size_bytes = max_upload_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                anyhow::anyhow!("MAX_UPLOAD_SIZE_MB '{}' is too large", max_upload_size_mb)
            })?;

        let max_form_field_bytes = lookup("MAX_FORM_FIELD_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(MAX_FORM_FIELD_BYTES);

        let custom_header_prefix = lookup("CUSTOM_HEADER_PREFIX")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or_else(|| DEFAULT_CUSTOM_HEADER_PREFIX.to_string());

        Ok(FileServiceConfig {
            base: BaseConfig {
                server_port,
                cors_origins: split_list(&cors_origins_str),
                environment,
            },
            storage_backend,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| LOCAL_STORAGE_PATH.to_string()),
            local_storage_base_url: lookup("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| LOCAL_STORAGE_BASE_URL.to_string()),
            custom_header_prefix,
            max_upload_size_bytes,
            max_form_field_bytes,
            api_keys: lookup("API_KEYS")
                .map(|s| split_list(&s))
                .unwrap_or_default(),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.custom_header_prefix.is_empty() {
            return Err(anyhow::anyhow!("CUSTOM_HEADER_PREFIX must not be empty"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.max_form_field_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FORM_FIELD_BYTES must be greater than 0"));
        }

        if self.storage_backend == StorageBackend::Local {
            if self.local_storage_path.trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "LOCAL_STORAGE_PATH is required for the local storage backend"
                ));
            }
            if !self.local_storage_base_url.starts_with("http://")
                && !self.local_storage_base_url.starts_with("https://")
            {
                return Err(anyhow::anyhow!(
                    "LOCAL_STORAGE_BASE_URL must be an http(s) URL"
                ));
            }
        }

        if self.api_keys.iter().any(|k| k.len() < 16) {
            return Err(anyhow::anyhow!(
                "API_KEYS entries must be at least 16 characters long"
            ));
        }

        if is_production_name(&self.base.environment) && self.api_keys.is_empty() {
            return Err(anyhow::anyhow!(
                "API_KEYS must be set in production; anonymous uploads are development-only"
            ));
        }

        Ok(())
    }
}
