//! Configuration module
//!
//! Configuration is read once from the process environment (optionally seeded
//! from a `.env` file) and validated before any collaborator is built.

use std::env;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CLAMAV_PORT: u16 = 3310;
const CLAMAV_CONNECT_TIMEOUT_MS: u64 = 2_000;
const CLAMAV_READ_TIMEOUT_MS: u64 = 30_000;
const CLAMAV_CHUNK_SIZE: usize = 2048;
const SEARCH_MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Debug)]
pub struct DocVaultConfig {
    pub environment: String,
    pub service_name: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    // ClamAV configuration
    pub clamav_host: String,
    pub clamav_port: u16,
    pub clamav_connect_timeout_ms: u64,
    pub clamav_read_timeout_ms: u64,
    pub clamav_chunk_size: usize,
    // Search
    pub search_max_page_size: u32,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<DocVaultConfig>);

impl Config {
    fn inner(&self) -> &DocVaultConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = DocVaultConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn environment(&self) -> &str {
        &self.inner().environment
    }

    pub fn service_name(&self) -> &str {
        &self.inner().service_name
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().db_timeout_seconds
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.inner().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn clamav_host(&self) -> &str {
        &self.inner().clamav_host
    }

    pub fn clamav_port(&self) -> u16 {
        self.inner().clamav_port
    }

    pub fn clamav_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.inner().clamav_connect_timeout_ms)
    }

    pub fn clamav_read_timeout(&self) -> Duration {
        Duration::from_millis(self.inner().clamav_read_timeout_ms)
    }

    pub fn clamav_chunk_size(&self) -> usize {
        self.inner().clamav_chunk_size
    }

    pub fn search_max_page_size(&self) -> u32 {
        self.inner().search_max_page_size
    }
}

impl DocVaultConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let storage_backend = env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "s3".to_string())
            .parse::<StorageBackend>()?;

        Ok(DocVaultConfig {
            environment,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "docvault".to_string()),
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            clamav_host: env::var("CLAMAV_HOST").unwrap_or_else(|_| "localhost".to_string()),
            clamav_port: env::var("CLAMAV_PORT")
                .unwrap_or_else(|_| CLAMAV_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("CLAMAV_PORT must be a valid port number"))?,
            clamav_connect_timeout_ms: env::var("CLAMAV_CONNECT_TIMEOUT_MS")
                .unwrap_or_else(|_| CLAMAV_CONNECT_TIMEOUT_MS.to_string())
                .parse()
                .unwrap_or(CLAMAV_CONNECT_TIMEOUT_MS),
            clamav_read_timeout_ms: env::var("CLAMAV_READ_TIMEOUT_MS")
                .unwrap_or_else(|_| CLAMAV_READ_TIMEOUT_MS.to_string())
                .parse()
                .unwrap_or(CLAMAV_READ_TIMEOUT_MS),
            clamav_chunk_size: env::var("CLAMAV_CHUNK_SIZE")
                .unwrap_or_else(|_| CLAMAV_CHUNK_SIZE.to_string())
                .parse()
                .unwrap_or(CLAMAV_CHUNK_SIZE),
            search_max_page_size: env::var("SEARCH_MAX_PAGE_SIZE")
                .unwrap_or_else(|_| SEARCH_MAX_PAGE_SIZE.to_string())
                .parse()
                .unwrap_or(SEARCH_MAX_PAGE_SIZE),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.service_name.trim().is_empty() {
            return Err(anyhow::anyhow!("SERVICE_NAME cannot be empty"));
        }

        if self.clamav_chunk_size == 0 {
            return Err(anyhow::anyhow!("CLAMAV_CHUNK_SIZE must be greater than 0"));
        }

        if self.search_max_page_size == 0 {
            return Err(anyhow::anyhow!(
                "SEARCH_MAX_PAGE_SIZE must be greater than 0"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> DocVaultConfig {
        DocVaultConfig {
            environment: "development".to_string(),
            service_name: "billing".to_string(),
            database_url: "postgresql://localhost/docvault".to_string(),
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            storage_backend: StorageBackend::Local,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("/tmp/docvault".to_string()),
            clamav_host: "localhost".to_string(),
            clamav_port: CLAMAV_PORT,
            clamav_connect_timeout_ms: CLAMAV_CONNECT_TIMEOUT_MS,
            clamav_read_timeout_ms: CLAMAV_READ_TIMEOUT_MS,
            clamav_chunk_size: CLAMAV_CHUNK_SIZE,
            search_max_page_size: SEARCH_MAX_PAGE_SIZE,
        }
    }

    #[test]
    fn test_valid_local_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_postgres_url() {
        let mut config = base_config();
        config.database_url = "mysql://localhost/docvault".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_backend_requires_path() {
        let mut config = base_config();
        config.local_storage_path = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_backend_requires_region() {
        let mut config = base_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());

        config.aws_region = Some("eu-west-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = base_config();
        config.clamav_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_getters_and_production_flag() {
        let mut inner = base_config();
        inner.environment = "Prod".to_string();
        let config = Config(Box::new(inner));
        assert!(config.is_production());
        assert_eq!(config.clamav_chunk_size(), 2048);
        assert_eq!(config.clamav_read_timeout(), Duration::from_secs(30));
        assert_eq!(config.service_name(), "billing");
    }
}
