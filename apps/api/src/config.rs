//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//! `main` loads `.env` first, so a local file works for development.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface the HTTP server binds to
    pub http_host: String,

    /// HTTP server port
    pub http_port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// JWT secret key for signing tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// JWT access token lifetime in seconds
    pub jwt_access_ttl_secs: i64,

    /// Object storage settings
    pub storage: StorageConfig,

    /// Admin created on startup when the database has none
    pub admin_username: Option<String>,

    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
}

/// S3 / MinIO settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint the API talks to (e.g. `minio:9000` inside Docker)
    pub endpoint: String,

    /// Endpoint clients reach; presigned URLs and public URLs use it
    pub public_endpoint: Option<String>,

    /// Port paired with the endpoint host when no public endpoint is set
    pub public_port: u16,

    pub access_key: String,

    #[serde(skip_serializing)]
    pub secret_key: String,

    pub bucket: String,
    pub region: String,
    pub use_ssl: bool,

    /// Apply an anonymous `s3:GetObject` policy when the bucket is created
    pub enable_public_read: bool,

    /// Root of every object key
    pub prefix: String,

    /// Lifetime of presigned upload URLs
    pub upload_url_expiry_secs: u64,

    /// Largest upload accepted (bytes)
    pub upload_max_bytes: u64,

    /// Age after which temp uploads are swept
    pub temp_max_age_secs: u64,

    /// Sweep period
    pub cleanup_interval_secs: u64,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let storage = StorageConfig {
            endpoint: env::var("S3_ENDPOINT").unwrap_or_else(|_| "localhost:9000".to_string()),
            public_endpoint: env::var("S3_PUBLIC_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            public_port: parse_var("S3_PUBLIC_PORT", "9000")?,
            access_key: env::var("S3_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            secret_key: env::var("S3_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string()),
            bucket: env::var("S3_BUCKET").unwrap_or_else(|_| "forex".to_string()),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            use_ssl: parse_var("S3_USE_SSL", "false")?,
            enable_public_read: parse_var("S3_ENABLE_PUBLIC_READ", "true")?,
            prefix: env::var("S3_PREFIX").unwrap_or_else(|_| "uploads".to_string()),
            upload_url_expiry_secs: parse_var("UPLOAD_URL_EXPIRY_SECS", "3600")?, // 1 hour
            upload_max_bytes: parse_var("UPLOAD_MAX_BYTES", "5242880")?, // 5MB
            temp_max_age_secs: parse_var("TEMP_MAX_AGE_SECS", "86400")?, // 1 day
            cleanup_interval_secs: parse_var("CLEANUP_INTERVAL_SECS", "3600")?,
        };

        let config = ApiConfig {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: parse_var("HTTP_PORT", "8080")?,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "./forex.db".to_string()),
            db_max_connections: parse_var("DB_MAX_CONNECTIONS", "5")?,
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| {
                // In production, this MUST be set via environment variable
                "forex-dev-secret-change-in-production".to_string()
            }),
            jwt_access_ttl_secs: parse_var("JWT_ACCESS_TTL_SECS", "43200")?, // 12 hours
            storage,
            admin_username: env::var("ADMIN_USERNAME").ok().filter(|v| !v.trim().is_empty()),
            admin_password: env::var("ADMIN_PASSWORD").ok().filter(|v| !v.is_empty()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot run.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        // tokio's interval panics on a zero period
        if self.storage.cleanup_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("CLEANUP_INTERVAL_SECS".to_string()));
        }
        if self.admin_username.is_some() && self.admin_password.is_none() {
            return Err(ConfigError::MissingRequired("ADMIN_PASSWORD".to_string()));
        }
        Ok(())
    }

    /// `host:port` the listener binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Configuration for tests: in-memory values, no environment access.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ApiConfig {
            http_host: "127.0.0.1".to_string(),
            http_port: 0,
            database_path: ":memory:".to_string(),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            jwt_access_ttl_secs: 3600,
            storage: StorageConfig {
                endpoint: "localhost:9000".to_string(),
                public_endpoint: Some("files.example.com".to_string()),
                public_port: 9000,
                access_key: "minio".to_string(),
                secret_key: "minio".to_string(),
                bucket: "forex".to_string(),
                region: "us-east-1".to_string(),
                use_ssl: false,
                enable_public_read: true,
                prefix: "uploads".to_string(),
                upload_url_expiry_secs: 3600,
                upload_max_bytes: 5 * 1024 * 1024,
                temp_max_age_secs: 86400,
                cleanup_interval_secs: 3600,
            },
            admin_username: None,
            admin_password: None,
        }
    }
}

impl StorageConfig {
    pub fn upload_url_expiry(&self) -> Duration {
        Duration::from_secs(self.upload_url_expiry_secs)
    }

    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Endpoint clients can reach: the explicit public endpoint, else the
    /// internal host paired with the public port.
    pub fn public_endpoint(&self) -> String {
        if let Some(endpoint) = &self.public_endpoint {
            return endpoint.clone();
        }
        let host = strip_scheme(&self.endpoint)
            .split(':')
            .next()
            .unwrap_or_default();
        format!("{}:{}", host, self.public_port)
    }

    /// Adds the scheme to a bare `host:port` endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.trim_end_matches('/').to_string()
        } else if self.use_ssl {
            format!("https://{}", endpoint.trim_end_matches('/'))
        } else {
            format!("http://{}", endpoint.trim_end_matches('/'))
        }
    }
}

fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint)
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(name.to_string()))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
