/// Configuration management for the YAMO finance server
use crate::error::{YamoError, YamoResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub finance_db: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Session token lifetime in minutes
    pub token_ttl_minutes: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> YamoResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("YAMO_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("YAMO_PORT")
            .unwrap_or_else(|_| "3789".to_string())
            .parse()
            .map_err(|_| YamoError::Validation("Invalid port number".to_string()))?;
        let version = env::var("YAMO_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("YAMO_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let finance_db = env::var("YAMO_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("finance.sqlite"));

        let jwt_secret = env::var("YAMO_JWT_SECRET")
            .map_err(|_| YamoError::Validation("YAMO_JWT_SECRET must be set".to_string()))?;

        let token_ttl_minutes = env::var("YAMO_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "720".to_string())
            .parse()
            .map_err(|_| YamoError::Validation("Invalid token TTL".to_string()))?;

        let level = env::var("YAMO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let config = Self {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                finance_db,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_minutes,
            },
            logging: LoggingConfig { level },
        };

        Ok(config)
    }

    /// Validate the loaded configuration
    pub fn validate(&self) -> YamoResult<()> {
        if self.authentication.jwt_secret.len() < 16 {
            return Err(YamoError::Validation(
                "JWT secret must be at least 16 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_minutes <= 0 {
            return Err(YamoError::Validation(
                "Token TTL must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3789,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                finance_db: "./data/finance.sqlite".into(),
            },
            authentication: AuthConfig {
                jwt_secret: "a-test-secret-that-is-long-enough".to_string(),
                token_ttl_minutes: 720,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_secret() {
        let mut config = test_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_nonpositive_ttl() {
        let mut config = test_config();
        config.authentication.token_ttl_minutes = 0;
        assert!(config.validate().is_err());
    }
}
