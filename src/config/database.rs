//! Database configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Database configuration (message persistence)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum connections allowed
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Validate database configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("CHANGO__DATABASE__URL"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(ValidationError::InvalidPoolSize);
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DatabaseConfig {
        DatabaseConfig {
            url: "postgres://chango@localhost/chango".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_validation_missing_url_names_env_var() {
        let err = DatabaseConfig::default().validate().unwrap_err();
        assert_eq!(err, ValidationError::MissingRequired("CHANGO__DATABASE__URL"));
        assert!(err.to_string().contains("CHANGO__DATABASE__URL"));
    }

    #[test]
    fn test_validation_accepts_both_schemes() {
        assert!(valid().validate().is_ok());
        let config = DatabaseConfig {
            url: "postgresql://chango@localhost/chango".to_string(),
            ..valid()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_other_schemes() {
        let config = DatabaseConfig {
            url: "mysql://localhost/chango".to_string(),
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
    }

    #[test]
    fn test_validation_pool_bounds() {
        let config = DatabaseConfig {
            max_connections: 0,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPoolSize));

        let config = DatabaseConfig {
            max_connections: 101,
            ..valid()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPoolSize));
    }
}
