//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Shutdown grace period must be between 1 and 60 seconds")]
    InvalidShutdownGrace,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Redis topic prefix must not be empty")]
    EmptyTopicPrefix,

    #[error("Pool size must be between 1 and 100")]
    InvalidPoolSize,

    #[error("Outbound queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("Write timeout must be between 1 and 300 seconds")]
    InvalidWriteTimeout,

    #[error("Maximum message size must be at least 1 byte")]
    InvalidMaxMessageBytes,
}
