//! Redis configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Redis configuration (pub/sub broker)
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    #[serde(default)]
    pub url: String,

    /// Prefix prepended to the room name to form the pub/sub channel
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Delay before a lost room subscription is re-established, in milliseconds
    #[serde(default = "default_resubscribe_delay")]
    pub resubscribe_delay_ms: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl RedisConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get resubscribe delay as Duration
    pub fn resubscribe_delay(&self) -> Duration {
        Duration::from_millis(self.resubscribe_delay_ms)
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("CHANGO__REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.topic_prefix.is_empty() {
            return Err(ValidationError::EmptyTopicPrefix);
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            topic_prefix: default_topic_prefix(),
            resubscribe_delay_ms: default_resubscribe_delay(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_topic_prefix() -> String {
    "chango:room:".to_string()
}

fn default_resubscribe_delay() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    5
}
