//! Gateway (fan-out) configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Per-connection limits and broker selection
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Which broker relays room traffic between processes
    #[serde(default)]
    pub broker: BrokerKind,

    /// Frames a session may have queued before it is shed as a slow consumer
    #[serde(default = "default_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Deadline for a single socket write, in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    /// Largest accepted inbound chat content, in bytes
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Stop a room's relay once its last local session leaves
    #[serde(default)]
    pub retire_idle_relays: bool,
}

/// Broker implementation
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrokerKind {
    #[default]
    Redis,
    /// Process-local broker; only meaningful for a single gateway.
    Memory,
}

impl GatewayConfig {
    /// Get write timeout as Duration
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// Validate gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        if self.write_timeout_secs == 0 || self.write_timeout_secs > 300 {
            return Err(ValidationError::InvalidWriteTimeout);
        }
        if self.max_message_bytes == 0 {
            return Err(ValidationError::InvalidMaxMessageBytes);
        }
        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker: BrokerKind::default(),
            outbound_queue_capacity: default_queue_capacity(),
            write_timeout_secs: default_write_timeout(),
            max_message_bytes: default_max_message_bytes(),
            retire_idle_relays: false,
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_write_timeout() -> u64 {
    10
}

fn default_max_message_bytes() -> usize {
    4096
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.broker, BrokerKind::Redis);
        assert_eq!(config.outbound_queue_capacity, 256);
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_message_bytes, 4096);
        assert!(!config.retire_idle_relays);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_capacity() {
        let config = GatewayConfig {
            outbound_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }

    #[test]
    fn test_validation_write_timeout_bounds() {
        let config = GatewayConfig {
            write_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidWriteTimeout));
    }

    #[test]
    fn test_validation_zero_message_size() {
        let config = GatewayConfig {
            max_message_bytes: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidMaxMessageBytes));
    }
}
