//! Process-level configuration, loaded once at startup from environment
//! variables with defaults. A thin typed wrapper over `std::env::var`, the
//! same plain-struct-plus-constructor idiom this codebase's NATS publishers
//! use instead of a config-file parser.

use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";
const DEFAULT_COMMAND_STREAM: &str = "ORDERS";
const DEFAULT_EVENT_STREAM: &str = "EVENTS";
const DEFAULT_CONSUMER_GROUP: &str = "matching-engine";
const DEFAULT_RECLAIM_IDLE_SECS: u64 = 30;
const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 4096;
const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub nats_url: String,
    pub command_stream: String,
    pub event_stream: String,
    pub consumer_group: String,
    pub reclaim_idle: Duration,
    pub command_queue_capacity: usize,
    pub event_queue_capacity: usize,
    pub subscriber_queue_capacity: usize,
}

impl Config {
    /// Reads every field from the environment, falling back to a documented
    /// default when a variable is unset. Only present-but-malformed values
    /// are rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            nats_url: env_string("EXCHANGE_NATS_URL", DEFAULT_NATS_URL),
            command_stream: env_string("EXCHANGE_COMMAND_STREAM", DEFAULT_COMMAND_STREAM),
            event_stream: env_string("EXCHANGE_EVENT_STREAM", DEFAULT_EVENT_STREAM),
            consumer_group: env_string("EXCHANGE_CONSUMER_GROUP", DEFAULT_CONSUMER_GROUP),
            reclaim_idle: Duration::from_secs(env_parsed(
                "EXCHANGE_RECLAIM_IDLE_SECS",
                DEFAULT_RECLAIM_IDLE_SECS,
            )?),
            command_queue_capacity: env_parsed(
                "EXCHANGE_COMMAND_QUEUE_CAPACITY",
                DEFAULT_COMMAND_QUEUE_CAPACITY,
            )?,
            event_queue_capacity: env_parsed(
                "EXCHANGE_EVENT_QUEUE_CAPACITY",
                DEFAULT_EVENT_QUEUE_CAPACITY,
            )?,
            subscriber_queue_capacity: env_parsed(
                "EXCHANGE_SUBSCRIBER_QUEUE_CAPACITY",
                DEFAULT_SUBSCRIBER_QUEUE_CAPACITY,
            )?,
        })
    }
}

fn env_string(name: &'static str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_defaults_when_unset() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.nats_url, DEFAULT_NATS_URL);
        assert_eq!(config.reclaim_idle, Duration::from_secs(DEFAULT_RECLAIM_IDLE_SECS));
    }

    #[test]
    fn rejects_malformed_numeric_override() {
        // SAFETY: test runs single-threaded with respect to this var via
        // the `#[test]` harness default; no other test reads it.
        unsafe {
            std::env::set_var("EXCHANGE_RECLAIM_IDLE_SECS", "not-a-number");
        }
        let result = Config::from_env();
        unsafe {
            std::env::remove_var("EXCHANGE_RECLAIM_IDLE_SECS");
        }
        assert!(result.is_err());
    }
}
