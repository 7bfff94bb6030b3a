//! Server configuration from environment variables.
//!
//! | Variable                 | Default   |
//! |--------------------------|-----------|
//! | `SERVICE_PORT`           | `8080`    |
//! | `GATEWAY_STRICT`         | `false`   |
//! | `RATE_LIMIT_REQUESTS`    | `20`      |
//! | `RATE_LIMIT_WINDOW_SECS` | `1`       |
//! | `SHUTDOWN_TIMEOUT_SECS`  | `30`      |
//! | `BODY_LIMIT_BYTES`       | `1048576` |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bind::DEFAULT_BODY_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Fail start-up on gateway wiring errors instead of logging them.
    pub strict_gateway: bool,
    pub rate_limit_requests: u64,
    pub rate_limit_window: Duration,
    pub shutdown_timeout: Duration,
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            strict_gateway: false,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`; unset variables keep their
    /// defaults.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = parse(&lookup, "SERVICE_PORT", "a port number", defaults.port)?;
        let strict_gateway = match lookup("GATEWAY_STRICT") {
            Some(v) => parse_bool("GATEWAY_STRICT", &v)?,
            None => defaults.strict_gateway,
        };
        let rate_limit_requests = parse(
            &lookup,
            "RATE_LIMIT_REQUESTS",
            "a request count",
            defaults.rate_limit_requests,
        )?;
        let window_secs = parse(
            &lookup,
            "RATE_LIMIT_WINDOW_SECS",
            "whole seconds",
            defaults.rate_limit_window.as_secs(),
        )?;
        let shutdown_secs = parse(
            &lookup,
            "SHUTDOWN_TIMEOUT_SECS",
            "whole seconds",
            defaults.shutdown_timeout.as_secs(),
        )?;
        let body_limit = parse(&lookup, "BODY_LIMIT_BYTES", "a byte count", defaults.body_limit)?;

        if rate_limit_requests == 0 {
            return Err(ConfigError::Zero {
                var: "RATE_LIMIT_REQUESTS",
            });
        }
        if window_secs == 0 {
            return Err(ConfigError::Zero {
                var: "RATE_LIMIT_WINDOW_SECS",
            });
        }

        Ok(Self {
            port,
            strict_gateway,
            rate_limit_requests,
            rate_limit_window: Duration::from_secs(window_secs),
            shutdown_timeout: Duration::from_secs(shutdown_secs),
            body_limit,
        })
    }
}

fn parse<L, T>(
    lookup: &L,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            expected: "a boolean",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.rate_limit_requests, 20);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVICE_PORT", "9000"),
            ("GATEWAY_STRICT", "true"),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW_SECS", "10"),
            ("BODY_LIMIT_BYTES", "2048"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert!(config.strict_gateway);
        assert_eq!(config.rate_limit_requests, 5);
        assert_eq!(config.rate_limit_window, Duration::from_secs(10));
        assert_eq!(config.body_limit, 2048);
    }

    #[test]
    fn test_invalid_values() {
        let err = ServerConfig::from_lookup(lookup(&[("SERVICE_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SERVICE_PORT", .. }));

        let err = ServerConfig::from_lookup(lookup(&[("GATEWAY_STRICT", "maybe")])).unwrap_err();
        assert!(err.to_string().contains("a boolean"));

        let err =
            ServerConfig::from_lookup(lookup(&[("RATE_LIMIT_REQUESTS", "0")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Zero {
                var: "RATE_LIMIT_REQUESTS"
            }
        );
    }
}
