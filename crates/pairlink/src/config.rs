//! Server configuration.

use std::time::Duration;

use pairlink_pairing::{DonePolicy, PairingConfig};
use pairlink_transport::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PATH};
use serde::{Deserialize, Serialize};

use crate::PairlinkError;

/// Environment variable naming the listen address.
pub const ENV_ADDR: &str = "PAIRLINK_ADDR";
/// Environment variable naming the WebSocket request path.
pub const ENV_PATH: &str = "PAIRLINK_PATH";
/// Environment variable for the keep-alive ping period in seconds (0 = off).
pub const ENV_PING_SECS: &str = "PAIRLINK_PING_SECS";
/// Environment variable for the unmatched-waiter timeout in seconds.
pub const ENV_WAITING_TIMEOUT_SECS: &str = "PAIRLINK_WAITING_TIMEOUT_SECS";
/// Environment variable selecting `per-signal` or `per-participant` done
/// counting.
pub const ENV_DONE_POLICY: &str = "PAIRLINK_DONE_POLICY";

/// Configuration for a [`PairlinkServer`](crate::PairlinkServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: String,

    /// Request path WebSocket upgrades are accepted on.
    pub path: String,

    /// How long a client gets to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,

    /// How often to ping each client. `None` disables keep-alive pings.
    pub ping_interval: Option<Duration>,

    /// How often to sweep the pool for stale waiters. Only used when
    /// `pairing.waiting_timeout` is set.
    pub idle_sweep_interval: Duration,

    /// Matchmaking behavior.
    pub pairing: PairingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7070".to_string(),
            path: DEFAULT_PATH.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            ping_interval: Some(Duration::from_secs(15)),
            idle_sweep_interval: Duration::from_secs(5),
            pairing: PairingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads overrides from the process environment on top of the defaults.
    ///
    /// # Errors
    /// [`PairlinkError::Config`] if a variable is set but unparseable.
    pub fn from_env() -> Result<Self, PairlinkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PairlinkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup(ENV_ADDR) {
            config.bind_addr = addr;
        }
        if let Some(path) = lookup(ENV_PATH) {
            if !path.starts_with('/') {
                return Err(PairlinkError::Config(format!(
                    "{ENV_PATH} must start with '/', got {path:?}"
                )));
            }
            config.path = path;
        }
        if let Some(secs) = lookup(ENV_PING_SECS) {
            config.ping_interval = match parse_secs(ENV_PING_SECS, &secs)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            };
        }
        if let Some(secs) = lookup(ENV_WAITING_TIMEOUT_SECS) {
            let secs = parse_secs(ENV_WAITING_TIMEOUT_SECS, &secs)?;
            config.pairing.waiting_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(policy) = lookup(ENV_DONE_POLICY) {
            config.pairing.done_policy = match policy.as_str() {
                "per-signal" => DonePolicy::PerSignal,
                "per-participant" => DonePolicy::PerParticipant,
                other => {
                    return Err(PairlinkError::Config(format!(
                        "{ENV_DONE_POLICY} must be per-signal or per-participant, got {other:?}"
                    )));
                }
            };
        }

        Ok(config)
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, PairlinkError> {
    value.trim().parse().map_err(|_| {
        PairlinkError::Config(format!("{key} must be a whole number of seconds, got {value:?}"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, PairlinkError> {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        ServerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:7070");
        assert_eq!(config.path, "/api/matchmaking");
        assert_eq!(config.ping_interval, Some(Duration::from_secs(15)));
        assert_eq!(config.handshake_timeout, Duration::from_secs(10));
        assert!(config.pairing.waiting_timeout.is_none());
    }

    #[test]
    fn test_from_lookup_empty_env_gives_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, ServerConfig::default().bind_addr);
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = load(&[
            (ENV_ADDR, "0.0.0.0:9000"),
            (ENV_PATH, "/signal"),
            (ENV_PING_SECS, "0"),
            (ENV_WAITING_TIMEOUT_SECS, "120"),
            (ENV_DONE_POLICY, "per-participant"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.path, "/signal");
        assert_eq!(config.ping_interval, None);
        assert_eq!(config.pairing.waiting_timeout, Some(Duration::from_secs(120)));
        assert_eq!(config.pairing.done_policy, DonePolicy::PerParticipant);
    }

    #[test]
    fn test_from_lookup_bad_number_returns_config_error() {
        let result = load(&[(ENV_PING_SECS, "soon")]);
        assert!(matches!(result, Err(PairlinkError::Config(msg)) if msg.contains(ENV_PING_SECS)));
    }

    #[test]
    fn test_from_lookup_relative_path_returns_config_error() {
        let result = load(&[(ENV_PATH, "api")]);
        assert!(matches!(result, Err(PairlinkError::Config(_))));
    }

    #[test]
    fn test_from_lookup_unknown_policy_returns_config_error() {
        let result = load(&[(ENV_DONE_POLICY, "strict")]);
        assert!(matches!(result, Err(PairlinkError::Config(_))));
    }
}
