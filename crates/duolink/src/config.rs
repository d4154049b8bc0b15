//! Server configuration.
//!
//! [`ServerConfig::default`] is what the builder starts from. The binary
//! overlays environment variables with [`ServerConfig::from_env`]:
//!
//! | variable                      | field                        |
//! |-------------------------------|------------------------------|
//! | `PORT`                        | `bind_addr` as `0.0.0.0:PORT`|
//! | `DUOLINK_BIND`                | `bind_addr` (wins over PORT) |
//! | `DUOLINK_JOIN_TIMEOUT_MS`     | `room.join_timeout`          |
//! | `DUOLINK_RELAY_INTERVAL_MS`   | `relay_interval`             |
//! | `DUOLINK_RELAY_ACTIONS`       | `relay_actions` (comma list) |
//! | `DUOLINK_STATS_INTERVAL_SECS` | `stats_interval` (0 = off)   |
//! | `DUOLINK_HANDSHAKE_TIMEOUT_MS`| `websocket.handshake_timeout`|
//! | `DUOLINK_CLOSE_GRACE_MS`      | `websocket.close_grace`      |
//! | `DUOLINK_OUTBOUND_CAPACITY`   | `websocket.outbound_capacity`|

use std::str::FromStr;
use std::time::Duration;

use duolink_protocol::RelayActions;
use duolink_room::RoomConfig;
use duolink_transport::WebSocketOptions;

use crate::limiter::RateLimiter;

/// Errors from reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A variable was set to something that doesn't parse.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Everything a [`DuolinkServer`](crate::DuolinkServer) needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// Per-room settings (join-timeout).
    pub room: RoomConfig,

    /// Minimum gap between two relayed messages from one connection.
    pub relay_interval: Duration,

    /// Structured actions forwarded to the peer.
    pub relay_actions: RelayActions,

    /// How often to log registry statistics. `None` disables it.
    pub stats_interval: Option<Duration>,

    /// Upgrade deadline, close grace and outbound queue size.
    pub websocket: WebSocketOptions,
}

impl ServerConfig {
    pub const DEFAULT_BIND_ADDR: &'static str = "0.0.0.0:8080";
    pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns per variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            let port: u16 = parse("PORT", &port)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(addr) = lookup("DUOLINK_BIND") {
            config.bind_addr = addr;
        }
        if let Some(ms) = lookup("DUOLINK_JOIN_TIMEOUT_MS") {
            config.room.join_timeout =
                Duration::from_millis(parse("DUOLINK_JOIN_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("DUOLINK_RELAY_INTERVAL_MS") {
            config.relay_interval =
                Duration::from_millis(parse("DUOLINK_RELAY_INTERVAL_MS", &ms)?);
        }
        if let Some(list) = lookup("DUOLINK_RELAY_ACTIONS") {
            config.relay_actions = RelayActions::new(
                list.split(',').map(str::trim).filter(|a| !a.is_empty()),
            );
        }
        if let Some(secs) = lookup("DUOLINK_STATS_INTERVAL_SECS") {
            config.stats_interval =
                match parse::<u64>("DUOLINK_STATS_INTERVAL_SECS", &secs)? {
                    0 => None,
                    n => Some(Duration::from_secs(n)),
                };
        }
        if let Some(ms) = lookup("DUOLINK_HANDSHAKE_TIMEOUT_MS") {
            config.websocket.handshake_timeout =
                Duration::from_millis(parse("DUOLINK_HANDSHAKE_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = lookup("DUOLINK_CLOSE_GRACE_MS") {
            config.websocket.close_grace =
                Duration::from_millis(parse("DUOLINK_CLOSE_GRACE_MS", &ms)?);
        }
        if let Some(n) = lookup("DUOLINK_OUTBOUND_CAPACITY") {
            config.websocket.outbound_capacity =
                match parse::<usize>("DUOLINK_OUTBOUND_CAPACITY", &n)? {
                    0 => {
                        return Err(ConfigError::InvalidValue {
                            key: "DUOLINK_OUTBOUND_CAPACITY",
                            value: n,
                        });
                    }
                    n => n,
                };
        }

        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: Self::DEFAULT_BIND_ADDR.to_string(),
            room: RoomConfig::default(),
            relay_interval: RateLimiter::DEFAULT_INTERVAL,
            relay_actions: RelayActions::default(),
            stats_interval: Some(Self::DEFAULT_STATS_INTERVAL),
            websocket: WebSocketOptions::default(),
        }
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
