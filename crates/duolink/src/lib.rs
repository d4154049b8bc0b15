//! # Duolink
//!
//! Pairs exactly two real-time clients into a named room and relays
//! messages between them.
//!
//! A client creates a room under a code it chooses and waits; a second
//! client joins with the same code; from then on every structured relay
//! action and every unstructured frame one sends is forwarded to the other,
//! subject to a per-connection rate limit. A room nobody joins within the
//! join window is torn down and its host disconnected.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duolink::prelude::*;
//!
//! # async fn start() -> Result<(), DuolinkError> {
//! let server = DuolinkServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! The [`Router`] is transport-agnostic, so it can also be driven with
//! in-memory connections via [`serve_connection`].

mod config;
mod error;
mod handler;
mod limiter;
mod router;
mod server;
mod supervisor;

pub use config::{ConfigError, ServerConfig};
pub use error::DuolinkError;
pub use handler::serve_connection;
pub use limiter::RateLimiter;
pub use router::Router;
pub use server::{DuolinkServer, DuolinkServerBuilder};
pub use supervisor::{run_expiry_loop, run_stats_loop};

pub mod prelude {
    pub use crate::{DuolinkError, DuolinkServer, ServerConfig};
    pub use duolink_protocol::{RelayActions, RoomCode};
    pub use duolink_room::RoomConfig;
}
