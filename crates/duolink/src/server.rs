//! `DuolinkServer` builder and server loop.
//!
//! This is the entry point for running a Duolink relay. It ties the layers
//! together: transport → router → registry, plus the expiry and stats
//! tasks.

use std::sync::Arc;
use std::time::Duration;

use duolink_protocol::RelayActions;
use duolink_room::Expired;
use duolink_transport::{
    Handshake, Transport, WebSocketConnection, WebSocketTransport,
};
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::handler::serve_connection;
use crate::router::Router;
use crate::supervisor::{run_expiry_loop, run_stats_loop};
use crate::DuolinkError;

/// Builder for configuring and starting a Duolink server.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use duolink::prelude::*;
///
/// # async fn start() -> Result<(), DuolinkError> {
/// let server = DuolinkServer::builder()
///     .bind("0.0.0.0:8080")
///     .join_timeout(Duration::from_secs(600))
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct DuolinkServerBuilder {
    config: ServerConfig,
}

impl DuolinkServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a lone participant waits for a peer.
    pub fn join_timeout(mut self, timeout: Duration) -> Self {
        self.config.room.join_timeout = timeout;
        self
    }

    /// Sets the minimum gap between relays from one connection.
    pub fn relay_interval(mut self, interval: Duration) -> Self {
        self.config.relay_interval = interval;
        self
    }

    /// Sets which structured actions are forwarded to the peer.
    pub fn relay_actions(mut self, actions: RelayActions) -> Self {
        self.config.relay_actions = actions;
        self
    }

    /// Sets the stats logging period. `None` turns it off.
    pub fn stats_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.stats_interval = interval;
        self
    }

    /// Sets how long a new socket gets to finish the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.websocket.handshake_timeout = timeout;
        self
    }

    /// Sets how long a closing connection waits for the peer's Close.
    pub fn close_grace(mut self, grace: Duration) -> Self {
        self.config.websocket.close_grace = grace;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<DuolinkServer, DuolinkError> {
        let transport =
            WebSocketTransport::bind_with(&self.config.bind_addr, self.config.websocket)
                .await?;
        let (router, expired_rx) = Router::new(&self.config);

        Ok(DuolinkServer {
            transport,
            router: Arc::new(router),
            expired_rx,
            stats_interval: self.config.stats_interval,
        })
    }
}

impl Default for DuolinkServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duolink server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuolinkServer {
    transport: WebSocketTransport,
    router: Arc<Router<WebSocketConnection>>,
    expired_rx: mpsc::UnboundedReceiver<Expired>,
    stats_interval: Option<Duration>,
}

impl DuolinkServer {
    /// Creates a new builder.
    pub fn builder() -> DuolinkServerBuilder {
        DuolinkServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Starts the expiry task (and the stats task, if configured), then
    /// spawns a task for each accepted socket. That task finishes the
    /// WebSocket upgrade and serves the connection, so a client that never
    /// completes its upgrade only holds up itself. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), DuolinkError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Duolink server running");

        tokio::spawn(run_expiry_loop(
            Arc::clone(self.router.registry()),
            self.expired_rx,
        ));
        if let Some(every) = self.stats_interval {
            tokio::spawn(run_stats_loop(Arc::clone(&self.router), every));
        }

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let router = Arc::clone(&self.router);
                    tokio::spawn(async move {
                        let peer = incoming.peer_addr();
                        match incoming.complete().await {
                            Ok(conn) => serve_connection(Arc::new(conn), router).await,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
