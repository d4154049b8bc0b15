//! Per-frame dispatch: control actions, relays, and close cleanup.
//!
//! The router owns no connection state of its own. Room membership lives
//! in the [`RoomRegistry`] and relay timestamps in the [`RateLimiter`]; the
//! router classifies each frame, takes the lock it needs for the one
//! operation, releases it, then sends. Sends only enqueue, so no lock is
//! ever held while waiting on a peer.

use std::sync::Arc;

use duolink_protocol::{
    Codec, Inbound, JsonCodec, ProtocolError, RelayActions, RoomCode,
    ServerMessage,
};
use duolink_room::{Expired, RoomError, RoomRegistry};
use duolink_transport::{Connection, ConnectionId, Frame};
use tokio::sync::{Mutex, mpsc};

use crate::config::ServerConfig;
use crate::limiter::RateLimiter;
use crate::DuolinkError;

/// Shared dispatch state for every connection of one server.
pub struct Router<C: Connection> {
    registry: Arc<Mutex<RoomRegistry<C>>>,
    limiter: Mutex<RateLimiter>,
    relay_actions: RelayActions,
    codec: JsonCodec,
}

impl<C: Connection> Router<C> {
    /// Builds a router with a fresh registry.
    ///
    /// The receiver yields fired join-timeouts and must be drained by
    /// [`run_expiry_loop`](crate::run_expiry_loop).
    pub fn new(config: &ServerConfig) -> (Self, mpsc::UnboundedReceiver<Expired>) {
        let (registry, expired_rx) = RoomRegistry::new(config.room.clone());
        let router = Self::with_registry(
            Arc::new(Mutex::new(registry)),
            RateLimiter::new(config.relay_interval),
            config.relay_actions.clone(),
        );
        (router, expired_rx)
    }

    /// Builds a router around an existing registry.
    pub fn with_registry(
        registry: Arc<Mutex<RoomRegistry<C>>>,
        limiter: RateLimiter,
        relay_actions: RelayActions,
    ) -> Self {
        Self {
            registry,
            limiter: Mutex::new(limiter),
            relay_actions,
            codec: JsonCodec,
        }
    }

    /// The registry this router dispatches into.
    pub fn registry(&self) -> &Arc<Mutex<RoomRegistry<C>>> {
        &self.registry
    }

    /// Connections with a recorded relay timestamp.
    pub async fn rate_limited_connections(&self) -> usize {
        self.limiter.lock().await.tracked()
    }

    /// Handles one inbound frame from `conn`.
    ///
    /// Client mistakes are answered with an `error` reply and never fail
    /// this call; an `Err` here means the server couldn't encode its own
    /// message.
    pub async fn handle_frame(
        &self,
        conn: &Arc<C>,
        frame: Frame,
    ) -> Result<(), DuolinkError> {
        let inbound = Inbound::classify(&frame, &self.relay_actions);
        tracing::trace!(conn_id = %conn.id(), kind = inbound.kind(), "frame received");

        match inbound {
            Inbound::Create { code } => self.handle_create(conn, code).await,
            Inbound::Join { code } => self.handle_join(conn, code).await,
            Inbound::Relay { action } => {
                let peers = self.relay_targets(conn).await;
                if peers.is_empty() {
                    tracing::trace!(conn_id = %conn.id(), %action, "relay dropped");
                    return Ok(());
                }
                forward(conn.id(), &peers, frame);
                Ok(())
            }
            Inbound::Unknown { action } => {
                tracing::debug!(conn_id = %conn.id(), %action, "unknown action");
                let err = ProtocolError::UnknownAction(action);
                self.reply_error(conn, &err)
            }
            Inbound::Raw => {
                let peers = self.relay_targets(conn).await;
                if peers.is_empty() {
                    tracing::debug!(
                        conn_id = %conn.id(),
                        bytes = frame.len(),
                        "dropping unstructured frame from unpaired connection"
                    );
                    return Ok(());
                }
                forward(conn.id(), &peers, frame);
                Ok(())
            }
        }
    }

    /// Cleans up after a closed connection. Safe to call more than once.
    pub async fn handle_close(&self, conn_id: ConnectionId) {
        let left = self.registry.lock().await.disconnect(conn_id);
        self.limiter.lock().await.forget(conn_id);
        if let Some(code) = left {
            tracing::debug!(%conn_id, %code, "connection left room");
        }
    }

    async fn handle_create(
        &self,
        conn: &Arc<C>,
        code: Option<RoomCode>,
    ) -> Result<(), DuolinkError> {
        let Some(code) = code else {
            return self.reply_error(conn, &RoomError::InvalidCode);
        };

        let result = self
            .registry
            .lock()
            .await
            .create_room(code.clone(), Arc::clone(conn));

        match result {
            Ok(_) => self.reply(conn, &ServerMessage::Waiting { code }),
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = ?e, "create refused");
                self.reply_error(conn, &e)
            }
        }
    }

    async fn handle_join(
        &self,
        conn: &Arc<C>,
        code: Option<RoomCode>,
    ) -> Result<(), DuolinkError> {
        let Some(code) = code else {
            return self.reply_error(conn, &RoomError::InvalidCode);
        };

        let result = self
            .registry
            .lock()
            .await
            .join_room(code.clone(), Arc::clone(conn));

        match result {
            Ok(participants) => {
                let frame = self.codec.encode(&ServerMessage::Connected { code })?;
                for participant in &participants {
                    send_quietly(participant, frame.clone());
                }
                Ok(())
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = ?e, "join refused");
                self.reply_error(conn, &e)
            }
        }
    }

    /// Peers that should receive a relay from `conn`, or nothing if `conn`
    /// is unpaired or over its rate.
    async fn relay_targets(&self, conn: &Arc<C>) -> Vec<Arc<C>> {
        let conn_id = conn.id();
        let peers = self.registry.lock().await.peers_of(conn_id);
        if peers.is_empty() {
            return peers;
        }

        let now = tokio::time::Instant::now().into_std();
        if !self.limiter.lock().await.allow(conn_id, now) {
            tracing::trace!(%conn_id, "relay rate limited");
            return Vec::new();
        }
        peers
    }

    fn reply(&self, conn: &Arc<C>, message: &ServerMessage) -> Result<(), DuolinkError> {
        let frame = self.codec.encode(message)?;
        send_quietly(conn, frame);
        Ok(())
    }

    fn reply_error(
        &self,
        conn: &Arc<C>,
        err: &dyn std::error::Error,
    ) -> Result<(), DuolinkError> {
        self.reply(
            conn,
            &ServerMessage::Error {
                message: err.to_string(),
            },
        )
    }
}

/// Sends `frame` to every peer. The sender is never among `peers`.
fn forward<C: Connection>(from: ConnectionId, peers: &[Arc<C>], frame: Frame) {
    for peer in peers {
        debug_assert_ne!(peer.id(), from);
        send_quietly(peer, frame.clone());
    }
}

/// A peer that has gone away just misses the frame.
fn send_quietly<C: Connection>(conn: &Arc<C>, frame: Frame) {
    if let Err(e) = conn.send(frame) {
        tracing::trace!(conn_id = %conn.id(), error = %e, "send dropped");
    }
}
