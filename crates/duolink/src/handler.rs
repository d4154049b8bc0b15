//! Per-connection task: read frames, dispatch, clean up on close.

use std::sync::Arc;

use duolink_transport::{Connection, ConnectionId};

use crate::router::Router;

/// Drop guard that releases a connection's room and limiter entries when
/// its task exits.
///
/// Cleanup happens even if the task panics. Since `Drop` is synchronous,
/// we spawn a fire-and-forget task for the async locks.
struct CloseGuard<C: Connection> {
    conn_id: ConnectionId,
    router: Arc<Router<C>>,
}

impl<C: Connection> Drop for CloseGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            router.handle_close(conn_id).await;
        });
    }
}

/// Serves one connection from accept to close.
///
/// Frames are handled one at a time, in arrival order. Returns once the
/// peer closes, the transport fails, or the server closes the connection
/// (e.g. after a join-timeout).
pub async fn serve_connection<C: Connection>(conn: Arc<C>, router: Arc<Router<C>>) {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "connection opened");

    let _guard = CloseGuard {
        conn_id,
        router: Arc::clone(&router),
    };

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        if let Err(e) = router.handle_frame(&conn, frame).await {
            tracing::warn!(%conn_id, error = %e, "failed to handle frame");
        }
    }

    // _guard drops here → room cleanup fires.
}
