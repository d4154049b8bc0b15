//! Background tasks that run beside the accept loop.

use std::sync::Arc;
use std::time::Duration;

use duolink_room::{Expired, RoomRegistry};
use duolink_transport::Connection;
use tokio::sync::{Mutex, mpsc};

use crate::router::Router;

/// Applies fired join-timeouts to the registry until every sender is gone.
///
/// Each event is applied under the registry mutex, the same one create,
/// join and disconnect take, so a join that got there first makes the
/// event a no-op.
pub async fn run_expiry_loop<C: Connection>(
    registry: Arc<Mutex<RoomRegistry<C>>>,
    mut expired_rx: mpsc::UnboundedReceiver<Expired>,
) {
    while let Some(event) = expired_rx.recv().await {
        let closed = registry.lock().await.expire(&event);
        if let Some(conn) = closed {
            tracing::debug!(conn_id = %conn.id(), code = %event.code, "join window elapsed");
        }
    }
    tracing::debug!("expiry loop stopped");
}

/// Logs registry statistics every `every`. Never returns.
pub async fn run_stats_loop<C: Connection>(router: Arc<Router<C>>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let stats = router.registry().lock().await.stats();
        let limited = router.rate_limited_connections().await;
        tracing::info!(
            rooms = stats.rooms,
            waiting = stats.waiting,
            paired = stats.paired,
            players = stats.connections,
            rate_limited = limited,
            timeouts_scheduled = stats.timeouts_scheduled,
            timeouts_cancelled = stats.timeouts_cancelled,
            "registry stats"
        );
    }
}
