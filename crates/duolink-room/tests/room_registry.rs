//! Integration tests for the room registry using in-memory connections.

use std::sync::Arc;
use std::time::Duration;

use duolink_protocol::RoomCode;
use duolink_room::{
    Expired, Role, RoomConfig, RoomError, RoomRegistry, RoomState,
    TIMEOUT_MESSAGE,
};
use duolink_transport::{Connection, MemoryClient, MemoryConnection};
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

type Registry = RoomRegistry<MemoryConnection>;

fn code(s: &str) -> RoomCode {
    RoomCode::new(s)
}

fn registry() -> (Registry, mpsc::UnboundedReceiver<Expired>) {
    RoomRegistry::new(RoomConfig::default())
}

fn conn() -> (Arc<MemoryConnection>, MemoryClient) {
    let (server, client) = MemoryConnection::pair();
    (Arc::new(server), client)
}

fn ids(conns: &[Arc<MemoryConnection>]) -> Vec<duolink_transport::ConnectionId> {
    conns.iter().map(|c| c.id()).collect()
}

// =========================================================================
// create / join
// =========================================================================

#[tokio::test]
async fn test_create_then_join_pairs_both_ways() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    let (b, _cb) = conn();

    let state = reg.create_room(code("ABCD"), Arc::clone(&a)).unwrap();
    assert_eq!(state, RoomState::Waiting);
    assert!(reg.has_pending_timeout(&code("ABCD")));

    let participants = reg.join_room(code("ABCD"), Arc::clone(&b)).unwrap();
    assert_eq!(ids(&participants), vec![a.id(), b.id()], "host first");

    assert_eq!(ids(&reg.peers_of(a.id())), vec![b.id()]);
    assert_eq!(ids(&reg.peers_of(b.id())), vec![a.id()]);
    assert_eq!(reg.room_state(&code("ABCD")), Some(RoomState::Paired));
    assert!(!reg.has_pending_timeout(&code("ABCD")));

    assert_eq!(reg.membership(a.id()).unwrap().role, Role::Host);
    assert_eq!(reg.membership(b.id()).unwrap().role, Role::Joiner);
}

#[tokio::test]
async fn test_create_duplicate_code() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    let (a2, _ca2) = conn();

    reg.create_room(code("ABCD"), a).unwrap();
    let result = reg.create_room(code("ABCD"), a2);
    assert!(matches!(result, Err(RoomError::DuplicateCode(c)) if c == code("ABCD")));
    assert_eq!(reg.room_count(), 1);
}

#[tokio::test]
async fn test_codes_are_case_sensitive() {
    let (mut reg, _rx) = registry();
    reg.create_room(code("abcd"), conn().0).unwrap();
    reg.create_room(code("ABCD"), conn().0).unwrap();
    assert_eq!(reg.room_count(), 2);
}

#[tokio::test]
async fn test_empty_code_is_invalid() {
    let (mut reg, _rx) = registry();
    assert!(matches!(
        reg.create_room(code(""), conn().0),
        Err(RoomError::InvalidCode)
    ));
    assert!(matches!(
        reg.join_room(code(""), conn().0),
        Err(RoomError::InvalidCode)
    ));
    assert_eq!(reg.room_count(), 0);
}

#[tokio::test]
async fn test_join_unknown_room() {
    let (mut reg, _rx) = registry();
    let (b, _cb) = conn();
    let result = reg.join_room(code("NOPE"), Arc::clone(&b));
    assert!(matches!(result, Err(RoomError::NotFound(_))));
    assert!(reg.membership(b.id()).is_none());
}

#[tokio::test]
async fn test_join_full_room_always_fails() {
    let (mut reg, _rx) = registry();
    reg.create_room(code("R"), conn().0).unwrap();
    reg.join_room(code("R"), conn().0).unwrap();

    for _ in 0..3 {
        let (c, _client) = conn();
        let result = reg.join_room(code("R"), Arc::clone(&c));
        assert!(matches!(result, Err(RoomError::RoomFull(_))));
        assert!(reg.membership(c.id()).is_none());
    }
    assert_eq!(reg.participants(&code("R")).unwrap().len(), 2);
}

#[tokio::test]
async fn test_connection_cannot_be_in_two_rooms() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    reg.create_room(code("ONE"), Arc::clone(&a)).unwrap();

    let again = reg.create_room(code("TWO"), Arc::clone(&a));
    assert!(matches!(again, Err(RoomError::AlreadyInRoom { .. })));

    reg.create_room(code("THREE"), conn().0).unwrap();
    let join = reg.join_room(code("THREE"), Arc::clone(&a));
    assert!(matches!(join, Err(RoomError::AlreadyInRoom { code: c, .. }) if c == code("ONE")));

    // Joining its own room is refused the same way.
    let own = reg.join_room(code("ONE"), Arc::clone(&a));
    assert!(matches!(own, Err(RoomError::AlreadyInRoom { .. })));
}

#[tokio::test]
async fn test_peers_of_unassigned_or_alone_is_empty() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    assert!(reg.peers_of(a.id()).is_empty());

    reg.create_room(code("R"), Arc::clone(&a)).unwrap();
    assert!(reg.peers_of(a.id()).is_empty());
}

// =========================================================================
// disconnect
// =========================================================================

#[tokio::test]
async fn test_disconnect_only_participant_deletes_room() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    reg.create_room(code("ABCD"), Arc::clone(&a)).unwrap();

    assert_eq!(reg.disconnect(a.id()), Some(code("ABCD")));
    assert!(!reg.contains(&code("ABCD")));
    assert_eq!(reg.room_count(), 0);
    assert_eq!(reg.stats().timeouts_cancelled, 1);

    // The code is free again.
    reg.create_room(code("ABCD"), conn().0).unwrap();
}

#[tokio::test]
async fn test_disconnect_is_idempotent_and_safe_when_unassigned() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    assert_eq!(reg.disconnect(a.id()), None);

    reg.create_room(code("R"), Arc::clone(&a)).unwrap();
    assert!(reg.disconnect(a.id()).is_some());
    assert_eq!(reg.disconnect(a.id()), None);
    assert_eq!(reg.room_count(), 0);
}

#[tokio::test]
async fn test_disconnect_one_of_two_rearms_join_timeout() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    let (b, _cb) = conn();
    reg.create_room(code("R"), Arc::clone(&a)).unwrap();
    reg.join_room(code("R"), Arc::clone(&b)).unwrap();

    reg.disconnect(b.id());

    assert_eq!(reg.room_state(&code("R")), Some(RoomState::Waiting));
    assert_eq!(reg.participants(&code("R")).unwrap(), vec![a.id()]);
    assert!(reg.has_pending_timeout(&code("R")));
    assert!(reg.peers_of(a.id()).is_empty());

    // Someone else can take the free seat.
    let (c, _cc) = conn();
    reg.join_room(code("R"), Arc::clone(&c)).unwrap();
    assert_eq!(ids(&reg.peers_of(a.id())), vec![c.id()]);
}

#[tokio::test]
async fn test_host_leaving_keeps_joiner_role() {
    let (mut reg, _rx) = registry();
    let (a, _ca) = conn();
    let (b, _cb) = conn();
    reg.create_room(code("R"), Arc::clone(&a)).unwrap();
    reg.join_room(code("R"), Arc::clone(&b)).unwrap();

    reg.disconnect(a.id());

    assert_eq!(reg.participants(&code("R")).unwrap(), vec![b.id()]);
    assert_eq!(reg.membership(b.id()).unwrap().role, Role::Joiner);
    assert!(reg.has_pending_timeout(&code("R")));
}

// =========================================================================
// join-timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_disconnects_lone_host() {
    let (mut reg, mut rx) = registry();
    let (a, mut ca) = conn();
    reg.create_room(code("ABCD"), Arc::clone(&a)).unwrap();

    let event = rx.recv().await.expect("timeout should fire");
    assert_eq!(event.code, code("ABCD"));

    let closed = reg.expire(&event).expect("host should be expired");
    assert_eq!(closed.id(), a.id());

    let frame = ca.try_recv().expect("host should get a notice");
    let json: serde_json::Value = serde_json::from_slice(frame.as_bytes()).unwrap();
    assert_eq!(json["action"], "timeout_disconnect");
    assert_eq!(json["message"], TIMEOUT_MESSAGE);

    assert!(ca.is_closed_by_server());
    assert!(!reg.contains(&code("ABCD")));
    assert!(reg.membership(a.id()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_respects_configured_duration() {
    let config = RoomConfig {
        join_timeout: Duration::from_secs(5),
    };
    let (mut reg, mut rx) = RoomRegistry::<MemoryConnection>::new(config);
    reg.create_room(code("R"), conn().0).unwrap();

    let early = tokio::time::timeout(Duration::from_secs(4), rx.recv()).await;
    assert!(early.is_err());
    let late = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
    assert!(matches!(late, Ok(Some(_))));
}

#[tokio::test(start_paused = true)]
async fn test_join_cancels_timeout() {
    let (mut reg, mut rx) = registry();
    reg.create_room(code("R"), conn().0).unwrap();
    reg.join_room(code("R"), conn().0).unwrap();

    let fired = tokio::time::timeout(Duration::from_secs(1200), rx.recv()).await;
    assert!(fired.is_err(), "cancelled timeout must not fire");
    assert_eq!(reg.room_state(&code("R")), Some(RoomState::Paired));
}

#[tokio::test(start_paused = true)]
async fn test_join_wins_over_timeout_already_in_flight() {
    let (mut reg, mut rx) = registry();
    let (a, mut ca) = conn();
    reg.create_room(code("R"), Arc::clone(&a)).unwrap();

    // The timer fires, but the join gets the lock before the event is applied.
    let event = rx.recv().await.unwrap();
    reg.join_room(code("R"), conn().0).unwrap();

    assert!(reg.expire(&event).is_none());
    assert_eq!(reg.room_state(&code("R")), Some(RoomState::Paired));
    assert!(ca.try_recv().is_none());
    assert!(!ca.is_closed_by_server());
}

#[tokio::test(start_paused = true)]
async fn test_stale_event_after_recreate_is_ignored() {
    let (mut reg, mut rx) = registry();
    let (a, _ca) = conn();
    reg.create_room(code("R"), Arc::clone(&a)).unwrap();

    let event = rx.recv().await.unwrap();
    reg.disconnect(a.id());
    let (b, mut cb) = conn();
    reg.create_room(code("R"), Arc::clone(&b)).unwrap();

    // Old timer id, new room under the same code.
    assert!(reg.expire(&event).is_none());
    assert!(reg.contains(&code("R")));
    assert!(cb.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rearmed_timeout_expires_remaining_participant() {
    let (mut reg, mut rx) = registry();
    let (a, mut ca) = conn();
    let (b, _cb) = conn();
    reg.create_room(code("R"), Arc::clone(&a)).unwrap();
    reg.join_room(code("R"), Arc::clone(&b)).unwrap();
    reg.disconnect(b.id());

    let event = rx.recv().await.unwrap();
    let closed = reg.expire(&event).unwrap();
    assert_eq!(closed.id(), a.id());
    assert!(ca.is_closed_by_server());
    assert_eq!(reg.room_count(), 0);
}
