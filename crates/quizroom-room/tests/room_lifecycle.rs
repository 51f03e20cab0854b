//! Integration tests for the room registry and the room actor: roster
//! rules, the status state machine, host promotion, and the broadcasts
//! each mutation produces.

use std::collections::HashSet;
use std::sync::Arc;

use quizroom_broadcast::{EventBroadcaster, EventReceiver, event_channel};
use quizroom_protocol::{Event, PlayerId, RoomCode, RoomStatus};
use quizroom_room::{LeaveOutcome, RoomError, RoomHandle, RoomRegistry};
use quizroom_transport::ConnectionId;

// =========================================================================
// Helpers
// =========================================================================

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

fn setup() -> (Arc<EventBroadcaster>, RoomRegistry) {
    let bus = Arc::new(EventBroadcaster::new());
    let registry = RoomRegistry::new(Arc::clone(&bus));
    (bus, registry)
}

/// Registers a delivery channel for a connection and returns the
/// receiving end.
fn listen(bus: &EventBroadcaster, c: ConnectionId) -> EventReceiver {
    let (tx, rx) = event_channel();
    bus.register(c, tx);
    rx
}

/// Creates a room hosted by `host` and returns (code, handle).
fn create(registry: &mut RoomRegistry, host: ConnectionId, name: &str) -> (RoomCode, RoomHandle) {
    let (_, snapshot) = registry
        .create_room(host, "deck123", name)
        .expect("create should succeed");
    let handle = registry.get(snapshot.code).expect("room registered").clone();
    (snapshot.code, handle)
}

/// Drains every event currently queued on a receiver.
fn drain(rx: &mut EventReceiver) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

// =========================================================================
// Room creation
// =========================================================================

#[tokio::test]
async fn test_create_room_starts_in_lobby_with_host_seated() {
    let (_bus, mut registry) = setup();
    let (host, snapshot) = registry
        .create_room(conn(1), "deck123", "Alice")
        .unwrap();

    assert_eq!(snapshot.status, RoomStatus::Lobby);
    assert_eq!(snapshot.deck_ref, "deck123");
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.host_id, host.id);
    assert!(snapshot.players[0].is_host);
    assert_eq!(snapshot.players[0].name, "Alice");
}

#[tokio::test]
async fn test_create_room_trims_host_name() {
    let (_bus, mut registry) = setup();
    let (host, _) = registry
        .create_room(conn(1), "deck123", "  Alice  ")
        .unwrap();
    assert_eq!(host.name, "Alice");
}

#[tokio::test]
async fn test_create_room_rejects_blank_host_name() {
    let (_bus, mut registry) = setup();
    let result = registry.create_room(conn(1), "deck123", "   ");
    assert!(matches!(result, Err(RoomError::InvalidName(_))));
    assert!(registry.is_empty(), "no room should be registered");
}

#[tokio::test]
async fn test_create_many_rooms_yields_distinct_codes() {
    // Code generation must collision-check against active rooms: N
    // creations while all N rooms stay alive give N distinct codes.
    let (_bus, mut registry) = setup();
    let mut codes = HashSet::new();
    for i in 0..50 {
        let (_, snapshot) = registry
            .create_room(conn(i), "deck123", "Host")
            .unwrap();
        assert!(codes.insert(snapshot.code), "duplicate code generated");
    }
    assert_eq!(registry.len(), 50);
}

// =========================================================================
// Joining
// =========================================================================

#[tokio::test]
async fn test_join_appends_players_with_unique_ids() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    for i in 2..=5 {
        handle.join(conn(i), format!("Player{i}")).await.unwrap();
    }

    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.players.len(), 5);

    let ids: HashSet<PlayerId> = info.snapshot.players.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 5, "player ids must be unique");

    // Join order is preserved in the roster.
    let names: Vec<&str> = info
        .snapshot
        .players
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    assert_eq!(names, vec!["Alice", "Player2", "Player3", "Player4", "Player5"]);
}

#[tokio::test]
async fn test_join_is_not_host() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    let (bob, room) = handle.join(conn(2), "Bob".into()).await.unwrap();
    assert!(!bob.is_host);
    assert_ne!(room.host_id, bob.id);
}

#[tokio::test]
async fn test_join_rejects_blank_and_oversized_names() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    let blank = handle.join(conn(2), "   ".into()).await;
    assert!(matches!(blank, Err(RoomError::InvalidName(_))));

    let oversized = handle.join(conn(2), "x".repeat(21)).await;
    assert!(matches!(oversized, Err(RoomError::InvalidName(_))));

    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.players.len(), 1, "failed joins must not seat anyone");
}

#[tokio::test]
async fn test_join_after_start_is_not_joinable() {
    let (_bus, mut registry) = setup();
    let (code, handle) = create(&mut registry, conn(1), "Alice");
    handle.join(conn(2), "Bob".into()).await.unwrap();
    handle.start(conn(1)).await.unwrap();

    let result = handle.join(conn(3), "Carol".into()).await;
    assert!(matches!(result, Err(RoomError::RoomNotJoinable(c)) if c == code));
}

#[tokio::test]
async fn test_same_connection_cannot_be_seated_twice() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    handle.join(conn(2), "Bob".into()).await.unwrap();

    let result = handle.join(conn(2), "Bob again".into()).await;
    assert!(matches!(result, Err(RoomError::AlreadySeated(..))));

    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.players.len(), 2);
}

// =========================================================================
// Starting and finishing
// =========================================================================

#[tokio::test]
async fn test_start_moves_lobby_to_playing() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    handle.join(conn(2), "Bob".into()).await.unwrap();

    let room = handle.start(conn(1)).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
}

#[tokio::test]
async fn test_start_by_non_host_fails_regardless_of_status() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    handle.join(conn(2), "Bob".into()).await.unwrap();

    // In the lobby: NotHost.
    let result = handle.start(conn(2)).await;
    assert!(matches!(result, Err(RoomError::NotHost(_))));

    // While playing: still NotHost, not InvalidTransition.
    handle.start(conn(1)).await.unwrap();
    let result = handle.start(conn(2)).await;
    assert!(matches!(result, Err(RoomError::NotHost(_))));
}

#[tokio::test]
async fn test_start_twice_is_invalid_transition() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    handle.start(conn(1)).await.unwrap();

    let result = handle.start(conn(1)).await;
    assert!(matches!(
        result,
        Err(RoomError::InvalidTransition(_, RoomStatus::Playing, RoomStatus::Playing))
    ));
}

#[tokio::test]
async fn test_finish_only_from_playing() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    // Lobby → finished is not a legal transition.
    let result = handle.finish().await;
    assert!(matches!(result, Err(RoomError::InvalidTransition(..))));

    handle.start(conn(1)).await.unwrap();
    let room = handle.finish().await.unwrap();
    assert_eq!(room.status, RoomStatus::Finished);

    // Finished is terminal.
    let again = handle.finish().await;
    assert!(matches!(again, Err(RoomError::InvalidTransition(..))));
    let restart = handle.start(conn(1)).await;
    assert!(matches!(restart, Err(RoomError::InvalidTransition(..))));
}

// =========================================================================
// Leaving and host promotion
// =========================================================================

#[tokio::test]
async fn test_host_leave_promotes_in_join_order() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Host");
    let (p1, _) = handle.join(conn(2), "First".into()).await.unwrap();
    let (p2, _) = handle.join(conn(3), "Second".into()).await.unwrap();

    // Host leaves → earliest-joined remaining player is promoted.
    assert_eq!(handle.leave(conn(1)).await, LeaveOutcome::Left);
    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.host_id, p1.id);
    assert!(info.snapshot.players.iter().any(|p| p.id == p1.id && p.is_host));

    // First leaves → Second is promoted.
    assert_eq!(handle.leave(conn(2)).await, LeaveOutcome::Left);
    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.host_id, p2.id);

    // Second leaves → the room is empty and the actor shuts down.
    assert_eq!(handle.leave(conn(3)).await, LeaveOutcome::RoomEmpty);
}

#[tokio::test]
async fn test_promoted_host_can_start() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Host");
    handle.join(conn(2), "Bob".into()).await.unwrap();

    handle.leave(conn(1)).await;

    // Bob inherited the host seat and may start; the old host
    // connection no longer exists as far as the room is concerned.
    let room = handle.start(conn(2)).await.unwrap();
    assert_eq!(room.status, RoomStatus::Playing);
}

#[tokio::test]
async fn test_non_host_leave_keeps_host() {
    let (_bus, mut registry) = setup();
    let (host, _) = registry.create_room(conn(1), "deck123", "Host").unwrap();
    let handle = registry.get(registry.codes()[0]).unwrap().clone();
    handle.join(conn(2), "Bob".into()).await.unwrap();

    handle.leave(conn(2)).await;

    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.host_id, host.id);
    assert_eq!(info.snapshot.players.len(), 1);
}

#[tokio::test]
async fn test_leave_by_non_member_is_a_no_op() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Host");

    assert_eq!(handle.leave(conn(99)).await, LeaveOutcome::NotMember);
    let info = handle.info().await.unwrap();
    assert_eq!(info.snapshot.players.len(), 1);
}

#[tokio::test]
async fn test_commands_after_room_emptied_report_unavailable() {
    let (_bus, mut registry) = setup();
    let (code, handle) = create(&mut registry, conn(1), "Host");

    assert_eq!(handle.leave(conn(1)).await, LeaveOutcome::RoomEmpty);
    registry.remove(code);

    // The actor has stopped; late commands fail cleanly.
    let result = handle.start(conn(1)).await;
    assert!(matches!(result, Err(RoomError::Unavailable(c)) if c == code));
    // A late leave is still a quiet no-op.
    assert_eq!(handle.leave(conn(1)).await, LeaveOutcome::NotMember);
}

// =========================================================================
// Broadcasts
// =========================================================================

#[tokio::test]
async fn test_join_broadcasts_to_existing_subscribers_only() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let mut joiner_rx = listen(&bus, conn(2));
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    let (bob, _) = handle.join(conn(2), "Bob".into()).await.unwrap();

    let host_events = drain(&mut host_rx);
    assert!(
        matches!(
            &host_events[0],
            Event::PlayerJoined { player, room }
                if player.id == bob.id && room.players.len() == 2
        ),
        "host should see playerJoined first, got {host_events:?}"
    );
    assert!(matches!(&host_events[1], Event::RoomUpdated { .. }));

    // The joiner gets no playerJoined about itself, only the catch-all.
    let joiner_events = drain(&mut joiner_rx);
    assert!(
        joiner_events
            .iter()
            .all(|e| !matches!(e, Event::PlayerJoined { .. })),
        "joiner must not receive its own join, got {joiner_events:?}"
    );
}

#[tokio::test]
async fn test_start_broadcasts_game_started_to_all() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let mut bob_rx = listen(&bus, conn(2));
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    handle.join(conn(2), "Bob".into()).await.unwrap();
    drain(&mut host_rx);
    drain(&mut bob_rx);

    handle.start(conn(1)).await.unwrap();

    for (who, rx) in [("host", &mut host_rx), ("bob", &mut bob_rx)] {
        let events = drain(rx);
        assert!(
            matches!(
                &events[0],
                Event::GameStarted { room } if room.status == RoomStatus::Playing
            ),
            "{who} should see gameStarted, got {events:?}"
        );
    }
}

#[tokio::test]
async fn test_leave_broadcasts_player_left_to_remaining() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let mut bob_rx = listen(&bus, conn(2));
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    let (bob, _) = handle.join(conn(2), "Bob".into()).await.unwrap();
    drain(&mut host_rx);
    drain(&mut bob_rx);

    handle.leave(conn(2)).await;

    let host_events = drain(&mut host_rx);
    assert!(
        matches!(
            &host_events[0],
            Event::PlayerLeft { player_id, room }
                if *player_id == bob.id && room.players.len() == 1
        ),
        "host should see playerLeft, got {host_events:?}"
    );

    // The leaver is unsubscribed before the broadcast.
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn test_last_leave_is_silent() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    assert_eq!(handle.leave(conn(1)).await, LeaveOutcome::RoomEmpty);

    // Empty-room deletion produces no broadcast at all.
    assert!(drain(&mut host_rx).is_empty());
}

#[tokio::test]
async fn test_action_reaches_everyone_including_sender() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let mut bob_rx = listen(&bus, conn(2));
    let (_, handle) = create(&mut registry, conn(1), "Alice");
    let (bob, _) = handle.join(conn(2), "Bob".into()).await.unwrap();
    drain(&mut host_rx);
    drain(&mut bob_rx);

    handle
        .action(conn(2), "cardFlipped".into(), serde_json::json!({"cardIndex": 3}))
        .await
        .unwrap();
    // Fire-and-forget: give the actor a moment to process.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    for (who, rx) in [("host", &mut host_rx), ("sender", &mut bob_rx)] {
        let events = drain(rx);
        assert!(
            matches!(
                &events[0],
                Event::PlayerAction { player_id, player_name, action_name, payload, .. }
                    if *player_id == bob.id
                        && player_name == "Bob"
                        && action_name == "cardFlipped"
                        && payload["cardIndex"] == 3
            ),
            "{who} should see the action, got {events:?}"
        );
    }
}

#[tokio::test]
async fn test_action_from_non_member_is_dropped() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    handle
        .action(conn(99), "cardFlipped".into(), serde_json::Value::Null)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;

    assert!(drain(&mut host_rx).is_empty(), "no broadcast for a non-member action");
}

#[tokio::test]
async fn test_events_arrive_in_mutation_order() {
    let (bus, mut registry) = setup();
    let mut host_rx = listen(&bus, conn(1));
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    handle.join(conn(2), "Bob".into()).await.unwrap();
    handle.join(conn(3), "Carol".into()).await.unwrap();
    handle.start(conn(1)).await.unwrap();

    let events = drain(&mut host_rx);
    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            Event::PlayerJoined { .. } => "joined",
            Event::RoomUpdated { .. } => "updated",
            Event::GameStarted { .. } => "started",
            Event::PlayerLeft { .. } => "left",
            Event::PlayerAction { .. } => "action",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["joined", "updated", "joined", "updated", "started", "updated"],
        "per-room delivery must be FIFO in mutation order"
    );
}

// =========================================================================
// Snapshots and idle tracking
// =========================================================================

#[tokio::test]
async fn test_info_reports_idle_time_without_resetting_it() {
    let (_bus, mut registry) = setup();
    let (_, handle) = create(&mut registry, conn(1), "Alice");

    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let first = handle.info().await.unwrap();
    assert!(first.idle_for >= std::time::Duration::from_millis(20));

    // A second info read sees at least as much idle time: reads don't
    // count as activity.
    let second = handle.info().await.unwrap();
    assert!(second.idle_for >= first.idle_for);

    // A real mutation resets the clock.
    handle.join(conn(2), "Bob".into()).await.unwrap();
    let after = handle.info().await.unwrap();
    assert!(after.idle_for < std::time::Duration::from_millis(20));
}

#[tokio::test]
async fn test_registry_lookup_and_removal() {
    let (_bus, mut registry) = setup();
    let (code, _) = create(&mut registry, conn(1), "Alice");

    assert!(registry.contains(code));
    assert!(registry.get(code).is_ok());

    registry.remove(code);
    assert!(!registry.contains(code));
    assert!(matches!(
        registry.get(code),
        Err(RoomError::RoomNotFound(c)) if c == code
    ));

    // Removal is idempotent.
    registry.remove(code);
}
