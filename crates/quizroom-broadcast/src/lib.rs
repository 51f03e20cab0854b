//! Per-room event fan-out.
//!
//! The broadcaster keeps two maps: a delivery channel per connection, and
//! a subscriber set per room code. Publishing an event clones it into the
//! channel of every current subscriber of that code. Channels are
//! unbounded, so a slow consumer queues instead of blocking the
//! publisher, and a send to a dropped receiver is discarded silently.
//!
//! Ordering: all publishes for a given room originate in that room's
//! actor task, and each connection's channel is FIFO, so a subscriber
//! sees one room's events in publish order. Nothing is guaranteed
//! *between* subscribers or between different rooms.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use quizroom_protocol::{Event, RoomCode};
use quizroom_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's delivery channel.
pub type EventSender = mpsc::UnboundedSender<Event>;
/// Receiving half, drained by the connection's outbound pump.
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Creates a delivery channel pair for one connection.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Default)]
struct Inner {
    /// Delivery channel per registered connection.
    connections: HashMap<ConnectionId, EventSender>,
    /// Which connections are subscribed to which room code.
    subscribers: HashMap<RoomCode, HashSet<ConnectionId>>,
}

/// Maintains subscriber sets per room code and delivers events to every
/// current subscriber.
///
/// All operations take `&self` and are safe to call from any task. The
/// internal lock is held only for map access, never across an await, so
/// the broadcaster can sit behind an `Arc` shared by every room actor
/// and connection handler.
#[derive(Default)]
pub struct EventBroadcaster {
    inner: Mutex<Inner>,
}

impl EventBroadcaster {
    /// Creates an empty broadcaster.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning would mean a panic while holding the guard;
        // the maps are still structurally intact, so keep going.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Attaches a connection's delivery channel.
    ///
    /// Must happen before the connection can subscribe to any room.
    /// Registering the same connection again replaces its channel.
    pub fn register(&self, conn: ConnectionId, sender: EventSender) {
        self.lock().connections.insert(conn, sender);
        tracing::debug!(%conn, "connection registered for delivery");
    }

    /// Detaches a connection and drops all of its subscriptions.
    ///
    /// Events already queued on its channel are not retracted; they are
    /// simply never drained once the receiver is gone.
    pub fn unregister(&self, conn: ConnectionId) {
        let mut inner = self.lock();
        inner.connections.remove(&conn);
        inner.subscribers.retain(|_, subs| {
            subs.remove(&conn);
            !subs.is_empty()
        });
        tracing::debug!(%conn, "connection unregistered");
    }

    /// Adds a connection to a room's subscriber set. Idempotent.
    pub fn subscribe(&self, conn: ConnectionId, code: RoomCode) {
        self.lock()
            .subscribers
            .entry(code)
            .or_default()
            .insert(conn);
    }

    /// Removes a connection from a room's subscriber set. Idempotent.
    pub fn unsubscribe(&self, conn: ConnectionId, code: RoomCode) {
        let mut inner = self.lock();
        if let Some(subs) = inner.subscribers.get_mut(&code) {
            subs.remove(&conn);
            if subs.is_empty() {
                inner.subscribers.remove(&code);
            }
        }
    }

    /// Delivers an event to every subscriber of the room.
    pub fn publish(&self, code: RoomCode, event: Event) {
        self.fan_out(code, None, event);
    }

    /// Delivers an event to every subscriber except one.
    ///
    /// Used for `playerJoined`: the joiner learns about itself from its
    /// response, not from a duplicate broadcast.
    pub fn publish_except(&self, code: RoomCode, except: ConnectionId, event: Event) {
        self.fan_out(code, Some(except), event);
    }

    fn fan_out(&self, code: RoomCode, except: Option<ConnectionId>, event: Event) {
        let inner = self.lock();
        let Some(subs) = inner.subscribers.get(&code) else {
            return;
        };
        for conn in subs {
            if Some(*conn) == except {
                continue;
            }
            if let Some(sender) = inner.connections.get(conn) {
                // Receiver gone means the connection is tearing down;
                // the event is simply dropped.
                let _ = sender.send(event.clone());
            }
        }
    }

    /// Drops a room's entire subscriber set.
    ///
    /// Used when a room is destroyed out from under its subscribers
    /// (idle reaping); their delivery channels stay registered.
    pub fn drop_room(&self, code: RoomCode) {
        self.lock().subscribers.remove(&code);
    }

    /// Number of connections currently subscribed to a room.
    pub fn subscriber_count(&self, code: RoomCode) -> usize {
        self.lock()
            .subscribers
            .get(&code)
            .map_or(0, HashSet::len)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quizroom_protocol::{PlayerId, RoomSnapshot, RoomStatus};

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn code(s: &str) -> RoomCode {
        s.parse().expect("valid test code")
    }

    fn room_updated(code_str: &str) -> Event {
        Event::RoomUpdated {
            room: RoomSnapshot {
                code: code(code_str),
                host_id: PlayerId(1),
                deck_ref: "deck".into(),
                players: vec![],
                status: RoomStatus::Lobby,
                created_at: 0,
            },
        }
    }

    fn left(id: u64, code_str: &str) -> Event {
        Event::PlayerLeft {
            player_id: PlayerId(id),
            room: match room_updated(code_str) {
                Event::RoomUpdated { room } => room,
                _ => unreachable!(),
            },
        }
    }

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBroadcaster::new();
        let (tx1, mut rx1) = event_channel();
        let (tx2, mut rx2) = event_channel();

        bus.register(conn(1), tx1);
        bus.register(conn(2), tx2);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(2), code("ABCD"));

        bus.publish(code("ABCD"), room_updated("ABCD"));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_publish_is_scoped_to_the_room() {
        let bus = EventBroadcaster::new();
        let (tx1, mut rx1) = event_channel();
        let (tx2, mut rx2) = event_channel();

        bus.register(conn(1), tx1);
        bus.register(conn(2), tx2);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(2), code("WXYZ"));

        bus.publish(code("ABCD"), room_updated("ABCD"));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err(), "other room must not see the event");
    }

    #[test]
    fn test_publish_except_skips_one_connection() {
        let bus = EventBroadcaster::new();
        let (tx1, mut rx1) = event_channel();
        let (tx2, mut rx2) = event_channel();

        bus.register(conn(1), tx1);
        bus.register(conn(2), tx2);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(2), code("ABCD"));

        bus.publish_except(code("ABCD"), conn(2), room_updated("ABCD"));

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_delivery_is_fifo_per_room() {
        let bus = EventBroadcaster::new();
        let (tx, mut rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));

        bus.publish(code("ABCD"), left(10, "ABCD"));
        bus.publish(code("ABCD"), left(11, "ABCD"));
        bus.publish(code("ABCD"), left(12, "ABCD"));

        for expected in [10, 11, 12] {
            match rx.try_recv().unwrap() {
                Event::PlayerLeft { player_id, .. } => {
                    assert_eq!(player_id, PlayerId(expected));
                }
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let bus = EventBroadcaster::new();
        let (tx, mut rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(1), code("ABCD"));

        assert_eq!(bus.subscriber_count(code("ABCD")), 1);

        bus.publish(code("ABCD"), room_updated("ABCD"));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err(), "no duplicate delivery");
    }

    #[test]
    fn test_unsubscribe_stops_future_events_but_keeps_queued_ones() {
        let bus = EventBroadcaster::new();
        let (tx, mut rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));

        bus.publish(code("ABCD"), left(1, "ABCD"));
        bus.unsubscribe(conn(1), code("ABCD"));
        bus.publish(code("ABCD"), left(2, "ABCD"));

        // The pre-unsubscribe event was already enqueued and survives.
        assert!(matches!(
            rx.try_recv().unwrap(),
            Event::PlayerLeft { player_id: PlayerId(1), .. }
        ));
        // The post-unsubscribe event never arrives.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_unknown_is_a_no_op() {
        let bus = EventBroadcaster::new();
        bus.unsubscribe(conn(99), code("ABCD"));
        assert_eq!(bus.subscriber_count(code("ABCD")), 0);
    }

    #[test]
    fn test_publish_to_dropped_receiver_does_not_panic() {
        let bus = EventBroadcaster::new();
        let (tx, rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));
        drop(rx);

        // Undeliverable events are discarded, not retried.
        bus.publish(code("ABCD"), room_updated("ABCD"));
    }

    #[test]
    fn test_unregister_drops_all_subscriptions() {
        let bus = EventBroadcaster::new();
        let (tx, _rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(1), code("WXYZ"));

        bus.unregister(conn(1));

        assert_eq!(bus.subscriber_count(code("ABCD")), 0);
        assert_eq!(bus.subscriber_count(code("WXYZ")), 0);
    }

    #[test]
    fn test_publish_to_room_with_no_subscribers_is_a_no_op() {
        let bus = EventBroadcaster::new();
        bus.publish(code("ABCD"), room_updated("ABCD"));
    }

    #[test]
    fn test_drop_room_clears_subscribers_but_keeps_connections() {
        let bus = EventBroadcaster::new();
        let (tx, mut rx) = event_channel();
        bus.register(conn(1), tx);
        bus.subscribe(conn(1), code("ABCD"));
        bus.subscribe(conn(1), code("WXYZ"));

        bus.drop_room(code("ABCD"));

        bus.publish(code("ABCD"), room_updated("ABCD"));
        assert!(rx.try_recv().is_err(), "dropped room delivers nothing");

        // The connection is still registered and still subscribed to the
        // other room.
        bus.publish(code("WXYZ"), room_updated("WXYZ"));
        assert!(rx.try_recv().is_ok());
    }
}
