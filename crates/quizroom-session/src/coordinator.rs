//! The session coordinator: per-connection API over the room layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use quizroom_broadcast::{EventBroadcaster, EventSender};
use quizroom_protocol::{Player, PlayerId, RoomCode, RoomSnapshot};
use quizroom_room::{LeaveOutcome, RoomError, RoomHandle, RoomRegistry, validate_display_name};
use quizroom_transport::ConnectionId;
use tokio::sync::Mutex;

/// Where a connection is currently seated.
#[derive(Debug, Clone, Copy)]
struct Seat {
    code: RoomCode,
    player_id: PlayerId,
}

struct CoordinatorState {
    registry: RoomRegistry,
    /// A connection holds at most one seat at a time.
    seats: HashMap<ConnectionId, Seat>,
}

/// Translates client intents into registry / room-actor calls and
/// triggers broadcasts on success.
///
/// One instance serves every connection; pass it explicitly (behind an
/// `Arc`) to whatever owns the connections. There is no process-wide
/// singleton. The internal lock guards only the registry map and the
/// seat index; it is never held while a room command is in flight, so
/// operations on different rooms proceed in parallel.
pub struct SessionCoordinator {
    state: Mutex<CoordinatorState>,
    broadcaster: Arc<EventBroadcaster>,
}

impl SessionCoordinator {
    /// Creates a coordinator with its own broadcaster.
    pub fn new() -> Self {
        Self::with_broadcaster(Arc::new(EventBroadcaster::new()))
    }

    /// Creates a coordinator publishing through an existing broadcaster.
    pub fn with_broadcaster(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                registry: RoomRegistry::new(Arc::clone(&broadcaster)),
                seats: HashMap::new(),
            }),
            broadcaster,
        }
    }

    /// The broadcaster room events flow through.
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Attaches a connection's event delivery channel. Must be called
    /// before the connection can receive any broadcast.
    pub fn register_connection(&self, conn: ConnectionId, sender: EventSender) {
        self.broadcaster.register(conn, sender);
    }

    /// Opens a new room with the calling connection as host.
    ///
    /// The creator is subscribed to the new code; nothing is broadcast
    /// (nobody else can know the code yet). A connection already seated
    /// elsewhere is implicitly removed from its previous room first.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] for a bad host name.
    pub async fn create_room(
        &self,
        conn: ConnectionId,
        deck_ref: &str,
        host_name: &str,
    ) -> Result<RoomSnapshot, RoomError> {
        // Validate before the implicit leave so a garbage name doesn't
        // eject the caller from its current room.
        validate_display_name(host_name)?;
        self.leave_room(conn).await;

        let mut state = self.state.lock().await;
        let (host, snapshot) = state.registry.create_room(conn, deck_ref, host_name)?;
        state.seats.insert(
            conn,
            Seat {
                code: snapshot.code,
                player_id: host.id,
            },
        );
        tracing::info!(%conn, code = %snapshot.code, "connection hosting room");
        Ok(snapshot)
    }

    /// Joins an existing room by code (case-insensitive).
    ///
    /// On success the caller is subscribed and every *other* subscriber
    /// receives `playerJoined`; the caller's own seat comes back in the
    /// return value. A connection already seated elsewhere is implicitly
    /// removed from its previous room first.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`] (also for malformed codes),
    /// [`RoomError::RoomNotJoinable`], [`RoomError::InvalidName`].
    pub async fn join_room(
        &self,
        conn: ConnectionId,
        raw_code: &str,
        player_name: &str,
    ) -> Result<(Player, RoomSnapshot), RoomError> {
        let code: RoomCode = raw_code
            .parse()
            .map_err(|_| RoomError::InvalidCode(raw_code.to_string()))?;
        validate_display_name(player_name)?;

        let handle = {
            let state = self.state.lock().await;
            // Rejoining the room you're already seated in would dissolve
            // and re-enter it through the implicit leave; reject instead.
            if let Some(seat) = state.seats.get(&conn) {
                if seat.code == code {
                    return Err(RoomError::AlreadySeated(conn, code));
                }
            }
            state.registry.get(code)?.clone()
        };
        self.leave_room(conn).await;

        let (player, room) = handle.join(conn, player_name.to_string()).await?;
        self.state.lock().await.seats.insert(
            conn,
            Seat {
                code,
                player_id: player.id,
            },
        );
        tracing::info!(%conn, %code, player_id = %player.id, "connection joined room");
        Ok((player, room))
    }

    /// Starts the game in the caller's current room (host only).
    ///
    /// # Errors
    /// [`RoomError::NotHost`], [`RoomError::InvalidTransition`], and
    /// `RoomNotFound`-class errors when the connection has no live room.
    pub async fn start_game(&self, conn: ConnectionId) -> Result<RoomSnapshot, RoomError> {
        let handle = self.seated_handle(conn).await?;
        handle.start(conn).await
    }

    /// Marks the given room's game finished.
    ///
    /// The finishing condition itself (all questions exhausted, host
    /// ended the session) belongs to the quiz-flow collaborator; this is
    /// the hook it calls. Subscribers observe the change via
    /// `roomUpdated`.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`], [`RoomError::InvalidTransition`].
    pub async fn finish_game(&self, code: RoomCode) -> Result<RoomSnapshot, RoomError> {
        let handle = { self.state.lock().await.registry.get(code)?.clone() };
        handle.finish().await
    }

    /// Removes the caller from its current room.
    ///
    /// Idempotent: leaving twice, or while in no room, is a quiet no-op.
    /// If the caller was the last player, the room is deleted silently;
    /// otherwise the remaining subscribers get `playerLeft` (with any
    /// host promotion already applied).
    pub async fn leave_room(&self, conn: ConnectionId) {
        let (seat, handle) = {
            let mut state = self.state.lock().await;
            let Some(seat) = state.seats.remove(&conn) else {
                return;
            };
            let handle = state.registry.get(seat.code).ok().cloned();
            (seat, handle)
        };

        let Some(handle) = handle else {
            // Room already gone (reaped); just drop the subscription.
            self.broadcaster.unsubscribe(conn, seat.code);
            return;
        };

        match handle.leave(conn).await {
            LeaveOutcome::RoomEmpty => {
                self.state.lock().await.registry.remove(seat.code);
                tracing::info!(code = %seat.code, "last player left, room deleted");
            }
            LeaveOutcome::NotMember => {
                // The actor no longer knows this connection; make sure
                // the subscription doesn't linger either.
                self.broadcaster.unsubscribe(conn, seat.code);
            }
            LeaveOutcome::Left => {}
        }
    }

    /// Relays a gameplay action to the caller's room. Fire-and-forget:
    /// a connection with no current room is logged and ignored.
    pub async fn send_action(
        &self,
        conn: ConnectionId,
        action_name: &str,
        payload: serde_json::Value,
    ) {
        let handle = match self.seated_handle(conn).await {
            Ok(handle) => handle,
            Err(_) => {
                tracing::debug!(%conn, action_name, "action from connection with no room, ignoring");
                return;
            }
        };
        if let Err(e) = handle
            .action(conn, action_name.to_string(), payload)
            .await
        {
            tracing::debug!(%conn, error = %e, "action dropped");
        }
    }

    /// The player identity this connection currently holds, if seated.
    pub async fn player_id(&self, conn: ConnectionId) -> Option<PlayerId> {
        self.state
            .lock()
            .await
            .seats
            .get(&conn)
            .map(|seat| seat.player_id)
    }

    /// A consistent snapshot of the caller's current room, if any.
    pub async fn current_room(&self, conn: ConnectionId) -> Option<RoomSnapshot> {
        let handle = self.seated_handle(conn).await.ok()?;
        handle.info().await.ok().map(|info| info.snapshot)
    }

    /// A consistent snapshot of a room by code.
    ///
    /// # Errors
    /// [`RoomError::RoomNotFound`].
    pub async fn room_snapshot(&self, code: RoomCode) -> Result<RoomSnapshot, RoomError> {
        let handle = { self.state.lock().await.registry.get(code)?.clone() };
        Ok(handle.info().await?.snapshot)
    }

    /// Tears down everything tied to a dropped connection: an implicit
    /// leave of its room plus removal of its delivery channel.
    pub async fn disconnect(&self, conn: ConnectionId) {
        self.leave_room(conn).await;
        self.broadcaster.unregister(conn);
        tracing::debug!(%conn, "connection torn down");
    }

    /// Destroys rooms that have seen no activity for at least `max_idle`
    /// and returns their codes. Info reads don't count as activity.
    ///
    /// Abandoned rooms normally disappear via the last-leaver rule; this
    /// sweep catches rooms whose members all vanished without clean
    /// leaves. Run it on an interval, or not at all.
    pub async fn reap_idle(&self, max_idle: Duration) -> Vec<RoomCode> {
        let handles = { self.state.lock().await.registry.handles() };

        let mut reaped = Vec::new();
        for handle in handles {
            let Ok(info) = handle.info().await else {
                continue;
            };
            if info.idle_for < max_idle {
                continue;
            }

            let code = handle.code();
            let _ = handle.shutdown().await;
            {
                let mut state = self.state.lock().await;
                state.registry.remove(code);
                state.seats.retain(|_, seat| seat.code != code);
            }
            self.broadcaster.drop_room(code);
            tracing::info!(%code, idle_for = ?info.idle_for, "idle room reaped");
            reaped.push(code);
        }
        reaped
    }

    /// Number of active rooms.
    pub async fn room_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Clones the handle for the caller's current room.
    async fn seated_handle(&self, conn: ConnectionId) -> Result<RoomHandle, RoomError> {
        let state = self.state.lock().await;
        let seat = state
            .seats
            .get(&conn)
            .ok_or(RoomError::NotInRoom(conn))?;
        state.registry.get(seat.code).cloned()
    }
}

impl Default for SessionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
