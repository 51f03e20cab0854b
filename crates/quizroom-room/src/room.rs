//! Room actor: an isolated Tokio task that owns one room's state.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. Serializing every mutation through that
//! channel is what gives the room its single-writer guarantee, and since
//! the actor is also the only publisher of the room's events, subscribers
//! see them in exactly the order the mutations happened.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use quizroom_broadcast::EventBroadcaster;
use quizroom_protocol::{Event, Player, PlayerId, RoomCode, RoomSnapshot, RoomStatus};
use quizroom_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};

use crate::{RoomError, roster};

/// Counter for minting player identities. Process-wide so ids are never
/// reused, even across rooms.
static NEXT_PLAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Milliseconds since the Unix epoch, for `joinedAt` / `createdAt` /
/// action timestamps on the wire.
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub(crate) fn mint_player_id() -> PlayerId {
    PlayerId(NEXT_PLAYER_ID.fetch_add(1, Ordering::Relaxed))
}

/// What a leave request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The connection held no seat in this room; nothing changed.
    NotMember,
    /// The player was removed; others remain (host possibly promoted).
    Left,
    /// The last player left. The actor has shut down; the caller must
    /// drop the room from the registry. No broadcast is sent.
    RoomEmpty,
}

/// A room metadata snapshot plus how long the room has been idle.
///
/// `idle_for` counts time since the last roster/status/action command;
/// info reads don't reset it, so an idle sweep can query freely.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub snapshot: RoomSnapshot,
    pub idle_for: Duration,
}

/// Commands sent to a room actor through its channel.
pub(crate) enum RoomCommand {
    /// Seat a new player.
    Join {
        conn: ConnectionId,
        name: String,
        reply: oneshot::Sender<Result<(Player, RoomSnapshot), RoomError>>,
    },

    /// Remove the player seated for this connection.
    Leave {
        conn: ConnectionId,
        reply: oneshot::Sender<LeaveOutcome>,
    },

    /// Move lobby → playing. Host only.
    Start {
        conn: ConnectionId,
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },

    /// Move playing → finished. Triggered by the quiz-flow collaborator.
    Finish {
        reply: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },

    /// Relay a gameplay action to all subscribers. Fire-and-forget.
    Action {
        conn: ConnectionId,
        action_name: String,
        payload: serde_json::Value,
    },

    /// Request a consistent snapshot of the room.
    Info {
        reply: oneshot::Sender<RoomInfo>,
    },

    /// Shut down the room (idle reaping).
    Shutdown,
}

/// Handle to a running room actor. Cheap to clone; the registry holds
/// one per room and the coordinator clones them out of the registry so
/// no lock is held while a command is in flight.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's code.
    pub fn code(&self) -> RoomCode {
        self.code
    }

    /// Seats a player for `conn`. The name is validated by the actor.
    pub async fn join(
        &self,
        conn: ConnectionId,
        name: String,
    ) -> Result<(Player, RoomSnapshot), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                conn,
                name,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?
    }

    /// Removes the player seated for `conn`, if any.
    ///
    /// An unavailable actor counts as `NotMember`: the room is already
    /// gone, which is exactly what an idempotent leave wants.
    pub async fn leave(&self, conn: ConnectionId) -> LeaveOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .sender
            .send(RoomCommand::Leave {
                conn,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            return LeaveOutcome::NotMember;
        }
        reply_rx.await.unwrap_or(LeaveOutcome::NotMember)
    }

    /// Starts the game on behalf of `conn`.
    pub async fn start(&self, conn: ConnectionId) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Start {
                conn,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?
    }

    /// Finishes the game.
    pub async fn finish(&self) -> Result<RoomSnapshot, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Finish { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?
    }

    /// Relays a gameplay action. Fire-and-forget: membership is checked
    /// inside the actor and non-members are logged and dropped.
    pub async fn action(
        &self,
        conn: ConnectionId,
        action_name: String,
        payload: serde_json::Value,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Action {
                conn,
                action_name,
                payload,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.code))
    }

    /// Requests a consistent snapshot plus idle time.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.code))?;
        reply_rx.await.map_err(|_| RoomError::Unavailable(self.code))
    }

    /// Tells the room to shut down without emptying it first.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| RoomError::Unavailable(self.code))
    }
}

/// One seated player: the public `Player` plus the connection it belongs
/// to. The connection id stays server-side; only `player` goes on the
/// wire.
struct Seat {
    conn: ConnectionId,
    player: Player,
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    code: RoomCode,
    deck_ref: String,
    status: RoomStatus,
    /// Connection currently holding host privilege. Mirrors the seat
    /// whose `player.is_host` is set.
    host: ConnectionId,
    seats: Vec<Seat>,
    created_at: u64,
    last_activity: Instant,
    broadcaster: Arc<EventBroadcaster>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until the room empties
    /// or is shut down.
    async fn run(mut self) {
        tracing::info!(code = %self.code, "room opened");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { conn, name, reply } => {
                    let result = self.handle_join(conn, name);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { conn, reply } => {
                    let outcome = self.handle_leave(conn);
                    let _ = reply.send(outcome);
                    if outcome == LeaveOutcome::RoomEmpty {
                        break;
                    }
                }
                RoomCommand::Start { conn, reply } => {
                    let result = self.handle_start(conn);
                    let _ = reply.send(result);
                }
                RoomCommand::Finish { reply } => {
                    let result = self.handle_finish();
                    let _ = reply.send(result);
                }
                RoomCommand::Action {
                    conn,
                    action_name,
                    payload,
                } => {
                    self.handle_action(conn, action_name, payload);
                }
                RoomCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::Shutdown => {
                    tracing::info!(code = %self.code, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(code = %self.code, "room closed");
    }

    fn handle_join(
        &mut self,
        conn: ConnectionId,
        name: String,
    ) -> Result<(Player, RoomSnapshot), RoomError> {
        if !self.status.is_joinable() {
            return Err(RoomError::RoomNotJoinable(self.code));
        }
        let name = roster::validate_display_name(&name)?;
        if self.seats.iter().any(|s| s.conn == conn) {
            return Err(RoomError::AlreadySeated(conn, self.code));
        }

        let player = Player {
            id: mint_player_id(),
            name,
            avatar: roster::random_avatar(),
            is_host: false,
            joined_at: now_millis(),
        };
        self.seats.push(Seat {
            conn,
            player: player.clone(),
        });
        self.touch();

        tracing::info!(
            code = %self.code,
            player_id = %player.id,
            players = self.seats.len(),
            "player joined"
        );

        // The joiner learns about itself from the reply; existing
        // subscribers get the broadcast.
        let room = self.snapshot();
        self.broadcaster.subscribe(conn, self.code);
        self.broadcaster.publish_except(
            self.code,
            conn,
            Event::PlayerJoined {
                player: player.clone(),
                room: room.clone(),
            },
        );
        self.broadcaster
            .publish(self.code, Event::RoomUpdated { room: room.clone() });

        Ok((player, room))
    }

    fn handle_leave(&mut self, conn: ConnectionId) -> LeaveOutcome {
        let Some(index) = self.seats.iter().position(|s| s.conn == conn) else {
            tracing::debug!(code = %self.code, %conn, "leave from non-member, ignoring");
            return LeaveOutcome::NotMember;
        };

        let departed = self.seats.remove(index);
        self.broadcaster.unsubscribe(conn, self.code);
        self.touch();

        tracing::info!(
            code = %self.code,
            player_id = %departed.player.id,
            players = self.seats.len(),
            "player left"
        );

        if self.seats.is_empty() {
            // Last one out: the room dissolves silently.
            return LeaveOutcome::RoomEmpty;
        }

        if departed.player.is_host {
            self.promote_next_host();
        }

        let room = self.snapshot();
        self.broadcaster.publish(
            self.code,
            Event::PlayerLeft {
                player_id: departed.player.id,
                room: room.clone(),
            },
        );
        self.broadcaster
            .publish(self.code, Event::RoomUpdated { room });

        LeaveOutcome::Left
    }

    /// Hands host privilege to the earliest-joined remaining player,
    /// ties broken by ascending player id. Deterministic: replaying the
    /// same departures always promotes the same player.
    fn promote_next_host(&mut self) {
        let Some(next) = self
            .seats
            .iter_mut()
            .min_by_key(|s| (s.player.joined_at, s.player.id))
        else {
            return;
        };
        next.player.is_host = true;
        self.host = next.conn;
        tracing::info!(
            code = %self.code,
            player_id = %next.player.id,
            "host privilege promoted"
        );
    }

    fn handle_start(&mut self, conn: ConnectionId) -> Result<RoomSnapshot, RoomError> {
        // Host check first: a non-host is told NotHost regardless of the
        // room's status.
        if conn != self.host {
            return Err(RoomError::NotHost(self.code));
        }
        if !self.status.can_transition_to(RoomStatus::Playing) {
            return Err(RoomError::InvalidTransition(
                self.code,
                self.status,
                RoomStatus::Playing,
            ));
        }

        self.status = RoomStatus::Playing;
        self.touch();
        tracing::info!(code = %self.code, players = self.seats.len(), "game started");

        let room = self.snapshot();
        self.broadcaster
            .publish(self.code, Event::GameStarted { room: room.clone() });
        self.broadcaster
            .publish(self.code, Event::RoomUpdated { room: room.clone() });

        Ok(room)
    }

    fn handle_finish(&mut self) -> Result<RoomSnapshot, RoomError> {
        if !self.status.can_transition_to(RoomStatus::Finished) {
            return Err(RoomError::InvalidTransition(
                self.code,
                self.status,
                RoomStatus::Finished,
            ));
        }

        self.status = RoomStatus::Finished;
        self.touch();
        tracing::info!(code = %self.code, "game finished");

        let room = self.snapshot();
        self.broadcaster
            .publish(self.code, Event::RoomUpdated { room: room.clone() });

        Ok(room)
    }

    fn handle_action(
        &mut self,
        conn: ConnectionId,
        action_name: String,
        payload: serde_json::Value,
    ) {
        let Some(seat) = self.seats.iter().find(|s| s.conn == conn) else {
            tracing::debug!(code = %self.code, %conn, "action from non-member, ignoring");
            return;
        };
        self.broadcaster.publish(
            self.code,
            // Everyone including the sender, so all clients render the
            // action from the same event.
            Event::PlayerAction {
                player_id: seat.player.id,
                player_name: seat.player.name.clone(),
                action_name,
                payload,
                timestamp: now_millis(),
            },
        );
        self.touch();
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn snapshot(&self) -> RoomSnapshot {
        let host_id = self
            .seats
            .iter()
            .find(|s| s.player.is_host)
            .map(|s| s.player.id)
            // An empty room never produces a snapshot; the fallback only
            // exists to avoid a panic path.
            .unwrap_or(PlayerId(0));
        RoomSnapshot {
            code: self.code,
            host_id,
            deck_ref: self.deck_ref.clone(),
            players: self.seats.iter().map(|s| s.player.clone()).collect(),
            status: self.status,
            created_at: self.created_at,
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            snapshot: self.snapshot(),
            idle_for: self.last_activity.elapsed(),
        }
    }
}

/// Spawns a new room actor seeded with its host, and returns the handle.
///
/// `channel_size` bounds the command queue; senders wait when it fills.
pub(crate) fn spawn_room(
    code: RoomCode,
    deck_ref: String,
    host_conn: ConnectionId,
    host: Player,
    created_at: u64,
    broadcaster: Arc<EventBroadcaster>,
    channel_size: usize,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = RoomActor {
        code,
        deck_ref,
        status: RoomStatus::Lobby,
        host: host_conn,
        seats: vec![Seat {
            conn: host_conn,
            player: host,
        }],
        created_at,
        last_activity: Instant::now(),
        broadcaster,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
