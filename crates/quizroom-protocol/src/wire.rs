//! The three message families of the protocol.
//!
//! Everything a client sends is a [`Request`]; every request gets exactly
//! one [`Response`]; room activity additionally arrives as broadcast
//! [`Event`]s. The three are distinguishable by their tag key
//! (`"operation"` / `"result"` / `"event"`), so a client can route an
//! incoming frame without trying every shape.

use serde::{Deserialize, Serialize};

use crate::types::{ErrorCode, Player, PlayerId, RoomCode, RoomSnapshot};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A client intent, as `{"operation": ..., "args": {...}}`.
///
/// The requester's identity is implied by the connection the request
/// arrives on; `startGame` and `leaveRoom` carry no arguments at all.
///
/// `roomCode` is carried as a raw string here, not a [`RoomCode`]: a
/// mistyped code must surface as `RoomNotFound` from the coordinator, not
/// as a decode failure that kills the whole frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "args", rename_all = "camelCase")]
pub enum Request {
    /// Open a new room and become its host.
    #[serde(rename_all = "camelCase")]
    CreateRoom { deck_ref: String, host_name: String },

    /// Join an existing room by code.
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_code: String, player_name: String },

    /// Start the game (host only).
    StartGame,

    /// Leave the current room. Always acknowledged, never an error.
    LeaveRoom,

    /// Relay a gameplay action to everyone in the room.
    #[serde(rename_all = "camelCase")]
    SendAction {
        action_name: String,
        payload: serde_json::Value,
    },
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// The reply to a single [`Request`], as `{"result": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", content = "data", rename_all = "camelCase")]
pub enum Response {
    /// `createRoom` succeeded; the creator is the sole player and host.
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_code: RoomCode, room: RoomSnapshot },

    /// `joinRoom` succeeded. `player` is the caller's own new seat; the
    /// matching `playerJoined` broadcast goes only to the *other*
    /// subscribers, so the caller must take its roster from here.
    RoomJoined { player: Player, room: RoomSnapshot },

    /// `startGame` succeeded.
    GameStarted { room: RoomSnapshot },

    /// `leaveRoom` / `sendAction` acknowledgment.
    Ack,

    /// The request failed. Recoverable; the connection stays usable.
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Shorthand for an error response using the code's display text.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A room broadcast, as `{"event": ..., "data": {...}}`.
///
/// Events for one room are delivered to each subscriber in publish order.
/// `roomUpdated` fires alongside every roster or status change as a
/// catch-all for consumers that only want one signal to re-render from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Event {
    /// Someone joined. Not sent to the joiner itself; its own join
    /// arrives in the `roomJoined` response.
    PlayerJoined { player: Player, room: RoomSnapshot },

    /// Someone left. `room` already reflects any host promotion.
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId, room: RoomSnapshot },

    /// The host started the game.
    GameStarted { room: RoomSnapshot },

    /// Generic "the room changed" signal.
    RoomUpdated { room: RoomSnapshot },

    /// A relayed gameplay action, sent to everyone including the sender
    /// so all clients render the action identically.
    #[serde(rename_all = "camelCase")]
    PlayerAction {
        player_id: PlayerId,
        player_name: String,
        action_name: String,
        payload: serde_json::Value,
        timestamp: u64,
    },
}

// =========================================================================
// Tests
// =========================================================================
