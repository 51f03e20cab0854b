//! Error types for the room layer.

use quizroom_protocol::{ErrorCode, RoomCode, RoomStatus};
use quizroom_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No active room has this code.
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    /// The given text cannot be a room code at all (wrong shape).
    /// Indistinguishable from an unknown code as far as clients care.
    #[error("no room matches {0:?}")]
    InvalidCode(String),

    /// The room exists but is past the lobby stage.
    #[error("room {0} has already started")]
    RoomNotJoinable(RoomCode),

    /// Display name empty after trimming, or over the length limit.
    #[error("invalid display name: {0}")]
    InvalidName(String),

    /// A player other than the host attempted a host-only operation.
    #[error("room {0}: only the host can start the game")]
    NotHost(RoomCode),

    /// The room's status does not allow the requested transition.
    #[error("room {0}: cannot go from {1} to {2}")]
    InvalidTransition(RoomCode, RoomStatus, RoomStatus),

    /// The connection already holds a seat in this room.
    #[error("connection {0} is already seated in room {1}")]
    AlreadySeated(ConnectionId, RoomCode),

    /// The connection holds no seat in any room, but the operation
    /// needs one (e.g. `startGame` with no current room).
    #[error("connection {0} is not in any room")]
    NotInRoom(ConnectionId),

    /// The room's command channel is closed; the actor is gone.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}

impl RoomError {
    /// The wire-level error code this maps to.
    ///
    /// `AlreadySeated` and `Unavailable` are internal shades of meaning
    /// the wire taxonomy doesn't carry: a double-seat rejection reads as
    /// "room not joinable" to the client, and a vanished actor reads as
    /// "room not found".
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RoomNotFound(_) | Self::InvalidCode(_) => ErrorCode::RoomNotFound,
            Self::RoomNotJoinable(_) => ErrorCode::RoomNotJoinable,
            Self::InvalidName(_) => ErrorCode::InvalidName,
            Self::NotHost(_) => ErrorCode::NotHost,
            Self::InvalidTransition(..) => ErrorCode::InvalidTransition,
            Self::AlreadySeated(..) => ErrorCode::RoomNotJoinable,
            Self::NotInRoom(_) => ErrorCode::RoomNotFound,
            Self::Unavailable(_) => ErrorCode::RoomNotFound,
        }
    }
}
