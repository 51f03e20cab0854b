//! Unified error type for the Quizroom server.

use quizroom_protocol::ProtocolError;
use quizroom_room::RoomError;
use quizroom_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Callers of the `quizroom` meta-crate deal with this single type; the
/// `#[from]` attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum QuizroomError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (not found, not joinable, not host, ...).
    #[error(transparent)]
    Room(#[from] RoomError),
}
