//! # Quizroom
//!
//! Real-time room coordination backend for multiplayer study sessions.
//!
//! Quizroom manages the lobby layer of a study-session game: rooms with
//! 4-letter codes, host and player roles, the lobby → playing → finished
//! lifecycle, and fan-out of room events to every connected client. What
//! happens *inside* a game (decks, cards, scoring) stays with the
//! caller; this crate coordinates who is in which room, who may start
//! it, and who hears about what.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizroom::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), QuizroomError> {
//!     let server = QuizroomServerBuilder::new()
//!         .bind("0.0.0.0:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```

mod error;
mod handler;
mod server;

pub use error::QuizroomError;
pub use server::{QuizroomServer, QuizroomServerBuilder};

/// Installs a process-wide tracing subscriber honoring `RUST_LOG`.
///
/// Convenience for server binaries; call once at startup. Library users
/// embedding the server install their own subscriber instead.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// One-stop imports for server binaries and integration tests.
pub mod prelude {
    pub use crate::{QuizroomError, QuizroomServer, QuizroomServerBuilder};
    pub use quizroom_protocol::{
        ErrorCode, Event, Player, PlayerId, Request, Response, RoomCode, RoomSnapshot,
        RoomStatus,
    };
    pub use quizroom_session::SessionCoordinator;
}
