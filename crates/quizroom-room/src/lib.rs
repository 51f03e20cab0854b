//! Room lifecycle for Quizroom.
//!
//! Every room runs as an isolated Tokio task (actor model) owning its
//! roster, status, and host designation. All mutation of one room is
//! serialized through the actor's command channel, so two racing joins
//! can never clobber each other's roster append, while different rooms
//! run fully in parallel. The actor also publishes that room's broadcast
//! events, which makes per-room delivery order FIFO by construction.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — creates rooms, generates unique codes, owns the
//!   code → handle map
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomError`] — everything a room operation can reject
//! - [`LeaveOutcome`] — what a leave did (including "room is now empty")

mod error;
mod registry;
mod room;
mod roster;

pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{LeaveOutcome, RoomHandle, RoomInfo};
pub use roster::{MAX_NAME_CHARS, validate_display_name};
