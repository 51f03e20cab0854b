//! The connection-facing coordination layer for Quizroom.
//!
//! [`SessionCoordinator`] is the one surface callers interact with: it
//! translates a connection's intent (create, join, start, leave, action)
//! into registry and room-actor calls, keeps the connection → seat index,
//! and owns the broadcaster the room actors publish through.
//!
//! The coordinator is server-authoritative: every role and status field a
//! client sees is derived from room state here, never from what the
//! client believes about itself.

mod coordinator;

pub use coordinator::SessionCoordinator;
