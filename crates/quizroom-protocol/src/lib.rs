//! Wire contract for Quizroom.
//!
//! This crate defines everything that crosses the boundary between the
//! coordinator and its clients:
//!
//! - **Identity and room types** ([`PlayerId`], [`RoomCode`], [`Player`],
//!   [`RoomSnapshot`], [`RoomStatus`]) — the shapes that appear inside
//!   requests, responses, and broadcast events.
//! - **Messages** ([`Request`], [`Response`], [`Event`]) — the three
//!   message families of the protocol, with their exact JSON layout.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages are
//!   converted to and from bytes.
//! - **Errors** ([`ProtocolError`], and the caller-facing [`ErrorCode`]
//!   taxonomy).
//!
//! The protocol layer knows nothing about connections, subscriptions, or
//! room actors; it only describes data. Field names are camelCase on the
//! wire because the consuming UI is JavaScript.

mod codec;
mod error;
mod types;
mod wire;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{ErrorCode, Player, PlayerId, RoomCode, RoomSnapshot, RoomStatus};
pub use wire::{Event, Request, Response};
