//! Identity and room-state types shared by requests, responses, and events.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// PlayerId
// ---------------------------------------------------------------------------

/// A unique identifier for a player.
///
/// Minted by the room layer when a player is seated (at create or join
/// time) and never reused for the lifetime of the process. Each player
/// identity corresponds to exactly one connection, so this id also serves
/// as the "which connection holds host privilege" marker in
/// [`RoomSnapshot::host_id`].
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as just `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// RoomCode
// ---------------------------------------------------------------------------

/// A human-readable room identifier: exactly four ASCII uppercase letters.
///
/// Codes are what players type to join a friend's room, so parsing is
/// forgiving about case (`"wxtb"` and `"WXTB"` name the same room) but
/// strict about shape: anything that isn't four letters is rejected
/// rather than silently truncated or padded.
///
/// Serialized as a plain string (`"WXTB"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode([u8; 4]);

impl RoomCode {
    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII uppercase letters.
        std::str::from_utf8(&self.0).expect("room codes are ASCII")
    }

    /// Builds a code from four bytes already known to be uppercase
    /// ASCII letters. Not validated: callers generating codes from the
    /// `A..=Z` alphabet use this; user input goes through [`FromStr`].
    pub fn from_letters(letters: [u8; 4]) -> Self {
        debug_assert!(letters.iter().all(u8::is_ascii_uppercase));
        Self(letters)
    }
}

impl FromStr for RoomCode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(ProtocolError::InvalidRoomCode(s.to_string()));
        }
        let mut code = [0u8; 4];
        for (slot, b) in code.iter_mut().zip(bytes) {
            *slot = b.to_ascii_uppercase();
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.as_str().to_string()
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle state of a room.
///
/// Transitions are strictly forward: no transition out of `Finished`,
/// and no way back to `Lobby` once a game has started.
///
/// ```text
/// Lobby → Playing → Finished
/// ```
///
/// Serialized lowercase (`"lobby"`, `"playing"`, `"finished"`), the
/// strings the UI switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Pre-game: players may join, the host may start.
    Lobby,
    /// The game is running; the roster is closed.
    Playing,
    /// Terminal: the game ended.
    Finished,
}

impl RoomStatus {
    /// Returns `true` if new players may be seated.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Lobby)
    }

    /// The next state in the strict ordering, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Lobby => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` respects the ordering.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => f.write_str("lobby"),
            Self::Playing => f.write_str("playing"),
            Self::Finished => f.write_str("finished"),
        }
    }
}

// ---------------------------------------------------------------------------
// Player / RoomSnapshot
// ---------------------------------------------------------------------------

/// A seated player as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Unique per-connection identity.
    pub id: PlayerId,
    /// Display name, 1–20 characters after trimming.
    pub name: String,
    /// Cosmetic display token drawn from a fixed palette at join time.
    pub avatar: String,
    /// Exactly one player per non-empty room has this set.
    pub is_host: bool,
    /// Milliseconds since the Unix epoch; display ordering and the host
    /// promotion order.
    pub joined_at: u64,
}

/// A complete, consistent view of a room's public state.
///
/// Snapshots are produced by the room actor, so a snapshot never shows a
/// half-applied roster change. Clients are expected to treat these as the
/// source of truth rather than patching local copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: RoomCode,
    /// The player currently holding host privilege.
    pub host_id: PlayerId,
    /// Opaque reference to the deck being studied; the coordinator never
    /// looks inside it.
    pub deck_ref: String,
    /// Join order preserved.
    pub players: Vec<Player>,
    pub status: RoomStatus,
    pub created_at: u64,
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// The caller-facing error taxonomy.
///
/// Every failed request maps to one of these; all are recoverable by the
/// caller (show a message, let the user retry). Serialized PascalCase, as
/// the variant names read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The referenced code names no active room.
    RoomNotFound,
    /// The room exists but is no longer in the lobby.
    RoomNotJoinable,
    /// Display name empty after trimming, or over 20 characters.
    InvalidName,
    /// A non-host attempted a host-only operation.
    NotHost,
    /// The room's status does not allow the requested transition.
    InvalidTransition,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RoomNotFound => "RoomNotFound",
            Self::RoomNotJoinable => "RoomNotJoinable",
            Self::InvalidName => "InvalidName",
            Self::NotHost => "NotHost",
            Self::InvalidTransition => "InvalidTransition",
        };
        f.write_str(name)
    }
}

// =========================================================================
// Tests
// =========================================================================
