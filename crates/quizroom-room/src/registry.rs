//! Room registry: code generation and the code → handle map.

use std::collections::HashMap;
use std::sync::Arc;

use quizroom_broadcast::EventBroadcaster;
use quizroom_protocol::{Player, RoomCode, RoomSnapshot};
use quizroom_transport::ConnectionId;
use rand::Rng;

use crate::room::{mint_player_id, now_millis, spawn_room};
use crate::{RoomError, RoomHandle, roster};

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Room codes draw from the 26 uppercase letters.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Owns every active room: creation (with collision-checked code
/// generation), lookup, and removal. Purely in-memory; rooms live and
/// die with the process.
///
/// The registry itself is not thread-safe. The coordinator keeps it
/// behind a lock and holds that lock only for map access, never while a
/// room command is in flight.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomHandle>,
    broadcaster: Arc<EventBroadcaster>,
}

impl RoomRegistry {
    /// Creates an empty registry publishing through `broadcaster`.
    pub fn new(broadcaster: Arc<EventBroadcaster>) -> Self {
        Self {
            rooms: HashMap::new(),
            broadcaster,
        }
    }

    /// Creates a room hosted by `host_conn` and returns the host's seat
    /// and the initial snapshot.
    ///
    /// The creating connection is subscribed to the new code before this
    /// returns; no broadcast is emitted (nobody else is subscribed yet).
    ///
    /// # Errors
    /// Returns [`RoomError::InvalidName`] for a bad host name.
    pub fn create_room(
        &mut self,
        host_conn: ConnectionId,
        deck_ref: &str,
        host_name: &str,
    ) -> Result<(Player, RoomSnapshot), RoomError> {
        let name = roster::validate_display_name(host_name)?;
        let code = self.generate_code();
        let now = now_millis();

        let host = Player {
            id: mint_player_id(),
            name,
            avatar: roster::HOST_AVATAR.to_string(),
            is_host: true,
            joined_at: now,
        };
        let snapshot = RoomSnapshot {
            code,
            host_id: host.id,
            deck_ref: deck_ref.to_string(),
            players: vec![host.clone()],
            status: quizroom_protocol::RoomStatus::Lobby,
            created_at: now,
        };

        let handle = spawn_room(
            code,
            deck_ref.to_string(),
            host_conn,
            host.clone(),
            now,
            Arc::clone(&self.broadcaster),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(code, handle);
        self.broadcaster.subscribe(host_conn, code);

        tracing::info!(%code, host_id = %host.id, "room created");
        Ok((host, snapshot))
    }

    /// Looks up a room by code.
    ///
    /// # Errors
    /// Returns [`RoomError::RoomNotFound`] if no active room has `code`.
    pub fn get(&self, code: RoomCode) -> Result<&RoomHandle, RoomError> {
        self.rooms.get(&code).ok_or(RoomError::RoomNotFound(code))
    }

    /// Removes a room from the registry. No-op if already absent.
    pub fn remove(&mut self, code: RoomCode) {
        if self.rooms.remove(&code).is_some() {
            tracing::info!(%code, "room removed");
        }
    }

    /// Returns `true` if a room with this code is active.
    pub fn contains(&self, code: RoomCode) -> bool {
        self.rooms.contains_key(&code)
    }

    /// Number of active rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Returns `true` if no rooms are active.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Codes of all active rooms.
    pub fn codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().copied().collect()
    }

    /// Cloned handles to all active rooms, for callers that need to talk
    /// to rooms without holding the registry lock.
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.values().cloned().collect()
    }

    /// Draws 4-letter codes until one misses every active room.
    ///
    /// With 26^4 ≈ 457k combinations and a handful of live rooms, the
    /// retry loop terminates almost immediately.
    fn generate_code(&self) -> RoomCode {
        let mut rng = rand::rng();
        loop {
            let mut letters = [0u8; 4];
            for slot in &mut letters {
                *slot = CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())];
            }
            let code = RoomCode::from_letters(letters);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}
