//! Display-name rules and the avatar palette.

use rand::Rng;

use crate::RoomError;

/// Maximum display-name length, counted in characters after trimming.
pub const MAX_NAME_CHARS: usize = 20;

/// The avatar every host gets.
pub(crate) const HOST_AVATAR: &str = "👨‍🏫";

/// Palette for joining players. Purely cosmetic; collisions are fine.
const AVATARS: &[&str] = &[
    "😀", "😎", "🤓", "🥳", "🤩", "😇", "🤗", "🦄", "🐱", "🐶", "🦊", "🐼",
];

/// Validates a user-supplied display name and returns the trimmed form.
///
/// # Errors
/// Returns [`RoomError::InvalidName`] if the name is empty after trimming
/// or longer than [`MAX_NAME_CHARS`] characters.
pub fn validate_display_name(raw: &str) -> Result<String, RoomError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RoomError::InvalidName("name is empty".into()));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(RoomError::InvalidName(format!(
            "name exceeds {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Picks a random avatar from the palette.
pub(crate) fn random_avatar() -> String {
    let mut rng = rand::rng();
    AVATARS[rng.random_range(0..AVATARS.len())].to_string()
}
