//! Identifier generation.
//!
//! Room ids are short host-shareable tokens (typed into a join url by
//! humans), entity and socket ids are plain UUIDs.

use uuid::Uuid;

/// Generate a room id: 5 random bytes, hex encoded.
///
/// 40 bits of entropy: collisions are negligible at the room counts this
/// server will ever see, while the id stays short enough to share.
pub fn room_id() -> String {
    let bytes: [u8; 5] = rand::random();
    hex::encode(bytes)
}

/// Generate an entity id for a stored record.
pub fn entity_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a connection-handle id for a WebSocket.
pub fn socket_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_is_ten_hex_chars() {
        let id = room_id();
        assert_eq!(id.len(), 10);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_room_ids_are_unique() {
        let a = room_id();
        let b = room_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        assert_ne!(entity_id(), entity_id());
    }
}
