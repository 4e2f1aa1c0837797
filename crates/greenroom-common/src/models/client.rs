//! Client entity: a participant's membership record, distinct from the
//! transport connection carrying it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Effective membership identity inside a room.
///
/// An embed is a secondary, view-only presence mirroring an existing
/// participant, so one underlying user can hold a full presence and one or
/// more embed presences simultaneously. The composite key keeps those rows
/// from colliding. On the wire the key reads `owner` or `owner+source`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    /// Identity id of the underlying user.
    pub owner_uid: String,
    /// For embeds, the uid of the source client being mirrored.
    pub embed_source_uid: Option<String>,
}

impl ClientKey {
    /// Key for a full participant.
    pub fn user(owner_uid: impl Into<String>) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            embed_source_uid: None,
        }
    }

    /// Key for an embed presence mirroring `source_uid`.
    pub fn embed(owner_uid: impl Into<String>, source_uid: impl Into<String>) -> Self {
        Self {
            owner_uid: owner_uid.into(),
            embed_source_uid: Some(source_uid.into()),
        }
    }

    pub fn is_embed(&self) -> bool {
        self.embed_source_uid.is_some()
    }

    /// Parse a stored key back into its parts.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('+') {
            Some((owner, source)) => Self::embed(owner, source),
            None => Self::user(raw),
        }
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.embed_source_uid {
            Some(source) => write!(f, "{}+{}", self.owner_uid, source),
            None => write!(f, "{}", self.owner_uid),
        }
    }
}

/// A participant's membership/presence row.
///
/// Invariants:
/// - at most one non-pending row per `(uid, room_id)`;
/// - `socket_id` is non-null iff `is_online`;
/// - `is_pending` and `is_online` are mutually exclusive in steady state
///   (a pending row is online only while its access request is in flight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Store-generated primary key.
    pub entity_id: String,
    /// Effective membership key (composite for embeds), unique per room.
    pub uid: String,
    /// Display name; for embeds, copied from the source client.
    pub name: String,
    pub room_id: String,
    /// Currently bound connection handle, or None when offline.
    #[serde(default)]
    pub socket_id: Option<String>,
    pub is_host: bool,
    pub is_embed: bool,
    pub is_online: bool,
    pub is_pending: bool,
    /// When `is_embed`, the uid of the source client being embedded.
    #[serde(default)]
    pub embedded_client_uid: Option<String>,
}

impl Client {
    /// The structured membership key for this row.
    pub fn key(&self) -> ClientKey {
        ClientKey::parse(&self.uid)
    }
}
