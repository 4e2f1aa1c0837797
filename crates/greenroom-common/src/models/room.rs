//! Room entity: a named signaling scope uniting participants for one call.

use serde::{Deserialize, Serialize};

/// A room record. Created on `create-room`, expired by the store's TTL;
/// never explicitly deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Short host-generated random token, primary key.
    pub id: String,
    /// Display name, set once at creation.
    pub name: String,
    /// Identity id of the creating user. Exactly one host per room,
    /// immutable after creation.
    pub host_uid: String,
    /// Optional display metadata.
    #[serde(default)]
    pub twitch_host_name: Option<String>,
    #[serde(default)]
    pub pod_title: Option<String>,
}
