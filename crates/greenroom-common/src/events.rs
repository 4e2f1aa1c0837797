//! Wire protocol: the closed set of messages exchanged over a signaling
//! connection.
//!
//! Every frame is a JSON envelope `{ "event": "...", "data": { ... } }`.
//! Event names keep the `server:`/`client:` prefixes of the original socket
//! protocol so existing front ends keep working: `server:*` flows
//! client → server, `client:*` flows server → client.
//!
//! SDP blobs and ICE candidates are opaque [`serde_json::Value`]s: the
//! server routes them, it never inspects them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client → Server commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientCommand {
    /// Create a room. `access_token` is the caller's bearer credential.
    #[serde(rename = "server:create-room", rename_all = "camelCase")]
    CreateRoom {
        room_name: String,
        access_token: String,
        #[serde(default)]
        twitch_host_name: Option<String>,
        #[serde(default)]
        pod_title: Option<String>,
    },

    /// Join a room, optionally as an embed of an existing member.
    #[serde(rename = "server:join-room", rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        client_uid: String,
        client_name: String,
        #[serde(default)]
        as_embed: bool,
        #[serde(default)]
        embed_client_uid: Option<String>,
    },

    // === WebRTC peer negotiation ===
    #[serde(rename = "server:send-offer", rename_all = "camelCase")]
    SendOffer { to_client_id: String, sdp_offer: Value },

    #[serde(rename = "server:send-answer", rename_all = "camelCase")]
    SendAnswer {
        to_client_id: String,
        sdp_answer: Value,
    },

    #[serde(rename = "server:send-candidate", rename_all = "camelCase")]
    SendCandidate {
        to_client_id: String,
        ice_candidate: Value,
    },

    // === Host-only access control ===
    #[serde(rename = "server:grant-room-access", rename_all = "camelCase")]
    GrantRoomAccess { to_client_id: String },

    #[serde(rename = "server:deny-room-access", rename_all = "camelCase")]
    DenyRoomAccess { to_client_id: String },

    #[serde(rename = "server:remove-room-access", rename_all = "camelCase")]
    RemoveRoomAccess { to_client_id: String },

    #[serde(rename = "server:mute-participant", rename_all = "camelCase")]
    MuteParticipant { to_client_id: String },
}

/// A roster entry inside [`ServerEvent::RoomJoined`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPeer {
    pub client_uid: String,
    pub client_name: String,
    pub is_host: bool,
    pub is_embed: bool,
    pub is_pending: bool,
}

/// Server → Client events, sent to one connection or to a room group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    // === Room creation ===
    #[serde(rename = "client:room-created", rename_all = "camelCase")]
    RoomCreated {
        room_id: String,
        room_name: String,
        #[serde(default)]
        twitch_host_name: Option<String>,
        #[serde(default)]
        pod_title: Option<String>,
    },

    #[serde(rename = "client:room-creation-unauthorized")]
    RoomCreationRefused,

    #[serde(rename = "client:room-not-found")]
    RoomNotFound,

    // === Join flow ===
    #[serde(rename = "client:room-joined", rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        room_name: String,
        host_uid: String,
        #[serde(default)]
        twitch_host_name: Option<String>,
        #[serde(default)]
        pod_title: Option<String>,
        clients: Vec<RoomPeer>,
    },

    #[serde(rename = "client:room-access-pending", rename_all = "camelCase")]
    RoomAccessPending { room_id: String },

    #[serde(rename = "client:room-access-denied", rename_all = "camelCase")]
    RoomAccessDenied { room_id: String },

    #[serde(rename = "client:room-access-granted", rename_all = "camelCase")]
    RoomAccessGranted { room_id: String },

    #[serde(rename = "client:room-access-removed", rename_all = "camelCase")]
    RoomAccessRemoved { room_id: String },

    /// Sent to the host's connection when someone asks to join.
    #[serde(rename = "client:room-access-required", rename_all = "camelCase")]
    RoomAccessRequired {
        client_id: String,
        client_name: String,
    },

    // === Room membership ===
    #[serde(rename = "client:new-client", rename_all = "camelCase")]
    NewClient {
        client_uid: String,
        client_name: String,
        is_embed: bool,
    },

    #[serde(rename = "client:disconnected", rename_all = "camelCase")]
    ClientDisconnected { client_id: String },

    // === WebRTC peer negotiation ===
    #[serde(rename = "client:new-offer", rename_all = "camelCase")]
    NewOffer { from_client_id: String, sdp_offer: Value },

    #[serde(rename = "client:new-answer", rename_all = "camelCase")]
    NewAnswer {
        from_client_id: String,
        sdp_answer: Value,
    },

    #[serde(rename = "client:new-candidate", rename_all = "camelCase")]
    NewCandidate {
        from_client_id: String,
        ice_candidate: Value,
    },

    // === Moderation ===
    #[serde(rename = "client:mute-audio", rename_all = "camelCase")]
    MuteAudio { room_id: String },
}
