//! # greenroom-store
//!
//! Entity store adapter for Greenroom. The signaling layer talks to the two
//! repositories defined here and never to a concrete backend:
//!
//! - **Redis**: production backend: JSON values with per-key expiry plus
//!   small index keys for the secondary lookups the protocol needs.
//! - **Memory**: single-node dev mode and tests.
//!
//! The store is deliberately dumb: no transactions, no cross-key atomicity.
//! The signaling layer serializes read-check-write sequences per room.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use greenroom_common::error::SignalError;
use greenroom_common::models::{Client, Room};

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Room repository. Rooms are created once and left to expire; no update or
/// delete surface exists.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Persist a freshly created room with the configured expiry.
    async fn create(&self, room: &Room) -> Result<(), SignalError>;

    /// Fetch a room by id.
    async fn get(&self, id: &str) -> Result<Option<Room>, SignalError>;
}

/// Client repository: participant membership rows scoped to a room.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Create-or-update by entity id, refreshing the row's expiry.
    async fn save(&self, client: &Client) -> Result<(), SignalError>;

    /// Resolve "who is this connection" from a transport handle id.
    async fn find_by_socket(&self, socket_id: &str) -> Result<Option<Client>, SignalError>;

    /// The non-pending row for `(uid, room_id)`, if any.
    async fn find_member(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError>;

    /// The pending row for `(uid, room_id)`, if any.
    async fn find_pending(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError>;

    /// All non-pending rows in a room.
    async fn list_members(&self, room_id: &str) -> Result<Vec<Client>, SignalError>;

    /// Online, non-pending rows in a room, excluding `exclude_uid` when set.
    /// Used to build the join-roster snapshot.
    async fn list_online_members(
        &self,
        room_id: &str,
        exclude_uid: Option<&str>,
    ) -> Result<Vec<Client>, SignalError>;

    /// Hard delete: deny-access and kick.
    async fn remove(&self, client: &Client) -> Result<(), SignalError>;

    /// Disconnect bookkeeping: a pending row is deleted (an abandoned access
    /// request has no value once its connection drops), a member row is kept
    /// offline so a re-join can restore its role.
    async fn mark_offline(&self, client: &Client) -> Result<(), SignalError> {
        if client.is_pending {
            self.remove(client).await
        } else {
            let mut offline = client.clone();
            offline.is_online = false;
            offline.socket_id = None;
            self.save(&offline).await
        }
    }
}
