//! In-memory backend: single-node dev mode and tests.
//!
//! No expiry: records live until the process exits. Query semantics match
//! the Redis backend exactly; the trait default for `mark_offline` applies
//! to both.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use greenroom_common::error::SignalError;
use greenroom_common::models::{Client, Room};

use crate::{ClientStore, RoomStore};

#[derive(Clone, Default)]
pub struct MemoryStore {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
    /// entity_id → Client
    clients: Arc<RwLock<HashMap<String, Client>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryStore {
    async fn create(&self, room: &Room) -> Result<(), SignalError> {
        self.rooms
            .write()
            .await
            .insert(room.id.clone(), room.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Room>, SignalError> {
        Ok(self.rooms.read().await.get(id).cloned())
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn save(&self, client: &Client) -> Result<(), SignalError> {
        self.clients
            .write()
            .await
            .insert(client.entity_id.clone(), client.clone());
        Ok(())
    }

    async fn find_by_socket(&self, socket_id: &str) -> Result<Option<Client>, SignalError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.socket_id.as_deref() == Some(socket_id))
            .cloned())
    }

    async fn find_member(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.room_id == room_id && c.uid == uid && !c.is_pending)
            .cloned())
    }

    async fn find_pending(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .find(|c| c.room_id == room_id && c.uid == uid && c.is_pending)
            .cloned())
    }

    async fn list_members(&self, room_id: &str) -> Result<Vec<Client>, SignalError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.room_id == room_id && !c.is_pending)
            .cloned()
            .collect())
    }

    async fn list_online_members(
        &self,
        room_id: &str,
        exclude_uid: Option<&str>,
    ) -> Result<Vec<Client>, SignalError> {
        Ok(self
            .clients
            .read()
            .await
            .values()
            .filter(|c| c.room_id == room_id && c.is_online && !c.is_pending)
            .filter(|c| exclude_uid != Some(c.uid.as_str()))
            .cloned()
            .collect())
    }

    async fn remove(&self, client: &Client) -> Result<(), SignalError> {
        self.clients.write().await.remove(&client.entity_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_common::id;

    fn room(id: &str, host_uid: &str) -> Room {
        Room {
            id: id.into(),
            name: "Standup".into(),
            host_uid: host_uid.into(),
            twitch_host_name: None,
            pod_title: None,
        }
    }

    fn client(room_id: &str, uid: &str) -> Client {
        Client {
            entity_id: id::entity_id(),
            uid: uid.into(),
            name: uid.to_uppercase(),
            room_id: room_id.into(),
            socket_id: Some(format!("sock-{uid}")),
            is_host: false,
            is_embed: false,
            is_online: true,
            is_pending: false,
            embedded_client_uid: None,
        }
    }

    #[tokio::test]
    async fn test_room_create_and_get() {
        let store = MemoryStore::new();
        store.create(&room("abc", "u1")).await.expect("create");
        let found = store.get("abc").await.expect("get").expect("room exists");
        assert_eq!(found.host_uid, "u1");
        assert!(store.get("nope").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_find_member_skips_pending_rows() {
        let store = MemoryStore::new();
        let mut pending = client("r1", "u2");
        pending.is_pending = true;
        store.save(&pending).await.expect("save");

        assert!(store.find_member("r1", "u2").await.expect("find").is_none());
        assert!(store
            .find_pending("r1", "u2")
            .await
            .expect("find")
            .is_some());
    }

    #[tokio::test]
    async fn test_find_by_socket_resolves_identity() {
        let store = MemoryStore::new();
        let c = client("r1", "u1");
        store.save(&c).await.expect("save");

        let found = store
            .find_by_socket("sock-u1")
            .await
            .expect("find")
            .expect("bound");
        assert_eq!(found.uid, "u1");
        assert!(store.find_by_socket("sock-??").await.expect("find").is_none());
    }

    #[tokio::test]
    async fn test_list_online_members_excludes_joiner() {
        let store = MemoryStore::new();
        store.save(&client("r1", "u1")).await.expect("save");
        store.save(&client("r1", "u2")).await.expect("save");
        let mut offline = client("r1", "u3");
        offline.is_online = false;
        offline.socket_id = None;
        store.save(&offline).await.expect("save");

        let roster = store
            .list_online_members("r1", Some("u2"))
            .await
            .expect("list");
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].uid, "u1");
    }

    #[tokio::test]
    async fn test_mark_offline_keeps_member_row() {
        let store = MemoryStore::new();
        let c = client("r1", "u1");
        store.save(&c).await.expect("save");
        store.mark_offline(&c).await.expect("mark offline");

        let kept = store
            .find_member("r1", "u1")
            .await
            .expect("find")
            .expect("row kept");
        assert!(!kept.is_online);
        assert!(kept.socket_id.is_none());
    }

    #[tokio::test]
    async fn test_mark_offline_deletes_pending_row() {
        let store = MemoryStore::new();
        let mut pending = client("r1", "u2");
        pending.is_pending = true;
        store.save(&pending).await.expect("save");
        store.mark_offline(&pending).await.expect("mark offline");

        assert!(store
            .find_pending("r1", "u2")
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn test_save_updates_in_place() {
        let store = MemoryStore::new();
        let mut c = client("r1", "u1");
        store.save(&c).await.expect("save");

        c.name = "Renamed".into();
        c.socket_id = Some("sock-new".into());
        store.save(&c).await.expect("save");

        let members = store.list_members("r1").await.expect("list");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "Renamed");
        assert_eq!(members[0].socket_id.as_deref(), Some("sock-new"));
    }
}
