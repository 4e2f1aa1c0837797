//! Redis backend.
//!
//! Key layout:
//! - `room:{id}`: room record as JSON, EXPIREd.
//! - `client:{entity_id}`: client record as JSON, EXPIREd.
//! - `room-clients:{room_id}`: SET of client entity ids, EXPIREd alongside.
//! - `client-socket:{socket_id}`: entity id of the client bound to that
//!   connection handle.
//!
//! Index entries can outlive or lag their records (expiry, socket rebinds);
//! every read re-checks the loaded record against the query and prunes
//! stale entries lazily.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use greenroom_common::error::SignalError;
use greenroom_common::models::{Client, Room};

use crate::{ClientStore, RoomStore};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisStore {
    /// Connect to Redis. `ttl_secs` is applied to every entity key.
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, SignalError> {
        tracing::info!("Connecting to Redis...");
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis");
        Ok(Self { conn, ttl_secs })
    }

    fn room_key(id: &str) -> String {
        format!("room:{id}")
    }

    fn client_key(entity_id: &str) -> String {
        format!("client:{entity_id}")
    }

    fn room_clients_key(room_id: &str) -> String {
        format!("room-clients:{room_id}")
    }

    fn socket_key(socket_id: &str) -> String {
        format!("client-socket:{socket_id}")
    }

    async fn load_client(&self, entity_id: &str) -> Result<Option<Client>, SignalError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::client_key(entity_id)).await?;
        match raw {
            Some(json) => Ok(Some(decode(&json)?)),
            None => Ok(None),
        }
    }

    /// Load every live client row of a room, pruning entity ids whose
    /// record has expired out from under the index set.
    async fn load_room_clients(&self, room_id: &str) -> Result<Vec<Client>, SignalError> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(Self::room_clients_key(room_id)).await?;

        let mut clients = Vec::with_capacity(ids.len());
        for entity_id in ids {
            match self.load_client(&entity_id).await? {
                Some(client) => clients.push(client),
                None => {
                    let _: () = conn
                        .srem(Self::room_clients_key(room_id), &entity_id)
                        .await?;
                }
            }
        }
        Ok(clients)
    }
}

#[async_trait]
impl RoomStore for RedisStore {
    async fn create(&self, room: &Room) -> Result<(), SignalError> {
        let mut conn = self.conn.clone();
        let json = encode(room)?;
        let _: () = conn.set_ex(Self::room_key(&room.id), json, self.ttl_secs).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Room>, SignalError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::room_key(id)).await?;
        match raw {
            Some(json) => Ok(Some(decode(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClientStore for RedisStore {
    async fn save(&self, client: &Client) -> Result<(), SignalError> {
        let mut conn = self.conn.clone();
        let json = encode(client)?;
        let _: () = conn
            .set_ex(Self::client_key(&client.entity_id), json, self.ttl_secs)
            .await?;

        let set_key = Self::room_clients_key(&client.room_id);
        let _: () = conn.sadd(&set_key, &client.entity_id).await?;
        let _: () = conn.expire(&set_key, self.ttl_secs as i64).await?;

        if let Some(socket_id) = &client.socket_id {
            let _: () = conn
                .set_ex(Self::socket_key(socket_id), &client.entity_id, self.ttl_secs)
                .await?;
        }
        Ok(())
    }

    async fn find_by_socket(&self, socket_id: &str) -> Result<Option<Client>, SignalError> {
        let mut conn = self.conn.clone();
        let entity_id: Option<String> = conn.get(Self::socket_key(socket_id)).await?;
        let Some(entity_id) = entity_id else {
            return Ok(None);
        };

        match self.load_client(&entity_id).await? {
            Some(client) if client.socket_id.as_deref() == Some(socket_id) => Ok(Some(client)),
            _ => {
                // Rebind or expiry left a stale pointer behind
                let _: () = conn.del(Self::socket_key(socket_id)).await?;
                Ok(None)
            }
        }
    }

    async fn find_member(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError> {
        let clients = self.load_room_clients(room_id).await?;
        Ok(clients
            .into_iter()
            .find(|c| c.uid == uid && !c.is_pending))
    }

    async fn find_pending(&self, room_id: &str, uid: &str) -> Result<Option<Client>, SignalError> {
        let clients = self.load_room_clients(room_id).await?;
        Ok(clients.into_iter().find(|c| c.uid == uid && c.is_pending))
    }

    async fn list_members(&self, room_id: &str) -> Result<Vec<Client>, SignalError> {
        let clients = self.load_room_clients(room_id).await?;
        Ok(clients.into_iter().filter(|c| !c.is_pending).collect())
    }

    async fn list_online_members(
        &self,
        room_id: &str,
        exclude_uid: Option<&str>,
    ) -> Result<Vec<Client>, SignalError> {
        let clients = self.load_room_clients(room_id).await?;
        Ok(clients
            .into_iter()
            .filter(|c| c.is_online && !c.is_pending)
            .filter(|c| exclude_uid != Some(c.uid.as_str()))
            .collect())
    }

    async fn remove(&self, client: &Client) -> Result<(), SignalError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(Self::client_key(&client.entity_id)).await?;
        let _: () = conn
            .srem(Self::room_clients_key(&client.room_id), &client.entity_id)
            .await?;
        if let Some(socket_id) = &client.socket_id {
            let _: () = conn.del(Self::socket_key(socket_id)).await?;
        }
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, SignalError> {
    serde_json::to_string(value).map_err(|e| SignalError::Internal(e.into()))
}

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, SignalError> {
    serde_json::from_str(json).map_err(|e| SignalError::Internal(e.into()))
}
