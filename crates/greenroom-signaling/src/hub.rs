//! Connection hub: the transport-group primitive the session handler
//! drives.
//!
//! Tracks every live WebSocket's outbound channel and the room-keyed
//! multicast groups. The hub knows nothing about membership rules; the
//! Client registry stays the source of truth for "who is online", the hub
//! only answers "which connections currently receive this room's
//! broadcasts".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use greenroom_common::events::ServerEvent;

/// Shared registry of connections and room groups.
#[derive(Clone, Default)]
pub struct ConnectionHub {
    /// socket_id → outbound event channel
    connections: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<ServerEvent>>>>,
    /// room_id → set of socket_ids in the room's multicast group
    rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted connection.
    pub async fn register(&self, socket_id: &str, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.connections
            .write()
            .await
            .insert(socket_id.to_string(), tx);
    }

    /// Drop a connection and pull it out of every group.
    pub async fn unregister(&self, socket_id: &str) {
        self.connections.write().await.remove(socket_id);
        let mut rooms = self.rooms.write().await;
        for members in rooms.values_mut() {
            members.remove(socket_id);
        }
        rooms.retain(|_, members| !members.is_empty());
    }

    /// Add a connection to a room's multicast group.
    pub async fn join_room(&self, room_id: &str, socket_id: &str) {
        self.rooms
            .write()
            .await
            .entry(room_id.to_string())
            .or_default()
            .insert(socket_id.to_string());
    }

    /// Remove a connection from a room's multicast group.
    pub async fn leave_room(&self, room_id: &str, socket_id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room_id) {
            members.remove(socket_id);
            if members.is_empty() {
                rooms.remove(room_id);
            }
        }
    }

    /// Emit to one connection. Returns false when the connection is gone;
    /// the caller decides whether that is worth logging.
    pub async fn emit(&self, socket_id: &str, event: ServerEvent) -> bool {
        match self.connections.read().await.get(socket_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Emit to every connection in a room's group.
    pub async fn emit_to_room(&self, room_id: &str, event: ServerEvent) {
        self.emit_to_room_except(room_id, None, event).await;
    }

    /// Emit to every connection in a room's group except one.
    pub async fn emit_to_room_except(
        &self,
        room_id: &str,
        except_socket: Option<&str>,
        event: ServerEvent,
    ) {
        let members: Vec<String> = match self.rooms.read().await.get(room_id) {
            Some(members) => members
                .iter()
                .filter(|s| Some(s.as_str()) != except_socket)
                .cloned()
                .collect(),
            None => return,
        };

        let connections = self.connections.read().await;
        for socket_id in members {
            if let Some(tx) = connections.get(&socket_id) {
                let _ = tx.send(event.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn register(hub: &ConnectionHub, socket_id: &str) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.register(socket_id, tx).await;
        rx
    }

    fn ping(room_id: &str) -> ServerEvent {
        ServerEvent::MuteAudio {
            room_id: room_id.into(),
        }
    }

    #[tokio::test]
    async fn test_emit_reaches_only_the_target() {
        let hub = ConnectionHub::new();
        let mut a = register(&hub, "a").await;
        let mut b = register(&hub, "b").await;

        assert!(hub.emit("a", ping("r")).await);
        assert_eq!(a.recv().await, Some(ping("r")));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_emit_to_unknown_socket_returns_false() {
        let hub = ConnectionHub::new();
        assert!(!hub.emit("ghost", ping("r")).await);
    }

    #[tokio::test]
    async fn test_room_broadcast_excludes_sender() {
        let hub = ConnectionHub::new();
        let mut a = register(&hub, "a").await;
        let mut b = register(&hub, "b").await;
        let mut c = register(&hub, "c").await;
        hub.join_room("r", "a").await;
        hub.join_room("r", "b").await;
        hub.join_room("r", "c").await;

        hub.emit_to_room_except("r", Some("a"), ping("r")).await;
        assert!(a.try_recv().is_err());
        assert_eq!(b.recv().await, Some(ping("r")));
        assert_eq!(c.recv().await, Some(ping("r")));
    }

    #[tokio::test]
    async fn test_leave_room_stops_broadcasts() {
        let hub = ConnectionHub::new();
        let mut a = register(&hub, "a").await;
        hub.join_room("r", "a").await;
        hub.leave_room("r", "a").await;

        hub.emit_to_room("r", ping("r")).await;
        assert!(a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_removes_from_groups() {
        let hub = ConnectionHub::new();
        let mut a = register(&hub, "a").await;
        let mut b = register(&hub, "b").await;
        hub.join_room("r", "a").await;
        hub.join_room("r", "b").await;

        hub.unregister("a").await;
        hub.emit_to_room("r", ping("r")).await;
        assert!(a.try_recv().is_err());
        assert_eq!(b.recv().await, Some(ping("r")));
    }
}
