//! Per-connection session handler.
//!
//! One `Session` drives one connected participant through
//! create / join / access-control / negotiate / disconnect. It is the only
//! place that mutates Room and Client rows, and it serializes every
//! read-check-write sequence through the per-room lock. Outbound traffic
//! goes through the [`ConnectionHub`](crate::hub::ConnectionHub); inbound
//! commands arrive one at a time from the connection's receive loop, so a
//! session is a sequential actor.

use std::sync::Arc;

use greenroom_common::error::SignalError;
use greenroom_common::events::{ClientCommand, RoomPeer, ServerEvent};
use greenroom_common::id;
use greenroom_common::models::{Client, ClientKey, Room};

use crate::relay::{self, RelayPayload};
use crate::SignalingState;

pub struct Session {
    state: Arc<SignalingState>,
    socket_id: String,
    /// Room this connection has joined, carried explicitly in session state
    /// rather than derived from transport-group membership.
    room_id: Option<String>,
}

impl Session {
    pub fn new(state: Arc<SignalingState>, socket_id: String) -> Self {
        Self {
            state,
            socket_id,
            room_id: None,
        }
    }

    /// Dispatch one inbound command. Store or provider failures abandon the
    /// operation without emitting anything and without touching the
    /// connection; the next command runs normally.
    pub async fn handle(&mut self, command: ClientCommand) {
        let result = match command {
            ClientCommand::CreateRoom {
                room_name,
                access_token,
                twitch_host_name,
                pod_title,
            } => {
                self.on_create_room(room_name, access_token, twitch_host_name, pod_title)
                    .await
            }
            ClientCommand::JoinRoom {
                room_id,
                client_uid,
                client_name,
                as_embed,
                embed_client_uid,
            } => {
                self.on_join_room(room_id, client_uid, client_name, as_embed, embed_client_uid)
                    .await
            }
            ClientCommand::SendOffer {
                to_client_id,
                sdp_offer,
            } => {
                relay::forward(
                    &self.state,
                    &self.socket_id,
                    &to_client_id,
                    RelayPayload::Offer(sdp_offer),
                )
                .await
            }
            ClientCommand::SendAnswer {
                to_client_id,
                sdp_answer,
            } => {
                relay::forward(
                    &self.state,
                    &self.socket_id,
                    &to_client_id,
                    RelayPayload::Answer(sdp_answer),
                )
                .await
            }
            ClientCommand::SendCandidate {
                to_client_id,
                ice_candidate,
            } => {
                relay::forward(
                    &self.state,
                    &self.socket_id,
                    &to_client_id,
                    RelayPayload::Candidate(ice_candidate),
                )
                .await
            }
            ClientCommand::GrantRoomAccess { to_client_id } => {
                self.on_grant_access(to_client_id).await
            }
            ClientCommand::DenyRoomAccess { to_client_id } => self.on_deny_access(to_client_id).await,
            ClientCommand::RemoveRoomAccess { to_client_id } => {
                self.on_remove_access(to_client_id).await
            }
            ClientCommand::MuteParticipant { to_client_id } => self.on_mute(to_client_id).await,
        };

        if let Err(error) = result {
            tracing::warn!(
                socket = %self.socket_id,
                code = error.error_code(),
                %error,
                "Command abandoned"
            );
        }
    }

    async fn emit(&self, event: ServerEvent) {
        self.state.hub.emit(&self.socket_id, event).await;
    }

    // === create-room ===

    async fn on_create_room(
        &mut self,
        room_name: String,
        access_token: String,
        twitch_host_name: Option<String>,
        pod_title: Option<String>,
    ) -> Result<(), SignalError> {
        let user = match self.state.identity.resolve_token(&access_token).await {
            Ok(user) => user,
            Err(SignalError::InvalidToken) => {
                tracing::debug!(socket = %self.socket_id, "Room creation with unresolvable credential");
                self.emit(ServerEvent::RoomCreationRefused).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !self.state.identity.room_creation_allowed(&user).await? {
            tracing::info!(user = %user.id, "Room creation refused by subscription policy");
            self.emit(ServerEvent::RoomCreationRefused).await;
            return Ok(());
        }

        let room = Room {
            id: id::room_id(),
            name: room_name,
            host_uid: user.id,
            twitch_host_name,
            pod_title,
        };
        self.state.rooms.create(&room).await?;

        tracing::info!(room = %room.id, name = %room.name, host = %room.host_uid, "Room created");
        self.emit(ServerEvent::RoomCreated {
            room_id: room.id,
            room_name: room.name,
            twitch_host_name: room.twitch_host_name,
            pod_title: room.pod_title,
        })
        .await;
        Ok(())
    }

    // === join-room ===

    async fn on_join_room(
        &mut self,
        room_id: String,
        client_uid: String,
        client_name: String,
        as_embed: bool,
        embed_client_uid: Option<String>,
    ) -> Result<(), SignalError> {
        let Some(room) = self.state.rooms.get(&room_id).await? else {
            self.emit(ServerEvent::RoomNotFound).await;
            return Ok(());
        };

        // Provider call stays outside the room lock.
        let Some(user) = self.state.identity.lookup_user(&client_uid).await? else {
            tracing::debug!(room = %room_id, uid = %client_uid, "Join with unknown identity");
            self.emit(ServerEvent::RoomAccessDenied { room_id }).await;
            return Ok(());
        };

        let _guard = self.state.locks.acquire(&room_id).await;

        // A pending request already exists: a double-click or reconnect
        // storm must not spawn another one.
        if self
            .state
            .clients
            .find_pending(&room_id, &user.id)
            .await?
            .is_some()
        {
            self.emit(ServerEvent::RoomAccessPending { room_id }).await;
            return Ok(());
        }

        let is_authorized = user.id == room.host_uid
            || self
                .state
                .clients
                .find_member(&room_id, &user.id)
                .await?
                .is_some();

        if !is_authorized {
            // Access cannot be bootstrapped through an embed.
            if as_embed {
                self.emit(ServerEvent::RoomAccessDenied { room_id }).await;
                return Ok(());
            }
            return self.park_pending(&room, user.id, client_name).await;
        }

        // An embed mirrors an existing member: the source must exist and
        // lends the embed its display name.
        let (key, effective_name) = if as_embed {
            let Some(source_uid) = embed_client_uid.as_deref() else {
                self.emit(ServerEvent::RoomAccessDenied { room_id }).await;
                return Ok(());
            };
            let Some(source) = self.state.clients.find_member(&room_id, source_uid).await? else {
                tracing::debug!(room = %room_id, source = %source_uid, "Embed source not in room");
                self.emit(ServerEvent::RoomAccessDenied { room_id }).await;
                return Ok(());
            };
            (ClientKey::embed(&user.id, source_uid), source.name)
        } else {
            (ClientKey::user(&user.id), client_name)
        };

        self.state.hub.join_room(&room_id, &self.socket_id).await;
        self.room_id = Some(room_id.clone());

        let uid = key.to_string();
        let is_host = user.id == room.host_uid
            || key.embed_source_uid.as_deref() == Some(room.host_uid.as_str());

        match self.state.clients.find_member(&room_id, &uid).await? {
            Some(mut existing) => {
                existing.name = effective_name.clone();
                existing.socket_id = Some(self.socket_id.clone());
                existing.is_online = true;
                existing.is_host = is_host;
                existing.is_embed = as_embed;
                self.state.clients.save(&existing).await?;
            }
            None => {
                let fresh = Client {
                    entity_id: id::entity_id(),
                    uid: uid.clone(),
                    name: effective_name.clone(),
                    room_id: room_id.clone(),
                    socket_id: Some(self.socket_id.clone()),
                    is_host,
                    is_embed: as_embed,
                    is_online: true,
                    is_pending: false,
                    embedded_client_uid: key.embed_source_uid.clone(),
                };
                self.state.clients.save(&fresh).await?;
            }
        }

        let roster = self
            .state
            .clients
            .list_online_members(&room_id, Some(&uid))
            .await?;

        self.emit(ServerEvent::RoomJoined {
            room_id: room_id.clone(),
            room_name: room.name.clone(),
            host_uid: room.host_uid.clone(),
            twitch_host_name: room.twitch_host_name.clone(),
            pod_title: room.pod_title.clone(),
            clients: roster
                .into_iter()
                .map(|c| RoomPeer {
                    client_uid: c.uid,
                    client_name: c.name,
                    is_host: c.is_host,
                    is_embed: c.is_embed,
                    is_pending: c.is_pending,
                })
                .collect(),
        })
        .await;

        // Peers start WebRTC negotiation with the newcomer off this event.
        self.state
            .hub
            .emit_to_room_except(
                &room_id,
                Some(&self.socket_id),
                ServerEvent::NewClient {
                    client_uid: uid,
                    client_name: effective_name.clone(),
                    is_embed: as_embed,
                },
            )
            .await;

        tracing::info!(room = %room_id, name = %effective_name, embed = as_embed, "Client joined room");
        Ok(())
    }

    /// Park an unauthorized joiner as pending and notify the host.
    async fn park_pending(
        &mut self,
        room: &Room,
        uid: String,
        client_name: String,
    ) -> Result<(), SignalError> {
        let pending = Client {
            entity_id: id::entity_id(),
            uid: uid.clone(),
            name: client_name.clone(),
            room_id: room.id.clone(),
            socket_id: Some(self.socket_id.clone()),
            is_host: false,
            is_embed: false,
            is_online: true,
            is_pending: true,
            embedded_client_uid: None,
        };
        self.state.clients.save(&pending).await?;

        self.emit(ServerEvent::RoomAccessPending {
            room_id: room.id.clone(),
        })
        .await;

        match self
            .state
            .clients
            .find_member(&room.id, &room.host_uid)
            .await?
        {
            Some(host) => {
                if let Some(host_socket) = host.socket_id.as_deref() {
                    self.state
                        .hub
                        .emit(
                            host_socket,
                            ServerEvent::RoomAccessRequired {
                                client_id: uid.clone(),
                                client_name: client_name.clone(),
                            },
                        )
                        .await;
                } else {
                    tracing::debug!(room = %room.id, "Host offline; access request parked");
                }
            }
            None => tracing::debug!(room = %room.id, "Host has no client row yet"),
        }

        tracing::info!(room = %room.id, uid = %uid, "Access request pending host approval");
        Ok(())
    }

    // === host-only access control ===

    /// Resolve the caller and verify it is the online host of its room.
    /// Any failure is a silent no-op: non-hosts learn nothing.
    async fn require_host(&self) -> Result<Option<(Client, Room)>, SignalError> {
        let Some(caller) = self.state.clients.find_by_socket(&self.socket_id).await? else {
            tracing::debug!(socket = %self.socket_id, "Host operation from unbound connection");
            return Ok(None);
        };
        if !caller.is_online {
            return Ok(None);
        }
        let Some(room) = self.state.rooms.get(&caller.room_id).await? else {
            return Ok(None);
        };
        if room.host_uid != caller.uid {
            tracing::debug!(room = %room.id, uid = %caller.uid, "Host operation from non-host");
            return Ok(None);
        }
        Ok(Some((caller, room)))
    }

    async fn on_grant_access(&mut self, to_client_id: String) -> Result<(), SignalError> {
        let Some((_, room)) = self.require_host().await? else {
            return Ok(());
        };
        let _guard = self.state.locks.acquire(&room.id).await;

        let Some(mut target) = self.state.clients.find_pending(&room.id, &to_client_id).await?
        else {
            tracing::debug!(room = %room.id, to = %to_client_id, "Grant for unknown pending client");
            return Ok(());
        };

        target.is_pending = false;
        self.state.clients.save(&target).await?;

        // Two-phase handshake: the target re-issues join-room itself and
        // only then enters the transport group.
        if let Some(target_socket) = target.socket_id.as_deref() {
            self.state
                .hub
                .emit(
                    target_socket,
                    ServerEvent::RoomAccessGranted {
                        room_id: room.id.clone(),
                    },
                )
                .await;
        }
        tracing::info!(room = %room.id, uid = %target.uid, "Room access granted");
        Ok(())
    }

    async fn on_deny_access(&mut self, to_client_id: String) -> Result<(), SignalError> {
        let Some((_, room)) = self.require_host().await? else {
            return Ok(());
        };
        let _guard = self.state.locks.acquire(&room.id).await;

        let Some(target) = self.state.clients.find_pending(&room.id, &to_client_id).await? else {
            tracing::debug!(room = %room.id, to = %to_client_id, "Deny for unknown pending client");
            return Ok(());
        };

        if let Some(target_socket) = target.socket_id.as_deref() {
            self.state
                .hub
                .emit(
                    target_socket,
                    ServerEvent::RoomAccessDenied {
                        room_id: room.id.clone(),
                    },
                )
                .await;
        }
        self.state.clients.remove(&target).await?;
        tracing::info!(room = %room.id, uid = %target.uid, "Room access denied");
        Ok(())
    }

    async fn on_remove_access(&mut self, to_client_id: String) -> Result<(), SignalError> {
        let Some((_, room)) = self.require_host().await? else {
            return Ok(());
        };
        let _guard = self.state.locks.acquire(&room.id).await;

        // A kick applies to members and pending requesters alike.
        let target = match self.state.clients.find_member(&room.id, &to_client_id).await? {
            Some(member) => member,
            None => {
                let Some(pending) =
                    self.state.clients.find_pending(&room.id, &to_client_id).await?
                else {
                    tracing::debug!(room = %room.id, to = %to_client_id, "Remove for unknown client");
                    return Ok(());
                };
                pending
            }
        };

        self.state.clients.remove(&target).await?;

        if let Some(target_socket) = target.socket_id.as_deref() {
            self.state
                .hub
                .emit(
                    target_socket,
                    ServerEvent::RoomAccessRemoved {
                        room_id: room.id.clone(),
                    },
                )
                .await;
            // Evict server-side; the kicked client's own cleanup is not
            // trusted to run before it might reconnect.
            self.state.hub.leave_room(&room.id, target_socket).await;
        }
        tracing::info!(room = %room.id, uid = %target.uid, "Client expelled from room");
        Ok(())
    }

    async fn on_mute(&mut self, to_client_id: String) -> Result<(), SignalError> {
        let Some((_, room)) = self.require_host().await? else {
            return Ok(());
        };

        let Some(target) = self.state.clients.find_member(&room.id, &to_client_id).await? else {
            tracing::debug!(room = %room.id, to = %to_client_id, "Mute for unknown client");
            return Ok(());
        };
        if !target.is_online {
            tracing::debug!(room = %room.id, to = %target.uid, "Mute for offline client");
            return Ok(());
        }

        // Advisory only: no server-side state change, the target applies it.
        if let Some(target_socket) = target.socket_id.as_deref() {
            self.state
                .hub
                .emit(
                    target_socket,
                    ServerEvent::MuteAudio {
                        room_id: room.id.clone(),
                    },
                )
                .await;
        }
        Ok(())
    }

    // === disconnect ===

    /// Transport-driven teardown. Idempotent: a second invocation finds no
    /// bound Client row and stops.
    pub async fn on_disconnect(&mut self) {
        if let Err(error) = self.disconnect_inner().await {
            tracing::warn!(
                socket = %self.socket_id,
                code = error.error_code(),
                %error,
                "Disconnect cleanup abandoned"
            );
        }
    }

    async fn disconnect_inner(&mut self) -> Result<(), SignalError> {
        let Some(client) = self.state.clients.find_by_socket(&self.socket_id).await? else {
            tracing::debug!(socket = %self.socket_id, "Disconnected without a room");
            return Ok(());
        };

        let _guard = self.state.locks.acquire(&client.room_id).await;
        self.state.clients.mark_offline(&client).await?;

        self.state
            .hub
            .emit_to_room(
                &client.room_id,
                ServerEvent::ClientDisconnected {
                    client_id: client.uid.clone(),
                },
            )
            .await;
        self.state
            .hub
            .leave_room(&client.room_id, &self.socket_id)
            .await;
        self.room_id = None;

        tracing::info!(room = %client.room_id, uid = %client.uid, "Client left room");
        Ok(())
    }
}
