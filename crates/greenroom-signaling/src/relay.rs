//! Event relay: offer/answer/candidate forwarding between two live
//! Client rows.
//!
//! Stateless by design: every relay re-resolves both ends against the
//! Client registry at send time. A failed check drops the message with a
//! debug log and nothing else: the negotiation protocol upstream is
//! expected to recover from single-message loss via renegotiation, not
//! from server-side retries or buffering.

use serde_json::Value;

use greenroom_common::error::SignalError;
use greenroom_common::events::ServerEvent;

use crate::SignalingState;

/// The three negotiation payload kinds. Contents are opaque to the server.
#[derive(Debug, Clone)]
pub enum RelayPayload {
    Offer(Value),
    Answer(Value),
    Candidate(Value),
}

impl RelayPayload {
    fn kind(&self) -> &'static str {
        match self {
            Self::Offer(_) => "offer",
            Self::Answer(_) => "answer",
            Self::Candidate(_) => "candidate",
        }
    }

    /// Offers and answers come from full members only; candidates may
    /// trail in from a connection whose membership is still settling.
    fn requires_member(&self) -> bool {
        matches!(self, Self::Offer(_) | Self::Answer(_))
    }

    fn into_event(self, from_client_id: String) -> ServerEvent {
        match self {
            Self::Offer(sdp_offer) => ServerEvent::NewOffer {
                from_client_id,
                sdp_offer,
            },
            Self::Answer(sdp_answer) => ServerEvent::NewAnswer {
                from_client_id,
                sdp_answer,
            },
            Self::Candidate(ice_candidate) => ServerEvent::NewCandidate {
                from_client_id,
                ice_candidate,
            },
        }
    }
}

/// Forward one negotiation payload from the connection `socket_id` to the
/// client `to_client_id` in the caller's room.
pub async fn forward(
    state: &SignalingState,
    socket_id: &str,
    to_client_id: &str,
    payload: RelayPayload,
) -> Result<(), SignalError> {
    let kind = payload.kind();

    let Some(caller) = state.clients.find_by_socket(socket_id).await? else {
        tracing::debug!(socket = %socket_id, kind, "Relay dropped: caller no longer connected");
        return Ok(());
    };
    if !caller.is_online || (payload.requires_member() && caller.is_pending) {
        tracing::debug!(from = %caller.uid, kind, "Relay dropped: caller not a live member");
        return Ok(());
    }

    // Re-resolve the target at send time: it excludes pending rows and
    // carries the target's *current* socket, covering reconnects since the
    // caller last saw the roster.
    let Some(target) = state.clients.find_member(&caller.room_id, to_client_id).await? else {
        tracing::debug!(
            from = %caller.uid,
            to = %to_client_id,
            kind,
            "Relay dropped: target not in room"
        );
        return Ok(());
    };
    if !target.is_online {
        tracing::debug!(from = %caller.uid, to = %target.uid, kind, "Relay dropped: target offline");
        return Ok(());
    }
    let Some(target_socket) = target.socket_id.as_deref() else {
        tracing::debug!(from = %caller.uid, to = %target.uid, kind, "Relay dropped: target unbound");
        return Ok(());
    };

    state
        .hub
        .emit(target_socket, payload.into_event(caller.uid))
        .await;
    Ok(())
}
