//! Full-mesh negotiation topology.
//!
//! An alternative to the star room model: instead of an access-controlled
//! roster, every participant holds open negotiation slots and the server
//! pairs them up. A [`ConnectionPair`] is one peer-to-peer slot with an
//! initiator and at most one responder; a pure reducer over a room's pair
//! list decides, per event, which pairs change and which messages go out.
//!
//! The reducer is transport-agnostic: it returns [`MeshEffect`]s and the
//! caller maps them onto connections.

use serde_json::Value;

/// Most peers a single client interconnects with, itself included.
pub const MAX_INTERCONNECTED_CLIENTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct InitiatorSlot {
    pub client_id: String,
    pub sdp_offer: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponderSlot {
    pub client_id: String,
    pub sdp_answer: Option<Value>,
}

/// One negotiation slot. An unmatched pair has no responder yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionPair {
    pub initiator: InitiatorSlot,
    pub responder: Option<ResponderSlot>,
}

impl ConnectionPair {
    fn open(client_id: &str) -> Self {
        Self {
            initiator: InitiatorSlot {
                client_id: client_id.to_string(),
                sdp_offer: None,
            },
            responder: None,
        }
    }

    fn is_unmatched(&self) -> bool {
        self.responder.is_none()
    }
}

/// What the caller must send after a reducer step.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEffect {
    /// Ask `from_client_id` to produce a fresh offer for a newly opened
    /// slot. Broadcast, so any present peer can pick the slot up later.
    OfferRequested { from_client_id: String },
    /// Deliver an offer to the responder that was matched into its slot.
    AnswerRequested {
        to_client_id: String,
        from_client_id: String,
        sdp_offer: Value,
    },
    /// Deliver a finished answer back to the slot's initiator.
    AnswerDelivered {
        to_client_id: String,
        from_client_id: String,
        sdp_answer: Value,
    },
}

/// A room's mesh state: every pair ever opened, in creation order. The
/// scan order of `join` depends on it, so pairs are never reordered.
#[derive(Debug, Default)]
pub struct MeshRoom {
    pairs: Vec<ConnectionPair>,
}

impl MeshRoom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pairs(&self) -> &[ConnectionPair] {
        &self.pairs
    }

    fn are_paired(&self, a: &str, b: &str) -> bool {
        self.pairs.iter().any(|pair| {
            let responder = pair.responder.as_ref().map(|r| r.client_id.as_str());
            (pair.initiator.client_id == a && responder == Some(b))
                || (pair.initiator.client_id == b && responder == Some(a))
        })
    }

    /// Admit a client. Matches it against unmatched initiator slots from
    /// distinct other clients, first come first served, then opens new
    /// initiator slots for whatever fan-out budget remains.
    pub fn join(&mut self, client_id: &str) -> Vec<MeshEffect> {
        let mut effects = Vec::new();
        let mut budget = MAX_INTERCONNECTED_CLIENTS - 1;
        let mut matched: Vec<String> = Vec::new();
        let mut picks: Vec<usize> = Vec::new();

        for (index, pair) in self.pairs.iter().enumerate() {
            if budget == 0 {
                break;
            }
            let peer = &pair.initiator.client_id;
            // One edge per client pair; a second slot from the same peer
            // stays open for someone else.
            if !pair.is_unmatched()
                || peer == client_id
                || matched.contains(peer)
                || self.are_paired(client_id, peer)
            {
                continue;
            }
            matched.push(peer.clone());
            picks.push(index);
            budget -= 1;
        }

        for index in picks {
            let pair = &mut self.pairs[index];
            pair.responder = Some(ResponderSlot {
                client_id: client_id.to_string(),
                sdp_answer: None,
            });
            if let Some(sdp_offer) = pair.initiator.sdp_offer.clone() {
                effects.push(MeshEffect::AnswerRequested {
                    to_client_id: client_id.to_string(),
                    from_client_id: pair.initiator.client_id.clone(),
                    sdp_offer,
                });
            }
        }

        for _ in 0..budget {
            self.pairs.push(ConnectionPair::open(client_id));
            effects.push(MeshEffect::OfferRequested {
                from_client_id: client_id.to_string(),
            });
        }
        effects
    }

    /// Record an offer into the client's first offer-less initiator slot.
    /// If the slot already has a responder, the offer goes straight out to
    /// it; otherwise it waits for a future joiner.
    pub fn offer(&mut self, client_id: &str, sdp_offer: Value) -> Vec<MeshEffect> {
        let slot = self.pairs.iter_mut().find(|pair| {
            pair.initiator.client_id == client_id && pair.initiator.sdp_offer.is_none()
        });
        let Some(pair) = slot else {
            return Vec::new();
        };

        pair.initiator.sdp_offer = Some(sdp_offer.clone());
        match &pair.responder {
            Some(responder) => vec![MeshEffect::AnswerRequested {
                to_client_id: responder.client_id.clone(),
                from_client_id: client_id.to_string(),
                sdp_offer,
            }],
            None => Vec::new(),
        }
    }

    /// Record an answer into the client's first answered-offer slot and
    /// deliver it to the initiator.
    pub fn answer(&mut self, client_id: &str, sdp_answer: Value) -> Vec<MeshEffect> {
        let slot = self.pairs.iter_mut().find(|pair| {
            pair.initiator.sdp_offer.is_some()
                && pair
                    .responder
                    .as_ref()
                    .is_some_and(|r| r.client_id == client_id && r.sdp_answer.is_none())
        });
        let Some(pair) = slot else {
            return Vec::new();
        };

        if let Some(responder) = pair.responder.as_mut() {
            responder.sdp_answer = Some(sdp_answer.clone());
        }
        vec![MeshEffect::AnswerDelivered {
            to_client_id: pair.initiator.client_id.clone(),
            from_client_id: client_id.to_string(),
            sdp_answer,
        }]
    }

    /// Remove a client. Pairs it initiated are dropped; a responder left
    /// behind in one is demoted to a fresh initiator slot so it gets
    /// re-offered. Pairs where it responded lose the responder but keep
    /// the initiator's offer.
    pub fn disconnect(&mut self, client_id: &str) -> Vec<MeshEffect> {
        let mut effects = Vec::new();
        let mut demoted: Vec<String> = Vec::new();

        self.pairs.retain(|pair| {
            if pair.initiator.client_id == client_id {
                if let Some(responder) = &pair.responder {
                    demoted.push(responder.client_id.clone());
                }
                return false;
            }
            true
        });

        for pair in &mut self.pairs {
            if pair
                .responder
                .as_ref()
                .is_some_and(|r| r.client_id == client_id)
            {
                pair.responder = None;
            }
        }

        for peer in demoted {
            self.pairs.push(ConnectionPair::open(&peer));
            effects.push(MeshEffect::OfferRequested {
                from_client_id: peer,
            });
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn offer_requests(effects: &[MeshEffect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, MeshEffect::OfferRequested { .. }))
            .count()
    }

    #[test]
    fn test_first_joiner_opens_full_budget_of_slots() {
        let mut room = MeshRoom::new();
        let effects = room.join("a");

        assert_eq!(offer_requests(&effects), MAX_INTERCONNECTED_CLIENTS - 1);
        assert_eq!(room.pairs().len(), MAX_INTERCONNECTED_CLIENTS - 1);
        assert!(room.pairs().iter().all(|p| p.is_unmatched()));
    }

    #[test]
    fn test_second_joiner_matches_one_slot_and_opens_the_rest() {
        let mut room = MeshRoom::new();
        room.join("a");
        let effects = room.join("b");

        // One edge to "a", two fresh slots of its own.
        assert_eq!(offer_requests(&effects), 2);
        let matched: Vec<_> = room
            .pairs()
            .iter()
            .filter(|p| p.responder.is_some())
            .collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].initiator.client_id, "a");
        assert_eq!(
            matched[0].responder.as_ref().map(|r| r.client_id.as_str()),
            Some("b")
        );
    }

    #[test]
    fn test_join_delivers_waiting_offer() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.offer("a", json!({ "sdp": "a1" }));

        let effects = room.join("b");
        assert!(effects.contains(&MeshEffect::AnswerRequested {
            to_client_id: "b".into(),
            from_client_id: "a".into(),
            sdp_offer: json!({ "sdp": "a1" }),
        }));
    }

    #[test]
    fn test_late_offer_reaches_matched_responder() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");

        let effects = room.offer("a", json!({ "sdp": "a1" }));
        assert_eq!(
            effects,
            vec![MeshEffect::AnswerRequested {
                to_client_id: "b".into(),
                from_client_id: "a".into(),
                sdp_offer: json!({ "sdp": "a1" }),
            }]
        );
    }

    #[test]
    fn test_answer_flows_back_to_initiator() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");
        room.offer("a", json!({ "sdp": "a1" }));

        let effects = room.answer("b", json!({ "sdp": "b1" }));
        assert_eq!(
            effects,
            vec![MeshEffect::AnswerDelivered {
                to_client_id: "a".into(),
                from_client_id: "b".into(),
                sdp_answer: json!({ "sdp": "b1" }),
            }]
        );
    }

    #[test]
    fn test_answer_without_offer_is_dropped() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");

        assert!(room.answer("b", json!({ "sdp": "b1" })).is_empty());
    }

    #[test]
    fn test_one_edge_per_client_pair() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");
        room.join("c");

        // "c" took one slot from "a" and one from "b", never two from the
        // same peer.
        for pair in room.pairs() {
            if let Some(responder) = &pair.responder {
                assert_ne!(pair.initiator.client_id, responder.client_id);
            }
        }
        let c_edges = room
            .pairs()
            .iter()
            .filter(|p| {
                p.responder.as_ref().is_some_and(|r| r.client_id == "c")
            })
            .map(|p| p.initiator.client_id.clone())
            .collect::<Vec<_>>();
        let mut deduped = c_edges.clone();
        deduped.dedup();
        assert_eq!(c_edges, deduped);
    }

    #[test]
    fn test_fan_out_cap_respected() {
        let mut room = MeshRoom::new();
        for id in ["a", "b", "c", "d", "e"] {
            room.join(id);
        }

        for id in ["a", "b", "c", "d", "e"] {
            let edges = room
                .pairs()
                .iter()
                .filter(|p| {
                    p.responder.is_some()
                        && (p.initiator.client_id == id
                            || p.responder.as_ref().is_some_and(|r| r.client_id == id))
                })
                .count();
            assert!(
                edges <= MAX_INTERCONNECTED_CLIENTS - 1,
                "{id} has {edges} edges"
            );
        }
    }

    #[test]
    fn test_disconnect_drops_initiated_pairs_and_demotes_responders() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");

        let effects = room.disconnect("a");

        // "b" was responding in one of "a"'s pairs; it is demoted to a
        // fresh initiator slot and asked to re-offer.
        assert_eq!(
            effects,
            vec![MeshEffect::OfferRequested {
                from_client_id: "b".into()
            }]
        );
        assert!(room
            .pairs()
            .iter()
            .all(|p| p.initiator.client_id == "b"));
        // The demoted slot starts bare even if the old pair had an offer.
        assert!(room
            .pairs()
            .iter()
            .all(|p| p.responder.is_none()));
    }

    #[test]
    fn test_disconnect_as_responder_reopens_the_slot() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.offer("a", json!({ "sdp": "a1" }));
        room.join("b");

        room.disconnect("b");

        // "a"'s slot is unmatched again and keeps its recorded offer, so
        // the next joiner gets it immediately.
        let kept = room
            .pairs()
            .iter()
            .find(|p| p.initiator.client_id == "a" && p.initiator.sdp_offer.is_some())
            .expect("slot kept");
        assert!(kept.responder.is_none());

        let effects = room.join("c");
        assert!(effects.contains(&MeshEffect::AnswerRequested {
            to_client_id: "c".into(),
            from_client_id: "a".into(),
            sdp_offer: json!({ "sdp": "a1" }),
        }));
    }

    #[test]
    fn test_rejoin_after_full_disconnect_is_clean() {
        let mut room = MeshRoom::new();
        room.join("a");
        room.join("b");
        room.disconnect("b");

        let effects = room.join("b");
        // Same shape as any second joiner: one match, rest fresh slots.
        assert_eq!(offer_requests(&effects), MAX_INTERCONNECTED_CLIENTS - 2);
    }
}
