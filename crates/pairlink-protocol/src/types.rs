//! Core protocol types for the signaling wire format.
//!
//! Every frame in either direction is one [`Message`]:
//!
//! ```json
//! { "name": "SDP_OFFER", "payload": "v=0\r\n..." }
//! ```
//!
//! `name` selects what the relay does with it; `payload` is an opaque
//! string that the relay forwards without looking inside.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Payload of the `PARTNER_FOUND` sent to the older participant of a pair.
///
/// Exactly one side of a pair receives it, which decides who creates the
/// SDP offer.
pub const GO_FIRST: &str = "GO_FIRST";

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The closed vocabulary of message names.
///
/// The first six are sent by clients; `PartnerFound` and `PartnerLeft` are
/// only ever emitted by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Client asks to be queued for a partner.
    PairingStart,
    /// Client leaves its pairing, matched or not.
    PairingAbort,
    /// Client reports the peer connection is established.
    PairingDone,
    /// Session description offer, relayed to the partner.
    SdpOffer,
    /// Session description answer, relayed to the partner.
    SdpAnswer,
    /// ICE candidate, relayed to the partner.
    SdpIceCandidate,
    /// Relay tells a client it has been matched.
    PartnerFound,
    /// Relay tells a client its partner went away.
    PartnerLeft,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 8] = [
        Self::PairingStart,
        Self::PairingAbort,
        Self::PairingDone,
        Self::SdpOffer,
        Self::SdpAnswer,
        Self::SdpIceCandidate,
        Self::PartnerFound,
        Self::PartnerLeft,
    ];

    /// The exact wire spelling of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PairingStart => "PAIRING_START",
            Self::PairingAbort => "PAIRING_ABORT",
            Self::PairingDone => "PAIRING_DONE",
            Self::SdpOffer => "SDP_OFFER",
            Self::SdpAnswer => "SDP_ANSWER",
            Self::SdpIceCandidate => "SDP_ICE_CANDIDATE",
            Self::PartnerFound => "PARTNER_FOUND",
            Self::PartnerLeft => "PARTNER_LEFT",
        }
    }

    /// Returns `true` for the negotiation kinds relayed verbatim to a partner.
    pub fn is_forwarded(self) -> bool {
        matches!(self, Self::SdpOffer | Self::SdpAnswer | Self::SdpIceCandidate)
    }

    /// Returns `true` for kinds a client is allowed to send.
    pub fn is_client_sent(self) -> bool {
        !matches!(self, Self::PartnerFound | Self::PartnerLeft)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ProtocolError::InvalidMessage(format!("unknown message kind {s:?}")))
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One signaling message.
///
/// `name` is kept as the raw string so that a frame with a name outside the
/// vocabulary still decodes; the pairing engine ignores it instead of the
/// connection handler treating it as garbage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Wire name of the kind, e.g. `"PAIRING_START"`.
    pub name: String,

    /// Opaque payload, carried verbatim for forwarded kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Message {
    /// Creates a message of the given kind with no payload.
    pub fn new(kind: MessageKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            payload: None,
        }
    }

    /// Creates a message of the given kind carrying `payload`.
    pub fn with_payload(kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            name: kind.as_str().to_string(),
            payload: Some(payload.into()),
        }
    }

    /// Resolves `name` against the vocabulary.
    ///
    /// Returns `None` for names the relay doesn't know.
    pub fn kind(&self) -> Option<MessageKind> {
        self.name.parse().ok()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Some(payload) => write!(f, "{} ({} bytes)", self.name, payload.len()),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_str_round_trips_every_wire_name() {
        for kind in MessageKind::ALL {
            assert_eq!(kind.as_str().parse::<MessageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_from_str_unknown_returns_invalid_message() {
        let result = "pairing_start".parse::<MessageKind>();
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&MessageKind::SdpIceCandidate).unwrap();
        assert_eq!(json, "\"SDP_ICE_CANDIDATE\"");
    }

    #[test]
    fn test_kind_is_forwarded_only_for_sdp_kinds() {
        let forwarded: Vec<_> = MessageKind::ALL
            .into_iter()
            .filter(|k| k.is_forwarded())
            .collect();
        assert_eq!(
            forwarded,
            vec![
                MessageKind::SdpOffer,
                MessageKind::SdpAnswer,
                MessageKind::SdpIceCandidate
            ]
        );
    }

    #[test]
    fn test_kind_is_client_sent_excludes_server_kinds() {
        assert!(MessageKind::PairingStart.is_client_sent());
        assert!(MessageKind::SdpAnswer.is_client_sent());
        assert!(!MessageKind::PartnerFound.is_client_sent());
        assert!(!MessageKind::PartnerLeft.is_client_sent());
    }

    #[test]
    fn test_message_new_has_no_payload() {
        let msg = Message::new(MessageKind::PairingDone);
        assert_eq!(msg.name, "PAIRING_DONE");
        assert!(msg.payload.is_none());
        assert_eq!(msg.kind(), Some(MessageKind::PairingDone));
    }

    #[test]
    fn test_message_with_payload_sets_payload() {
        let msg = Message::with_payload(MessageKind::PartnerFound, GO_FIRST);
        assert_eq!(msg.payload.as_deref(), Some("GO_FIRST"));
    }

    #[test]
    fn test_message_display_hides_payload_contents() {
        let msg = Message::with_payload(MessageKind::SdpOffer, "secret-sdp");
        assert_eq!(msg.to_string(), "SDP_OFFER (10 bytes)");
        assert_eq!(Message::new(MessageKind::PartnerLeft).to_string(), "PARTNER_LEFT");
    }
}
