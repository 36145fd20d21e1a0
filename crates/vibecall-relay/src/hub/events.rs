//! Signaling protocol events.
//!
//! Every WebSocket frame is a `{"event": "...", "data": {...}}` envelope.
//! The event names and payload field names are the compatibility surface
//! the browser clients speak; payloads outside these closed variants are
//! rejected at the boundary instead of leaking into the handlers.

use serde::{Deserialize, Serialize};

use vibecall_core::SignalingMessage;

/// Events a client may send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Register this connection for a user. Overwrites any prior handle.
    #[serde(rename_all = "camelCase")]
    Join { user_id: String },

    /// Opaque WebRTC signaling payload to forward to `message.to`.
    Signal(SignalingMessage),

    /// Legacy two-sided recording consent.
    #[serde(rename_all = "camelCase")]
    RecordingConsent {
        call_id: String,
        user_id: String,
        consented: bool,
    },

    /// Current one-sided recording status broadcast.
    #[serde(rename_all = "camelCase")]
    RecordingStatus {
        call_id: String,
        user_id: String,
        is_recording: bool,
    },

    /// Leave a call without closing the connection.
    #[serde(rename_all = "camelCase")]
    LeaveCall { call_id: String },
}

/// Events the relay may push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A partner was found; start exchanging signaling for this call.
    #[serde(rename_all = "camelCase")]
    MatchReady { call_id: String, peer_id: String },

    /// Forwarded signaling payload, verbatim from the sender.
    Signal(SignalingMessage),

    /// Both participants consented to recording (legacy flow).
    #[serde(rename_all = "camelCase")]
    RecordingApproved { call_id: String },

    /// The other participant toggled recording (current flow).
    #[serde(rename_all = "camelCase")]
    PeerRecordingStatus { is_recording: bool },

    /// A participant left the call.
    #[serde(rename_all = "camelCase")]
    PeerLeft { user_id: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vibecall_core::SignalKind;

    use super::*;

    #[test]
    fn join_uses_wire_names() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"event":"join","data":{"userId":"u1"}}"#).unwrap();
        assert_eq!(event, ClientEvent::Join { user_id: "u1".into() });
    }

    #[test]
    fn signal_envelope_roundtrips() {
        let event = ClientEvent::Signal(SignalingMessage {
            kind: SignalKind::Offer,
            data: serde_json::json!({"sdp": "v=0"}),
            from: "a".into(),
            to: "b".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "signal");
        assert_eq!(json["data"]["type"], "offer");
        assert_eq!(json["data"]["to"], "b");

        let back: ClientEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn recording_events_parse() {
        let consent: ClientEvent = serde_json::from_str(
            r#"{"event":"recording-consent","data":{"callId":"c1","userId":"u1","consented":true}}"#,
        )
        .unwrap();
        assert!(matches!(
            consent,
            ClientEvent::RecordingConsent { consented: true, .. }
        ));

        let status: ClientEvent = serde_json::from_str(
            r#"{"event":"recording-status","data":{"callId":"c1","userId":"u1","isRecording":false}}"#,
        )
        .unwrap();
        assert!(matches!(
            status,
            ClientEvent::RecordingStatus { is_recording: false, .. }
        ));
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result =
            serde_json::from_str::<ClientEvent>(r#"{"event":"shutdown","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_events_serialize_camel_case_payloads() {
        let ready = ServerEvent::MatchReady {
            call_id: "c1".into(),
            peer_id: "u2".into(),
        };
        let json = serde_json::to_value(&ready).unwrap();
        assert_eq!(json["event"], "match-ready");
        assert_eq!(json["data"]["callId"], "c1");
        assert_eq!(json["data"]["peerId"], "u2");

        let status = ServerEvent::PeerRecordingStatus { is_recording: true };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["event"], "peer-recording-status");
        assert_eq!(json["data"]["isRecording"], true);
    }
}
