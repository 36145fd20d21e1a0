#![allow(clippy::unwrap_used)] // Integration tests use unwrap for brevity

//! Integration tests for the signaling hub: join/match/signal/teardown
//! flows exercised end-to-end against in-memory infrastructure, without
//! real sockets.

use std::sync::Arc;

use tokio::sync::mpsc;

use vibecall_broker::{MatchBroker, MemoryBroker, channels};
use vibecall_core::{MatchEvent, SignalKind, SignalingMessage};
use vibecall_relay::feed;
use vibecall_relay::hub::SignalingHub;
use vibecall_relay::hub::events::ServerEvent;
use vibecall_store::{NullProfileStore, SqliteProfileStore};

fn test_hub() -> Arc<SignalingHub> {
    Arc::new(SignalingHub::new(Arc::new(NullProfileStore)))
}

async fn join(hub: &SignalingHub, user: &str) -> mpsc::Receiver<ServerEvent> {
    let (tx, rx) = SignalingHub::outbound_channel();
    hub.join(user, &format!("conn-{user}"), tx).await;
    rx
}

fn match_event(user1: &str, user2: &str, call_id: &str) -> MatchEvent {
    MatchEvent {
        user1: user1.into(),
        user2: user2.into(),
        call_id: call_id.into(),
        score: 60,
        timestamp: 0,
    }
}

// =========================================================================
// Match fan-out
// =========================================================================

#[tokio::test]
async fn match_ready_reaches_both_peers() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;

    assert_eq!(
        rx_x.try_recv().unwrap(),
        ServerEvent::MatchReady {
            call_id: "call1".into(),
            peer_id: "y".into(),
        }
    );
    assert_eq!(
        rx_y.try_recv().unwrap(),
        ServerEvent::MatchReady {
            call_id: "call1".into(),
            peer_id: "x".into(),
        }
    );
    assert!(hub.session_exists("call1").await);
    assert_eq!(
        hub.session_participants("call1").await.unwrap(),
        vec!["x".to_string(), "y".to_string()]
    );
}

#[tokio::test]
async fn match_ready_skips_unjoined_participant() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;

    // y never joined; its notification is dropped, x still gets one and
    // the session exists for when y shows up.
    hub.match_found(&match_event("x", "y", "call1")).await;

    assert!(rx_x.try_recv().is_ok());
    assert!(hub.session_exists("call1").await);
}

// =========================================================================
// Signal relay
// =========================================================================

#[tokio::test]
async fn signal_is_forwarded_verbatim() {
    let hub = test_hub();
    let _rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    let message = SignalingMessage {
        kind: SignalKind::Offer,
        data: serde_json::json!({"sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1"}),
        from: "x".into(),
        to: "y".into(),
    };
    hub.signal(message.clone()).await;

    assert_eq!(rx_y.try_recv().unwrap(), ServerEvent::Signal(message));
}

#[tokio::test]
async fn signal_to_offline_target_is_dropped() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;

    hub.signal(SignalingMessage {
        kind: SignalKind::Answer,
        data: serde_json::json!({}),
        from: "x".into(),
        to: "nobody".into(),
    })
    .await;

    // No error back to the sender, nothing buffered anywhere.
    assert!(rx_x.try_recv().is_err());
}

// =========================================================================
// Leave and disconnect
// =========================================================================

#[tokio::test]
async fn disconnect_notifies_peer_and_destroys_session() {
    let hub = test_hub();
    let _rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;
    let _ = rx_y.try_recv(); // drain match-ready

    hub.disconnect("x", "conn-x").await;

    assert_eq!(
        rx_y.try_recv().unwrap(),
        ServerEvent::PeerLeft { user_id: "x".into() }
    );
    assert!(!hub.is_connected("x").await);
    assert!(!hub.session_exists("call1").await);

    // The session is gone; a late leave-call is a no-op with no further
    // notification.
    hub.leave_call("call1", "y").await;
    assert!(rx_y.try_recv().is_err());
}

#[tokio::test]
async fn leave_call_keeps_connection_alive() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let _rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;
    let _ = rx_x.try_recv();

    hub.leave_call("call1", "y").await;

    assert_eq!(
        rx_x.try_recv().unwrap(),
        ServerEvent::PeerLeft { user_id: "y".into() }
    );
    // y left the call but is still connected and can re-match.
    assert!(hub.is_connected("y").await);
    assert!(hub.session_exists("call1").await);
    assert_eq!(
        hub.session_participants("call1").await.unwrap(),
        vec!["x".to_string()]
    );
}

#[tokio::test]
async fn disconnect_tears_down_every_session_of_the_user() {
    let hub = test_hub();
    let _rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;
    let mut rx_z = join(&hub, "z").await;

    // Overlapping match events can land one user in two sessions.
    hub.match_found(&match_event("x", "y", "call1")).await;
    hub.match_found(&match_event("x", "z", "call2")).await;
    let _ = rx_y.try_recv();
    let _ = rx_z.try_recv();

    hub.disconnect("x", "conn-x").await;

    assert_eq!(
        rx_y.try_recv().unwrap(),
        ServerEvent::PeerLeft { user_id: "x".into() }
    );
    assert_eq!(
        rx_z.try_recv().unwrap(),
        ServerEvent::PeerLeft { user_id: "x".into() }
    );
    assert!(!hub.session_exists("call1").await);
    assert!(!hub.session_exists("call2").await);
}

#[tokio::test]
async fn stale_disconnect_does_not_evict_newer_connection() {
    let hub = test_hub();

    let (tx1, _rx1) = SignalingHub::outbound_channel();
    hub.join("x", "conn-old", tx1).await;
    let (tx2, _rx2) = SignalingHub::outbound_channel();
    hub.join("x", "conn-new", tx2).await;

    // The old socket closing must not kick out the new registration.
    hub.disconnect("x", "conn-old").await;
    assert!(hub.is_connected("x").await);

    hub.disconnect("x", "conn-new").await;
    assert!(!hub.is_connected("x").await);
}

// =========================================================================
// Recording flows
// =========================================================================

#[tokio::test]
async fn recording_status_reaches_only_the_peer() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;
    let _ = rx_x.try_recv();
    let _ = rx_y.try_recv();

    // One-sided: no consent required, never echoed to the sender.
    hub.recording_status("call1", "x", true).await;

    assert_eq!(
        rx_y.try_recv().unwrap(),
        ServerEvent::PeerRecordingStatus { is_recording: true }
    );
    assert!(rx_x.try_recv().is_err());
}

#[tokio::test]
async fn recording_approved_needs_both_consents() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;
    let _ = rx_x.try_recv();
    let _ = rx_y.try_recv();

    hub.recording_consent("call1", "x", true).await;
    assert!(rx_x.try_recv().is_err());
    assert!(rx_y.try_recv().is_err());

    hub.recording_consent("call1", "y", true).await;
    assert_eq!(
        rx_x.try_recv().unwrap(),
        ServerEvent::RecordingApproved { call_id: "call1".into() }
    );
    assert_eq!(
        rx_y.try_recv().unwrap(),
        ServerEvent::RecordingApproved { call_id: "call1".into() }
    );
}

#[tokio::test]
async fn declined_consent_blocks_approval() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let mut rx_y = join(&hub, "y").await;

    hub.match_found(&match_event("x", "y", "call1")).await;
    let _ = rx_x.try_recv();
    let _ = rx_y.try_recv();

    hub.recording_consent("call1", "x", true).await;
    hub.recording_consent("call1", "y", false).await;

    assert!(rx_x.try_recv().is_err());
    assert!(rx_y.try_recv().is_err());
}

// =========================================================================
// Presence side effects
// =========================================================================

#[tokio::test]
async fn join_and_disconnect_update_online_flag() {
    let store = SqliteProfileStore::open_in_memory().await.unwrap();
    store.upsert_profile("x", false).await.unwrap();
    let hub = SignalingHub::new(Arc::new(store.clone()));

    let (tx, _rx) = SignalingHub::outbound_channel();
    hub.join("x", "conn-x", tx).await;
    assert!(store.get_profile("x").await.unwrap().unwrap().is_online);

    hub.disconnect("x", "conn-x").await;
    assert!(!store.get_profile("x").await.unwrap().unwrap().is_online);
}

// =========================================================================
// Broker fan-in
// =========================================================================

#[tokio::test]
async fn broker_notifications_create_sessions() {
    let hub = test_hub();
    let mut rx_x = join(&hub, "x").await;
    let _rx_y = join(&hub, "y").await;

    let broker = Arc::new(MemoryBroker::new());
    let sub = broker
        .subscribe(channels::MATCH_NOTIFICATIONS)
        .await
        .unwrap();
    let pump = tokio::spawn(feed::pump_notifications(Arc::clone(&hub), sub));

    let payload = serde_json::to_string(&match_event("x", "y", "call9")).unwrap();
    broker
        .publish(channels::MATCH_NOTIFICATIONS, &payload)
        .await
        .unwrap();

    let event = tokio::time::timeout(std::time::Duration::from_secs(1), rx_x.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        event,
        ServerEvent::MatchReady {
            call_id: "call9".into(),
            peer_id: "y".into(),
        }
    );
    assert!(hub.session_exists("call9").await);
    pump.abort();
}
