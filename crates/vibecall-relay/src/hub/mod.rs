//! In-memory signaling hub: live connections, call sessions, and per-call
//! recording state.
//!
//! All state is process-memory-resident and lost on restart; clients
//! rejoin and re-match from scratch after a crash. Every mutation goes
//! through one mutex, which preserves the one-event-at-a-time processing
//! the session and registry maps rely on.

pub mod events;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use vibecall_core::{MatchEvent, SignalingMessage};
use vibecall_store::ProfileStore;

use self::events::ServerEvent;

/// Outbound buffer per connection. A client that stalls past this many
/// undelivered events starts losing them; delivery here is at-most-once
/// with no retry, so dropping beats blocking the hub.
const OUTBOUND_BUFFER: usize = 64;

/// Handle to one live client connection.
struct ConnectionHandle {
    connection_id: String,
    tx: mpsc::Sender<ServerEvent>,
}

/// One active call between at most two peers, with its recording state.
/// Destroyed as a unit once the last participant leaves.
#[derive(Default)]
struct CallSession {
    participants: HashSet<String>,
    /// Legacy two-sided consent flow: user -> consented.
    consents: HashMap<String, bool>,
    /// Current one-sided flow: user -> is currently recording.
    recording: HashMap<String, bool>,
}

#[derive(Default)]
struct HubState {
    connections: HashMap<String, ConnectionHandle>,
    sessions: HashMap<String, CallSession>,
}

/// The stateful hub coordinating exactly two peers per call.
pub struct SignalingHub {
    state: Mutex<HubState>,
    profiles: Arc<dyn ProfileStore>,
}

impl SignalingHub {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            profiles,
        }
    }

    /// The profile store this hub reports presence to.
    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }

    /// Register a connection for `user_id`, overwriting any prior handle
    /// (last connect wins; there is no multi-device fan-out).
    ///
    /// Marking the user online in the profile store is best-effort and
    /// never surfaced to the client.
    pub async fn join(&self, user_id: &str, connection_id: &str, tx: mpsc::Sender<ServerEvent>) {
        {
            let mut state = self.state.lock().await;
            state.connections.insert(
                user_id.to_string(),
                ConnectionHandle {
                    connection_id: connection_id.to_string(),
                    tx,
                },
            );
        }
        info!(user_id = %user_id, connection_id = %connection_id, "User joined");

        if let Err(e) = self.profiles.set_online(user_id, true).await {
            warn!(user_id = %user_id, error = %e, "Failed to mark user online");
        }
    }

    /// Handle a match announcement: create the call session and tell both
    /// participants. A participant without a live connection is skipped
    /// silently; there is no queueing or retry.
    pub async fn match_found(&self, event: &MatchEvent) {
        let mut state = self.state.lock().await;
        let session = state.sessions.entry(event.call_id.clone()).or_default();
        session.participants.insert(event.user1.clone());
        session.participants.insert(event.user2.clone());
        info!(
            call_id = %event.call_id,
            user1 = %event.user1,
            user2 = %event.user2,
            "Call session created"
        );

        for (user, peer) in [
            (&event.user1, &event.user2),
            (&event.user2, &event.user1),
        ] {
            Self::send_to(
                &state,
                user,
                ServerEvent::MatchReady {
                    call_id: event.call_id.clone(),
                    peer_id: peer.clone(),
                },
            );
        }
    }

    /// Forward a signaling message verbatim to its target, or drop it
    /// silently when the target has no live connection.
    pub async fn signal(&self, message: SignalingMessage) {
        let state = self.state.lock().await;
        let to = message.to.clone();
        Self::send_to(&state, &to, ServerEvent::Signal(message));
    }

    /// Legacy two-sided consent: once two distinct users have consented
    /// for the call, every participant gets `recording-approved`.
    pub async fn recording_consent(&self, call_id: &str, user_id: &str, consented: bool) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(session) = state.sessions.get_mut(call_id) else {
            debug!(call_id = %call_id, "Recording consent for unknown call");
            return;
        };
        session.consents.insert(user_id.to_string(), consented);

        let approved = session.consents.len() == 2 && session.consents.values().all(|c| *c);
        if !approved {
            return;
        }
        for user in session.participants.clone() {
            Self::send_to(
                state,
                &user,
                ServerEvent::RecordingApproved {
                    call_id: call_id.to_string(),
                },
            );
        }
    }

    /// Current one-sided flow: tell every OTHER participant about the
    /// sender's recording state. Never echoed back, never gated on consent.
    pub async fn recording_status(&self, call_id: &str, user_id: &str, is_recording: bool) {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let Some(session) = state.sessions.get_mut(call_id) else {
            debug!(call_id = %call_id, "Recording status for unknown call");
            return;
        };
        session.recording.insert(user_id.to_string(), is_recording);

        let others: Vec<String> = session
            .participants
            .iter()
            .filter(|p| p.as_str() != user_id)
            .cloned()
            .collect();
        for user in others {
            Self::send_to(state, &user, ServerEvent::PeerRecordingStatus { is_recording });
        }
    }

    /// Remove the user from the call; remaining participants get
    /// `peer-left` and an emptied session is destroyed with its recording
    /// state. Unknown calls are a no-op.
    pub async fn leave_call(&self, call_id: &str, user_id: &str) {
        let mut state = self.state.lock().await;
        Self::remove_from_session(&mut state, call_id, user_id);
    }

    /// Tear down a closed connection: evict the registry entry (unless a
    /// newer connection took over the user id), best-effort offline mark,
    /// then the leave-call sequence for every session holding the user.
    pub async fn disconnect(&self, user_id: &str, connection_id: &str) {
        {
            let mut state = self.state.lock().await;
            let owned = state
                .connections
                .get(user_id)
                .is_some_and(|h| h.connection_id == connection_id);
            if !owned {
                debug!(user_id = %user_id, connection_id = %connection_id, "Stale disconnect ignored");
                return;
            }
            state.connections.remove(user_id);

            let call_ids: Vec<String> = state
                .sessions
                .iter()
                .filter(|(_, s)| s.participants.contains(user_id))
                .map(|(id, _)| id.clone())
                .collect();
            for call_id in call_ids {
                Self::remove_from_session(&mut state, &call_id, user_id);
            }
        }
        info!(user_id = %user_id, "User disconnected");

        if let Err(e) = self.profiles.set_online(user_id, false).await {
            warn!(user_id = %user_id, error = %e, "Failed to mark user offline");
        }
    }

    fn remove_from_session(state: &mut HubState, call_id: &str, user_id: &str) {
        let (remaining, empty) = {
            let Some(session) = state.sessions.get_mut(call_id) else {
                return;
            };
            session.participants.remove(user_id);
            let remaining: Vec<String> = session.participants.iter().cloned().collect();
            (remaining, session.participants.is_empty())
        };

        for user in &remaining {
            Self::send_to(
                state,
                user,
                ServerEvent::PeerLeft {
                    user_id: user_id.to_string(),
                },
            );
        }

        if empty {
            state.sessions.remove(call_id);
            debug!(call_id = %call_id, "Call session destroyed");
        }
    }

    fn send_to(state: &HubState, user_id: &str, event: ServerEvent) {
        let Some(handle) = state.connections.get(user_id) else {
            debug!(user_id = %user_id, "Dropping event for unconnected user");
            return;
        };
        if handle.tx.try_send(event).is_err() {
            debug!(user_id = %user_id, "Dropping event for stalled connection");
        }
    }

    /// Open an outbound channel sized for one connection.
    pub fn outbound_channel() -> (mpsc::Sender<ServerEvent>, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(OUTBOUND_BUFFER)
    }

    /// Whether a user currently has a live connection.
    pub async fn is_connected(&self, user_id: &str) -> bool {
        self.state.lock().await.connections.contains_key(user_id)
    }

    /// Count of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Whether a call session currently exists.
    pub async fn session_exists(&self, call_id: &str) -> bool {
        self.state.lock().await.sessions.contains_key(call_id)
    }

    /// Participants of a session, sorted, if it exists.
    pub async fn session_participants(&self, call_id: &str) -> Option<Vec<String>> {
        let state = self.state.lock().await;
        state.sessions.get(call_id).map(|s| {
            let mut users: Vec<String> = s.participants.iter().cloned().collect();
            users.sort();
            users
        })
    }
}
