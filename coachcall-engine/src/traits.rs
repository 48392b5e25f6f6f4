use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use coachcall_core::record::CallRecord;
use coachcall_core::results::{ConversationSummary, GoalAnalysis, TodoSuggestion};
use coachcall_core::types::{AgentId, CallId, RawTranscriptEntry, TranscriptEntry, UserId};

pub const EVENT_CALL_STARTED: &str = "call_started";
pub const EVENT_CALL_ENDED: &str = "call_ended";
pub const EVENT_AGENT_START_TALKING: &str = "agent_start_talking";
pub const EVENT_AGENT_STOP_TALKING: &str = "agent_stop_talking";
pub const EVENT_UPDATE: &str = "update";
pub const EVENT_ERROR: &str = "error";

/// The vendor event contract. Live and simulated adapters emit exactly these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    CallStarted,
    CallEnded,
    AgentStartTalking,
    AgentStopTalking,
    // Always the full transcript so far, never a delta.
    Update { transcript: Vec<RawTranscriptEntry> },
    Error { message: String },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::CallStarted => EVENT_CALL_STARTED,
            ClientEvent::CallEnded => EVENT_CALL_ENDED,
            ClientEvent::AgentStartTalking => EVENT_AGENT_START_TALKING,
            ClientEvent::AgentStopTalking => EVENT_AGENT_STOP_TALKING,
            ClientEvent::Update { .. } => EVENT_UPDATE,
            ClientEvent::Error { .. } => EVENT_ERROR,
        }
    }
}

#[derive(Debug)]
pub(crate) enum Signal {
    Client(ClientEvent),
    StopRequested,
}

/// Where an adapter delivers its events for one session.
///
/// Cloneable; the session's event pump ends once every sink for it is dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Signal>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (EventSink, EventReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (EventSink { tx }, EventReceiver { rx })
    }

    /// Returns false once the session no longer listens.
    pub async fn emit(&self, event: ClientEvent) -> bool {
        self.tx.send(Signal::Client(event)).await.is_ok()
    }

    pub fn try_emit(&self, event: ClientEvent) -> bool {
        self.tx.try_send(Signal::Client(event)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) async fn request_stop(&self) -> bool {
        self.tx.send(Signal::StopRequested).await.is_ok()
    }
}

#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<Signal>,
}

impl EventReceiver {
    /// Next adapter event, skipping controller-internal signals.
    pub async fn recv(&mut self) -> Option<ClientEvent> {
        loop {
            match self.rx.recv().await? {
                Signal::Client(ev) => return Some(ev),
                Signal::StopRequested => continue,
            }
        }
    }

    pub(crate) async fn recv_signal(&mut self) -> Option<Signal> {
        self.rx.recv().await
    }
}

/// The real-time call transport: either the vendor client or a scripted stand-in.
#[async_trait]
pub trait SessionClient: Send + Sync {
    // Diagnostics only; nothing downstream may branch on it.
    fn backend_name(&self) -> &'static str;

    async fn start(&self, access_token: &str, events: EventSink) -> anyhow::Result<()>;

    /// Fire-and-forget. The adapter reports `call_ended` on its sink when it has hung up.
    async fn stop(&self);

    async fn mute(&self);

    async fn unmute(&self);
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCallCredentials {
    pub call_id: CallId,
    pub agent_id: AgentId,
    pub access_token: String,
}

impl std::fmt::Debug for WebCallCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebCallCredentials")
            .field("call_id", &self.call_id)
            .field("agent_id", &self.agent_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn create_web_call(&self, user_id: &UserId) -> anyhow::Result<WebCallCredentials>;
}

#[async_trait]
pub trait CallPersistence: Send + Sync {
    async fn save_call_data(&self, record: &CallRecord) -> anyhow::Result<()>;
}

/// Local, best-effort trail of finished calls, kept whether or not the remote save worked.
pub trait CallArchive: Send + Sync {
    fn archive(&self, record: &CallRecord, saved: bool) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ResultsBackend: Send + Sync {
    async fn generate_summary(
        &self,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
    ) -> anyhow::Result<ConversationSummary>;

    async fn get_summary(&self, call_id: &CallId) -> anyhow::Result<Option<ConversationSummary>>;

    async fn analyze_goal_achievement(
        &self,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
        patient_id: &UserId,
        patient_name: &str,
    ) -> anyhow::Result<GoalAnalysis>;

    async fn get_goal_analysis(&self, call_id: &CallId) -> anyhow::Result<Option<GoalAnalysis>>;

    async fn generate_todo_suggestions(
        &self,
        user_id: &UserId,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
    ) -> anyhow::Result<Vec<TodoSuggestion>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_vendor_contract() {
        assert_eq!(ClientEvent::CallStarted.name(), "call_started");
        assert_eq!(ClientEvent::CallEnded.name(), "call_ended");
        assert_eq!(ClientEvent::AgentStartTalking.name(), "agent_start_talking");
        assert_eq!(ClientEvent::AgentStopTalking.name(), "agent_stop_talking");
        assert_eq!(ClientEvent::Update { transcript: vec![] }.name(), "update");
        assert_eq!(
            ClientEvent::Error {
                message: "x".into()
            }
            .name(),
            "error"
        );
    }

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = WebCallCredentials {
            call_id: CallId::new("call_1"),
            agent_id: AgentId::new("agent_1"),
            access_token: "secret-token".into(),
        };
        let s = format!("{creds:?}");
        assert!(s.contains("call_1"));
        assert!(!s.contains("secret-token"));
        assert!(s.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn receiver_skips_internal_stop_signals() {
        let (sink, mut rx) = EventSink::channel(4);
        assert!(sink.request_stop().await);
        assert!(sink.emit(ClientEvent::CallStarted).await);
        assert_eq!(rx.recv().await, Some(ClientEvent::CallStarted));

        drop(sink);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn emit_fails_once_receiver_is_gone() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.emit(ClientEvent::CallEnded).await);
        assert!(!sink.try_emit(ClientEvent::CallEnded));
    }
}
