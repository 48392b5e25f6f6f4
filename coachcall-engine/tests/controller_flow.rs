use std::sync::{Arc, Mutex};
use std::time::Duration;

use coachcall_core::record::CallRecord;
use coachcall_core::types::{AgentId, CallId, CallStatus, RawTranscriptEntry, UserId};
use coachcall_engine::controller::{
    CallController, ControllerConfig, ControllerDeps, ControllerError, EndedCall,
};
use coachcall_engine::simulated::{
    DEFAULT_GREETING, ScriptStep, SimulatedClient, SimulatedIssuer, SimulatedScript,
};
use coachcall_engine::traits::{
    CallArchive, CallPersistence, ClientEvent, CredentialIssuer, EventSink, SessionClient,
    WebCallCredentials,
};

#[derive(Default)]
struct ManualClient {
    calls: Mutex<Vec<&'static str>>,
    sinks: Mutex<Vec<EventSink>>,
    fail_start: bool,
}

impl ManualClient {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn sink(&self, idx: usize) -> EventSink {
        self.sinks.lock().unwrap()[idx].clone()
    }
}

#[async_trait::async_trait]
impl SessionClient for ManualClient {
    fn backend_name(&self) -> &'static str {
        "manual"
    }

    async fn start(&self, _access_token: &str, events: EventSink) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("start");
        self.sinks.lock().unwrap().push(events);
        if self.fail_start {
            anyhow::bail!("microphone permission denied");
        }
        Ok(())
    }

    async fn stop(&self) {
        self.calls.lock().unwrap().push("stop");
    }

    async fn mute(&self) {
        self.calls.lock().unwrap().push("mute");
    }

    async fn unmute(&self) {
        self.calls.lock().unwrap().push("unmute");
    }
}

struct FixedIssuer {
    fail: bool,
    delay: Duration,
}

#[async_trait::async_trait]
impl CredentialIssuer for FixedIssuer {
    async fn create_web_call(&self, _user_id: &UserId) -> anyhow::Result<WebCallCredentials> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("web call endpoint returned 503");
        }
        Ok(WebCallCredentials {
            call_id: CallId::new("call_abc"),
            agent_id: AgentId::new("agent_1"),
            access_token: "tok".into(),
        })
    }
}

#[derive(Default)]
struct MemoryPersistence {
    fail: bool,
    saved: Mutex<Vec<CallRecord>>,
}

#[async_trait::async_trait]
impl CallPersistence for MemoryPersistence {
    async fn save_call_data(&self, record: &CallRecord) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("save-call-data returned 500");
        }
        self.saved.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryArchive {
    entries: Mutex<Vec<(CallId, bool)>>,
}

impl CallArchive for MemoryArchive {
    fn archive(&self, record: &CallRecord, saved: bool) -> anyhow::Result<()> {
        self.entries
            .lock()
            .unwrap()
            .push((record.call_id.clone(), saved));
        Ok(())
    }
}

struct Harness {
    controller: CallController,
    persistence: Arc<MemoryPersistence>,
    archive: Arc<MemoryArchive>,
}

fn harness(
    client: Arc<dyn SessionClient>,
    issuer: Arc<dyn CredentialIssuer>,
    persistence: MemoryPersistence,
) -> Harness {
    let persistence = Arc::new(persistence);
    let archive = Arc::new(MemoryArchive::default());
    let controller = CallController::new(
        ControllerConfig {
            user_id: UserId::new("user_001"),
            agent_display_name: "Olivia".into(),
        },
        ControllerDeps {
            client,
            issuer,
            persistence: persistence.clone(),
            archive: Some(archive.clone()),
        },
    );
    Harness {
        controller,
        persistence,
        archive,
    }
}

fn issuer() -> Arc<dyn CredentialIssuer> {
    Arc::new(FixedIssuer {
        fail: false,
        delay: Duration::ZERO,
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

async fn wait_ended(controller: &CallController, session_id: u64) -> EndedCall {
    let mut rx = controller.subscribe_ended();
    let ended = rx
        .wait_for(|e| e.as_ref().is_some_and(|e| e.session_id == session_id))
        .await
        .unwrap();
    ended.clone().unwrap()
}

#[tokio::test(start_paused = true)]
async fn simulated_call_is_saved_with_greeting() {
    let h = harness(
        Arc::new(SimulatedClient::default()),
        Arc::new(SimulatedIssuer),
        MemoryPersistence::default(),
    );

    h.controller.start().await.unwrap();
    assert_eq!(h.controller.status().await.status, CallStatus::Connecting);

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Connected);
    assert_eq!(status.status_label, "connected");
    assert_eq!(status.duration_seconds, 4);
    assert!(!status.agent_speaking);
    assert_eq!(h.controller.transcript().len(), 1);

    h.controller.stop().await;
    assert_eq!(h.controller.status().await.status, CallStatus::Ended);

    let ended = wait_ended(&h.controller, status.session_id).await;
    assert!(ended.record_submitted);
    h.controller.flush().await;

    let saved = h.persistence.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    let record = &saved[0];
    assert!(record.call_id.as_str().starts_with("sim_call_"));
    assert_eq!(record.agent_id.as_str(), "sim_agent");
    assert_eq!(record.call_duration, 4);
    assert_eq!(record.call_status, "ended");
    assert_eq!(record.transcript, format!("Olivia: {DEFAULT_GREETING}"));
    assert!(record.end_timestamp >= record.start_timestamp);

    assert_eq!(h.archive.entries.lock().unwrap().len(), 1);
    assert!(h.archive.entries.lock().unwrap()[0].1);
}

#[tokio::test(start_paused = true)]
async fn error_before_connect_is_not_persisted() {
    let script = SimulatedScript::new(vec![ScriptStep::new(
        Duration::from_millis(500),
        ClientEvent::Error {
            message: "ICE negotiation failed".into(),
        },
    )]);
    let h = harness(
        Arc::new(SimulatedClient::new(script)),
        issuer(),
        MemoryPersistence::default(),
    );

    h.controller.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Error);
    assert_eq!(status.error.as_deref(), Some("ICE negotiation failed"));

    // Hanging up the errored call lets the adapter report call_ended.
    h.controller.stop().await;
    let ended = wait_ended(&h.controller, status.session_id).await;
    assert!(!ended.record_submitted);
    h.controller.flush().await;

    assert!(h.persistence.saved.lock().unwrap().is_empty());
    assert_eq!(h.controller.status().await.status, CallStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn later_updates_replace_earlier_ones() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::Update {
        transcript: vec![RawTranscriptEntry::agent("Hi there")],
    })
    .await;
    sink.emit(ClientEvent::Update {
        transcript: vec![
            RawTranscriptEntry::agent("Hi there"),
            RawTranscriptEntry::user("Hello"),
            RawTranscriptEntry::agent("How did you sleep?"),
        ],
    })
    .await;
    sink.emit(ClientEvent::CallEnded).await;

    let session_id = h.controller.status().await.session_id;
    let ended = wait_ended(&h.controller, session_id).await;
    assert_eq!(ended.transcript.len(), 3);
    h.controller.flush().await;

    let saved = h.persistence.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].transcript_object.len(), 3);
    assert_eq!(
        saved[0].transcript,
        "Olivia: Hi there\nUser: Hello\nOlivia: How did you sleep?"
    );
    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Ended);
    assert_eq!(status.call_id, Some(CallId::new("call_abc")));
}

#[tokio::test(start_paused = true)]
async fn credential_failure_never_touches_client() {
    let client = Arc::new(ManualClient::default());
    let h = harness(
        client.clone(),
        Arc::new(FixedIssuer {
            fail: true,
            delay: Duration::ZERO,
        }),
        MemoryPersistence::default(),
    );

    let err = h.controller.start().await.unwrap_err();
    assert!(matches!(err, ControllerError::Credentials(_)));

    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Error);
    assert!(status.error.unwrap().contains("503"));
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn client_start_failure_becomes_error_status() {
    let client = Arc::new(ManualClient {
        fail_start: true,
        ..ManualClient::default()
    });
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    let err = h.controller.start().await.unwrap_err();
    assert!(matches!(err, ControllerError::Client(_)));
    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Error);
    assert_eq!(
        status.error.as_deref(),
        Some("microphone permission denied")
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_stop_submits_once() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::Update {
        transcript: vec![RawTranscriptEntry::user("bye")],
    })
    .await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    h.controller.stop().await;
    h.controller.stop().await;
    // The vendor confirming the hang-up must not produce a second record either.
    sink.emit(ClientEvent::CallEnded).await;

    let session_id = h.controller.status().await.session_id;
    wait_ended(&h.controller, session_id).await;
    settle().await;
    h.controller.flush().await;

    let saved = h.persistence.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].call_duration, 2);
    assert_eq!(
        client.calls().iter().filter(|c| **c == "stop").count(),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn restart_right_after_stop_keeps_first_record() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let first_id = h.controller.status().await.session_id;
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::Update {
        transcript: vec![RawTranscriptEntry::user("I slept badly")],
    })
    .await;
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    h.controller.stop().await;
    h.controller.start().await.unwrap();

    let first = h.controller.last_call().unwrap();
    assert_eq!(first.session_id, first_id);
    assert!(first.record_submitted);
    let status = h.controller.status().await;
    assert_eq!(status.session_id, first_id + 1);
    assert_eq!(status.status, CallStatus::Connecting);
    assert!(h.controller.transcript().is_empty());

    h.controller.flush().await;
    let saved = h.persistence.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].transcript, "User: I slept badly");
    assert_eq!(saved[0].call_duration, 2);
}

#[tokio::test(start_paused = true)]
async fn duration_freezes_at_stop() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());
    let duration = h.controller.subscribe_duration();

    h.controller.start().await.unwrap();
    client.sink(0).emit(ClientEvent::CallStarted).await;
    tokio::time::sleep(Duration::from_millis(3_200)).await;
    assert_eq!(*duration.borrow(), 3);

    h.controller.stop().await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*duration.borrow(), 3);
    assert_eq!(h.controller.status().await.duration_seconds, 3);
}

#[tokio::test(start_paused = true)]
async fn start_while_active_is_rejected() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let err = h.controller.start().await.unwrap_err();
    assert_eq!(err, ControllerError::SessionActive("connecting"));

    client.sink(0).emit(ClientEvent::CallStarted).await;
    settle().await;
    let err = h.controller.start().await.unwrap_err();
    assert_eq!(err, ControllerError::SessionActive("connected"));
    assert_eq!(client.calls(), vec!["start"]);
}

#[tokio::test(start_paused = true)]
async fn stale_session_events_are_dropped() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let first = client.sink(0);
    first
        .emit(ClientEvent::Error {
            message: "socket closed".into(),
        })
        .await;
    settle().await;
    assert_eq!(h.controller.status().await.status, CallStatus::Error);

    h.controller.start().await.unwrap();
    let second_id = h.controller.status().await.session_id;

    // The first session's adapter keeps talking after we moved on.
    first.emit(ClientEvent::CallStarted).await;
    first
        .emit(ClientEvent::Update {
            transcript: vec![RawTranscriptEntry::agent("old call")],
        })
        .await;
    settle().await;

    let status = h.controller.status().await;
    assert_eq!(status.session_id, second_id);
    assert_eq!(status.status, CallStatus::Connecting);
    assert!(h.controller.transcript().is_empty());
    assert_eq!(status.error, None);
}

#[tokio::test(start_paused = true)]
async fn mute_only_applies_while_connected() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    assert!(!h.controller.mute().await);
    h.controller.start().await.unwrap();
    client.sink(0).emit(ClientEvent::CallStarted).await;
    settle().await;

    assert!(h.controller.mute().await);
    assert!(h.controller.status().await.is_muted);
    assert!(h.controller.mute().await);
    assert!(!h.controller.toggle_mute().await);
    assert!(!h.controller.status().await.is_muted);

    assert_eq!(client.calls(), vec!["start", "mute", "unmute"]);
}

#[tokio::test(start_paused = true)]
async fn agent_speaking_follows_talk_events() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());
    let mut status_rx = h.controller.subscribe_status();

    h.controller.start().await.unwrap();
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::AgentStartTalking).await;
    settle().await;
    assert!(status_rx.borrow_and_update().agent_speaking);

    sink.emit(ClientEvent::AgentStopTalking).await;
    settle().await;
    assert!(!status_rx.borrow_and_update().agent_speaking);
}

#[tokio::test(start_paused = true)]
async fn stop_while_connecting_skips_client_start() {
    let client = Arc::new(ManualClient::default());
    let h = harness(
        client.clone(),
        Arc::new(FixedIssuer {
            fail: false,
            delay: Duration::from_secs(2),
        }),
        MemoryPersistence::default(),
    );

    let controller = h.controller.clone();
    let starting = tokio::spawn(async move { controller.start().await });
    settle().await;
    h.controller.stop().await;

    assert_eq!(starting.await.unwrap(), Ok(()));
    assert_eq!(h.controller.status().await.status, CallStatus::Ended);
    assert!(!client.calls().contains(&"start"));
    h.controller.flush().await;
    assert!(h.persistence.saved.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transport_error_then_call_ended_still_saves() {
    let client = Arc::new(ManualClient::default());
    let h = harness(client.clone(), issuer(), MemoryPersistence::default());

    h.controller.start().await.unwrap();
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::Update {
        transcript: vec![RawTranscriptEntry::user("my knee hurts")],
    })
    .await;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    sink.emit(ClientEvent::Error {
        message: "network lost".into(),
    })
    .await;
    sink.emit(ClientEvent::CallEnded).await;

    let session_id = h.controller.status().await.session_id;
    wait_ended(&h.controller, session_id).await;
    h.controller.flush().await;

    let saved = h.persistence.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].call_duration, 1);
    let status = h.controller.status().await;
    assert_eq!(status.status, CallStatus::Error);
    assert_eq!(status.error.as_deref(), Some("network lost"));
}

#[tokio::test(start_paused = true)]
async fn failed_save_is_archived_as_unsaved() {
    let client = Arc::new(ManualClient::default());
    let h = harness(
        client.clone(),
        issuer(),
        MemoryPersistence {
            fail: true,
            ..MemoryPersistence::default()
        },
    );

    h.controller.start().await.unwrap();
    let sink = client.sink(0);
    sink.emit(ClientEvent::CallStarted).await;
    sink.emit(ClientEvent::Update {
        transcript: vec![RawTranscriptEntry::agent("hello")],
    })
    .await;
    sink.emit(ClientEvent::CallEnded).await;

    let session_id = h.controller.status().await.session_id;
    let ended = wait_ended(&h.controller, session_id).await;
    assert!(ended.record_submitted);
    h.controller.flush().await;

    assert_eq!(h.controller.status().await.status, CallStatus::Ended);
    let archived = h.archive.entries.lock().unwrap().clone();
    assert_eq!(archived, vec![(CallId::new("call_abc"), false)]);
}
