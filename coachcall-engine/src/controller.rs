use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use coachcall_core::record::CallRecord;
use coachcall_core::types::{CallId, CallStatus, TranscriptEntry, UserId};

use crate::record::build_call_record;
use crate::session::{CallStatusPayload, SessionContext, now_unix_ms};
use crate::timer::DurationTimer;
use crate::traits::{
    CallArchive, CallPersistence, ClientEvent, CredentialIssuer, EventReceiver, EventSink,
    SessionClient, Signal,
};
use crate::transcript::TranscriptBuffer;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const FINALIZE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a call is already {0}")]
    SessionActive(&'static str),
    #[error("failed to create web call: {0}")]
    Credentials(String),
    #[error("failed to start call client: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub user_id: UserId,
    pub agent_display_name: String,
}

pub struct ControllerDeps {
    pub client: Arc<dyn SessionClient>,
    pub issuer: Arc<dyn CredentialIssuer>,
    pub persistence: Arc<dyn CallPersistence>,
    pub archive: Option<Arc<dyn CallArchive>>,
}

/// What the results stage needs once a call is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedCall {
    pub session_id: u64,
    pub call_id: Option<CallId>,
    pub transcript: Vec<TranscriptEntry>,
    pub duration_seconds: u64,
    pub record_submitted: bool,
}

#[derive(Default)]
struct Inner {
    status: CallStatus,
    error: Option<String>,
    is_muted: bool,
    agent_speaking: bool,

    // Bumped on every start; events tagged with an older id are dropped.
    session_id: u64,
    session: Option<SessionContext>,

    timer: Option<DurationTimer>,
    frozen_duration: u64,

    // Our own handle on the session channel, used to queue finalization behind pending events.
    events: Option<EventSink>,
}

struct Shared {
    cfg: ControllerConfig,
    client: Arc<dyn SessionClient>,
    issuer: Arc<dyn CredentialIssuer>,
    persistence: Arc<dyn CallPersistence>,
    archive: Option<Arc<dyn CallArchive>>,
    transcript: TranscriptBuffer,
    inner: Mutex<Inner>,
    status_tx: watch::Sender<CallStatusPayload>,
    duration_tx: Arc<watch::Sender<u64>>,
    ended_tx: watch::Sender<Option<EndedCall>>,
    pending_saves: StdMutex<Vec<JoinHandle<()>>>,
}

/// Owns one call at a time: start, mute, stop, and what happens when the vendor says it's over.
///
/// Adapter events for a session are applied by a single task in delivery order, so the
/// call-end handler always sees every transcript update that arrived before it.
#[derive(Clone)]
pub struct CallController {
    shared: Arc<Shared>,
}

impl CallController {
    pub fn new(cfg: ControllerConfig, deps: ControllerDeps) -> Self {
        let (status_tx, _) = watch::channel(Self::payload(&Inner::default()));
        let (duration_tx, _) = watch::channel(0);
        let (ended_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                cfg,
                client: deps.client,
                issuer: deps.issuer,
                persistence: deps.persistence,
                archive: deps.archive,
                transcript: TranscriptBuffer::new(),
                inner: Mutex::new(Inner::default()),
                status_tx,
                duration_tx: Arc::new(duration_tx),
                ended_tx,
                pending_saves: StdMutex::new(Vec::new()),
            }),
        }
    }

    pub async fn status(&self) -> CallStatusPayload {
        let inner = self.shared.inner.lock().await;
        Self::payload(&inner)
    }

    pub fn subscribe_status(&self) -> watch::Receiver<CallStatusPayload> {
        self.shared.status_tx.subscribe()
    }

    /// Ticks once per connected second.
    pub fn subscribe_duration(&self) -> watch::Receiver<u64> {
        self.shared.duration_tx.subscribe()
    }

    pub fn subscribe_ended(&self) -> watch::Receiver<Option<EndedCall>> {
        self.shared.ended_tx.subscribe()
    }

    pub fn transcript(&self) -> &TranscriptBuffer {
        &self.shared.transcript
    }

    pub fn last_call(&self) -> Option<EndedCall> {
        self.shared.ended_tx.borrow().clone()
    }

    pub fn client_backend(&self) -> &'static str {
        self.shared.client.backend_name()
    }

    /// Starts a new call. A call that was just stopped is finalized first, so its record is
    /// never dropped by the restart.
    pub async fn start(&self) -> Result<(), ControllerError> {
        self.wait_for_pending_finalize().await?;

        let (session_id, sink) = {
            let mut inner = self.shared.inner.lock().await;
            if inner.status.is_active() {
                log::warn!("start ignored: call already {}", inner.status.label());
                return Err(ControllerError::SessionActive(inner.status.label()));
            }
            if Self::finalize_pending(&inner) {
                log::warn!("start ignored: previous call is still ending");
                return Err(ControllerError::SessionActive("ending"));
            }

            if let Some(mut timer) = inner.timer.take() {
                timer.stop();
            }
            inner.session_id += 1;
            let session_id = inner.session_id;
            inner.session = Some(SessionContext::new(
                session_id,
                self.shared.cfg.user_id.clone(),
            ));
            inner.error = None;
            inner.is_muted = false;
            inner.agent_speaking = false;
            inner.frozen_duration = 0;
            self.shared.duration_tx.send_replace(0);
            self.shared.transcript.clear();

            // Replacing our sink closes the previous session's channel once its adapter lets go.
            let (sink, rx) = EventSink::channel(EVENT_CHANNEL_CAPACITY);
            inner.events = Some(sink.clone());
            self.set_status(&mut inner, CallStatus::Connecting);

            tokio::spawn(self.clone().run_event_pump(session_id, rx));
            (session_id, sink)
        };

        log::info!(
            "starting call: session_id={session_id} client={}",
            self.shared.client.backend_name()
        );

        let creds = match self
            .shared
            .issuer
            .create_web_call(&self.shared.cfg.user_id)
            .await
        {
            Ok(creds) => creds,
            Err(e) => {
                let msg = format!("{e:#}");
                self.fail(session_id, &msg).await;
                return Err(ControllerError::Credentials(msg));
            }
        };

        {
            let mut inner = self.shared.inner.lock().await;
            if !Self::is_current(&inner, session_id) || inner.status != CallStatus::Connecting {
                log::info!("session {session_id} stopped while connecting; client not started");
                return Ok(());
            }
            if let Some(ctx) = inner.session.as_mut() {
                ctx.call_id = Some(creds.call_id.clone());
                ctx.agent_id = Some(creds.agent_id.clone());
            }
            self.publish(&inner);
        }
        log::info!(
            "web call created: call_id={} agent_id={}",
            creds.call_id.as_str(),
            creds.agent_id.as_str()
        );

        if let Err(e) = self.shared.client.start(&creds.access_token, sink).await {
            let msg = format!("{e:#}");
            self.fail(session_id, &msg).await;
            return Err(ControllerError::Client(msg));
        }
        Ok(())
    }

    async fn wait_for_pending_finalize(&self) -> Result<(), ControllerError> {
        let pending = {
            let inner = self.shared.inner.lock().await;
            if !Self::finalize_pending(&inner) {
                return Ok(());
            }
            inner.session_id
        };

        log::debug!("waiting for session {pending} to finalize before starting");
        let mut ended = self.shared.ended_tx.subscribe();
        let finished = tokio::time::timeout(
            FINALIZE_WAIT,
            ended.wait_for(|e| e.as_ref().is_some_and(|e| e.session_id >= pending)),
        )
        .await
        .is_ok_and(|r| r.is_ok());
        if finished {
            Ok(())
        } else {
            log::warn!("session {pending} did not finalize in time; start refused");
            Err(ControllerError::SessionActive("ending"))
        }
    }

    /// Ends the call from our side. Safe to call repeatedly; only the first call does anything.
    pub async fn stop(&self) {
        let (marker, stop_client) = {
            let mut inner = self.shared.inner.lock().await;
            let session_live = inner
                .session
                .as_ref()
                .is_some_and(|ctx| !ctx.finalized);

            match inner.status {
                CallStatus::Connecting | CallStatus::Connected => {
                    Self::freeze_timer(&mut inner);
                    if let Some(ctx) = inner.session.as_mut() {
                        ctx.ended_at.get_or_insert_with(Utc::now);
                    }
                    inner.agent_speaking = false;
                    self.set_status(&mut inner, CallStatus::Ended);
                    (inner.events.clone(), true)
                }
                // The adapter may still be holding a connection after a transport error.
                CallStatus::Error if session_live => (None, true),
                status => {
                    log::debug!("stop ignored in status {status:?}");
                    (None, false)
                }
            }
        };

        if let Some(sink) = marker {
            if !sink.request_stop().await {
                log::debug!("event pump already gone; nothing to finalize");
            }
        }

        if stop_client {
            let client = self.shared.client.clone();
            tokio::spawn(async move {
                client.stop().await;
            });
        }
    }

    pub async fn mute(&self) -> bool {
        self.set_muted(true).await
    }

    pub async fn unmute(&self) -> bool {
        self.set_muted(false).await
    }

    pub async fn toggle_mute(&self) -> bool {
        let target = !self.shared.inner.lock().await.is_muted;
        self.set_muted(target).await
    }

    /// Waits for submitted records to finish saving.
    pub async fn flush(&self) {
        let handles = {
            let mut pending = self
                .shared
                .pending_saves
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *pending)
        };
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("call save task did not complete: {e}");
            }
        }
    }

    async fn set_muted(&self, muted: bool) -> bool {
        {
            let mut inner = self.shared.inner.lock().await;
            if inner.status != CallStatus::Connected {
                log::debug!("mute change ignored in status {:?}", inner.status);
                return inner.is_muted;
            }
            if inner.is_muted == muted {
                return muted;
            }
            inner.is_muted = muted;
            self.publish(&inner);
        }

        if muted {
            self.shared.client.mute().await;
        } else {
            self.shared.client.unmute().await;
        }
        log::info!("microphone {}", if muted { "muted" } else { "unmuted" });
        muted
    }

    async fn run_event_pump(self, session_id: u64, mut rx: EventReceiver) {
        while let Some(signal) = rx.recv_signal().await {
            let keep_going = match signal {
                Signal::Client(event) => self.handle_event(session_id, event).await,
                Signal::StopRequested => {
                    self.finalize(session_id, "stopped").await;
                    false
                }
            };
            if !keep_going {
                break;
            }
        }
        log::debug!("event pump exited: session_id={session_id}");
    }

    async fn handle_event(&self, session_id: u64, event: ClientEvent) -> bool {
        log::debug!(
            "client event: session_id={session_id} event={}",
            event.name()
        );

        if event == ClientEvent::CallEnded {
            self.finalize(session_id, "call_ended").await;
            return false;
        }

        let mut inner = self.shared.inner.lock().await;
        if !Self::is_current(&inner, session_id) {
            log::debug!("dropping {} for stale session {session_id}", event.name());
            return false;
        }

        match event {
            ClientEvent::CallStarted => {
                if inner.status != CallStatus::Connecting {
                    log::warn!("call_started ignored in status {:?}", inner.status);
                    return true;
                }
                if let Some(ctx) = inner.session.as_mut() {
                    ctx.started_at = Some(Utc::now());
                }
                inner.timer = Some(DurationTimer::start(self.shared.duration_tx.clone()));
                self.set_status(&mut inner, CallStatus::Connected);
            }
            ClientEvent::AgentStartTalking | ClientEvent::AgentStopTalking => {
                let speaking = event == ClientEvent::AgentStartTalking;
                if inner.status == CallStatus::Connected && inner.agent_speaking != speaking {
                    inner.agent_speaking = speaking;
                    self.publish(&inner);
                }
            }
            ClientEvent::Update { transcript } => {
                let n = self
                    .shared
                    .transcript
                    .replace_from_raw(&transcript, now_unix_ms());
                log::debug!("transcript replaced: {n} entries");
            }
            ClientEvent::Error { message } => {
                self.fail_locked(&mut inner, &message);
            }
            ClientEvent::CallEnded => {}
        }
        true
    }

    async fn fail(&self, session_id: u64, message: &str) {
        let mut inner = self.shared.inner.lock().await;
        if !Self::is_current(&inner, session_id) {
            log::debug!("error for stale session {session_id} ignored: {message}");
            return;
        }
        self.fail_locked(&mut inner, message);
        // The session never got going; its event pump winds down once the adapter's sink is gone.
        if inner.status == CallStatus::Error {
            inner.events = None;
        }
    }

    fn fail_locked(&self, inner: &mut Inner, message: &str) {
        if !inner.status.is_active() {
            log::warn!(
                "call error after {}: {message}",
                inner.status.label()
            );
            return;
        }
        log::error!("call error: {message}");
        Self::freeze_timer(inner);
        inner.agent_speaking = false;
        inner.error = Some(message.to_string());
        self.set_status(inner, CallStatus::Error);
    }

    async fn finalize(&self, session_id: u64, reason: &str) {
        let record = {
            let mut inner = self.shared.inner.lock().await;
            if !Self::is_current(&inner, session_id) {
                log::debug!("finalize skipped for session {session_id}: already done or stale");
                return;
            }

            Self::freeze_timer(&mut inner);
            inner.agent_speaking = false;
            inner.events = None;
            let duration = inner.frozen_duration;

            let Some(ctx) = inner.session.as_mut() else {
                return;
            };
            ctx.finalized = true;
            let ended_at = *ctx.ended_at.get_or_insert_with(Utc::now);
            let ctx = ctx.clone();

            // An earlier error stays visible; the record is still saved if it's complete.
            if inner.status == CallStatus::Error {
                self.publish(&inner);
            } else {
                self.set_status(&mut inner, CallStatus::Ended);
            }

            let transcript = self.shared.transcript.snapshot();
            let record = build_call_record(
                &ctx,
                ended_at,
                duration,
                &transcript,
                &self.shared.cfg.agent_display_name,
            );

            log::info!(
                "call finalized: session_id={session_id} reason={reason} duration={duration}s entries={}",
                transcript.len()
            );

            self.shared.ended_tx.send_replace(Some(EndedCall {
                session_id,
                call_id: ctx.call_id.clone(),
                transcript: transcript.to_vec(),
                duration_seconds: duration,
                record_submitted: record.is_ok(),
            }));
            record
        };

        match record {
            Ok(record) => self.submit(record),
            Err(e) => log::warn!("call data not saved: {e}"),
        }
    }

    fn submit(&self, record: CallRecord) {
        let persistence = self.shared.persistence.clone();
        let archive = self.shared.archive.clone();

        let handle = tokio::spawn(async move {
            let saved = match persistence.save_call_data(&record).await {
                Ok(()) => {
                    log::info!(
                        "call data saved: call_id={} messages={} duration={}s",
                        record.call_id.as_str(),
                        record.message_count(),
                        record.call_duration
                    );
                    true
                }
                Err(e) => {
                    log::error!(
                        "failed to save call data: call_id={} error={e:#}",
                        record.call_id.as_str()
                    );
                    false
                }
            };

            if let Some(archive) = archive {
                if let Err(e) = archive.archive(&record, saved) {
                    log::warn!("failed to archive call locally: {e:#}");
                }
            }
        });

        let mut pending = self
            .shared
            .pending_saves
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    fn is_current(inner: &Inner, session_id: u64) -> bool {
        inner
            .session
            .as_ref()
            .is_some_and(|ctx| ctx.session_id == session_id && !ctx.finalized)
    }

    // Stopped from our side, with the queued finalization not yet applied.
    fn finalize_pending(inner: &Inner) -> bool {
        inner.status == CallStatus::Ended
            && inner.session.as_ref().is_some_and(|ctx| !ctx.finalized)
    }

    fn freeze_timer(inner: &mut Inner) {
        if let Some(mut timer) = inner.timer.take() {
            inner.frozen_duration = timer.stop();
        }
    }

    fn set_status(&self, inner: &mut Inner, next: CallStatus) {
        let prev = inner.status;
        if prev != next {
            log::info!("call status: {prev:?} -> {next:?}");
        }
        inner.status = next;
        self.publish(inner);
    }

    fn publish(&self, inner: &Inner) {
        self.shared.status_tx.send_replace(Self::payload(inner));
    }

    fn payload(inner: &Inner) -> CallStatusPayload {
        CallStatusPayload {
            status: inner.status,
            status_label: inner.status.label().into(),
            session_id: inner.session_id,
            call_id: inner.session.as_ref().and_then(|ctx| ctx.call_id.clone()),
            duration_seconds: inner
                .timer
                .as_ref()
                .map(DurationTimer::elapsed_secs)
                .unwrap_or(inner.frozen_duration),
            is_muted: inner.is_muted,
            agent_speaking: inner.agent_speaking,
            error: inner.error.clone(),
        }
    }
}
