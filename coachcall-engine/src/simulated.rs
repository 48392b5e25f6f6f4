use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use coachcall_core::types::{AgentId, CallId, RawTranscriptEntry, UserId};

use crate::traits::{
    ClientEvent, CredentialIssuer, EventSink, SessionClient, WebCallCredentials,
};

pub const SIMULATED_AGENT_ID: &str = "sim_agent";
pub const DEFAULT_GREETING: &str =
    "Hello! I'm Olivia, your health coach. How are you feeling today?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    // Measured from the previous step (or from start for the first one).
    pub after: Duration,
    pub event: ClientEvent,
}

impl ScriptStep {
    pub fn new(after: Duration, event: ClientEvent) -> Self {
        Self { after, event }
    }
}

/// The event sequence the simulated adapter plays back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedScript {
    pub steps: Vec<ScriptStep>,
}

impl Default for SimulatedScript {
    fn default() -> Self {
        Self::greeting(DEFAULT_GREETING)
    }
}

impl SimulatedScript {
    /// Connects after 1s, starts talking 1.5s later, and 2s after that delivers the greeting.
    pub fn greeting(text: impl Into<String>) -> Self {
        Self {
            steps: vec![
                ScriptStep::new(Duration::from_millis(1_000), ClientEvent::CallStarted),
                ScriptStep::new(Duration::from_millis(1_500), ClientEvent::AgentStartTalking),
                ScriptStep::new(
                    Duration::from_millis(2_000),
                    ClientEvent::Update {
                        transcript: vec![RawTranscriptEntry::agent(text)],
                    },
                ),
                ScriptStep::new(Duration::ZERO, ClientEvent::AgentStopTalking),
            ],
        }
    }

    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps }
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.after).sum()
    }
}

struct Running {
    sink: EventSink,
    task: JoinHandle<()>,
}

/// A stand-in for the vendor client that plays a fixed script. Used offline and whenever the
/// vendor adapter can't be loaded.
pub struct SimulatedClient {
    script: SimulatedScript,
    running: Mutex<Option<Running>>,
}

impl Default for SimulatedClient {
    fn default() -> Self {
        Self::new(SimulatedScript::default())
    }
}

impl SimulatedClient {
    pub fn new(script: SimulatedScript) -> Self {
        Self {
            script,
            running: Mutex::new(None),
        }
    }

    fn take_running(&self) -> Option<Running> {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

#[async_trait]
impl SessionClient for SimulatedClient {
    fn backend_name(&self) -> &'static str {
        "simulated"
    }

    async fn start(&self, access_token: &str, events: EventSink) -> anyhow::Result<()> {
        if let Some(prev) = self.take_running() {
            prev.task.abort();
        }

        log::info!(
            "simulated call starting ({} step script, token len={})",
            self.script.steps.len(),
            access_token.len()
        );

        let steps = self.script.steps.clone();
        let sink = events.clone();
        let task = tokio::spawn(async move {
            for step in steps {
                if !step.after.is_zero() {
                    tokio::time::sleep(step.after).await;
                }
                if !sink.emit(step.event).await {
                    break;
                }
            }
        });

        *self.running.lock().unwrap_or_else(|e| e.into_inner()) = Some(Running {
            sink: events,
            task,
        });
        Ok(())
    }

    async fn stop(&self) {
        let Some(running) = self.take_running() else {
            log::debug!("simulated stop: no call running");
            return;
        };
        running.task.abort();
        log::info!("simulated call stopped");
        running.sink.emit(ClientEvent::CallEnded).await;
    }

    async fn mute(&self) {
        log::debug!("simulated mute");
    }

    async fn unmute(&self) {
        log::debug!("simulated unmute");
    }
}

/// Fabricates web-call credentials without contacting any backend.
#[derive(Debug, Default, Clone)]
pub struct SimulatedIssuer;

#[async_trait]
impl CredentialIssuer for SimulatedIssuer {
    async fn create_web_call(&self, user_id: &UserId) -> anyhow::Result<WebCallCredentials> {
        let call_id = format!("sim_call_{}", uuid::Uuid::new_v4().simple());
        log::info!(
            "simulated web call for user {}: call_id={call_id}",
            user_id.as_str()
        );
        Ok(WebCallCredentials {
            call_id: CallId::new(call_id),
            agent_id: AgentId::new(SIMULATED_AGENT_ID),
            access_token: format!("sim_token_{}", uuid::Uuid::new_v4().simple()),
        })
    }
}
