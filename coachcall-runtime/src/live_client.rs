use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use coachcall_engine::traits::{ClientEvent, EventSink, SessionClient};
use coachcall_providers::gateway::{
    GatewayConfig, GatewayEvent, GatewayHandle, spawn_gateway_session,
};

struct ActiveSession {
    handle: GatewayHandle,
    forwarder: JoinHandle<()>,
}

/// Vendor realtime client: one gateway websocket per call, events forwarded onto the session sink.
pub struct LiveClient {
    gateway_url: Url,
    connect_timeout: Duration,
    active: Mutex<Option<ActiveSession>>,
}

impl LiveClient {
    pub fn new(gateway_url: Url) -> Self {
        Self {
            gateway_url,
            connect_timeout: Duration::from_secs(10),
            active: Mutex::new(None),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn gateway_url(&self) -> &Url {
        &self.gateway_url
    }

    async fn current_handle(&self) -> Option<GatewayHandle> {
        self.active.lock().await.as_ref().map(|s| s.handle.clone())
    }
}

fn to_client_event(ev: GatewayEvent) -> ClientEvent {
    match ev {
        GatewayEvent::CallStarted => ClientEvent::CallStarted,
        GatewayEvent::CallEnded => ClientEvent::CallEnded,
        GatewayEvent::AgentStartTalking => ClientEvent::AgentStartTalking,
        GatewayEvent::AgentStopTalking => ClientEvent::AgentStopTalking,
        GatewayEvent::Update { transcript } => ClientEvent::Update { transcript },
        GatewayEvent::Error { message } => ClientEvent::Error { message },
    }
}

#[async_trait]
impl SessionClient for LiveClient {
    fn backend_name(&self) -> &'static str {
        "live"
    }

    async fn start(&self, access_token: &str, events: EventSink) -> anyhow::Result<()> {
        let mut active = self.active.lock().await;
        if let Some(prev) = active.take() {
            // A previous call that never confirmed its hang-up.
            prev.handle.shutdown().await;
            prev.forwarder.abort();
        }

        let cfg = GatewayConfig {
            gateway_url: self.gateway_url.clone(),
            access_token: access_token.to_string(),
            connect_timeout: self.connect_timeout,
        };
        let (handle, mut rx) = spawn_gateway_session(cfg).await?;

        let forwarder = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                if !events.emit(to_client_event(ev)).await {
                    log::debug!("session stopped listening; dropping gateway events");
                    break;
                }
            }
        });

        *active = Some(ActiveSession { handle, forwarder });
        Ok(())
    }

    async fn stop(&self) {
        match self.current_handle().await {
            Some(h) => {
                if !h.stop().await {
                    log::debug!("stop: gateway session already closed");
                }
            }
            None => log::debug!("stop: no live gateway session"),
        }
    }

    async fn mute(&self) {
        if let Some(h) = self.current_handle().await {
            h.mute().await;
        }
    }

    async fn unmute(&self) {
        if let Some(h) = self.current_handle().await {
            h.unmute().await;
        }
    }
}
