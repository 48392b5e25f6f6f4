use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, client::IntoClientRequest};
use url::Url;

use coachcall_core::types::RawTranscriptEntry;

const WS_SEND_TIMEOUT: Duration = Duration::from_secs(3);
// How long we wait for the gateway to confirm a hang-up before reporting it ourselves.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub gateway_url: Url,
    pub access_token: String,
    pub connect_timeout: Duration,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("gateway_url", &self.gateway_url.as_str())
            .field("access_token", &"[REDACTED]")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl GatewayConfig {
    pub fn new(gateway_url: Url, access_token: impl Into<String>) -> Self {
        Self {
            gateway_url,
            access_token: access_token.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    CallStarted,
    CallEnded,
    AgentStartTalking,
    AgentStopTalking,
    Update { transcript: Vec<RawTranscriptEntry> },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayCmd {
    Mute,
    Unmute,
    Stop,
    Shutdown,
}

impl GatewayCmd {
    fn frame(self) -> Option<String> {
        let kind = match self {
            GatewayCmd::Mute => "mute",
            GatewayCmd::Unmute => "unmute",
            GatewayCmd::Stop => "stop",
            GatewayCmd::Shutdown => return None,
        };
        Some(serde_json::json!({ "type": kind }).to_string())
    }
}

#[derive(Clone)]
pub struct GatewayHandle {
    tx: mpsc::Sender<GatewayCmd>,
}

impl GatewayHandle {
    pub async fn mute(&self) -> bool {
        self.tx.send(GatewayCmd::Mute).await.is_ok()
    }

    pub async fn unmute(&self) -> bool {
        self.tx.send(GatewayCmd::Unmute).await.is_ok()
    }

    /// Asks the gateway to hang up. `CallEnded` follows on the event channel.
    pub async fn stop(&self) -> bool {
        self.tx.send(GatewayCmd::Stop).await.is_ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(GatewayCmd::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub fn build_gateway_url(cfg: &GatewayConfig) -> Url {
    let mut url = cfg.gateway_url.clone();
    url.query_pairs_mut()
        .append_pair("access_token", &cfg.access_token);
    url
}

pub async fn spawn_gateway_session(
    cfg: GatewayConfig,
) -> anyhow::Result<(GatewayHandle, mpsc::Receiver<GatewayEvent>)> {
    if cfg.access_token.trim().is_empty() {
        return Err(anyhow!("missing gateway access token"));
    }

    let url = build_gateway_url(&cfg);
    let req = url
        .as_str()
        .into_client_request()
        .context("build websocket request")?;

    let (ws, _resp) = tokio::time::timeout(cfg.connect_timeout, tokio_tungstenite::connect_async(req))
        .await
        .map_err(|_| anyhow!("gateway connect timed out"))?
        .context("connect realtime gateway websocket")?;
    log::info!("gateway connected: {}", cfg.gateway_url);

    let (ws_write, mut ws_read) = ws.split();
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<GatewayCmd>(32);
    let (evt_tx, evt_rx) = mpsc::channel::<GatewayEvent>(64);

    // Writer task: socket writes never block the read loop.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
    tokio::spawn(async move {
        let mut ws_write = ws_write;
        while let Some(msg) = out_rx.recv().await {
            let res = tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(msg)).await;
            if !matches!(res, Ok(Ok(()))) {
                break;
            }
        }
        let _ = ws_write.send(Message::Close(None)).await;
    });

    tokio::spawn(async move {
        let mut stop_deadline: Option<std::pin::Pin<Box<tokio::time::Sleep>>> = None;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    let Some(frame) = cmd.frame() else { break; };
                    if out_tx.send(Message::Text(frame.into())).await.is_err() {
                        let _ = evt_tx.send(GatewayEvent::Error { message: "gateway connection lost".into() }).await;
                        break;
                    }
                    if cmd == GatewayCmd::Stop && stop_deadline.is_none() {
                        stop_deadline = Some(Box::pin(tokio::time::sleep(STOP_GRACE)));
                    }
                }

                msg = ws_read.next() => {
                    let Some(msg) = msg else {
                        let _ = evt_tx.send(closed_event(stop_deadline.is_some())).await;
                        break;
                    };
                    let msg = match msg {
                        Ok(m) => m,
                        Err(e) => {
                            let _ = evt_tx.send(GatewayEvent::Error { message: format!("websocket read failed: {e}") }).await;
                            break;
                        }
                    };

                    let text = match msg {
                        Message::Text(t) => t.to_string(),
                        Message::Binary(b) => String::from_utf8_lossy(&b).to_string(),
                        Message::Close(_) => {
                            let _ = evt_tx.send(closed_event(stop_deadline.is_some())).await;
                            break;
                        }
                        Message::Ping(p) => {
                            if out_tx.try_send(Message::Pong(p)).is_err() {
                                let _ = evt_tx.send(GatewayEvent::Error { message: "failed to send pong".into() }).await;
                                break;
                            }
                            continue;
                        }
                        _ => continue,
                    };

                    match parse_gateway_frame(&text) {
                        Ok(Some(event)) => {
                            let ended = event == GatewayEvent::CallEnded;
                            if evt_tx.send(event).await.is_err() || ended {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => log::debug!("ignoring gateway frame: {e:#}"),
                    }
                }

                _ = async {
                    match stop_deadline.as_mut() {
                        Some(s) => s.as_mut().await,
                        None => std::future::pending::<()>().await,
                    }
                } => {
                    log::warn!("gateway did not confirm hang-up; ending locally");
                    let _ = evt_tx.send(GatewayEvent::CallEnded).await;
                    break;
                }
            }
        }
        log::debug!("gateway session loop exited");
    });

    Ok((GatewayHandle { tx: cmd_tx }, evt_rx))
}

// A close we asked for is a normal hang-up; anything else is a transport failure.
fn closed_event(stop_requested: bool) -> GatewayEvent {
    if stop_requested {
        GatewayEvent::CallEnded
    } else {
        GatewayEvent::Error {
            message: "gateway closed the connection before the call ended".into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    transcript: Vec<RawTranscriptEntry>,
    #[serde(default)]
    message: Option<String>,
}

/// `Ok(None)` for well-formed frames with an event we don't consume.
pub fn parse_gateway_frame(s: &str) -> anyhow::Result<Option<GatewayEvent>> {
    let frame: Frame = serde_json::from_str(s).context("decode gateway frame")?;
    let event = match frame.event.as_str() {
        "call_started" => GatewayEvent::CallStarted,
        "call_ended" => GatewayEvent::CallEnded,
        "agent_start_talking" => GatewayEvent::AgentStartTalking,
        "agent_stop_talking" => GatewayEvent::AgentStopTalking,
        "update" => GatewayEvent::Update {
            transcript: frame.transcript,
        },
        "error" => GatewayEvent::Error {
            message: frame
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "unknown gateway error".into()),
        },
        _ => return Ok(None),
    };
    Ok(Some(event))
}
