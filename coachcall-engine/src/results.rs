use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use coachcall_core::config::ResultsConfig;
use coachcall_core::results::{ArtifactState, CallResults};
use coachcall_core::types::{CallId, TranscriptEntry, UserId};

use crate::controller::EndedCall;
use crate::traits::ResultsBackend;

pub const GENERATION_FAILED: &str =
    "Failed to generate results. The conversation may have been too short.";
pub const POLLING_FAILED: &str = "Failed to retrieve results after polling";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsRequest {
    pub call_id: CallId,
    pub transcript: Vec<TranscriptEntry>,
    pub user_id: UserId,
    pub user_name: String,
}

impl ResultsRequest {
    /// `None` when the call never got a call id.
    pub fn from_ended_call(call: &EndedCall, user_id: UserId, user_name: String) -> Option<Self> {
        Some(Self {
            call_id: call.call_id.clone()?,
            transcript: call.transcript.clone(),
            user_id,
            user_name,
        })
    }
}

/// Drives summary, goal analysis and (optionally) todo suggestions for a finished call.
///
/// Every artifact lands in the shared `CallResults` as soon as its own request resolves;
/// one failing never blocks the others.
pub struct ResultsOrchestrator {
    backend: Arc<dyn ResultsBackend>,
    cfg: ResultsConfig,
    state: watch::Sender<CallResults>,
}

impl ResultsOrchestrator {
    pub fn new(backend: Arc<dyn ResultsBackend>, cfg: ResultsConfig) -> Self {
        let (state, _) = watch::channel(CallResults::default());
        Self {
            backend,
            cfg,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CallResults> {
        self.state.subscribe()
    }

    pub fn current(&self) -> CallResults {
        self.state.borrow().clone()
    }

    pub fn reset(&self) {
        self.state.send_replace(CallResults::default());
    }

    /// Generate everything, then poll for whatever generation didn't return if configured to.
    pub async fn resolve(&self, req: &ResultsRequest) -> CallResults {
        let results = self.generate(req).await;
        let missing = !results.summary.is_ready() || !results.goal_analysis.is_ready();
        if self.cfg.poll_missing && missing && self.eligible(req) {
            return self.poll(&req.call_id).await;
        }
        results
    }

    pub async fn generate(&self, req: &ResultsRequest) -> CallResults {
        if !self.eligible(req) {
            log::info!(
                "skipping results for call {}: transcript has {} entries",
                req.call_id.as_str(),
                req.transcript.len()
            );
            return self.current();
        }

        log::info!(
            "generating results: call_id={} entries={}",
            req.call_id.as_str(),
            req.transcript.len()
        );
        self.state.send_replace(CallResults::loading());

        let summary = async {
            let res = self
                .backend
                .generate_summary(&req.call_id, &req.transcript)
                .await;
            if let Err(e) = &res {
                log::error!("summary generation failed: {e:#}");
            }
            self.state
                .send_modify(|s| s.summary = ArtifactState::from_result(res));
        };

        let goal = async {
            let res = self
                .backend
                .analyze_goal_achievement(
                    &req.call_id,
                    &req.transcript,
                    &req.user_id,
                    &req.user_name,
                )
                .await;
            if let Err(e) = &res {
                log::error!("goal analysis failed: {e:#}");
            }
            self.state
                .send_modify(|s| s.goal_analysis = ArtifactState::from_result(res));
        };

        let todos = async {
            if !self.cfg.todo_suggestions {
                return;
            }
            let res = self
                .backend
                .generate_todo_suggestions(&req.user_id, &req.call_id, &req.transcript)
                .await;
            if let Err(e) = &res {
                log::warn!("todo suggestions failed: {e:#}");
            }
            self.state
                .send_modify(|s| s.todos = ArtifactState::from_result(res));
        };

        tokio::join!(summary, goal, todos);

        self.state.send_modify(|s| {
            s.is_loading = false;
            if s.summary.is_failed() && s.goal_analysis.is_failed() {
                s.error = Some(GENERATION_FAILED.into());
            }
        });
        self.current()
    }

    /// Fetches previously generated artifacts by call id until both are present or the attempt
    /// budget runs out. Fetch errors count as "not yet available".
    pub async fn poll(&self, call_id: &CallId) -> CallResults {
        let interval = Duration::from_millis(self.cfg.poll_interval_ms);
        let attempts = self.cfg.poll_max_attempts.max(1);

        self.state.send_modify(|s| s.is_loading = true);

        for attempt in 1..=attempts {
            let (need_summary, need_goal) = {
                let s = self.state.borrow();
                (!s.summary.is_ready(), !s.goal_analysis.is_ready())
            };
            if !need_summary && !need_goal {
                break;
            }

            log::debug!(
                "polling results: call_id={} attempt={attempt}/{attempts}",
                call_id.as_str()
            );

            let summary = async {
                if !need_summary {
                    return;
                }
                match self.backend.get_summary(call_id).await {
                    Ok(Some(v)) => self
                        .state
                        .send_modify(|s| s.summary = ArtifactState::Ready(v)),
                    Ok(None) => {}
                    Err(e) => log::debug!("summary not available yet: {e:#}"),
                }
            };
            let goal = async {
                if !need_goal {
                    return;
                }
                match self.backend.get_goal_analysis(call_id).await {
                    Ok(Some(v)) => self
                        .state
                        .send_modify(|s| s.goal_analysis = ArtifactState::Ready(v)),
                    Ok(None) => {}
                    Err(e) => log::debug!("goal analysis not available yet: {e:#}"),
                }
            };
            tokio::join!(summary, goal);

            let done = {
                let s = self.state.borrow();
                s.summary.is_ready() && s.goal_analysis.is_ready()
            };
            if done {
                break;
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        self.state.send_modify(|s| {
            s.is_loading = false;
            s.error = if s.summary.is_ready() || s.goal_analysis.is_ready() {
                None
            } else {
                Some(POLLING_FAILED.into())
            };
        });

        let results = self.current();
        log::info!(
            "results polling finished: call_id={} summary={} goal={}",
            call_id.as_str(),
            results.summary.is_ready(),
            results.goal_analysis.is_ready()
        );
        results
    }

    fn eligible(&self, req: &ResultsRequest) -> bool {
        req.transcript.len() >= self.cfg.min_transcript_entries.max(1)
    }
}
