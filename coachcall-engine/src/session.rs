use chrono::{DateTime, Utc};
use serde::Serialize;

use coachcall_core::types::{AgentId, CallId, CallStatus, UserId};

/// What observers render: lifecycle state plus the call's live indicators.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallStatusPayload {
    pub status: CallStatus,
    // A stable string label for UI display.
    pub status_label: String,
    pub session_id: u64,
    pub call_id: Option<CallId>,
    pub duration_seconds: u64,
    pub is_muted: bool,
    pub agent_speaking: bool,
    pub error: Option<String>,
}

impl CallStatusPayload {
    pub fn is_call_active(&self) -> bool {
        self.status == CallStatus::Connected
    }
}

/// Identifiers and timestamps for one call attempt.
///
/// Created by `start()` and kept until the next start. Finalization only marks it `finalized`,
/// so the ended call's ids stay visible in the status view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: u64,
    pub user_id: UserId,
    pub call_id: Option<CallId>,
    pub agent_id: Option<AgentId>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub finalized: bool,
}

impl SessionContext {
    pub fn new(session_id: u64, user_id: UserId) -> Self {
        Self {
            session_id,
            user_id,
            call_id: None,
            agent_id: None,
            started_at: None,
            ended_at: None,
            finalized: false,
        }
    }
}

pub fn now_unix_ms() -> i64 {
    Utc::now().timestamp_millis()
}
