use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AgentId, CallId, TranscriptEntry, UserId};

pub const CALL_STATUS_ENDED: &str = "ended";
pub const CALL_TYPE_WEB_CALL: &str = "web_call";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallCost {
    pub total: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<BTreeMap<String, f64>>,
}

/// The persisted shape of one finished call, as accepted by `save-call-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub user_id: UserId,
    pub call_id: CallId,
    pub agent_id: AgentId,
    pub call_status: String,
    pub call_type: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    // Whole seconds counted by the session timer, not end minus start.
    pub call_duration: u64,
    pub transcript: String,
    pub transcript_object: Vec<TranscriptEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_cost: Option<CallCost>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disconnection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CallRecord {
    pub fn message_count(&self) -> usize {
        self.transcript_object.len()
    }
}
