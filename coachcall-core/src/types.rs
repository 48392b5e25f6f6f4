use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    User,
}

impl Role {
    /// Vendors label turns loosely; anything that is not exactly `agent` is the caller.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw {
            Some("agent") => Role::Agent,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    // Unix epoch milliseconds, as delivered by the vendor.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl TranscriptEntry {
    pub fn new(role: Role, content: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp_ms,
        }
    }
}

/// A transcript turn as the adapter delivers it, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawTranscriptEntry {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl RawTranscriptEntry {
    pub fn agent(content: impl Into<String>) -> Self {
        Self {
            role: Some("agent".into()),
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Some("user".into()),
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn normalize(&self, arrived_at_ms: i64) -> TranscriptEntry {
        TranscriptEntry {
            role: Role::normalize(self.role.as_deref()),
            content: self.content.clone(),
            timestamp_ms: self.timestamp.unwrap_or(arrived_at_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    Ended,
    Error,
}

impl CallStatus {
    pub fn label(self) -> &'static str {
        match self {
            CallStatus::Idle => "idle",
            CallStatus::Connecting => "connecting",
            CallStatus::Connected => "connected",
            CallStatus::Ended => "ended",
            CallStatus::Error => "error",
        }
    }

    /// A session in one of these states still owns the adapter.
    pub fn is_active(self) -> bool {
        matches!(self, CallStatus::Connecting | CallStatus::Connected)
    }
}
