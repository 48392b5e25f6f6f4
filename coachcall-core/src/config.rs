use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::DEFAULT_AGENT_DISPLAY_NAME;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("user_id must not be empty")]
    MissingUserId,
    #[error("backend_base_url must not be empty")]
    MissingBackendUrl,
    #[error("results.poll_max_attempts must be at least 1")]
    NoPollAttempts,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsConfig {
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    // Poll get-by-id for whatever generation did not return.
    #[serde(default = "default_true")]
    pub poll_missing: bool,
    pub min_transcript_entries: usize,
    #[serde(default)]
    pub todo_suggestions: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            poll_max_attempts: 30,
            poll_missing: true,
            min_transcript_entries: 1,
            todo_suggestions: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub backend_base_url: String,
    pub sdk_manifest_url: String,

    // Skip the vendor entirely: simulated credentials and the scripted adapter.
    #[serde(default)]
    pub offline_mode: bool,

    #[serde(default = "default_agent_display_name")]
    pub agent_display_name: String,

    #[serde(default)]
    pub results: ResultsConfig,
}

fn default_agent_display_name() -> String {
    DEFAULT_AGENT_DISPLAY_NAME.into()
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.user_id.trim().is_empty() {
            return Err(CoreError::MissingUserId);
        }
        if self.backend_base_url.trim().is_empty() {
            return Err(CoreError::MissingBackendUrl);
        }
        if self.results.poll_max_attempts == 0 {
            return Err(CoreError::NoPollAttempts);
        }
        Ok(())
    }
}
