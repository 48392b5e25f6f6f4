use anyhow::{Context, anyhow};
use serde_json::json;

use coachcall_core::record::CallRecord;
use coachcall_core::types::{CallId, TranscriptEntry, UserId};

use crate::request::HttpRequest;

pub const DEFAULT_BACKEND_BASE_URL: &str = "http://localhost:8000/intake";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Appends path segments to `base`, percent-encoding each one.
pub fn endpoint_url(base: &str, segments: &[&str]) -> anyhow::Result<String> {
    let mut url = url::Url::parse(base).with_context(|| format!("invalid base url: {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("base url cannot take a path: {base}"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

pub fn build_create_web_call_request(
    cfg: &BackendConfig,
    user_id: &UserId,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["create-web-call"])?;
    Ok(HttpRequest::post_json(
        url,
        &json!({ "user_id": user_id }),
    ))
}

pub fn build_save_call_data_request(
    cfg: &BackendConfig,
    record: &CallRecord,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["save-call-data"])?;
    let payload = serde_json::to_value(record).context("encode call record")?;
    Ok(HttpRequest::post_json(url, &payload))
}

pub fn build_generate_summary_request(
    cfg: &BackendConfig,
    call_id: &CallId,
    transcript: &[TranscriptEntry],
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["generate-summary"])?;
    Ok(HttpRequest::post_json(
        url,
        &json!({ "call_id": call_id, "transcript": transcript }),
    ))
}

pub fn build_get_summary_request(
    cfg: &BackendConfig,
    call_id: &CallId,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["get-summary", call_id.as_str()])?;
    Ok(HttpRequest::get(url))
}

pub fn build_analyze_goal_request(
    cfg: &BackendConfig,
    call_id: &CallId,
    transcript: &[TranscriptEntry],
    patient_id: &UserId,
    patient_name: &str,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["analyze-goal-achievement"])?;
    Ok(HttpRequest::post_json(
        url,
        &json!({
            "call_id": call_id,
            "transcript": transcript,
            "patient_id": patient_id,
            "patient_name": patient_name,
        }),
    ))
}

pub fn build_get_goal_analysis_request(
    cfg: &BackendConfig,
    call_id: &CallId,
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["get-goal-analysis", call_id.as_str()])?;
    Ok(HttpRequest::get(url))
}

pub fn build_generate_todo_suggestions_request(
    cfg: &BackendConfig,
    user_id: &UserId,
    call_id: &CallId,
    transcript: &[TranscriptEntry],
) -> anyhow::Result<HttpRequest> {
    let url = endpoint_url(&cfg.base_url, &["generate-todo-suggestions"])?;
    Ok(HttpRequest::post_json(
        url,
        &json!({
            "user_id": user_id,
            "conversation_id": call_id,
            "transcript": transcript,
        }),
    ))
}
