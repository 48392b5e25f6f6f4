use anyhow::{Context, anyhow};
use serde::Deserialize;

use coachcall_core::results::{ConversationSummary, GoalAnalysis, TodoSuggestion};
use coachcall_core::types::{AgentId, CallId};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebCallResponse {
    pub call_id: CallId,
    pub agent_id: AgentId,
    pub access_token: String,
}

pub fn parse_web_call(body: &[u8]) -> anyhow::Result<WebCallResponse> {
    let resp: WebCallResponse =
        serde_json::from_slice(body).context("decode create-web-call JSON")?;
    if resp.access_token.trim().is_empty() {
        return Err(anyhow!("create-web-call returned an empty access token"));
    }
    Ok(resp)
}

#[derive(Debug, Deserialize)]
struct GeneratedSummary {
    #[serde(default)]
    summary: Option<ConversationSummary>,
}

/// A reply without a summary still yields one, made of placeholders.
pub fn parse_generated_summary(body: &[u8]) -> anyhow::Result<ConversationSummary> {
    let resp: GeneratedSummary =
        serde_json::from_slice(body).context("decode generate-summary JSON")?;
    Ok(resp.summary.unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct SummaryLookup {
    #[serde(default)]
    has_summary: bool,
    summary: Option<ConversationSummary>,
}

/// `None` until the backend reports the summary as generated.
pub fn parse_summary_lookup(body: &[u8]) -> anyhow::Result<Option<ConversationSummary>> {
    let resp: SummaryLookup = serde_json::from_slice(body).context("decode get-summary JSON")?;
    Ok(if resp.has_summary { resp.summary } else { None })
}

pub fn parse_goal_analysis(body: &[u8]) -> anyhow::Result<GoalAnalysis> {
    serde_json::from_slice(body).context("decode analyze-goal-achievement JSON")
}

#[derive(Debug, Deserialize)]
struct GoalAnalysisLookup {
    goal_analysis: Option<GoalAnalysis>,
}

pub fn parse_goal_analysis_lookup(body: &[u8]) -> anyhow::Result<Option<GoalAnalysis>> {
    let resp: GoalAnalysisLookup =
        serde_json::from_slice(body).context("decode get-goal-analysis JSON")?;
    Ok(resp.goal_analysis)
}

#[derive(Debug, Deserialize)]
struct TodoSuggestions {
    #[serde(default)]
    suggestions: Vec<TodoSuggestion>,
}

pub fn parse_todo_suggestions(body: &[u8]) -> anyhow::Result<Vec<TodoSuggestion>> {
    let resp: TodoSuggestions =
        serde_json::from_slice(body).context("decode generate-todo-suggestions JSON")?;
    Ok(resp.suggestions)
}
