use async_trait::async_trait;

use coachcall_core::record::CallRecord;
use coachcall_core::results::{ConversationSummary, GoalAnalysis, TodoSuggestion};
use coachcall_core::types::{CallId, TranscriptEntry, UserId};
use coachcall_engine::traits::{
    CallPersistence, CredentialIssuer, ResultsBackend, WebCallCredentials,
};
use coachcall_providers::backend::{
    BackendConfig, build_analyze_goal_request, build_create_web_call_request,
    build_generate_summary_request, build_generate_todo_suggestions_request,
    build_get_goal_analysis_request, build_get_summary_request, build_save_call_data_request,
};
use coachcall_providers::parse::{
    parse_generated_summary, parse_goal_analysis, parse_goal_analysis_lookup,
    parse_summary_lookup, parse_todo_suggestions, parse_web_call,
};
use coachcall_providers::request::HttpRequest;
use coachcall_providers::runtime::execute;

/// The coaching backend over HTTP: credentials, call persistence, and post-call analysis.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    cfg: BackendConfig,
}

impl HttpBackend {
    pub fn new(cfg: BackendConfig) -> Self {
        Self { cfg }
    }

    pub fn base_url(&self) -> &str {
        &self.cfg.base_url
    }

    async fn send(&self, req: HttpRequest, what: &str) -> anyhow::Result<Vec<u8>> {
        log::debug!("{what}: {req:?}");
        execute(&req).await?.into_success_body(what)
    }
}

#[async_trait]
impl CredentialIssuer for HttpBackend {
    async fn create_web_call(&self, user_id: &UserId) -> anyhow::Result<WebCallCredentials> {
        let req = build_create_web_call_request(&self.cfg, user_id)?;
        let body = self.send(req, "create-web-call").await?;
        let resp = parse_web_call(&body)?;
        Ok(WebCallCredentials {
            call_id: resp.call_id,
            agent_id: resp.agent_id,
            access_token: resp.access_token,
        })
    }
}

#[async_trait]
impl CallPersistence for HttpBackend {
    async fn save_call_data(&self, record: &CallRecord) -> anyhow::Result<()> {
        let req = build_save_call_data_request(&self.cfg, record)?;
        self.send(req, "save-call-data").await?;
        Ok(())
    }
}

#[async_trait]
impl ResultsBackend for HttpBackend {
    async fn generate_summary(
        &self,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
    ) -> anyhow::Result<ConversationSummary> {
        let req = build_generate_summary_request(&self.cfg, call_id, transcript)?;
        let body = self.send(req, "generate-summary").await?;
        parse_generated_summary(&body)
    }

    async fn get_summary(&self, call_id: &CallId) -> anyhow::Result<Option<ConversationSummary>> {
        let req = build_get_summary_request(&self.cfg, call_id)?;
        let body = self.send(req, "get-summary").await?;
        parse_summary_lookup(&body)
    }

    async fn analyze_goal_achievement(
        &self,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
        patient_id: &UserId,
        patient_name: &str,
    ) -> anyhow::Result<GoalAnalysis> {
        let req =
            build_analyze_goal_request(&self.cfg, call_id, transcript, patient_id, patient_name)?;
        let body = self.send(req, "analyze-goal-achievement").await?;
        parse_goal_analysis(&body)
    }

    async fn get_goal_analysis(&self, call_id: &CallId) -> anyhow::Result<Option<GoalAnalysis>> {
        let req = build_get_goal_analysis_request(&self.cfg, call_id)?;
        let body = self.send(req, "get-goal-analysis").await?;
        parse_goal_analysis_lookup(&body)
    }

    async fn generate_todo_suggestions(
        &self,
        user_id: &UserId,
        call_id: &CallId,
        transcript: &[TranscriptEntry],
    ) -> anyhow::Result<Vec<TodoSuggestion>> {
        let req = build_generate_todo_suggestions_request(&self.cfg, user_id, call_id, transcript)?;
        let body = self.send(req, "generate-todo-suggestions").await?;
        parse_todo_suggestions(&body)
    }
}
