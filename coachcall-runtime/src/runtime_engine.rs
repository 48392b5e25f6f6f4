use std::sync::Arc;

use anyhow::Context;

use coachcall_core::config::AppConfig;
use coachcall_core::types::UserId;
use coachcall_engine::controller::{CallController, ControllerConfig, ControllerDeps};
use coachcall_engine::results::{ResultsOrchestrator, ResultsRequest};
use coachcall_engine::simulated::{SimulatedIssuer, SimulatedScript};
use coachcall_engine::traits::{CallArchive, CredentialIssuer};
use coachcall_providers::backend::BackendConfig;

use crate::backend::HttpBackend;
use crate::history::HistoryStore;
use crate::loader::AdapterLoader;

#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub history: Option<HistoryStore>,
    // Overrides the simulated adapter's schedule.
    pub simulated_script: Option<SimulatedScript>,
}

/// Everything a front end needs for one user: the call controller and the results stage.
pub struct Runtime {
    pub controller: CallController,
    pub orchestrator: ResultsOrchestrator,
    pub history: Option<HistoryStore>,
    pub backend: HttpBackend,
    cfg: AppConfig,
}

impl Runtime {
    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Results input for the most recent finished call.
    pub fn results_request(&self) -> Option<ResultsRequest> {
        let ended = self.controller.last_call()?;
        ResultsRequest::from_ended_call(
            &ended,
            UserId::new(&self.cfg.user_id),
            self.cfg.user_name.clone(),
        )
    }
}

/// Build a runnable controller and orchestrator from config.
///
/// Resolves the session adapter up front, so the first `start()` never waits on the SDK probe.
pub async fn build_runtime_from_config(
    cfg: AppConfig,
    opts: RuntimeOptions,
) -> anyhow::Result<Runtime> {
    cfg.validate().context("invalid config")?;

    let backend = HttpBackend::new(BackendConfig::new(cfg.backend_base_url.clone()));

    let mut loader = AdapterLoader::new(cfg.sdk_manifest_url.clone(), cfg.offline_mode);
    if let Some(script) = opts.simulated_script {
        loader = loader.with_simulated_script(script);
    }
    let client = loader.load().await;

    let issuer: Arc<dyn CredentialIssuer> = if cfg.offline_mode {
        Arc::new(SimulatedIssuer)
    } else {
        Arc::new(backend.clone())
    };

    let archive = opts
        .history
        .clone()
        .map(|h| Arc::new(h) as Arc<dyn CallArchive>);

    let controller = CallController::new(
        ControllerConfig {
            user_id: UserId::new(&cfg.user_id),
            agent_display_name: cfg.agent_display_name.clone(),
        },
        ControllerDeps {
            client,
            issuer,
            persistence: Arc::new(backend.clone()),
            archive,
        },
    );

    let orchestrator = ResultsOrchestrator::new(Arc::new(backend.clone()), cfg.results.clone());

    log::info!(
        "runtime ready: user={} backend={} adapter={}",
        cfg.user_id,
        backend.base_url(),
        controller.client_backend()
    );

    Ok(Runtime {
        controller,
        orchestrator,
        history: opts.history,
        backend,
        cfg,
    })
}
