use std::sync::Arc;

use thiserror::Error;
use tokio::sync::OnceCell;

use coachcall_engine::simulated::{SimulatedClient, SimulatedScript};
use coachcall_engine::traits::SessionClient;
use coachcall_providers::sdk_manifest::fetch_sdk_manifest;

use crate::live_client::LiveClient;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("realtime SDK unavailable: {0}")]
    Unavailable(String),
    #[error("offline mode; realtime SDK not requested")]
    Offline,
}

/// Resolves the session adapter once: the live client when the vendor SDK answers,
/// the simulated client otherwise.
pub struct AdapterLoader {
    manifest_url: String,
    offline: bool,
    simulated_script: SimulatedScript,
    resident: OnceCell<Arc<dyn SessionClient>>,
}

impl AdapterLoader {
    pub fn new(manifest_url: impl Into<String>, offline: bool) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            offline,
            simulated_script: SimulatedScript::default(),
            resident: OnceCell::new(),
        }
    }

    pub fn with_simulated_script(mut self, script: SimulatedScript) -> Self {
        self.simulated_script = script;
        self
    }

    /// Never fails. Repeated calls return the same adapter.
    pub async fn load(&self) -> Arc<dyn SessionClient> {
        self.resident
            .get_or_init(|| async {
                match self.acquire().await {
                    Ok(client) => {
                        log::info!("realtime adapter: {}", client.backend_name());
                        client
                    }
                    Err(LoadError::Offline) => {
                        log::info!("offline mode; using simulated adapter");
                        self.simulated()
                    }
                    Err(e) => {
                        log::warn!("{e}; falling back to simulated adapter");
                        self.simulated()
                    }
                }
            })
            .await
            .clone()
    }

    /// Probes the vendor SDK without installing anything.
    pub async fn acquire(&self) -> Result<Arc<dyn SessionClient>, LoadError> {
        if self.offline {
            return Err(LoadError::Offline);
        }
        let manifest = fetch_sdk_manifest(&self.manifest_url)
            .await
            .map_err(|e| LoadError::Unavailable(format!("{e:#}")))?;
        if let Some(v) = &manifest.version {
            log::debug!("realtime SDK version {v}");
        }
        Ok(Arc::new(LiveClient::new(manifest.gateway_url)))
    }

    pub fn resident(&self) -> Option<Arc<dyn SessionClient>> {
        self.resident.get().cloned()
    }

    fn simulated(&self) -> Arc<dyn SessionClient> {
        Arc::new(SimulatedClient::new(self.simulated_script.clone()))
    }
}
