use coachcall_core::config::{AppConfig, ResultsConfig};
use coachcall_core::text::DEFAULT_AGENT_DISPLAY_NAME;
use coachcall_providers::backend::DEFAULT_BACKEND_BASE_URL;

pub const DEFAULT_USER_ID: &str = "user_001";
pub const DEFAULT_SDK_MANIFEST_URL: &str = "http://localhost:8000/sdk/manifest.json";

pub fn default_app_config() -> AppConfig {
    AppConfig {
        user_id: DEFAULT_USER_ID.into(),
        user_name: String::new(),
        backend_base_url: DEFAULT_BACKEND_BASE_URL.into(),
        sdk_manifest_url: DEFAULT_SDK_MANIFEST_URL.into(),
        offline_mode: false,
        agent_display_name: DEFAULT_AGENT_DISPLAY_NAME.into(),
        results: ResultsConfig::default(),
    }
}
