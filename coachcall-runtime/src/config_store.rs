use anyhow::Context;
use std::path::{Path, PathBuf};

use coachcall_core::config::AppConfig;

use crate::defaults::default_app_config;
use crate::fs_util::write_replacing;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        Ok(cfg)
    }

    /// Loads the file if present; otherwise writes and returns the defaults.
    pub fn load_or_init(&self) -> anyhow::Result<AppConfig> {
        if self.path.exists() {
            return self.load();
        }
        let cfg = default_app_config();
        self.save(&cfg)?;
        log::info!("wrote default config to {}", self.path.display());
        Ok(cfg)
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(cfg).context("encode config JSON")?;
        write_replacing(&self.path, "json.tmp", &json)
    }

    /// Local call history lives next to the config file.
    pub fn history_path(&self) -> PathBuf {
        self.path.with_file_name("history.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coachcall_core::config::ResultsConfig;

    #[test]
    fn round_trips_config() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));

        let cfg = AppConfig {
            user_id: "user_042".into(),
            user_name: "Robin".into(),
            backend_base_url: "https://api.example.com/intake".into(),
            sdk_manifest_url: "https://cdn.example.com/sdk/manifest.json".into(),
            offline_mode: true,
            agent_display_name: "Olivia".into(),
            results: ResultsConfig {
                todo_suggestions: true,
                ..ResultsConfig::default()
            },
        };

        store.save(&cfg).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_or_init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at_path(dir.path().join("config.json"));

        let first = store.load_or_init().unwrap();
        assert!(store.path().exists());
        assert_eq!(first, default_app_config());

        let mut changed = first.clone();
        changed.user_id = "someone_else".into();
        store.save(&changed).unwrap();
        assert_eq!(store.load_or_init().unwrap().user_id, "someone_else");
        assert_eq!(store.history_path(), dir.path().join("history.json"));
    }
}
