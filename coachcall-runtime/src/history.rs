use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use coachcall_core::record::CallRecord;
use coachcall_engine::traits::CallArchive;

use crate::fs_util::write_replacing;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub archived_at: DateTime<Utc>,
    // Whether save-call-data accepted the record.
    pub saved: bool,
    pub record: CallRecord,
}

/// Bounded on-disk list of finished calls, oldest dropped first.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    write_lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            max_entries: 200,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max.max(1);
        self
    }

    pub fn load(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read history: {}", self.path.display()))?;
        let entries: Vec<HistoryEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse history: {}", self.path.display()))?;
        Ok(entries)
    }

    pub fn append(&self, entry: HistoryEntry) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries = self.load()?;
        entries.push(entry);
        if entries.len() > self.max_entries {
            let start = entries.len() - self.max_entries;
            entries = entries.split_off(start);
        }

        let json = serde_json::to_vec_pretty(&entries).context("encode history JSON")?;
        write_replacing(&self.path, "tmp", &json)
            .with_context(|| format!("failed to write history: {}", self.path.display()))
    }

    /// Records the backend never acknowledged, oldest first.
    pub fn unsaved(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.load()?.into_iter().filter(|e| !e.saved).collect())
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove history: {}", self.path.display()))?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CallArchive for HistoryStore {
    fn archive(&self, record: &CallRecord, saved: bool) -> anyhow::Result<()> {
        self.append(HistoryEntry {
            archived_at: Utc::now(),
            saved,
            record: record.clone(),
        })?;
        log::debug!(
            "archived call {} (saved={saved}) to {}",
            record.call_id.as_str(),
            self.path.display()
        );
        Ok(())
    }
}
