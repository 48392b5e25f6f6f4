use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use coachcall_core::types::{RawTranscriptEntry, TranscriptEntry};

pub type TranscriptSnapshot = Arc<[TranscriptEntry]>;

struct Shared {
    // Read synchronously by handlers; never lags behind the watch channel.
    current: Mutex<TranscriptSnapshot>,
    watch: watch::Sender<TranscriptSnapshot>,
}

/// The call transcript, replaced wholesale on every vendor update.
///
/// Two views of the same value: `subscribe()` for rendering and `snapshot()` for code
/// that must see the latest state right now (the call-end handler).
#[derive(Clone)]
pub struct TranscriptBuffer {
    shared: Arc<Shared>,
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptBuffer {
    pub fn new() -> Self {
        let empty: TranscriptSnapshot = Arc::from(Vec::new());
        let (watch, _) = watch::channel(empty.clone());
        Self {
            shared: Arc::new(Shared {
                current: Mutex::new(empty),
                watch,
            }),
        }
    }

    /// Treats `raw` as the complete history so far. Returns the new length.
    pub fn replace_from_raw(&self, raw: &[RawTranscriptEntry], arrived_at_ms: i64) -> usize {
        let entries: Vec<TranscriptEntry> =
            raw.iter().map(|r| r.normalize(arrived_at_ms)).collect();
        self.replace(entries)
    }

    pub fn replace(&self, entries: Vec<TranscriptEntry>) -> usize {
        let len = entries.len();
        let next: TranscriptSnapshot = Arc::from(entries);
        {
            let mut current = self.shared.current.lock().unwrap_or_else(|e| e.into_inner());
            *current = next.clone();
        }
        self.shared.watch.send_replace(next);
        len
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.shared
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> watch::Receiver<TranscriptSnapshot> {
        self.shared.watch.subscribe()
    }
}
