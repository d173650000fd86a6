// History Store
// Bounded, most-recent-first persisted collection of analysis results.
// Entries are immutable once recorded; there is no update or delete-by-id.

use crate::models::AnalysisResult;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Maximum number of retained results. Insertion trims the oldest excess.
pub const HISTORY_CAP: usize = 15;

pub struct HistoryStore {
    data_dir: PathBuf,
    history_file: PathBuf,
}

impl HistoryStore {
    pub fn new(data_dir: PathBuf) -> Self {
        let history_file = data_dir.join("history.json");
        Self { data_dir, history_file }
    }

    /// Get default data directory
    pub fn default_data_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map(|p| p.join("proofy"))
    }

    /// Directory preview copies of submitted files live in. Preview files of
    /// evicted entries are removed in `record`.
    pub fn previews_dir(&self) -> PathBuf {
        self.data_dir.join("previews")
    }

    /// Read the persisted sequence. Missing or corrupt data yields an empty
    /// sequence, never an error.
    pub fn load(&self) -> Vec<AnalysisResult> {
        let content = match fs::read_to_string(&self.history_file) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str::<Vec<AnalysisResult>>(&content) {
            Ok(items) => items,
            Err(e) => {
                warn!("[HISTORY] discarding corrupt history file: {}", e);
                Vec::new()
            }
        }
    }

    /// Prepend a result, trim to the cap, persist, and dispose the preview
    /// files of any evicted entries. Returns the persisted sequence.
    pub fn record(&self, result: AnalysisResult) -> Result<Vec<AnalysisResult>, String> {
        let mut items = self.load();
        items.insert(0, result);

        if items.len() > HISTORY_CAP {
            let evicted = items.split_off(HISTORY_CAP);
            for entry in &evicted {
                self.dispose_preview(entry);
            }
        }

        fs::create_dir_all(&self.data_dir)
            .map_err(|e| format!("Failed to create data dir: {}", e))?;
        let content = serde_json::to_string_pretty(&items)
            .map_err(|e| format!("Failed to serialize history: {}", e))?;
        fs::write(&self.history_file, content)
            .map_err(|e| format!("Failed to write history: {}", e))?;

        Ok(items)
    }

    /// Best-effort removal of an evicted entry's preview copy. Only paths
    /// under our own previews directory are touched.
    fn dispose_preview(&self, result: &AnalysisResult) {
        let Some(ref preview) = result.file_metadata.preview_path else {
            return;
        };
        let path = Path::new(preview);
        if path.starts_with(self.previews_dir()) {
            if let Err(e) = fs::remove_file(path) {
                warn!("[HISTORY] could not remove evicted preview {}: {}", preview, e);
            }
        }
    }
}
