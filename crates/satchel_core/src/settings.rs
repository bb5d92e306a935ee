use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Project-level bundle settings, persisted as JSON next to the game data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Bundles are served remotely and labeled groups may need downloading.
    #[serde(default)]
    pub remote_bundle: bool,

    /// Labels downloaded during initialization when `remote_bundle` is set.
    #[serde(default)]
    pub preload_labels: Vec<String>,

    /// Cadence at which download progress is polled.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_progress_interval_ms() -> u64 {
    16
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            remote_bundle: false,
            preload_labels: Vec::new(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl ProjectSettings {
    pub fn from_json(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    /// Initialization downloads the preload labels only for remote bundles.
    pub fn wants_preload(&self) -> bool {
        self.remote_bundle && !self.preload_labels.is_empty()
    }
}
