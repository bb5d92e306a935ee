use satchel_core::settings::ProjectSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Where bundles come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// A directory written by `satchel pack`.
    Local { root: PathBuf },
    /// An asset server, with blobs cached in `cache_dir`.
    Remote {
        url: String,
        #[serde(default = "default_version")]
        version: String,
        #[serde(default = "default_cache_dir")]
        cache_dir: PathBuf,
        #[serde(default)]
        token: Option<String>,
    },
}

fn default_version() -> String {
    "latest".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".satchel-cache")
}

impl Default for Source {
    fn default() -> Self {
        Self::Local {
            root: PathBuf::from("bundles"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub source: Source,
}

impl CliConfig {
    /// A missing file yields a local source under `./bundles`.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("No config at {}, using local ./bundles", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
