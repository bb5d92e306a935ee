use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSceneMode {
    /// Replaces every loaded scene.
    #[default]
    Single,
    /// Loads next to the scenes already present.
    Additive,
}

impl fmt::Display for LoadSceneMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("Single"),
            Self::Additive => f.write_str("Additive"),
        }
    }
}

/// A scene loaded by a provider. Pass it back to unload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneInstance {
    pub id: u64,
    pub key: String,
    pub name: String,
    pub mode: LoadSceneMode,
}

/// An object instantiated from a prefab asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
    pub key: String,
    pub name: String,
}

/// Display name derived from an asset key: the file stem of its last segment.
pub fn name_from_key(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file.to_string(),
    }
}
