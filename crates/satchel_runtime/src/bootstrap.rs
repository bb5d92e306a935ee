use satchel_core::prelude::*;
use std::path::Path;
use tracing::{info, warn};

use crate::bundles::{Bundles, BundlesError, InitializeReport};

/// Reads project settings from `path`. A missing file yields the defaults.
pub async fn load_settings(path: impl AsRef<Path>) -> Result<ProjectSettings, BundlesError> {
    let path = path.as_ref();
    match tokio::fs::read(path).await {
        Ok(data) => Ok(ProjectSettings::from_json(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("No project settings at {}, using defaults", path.display());
            Ok(ProjectSettings::default())
        }
        Err(e) => Err(BundlesError::Io(e)),
    }
}

/// Startup entry point: loads the persisted settings and initializes a
/// [`Bundles`] context over `provider`.
pub async fn bootstrap<P: ResourceProvider>(
    provider: P,
    settings_path: impl AsRef<Path>,
) -> Result<(Bundles<P>, InitializeReport), BundlesError> {
    let settings = load_settings(settings_path).await?;
    info!(
        "Bootstrap bundles (remote: {}, preload labels: {})",
        settings.remote_bundle,
        settings.preload_labels.len()
    );
    let mut bundles = Bundles::new(provider, settings);
    let report = bundles.initialize().await?;
    Ok((bundles, report))
}
