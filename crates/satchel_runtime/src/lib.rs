//! # Satchel Runtime
//!
//! Promise-style handles over a [`ResourceProvider`](satchel_core::traits::ResourceProvider).
//!
//! Every request (dependency download, scene load/unload, asset load,
//! instantiate) is configured through a builder, runs on its own tokio task
//! and reports through `on_success` / `on_error` / `on_progress` /
//! `on_final` observers. Each provider operation a request opens is
//! released exactly once, after the final observers ran, whether the
//! request succeeded, failed or was canceled.
//!
//! ## Usage
//!
//! ```no_run
//! # async fn run<P: satchel_core::traits::ResourceProvider>(provider: P) -> Result<(), satchel_runtime::BundlesError> {
//! use satchel_runtime::bootstrap;
//!
//! let (bundles, _report) = bootstrap(provider, "satchel.json").await?;
//! bundles
//!     .download_dependencies(["level1"])
//!     .on_progress(|p| println!("{:.0}%", p.completed_percent() * 100.0))
//!     .on_final(|| println!("done"))
//!     .wait()
//!     .await;
//! # Ok(())
//! # }
//! ```

mod asset;
mod bootstrap;
mod bundles;
mod download;
mod handle;
mod lease;
mod pipeline;
mod scene;

pub use asset::{InstantiateHandler, InstantiateHandlerBuilder, LoadAssetHandler, LoadAssetHandlerBuilder};
pub use bootstrap::{bootstrap, load_settings};
pub use bundles::{Bundles, BundlesError, InitializeReport, KeyRegistry};
pub use download::{DownloadDependenciesHandler, DownloadDependenciesHandlerBuilder};
pub use handle::{Handle, HandleState};
pub use lease::Lease;
pub use scene::{LoadSceneHandler, LoadSceneHandlerBuilder, UnloadSceneHandler, UnloadSceneHandlerBuilder};

pub mod prelude {
    pub use crate::{
        Bundles, DownloadDependenciesHandler, HandleState, InstantiateHandler, LoadAssetHandler,
        LoadSceneHandler, UnloadSceneHandler, bootstrap,
    };
}
