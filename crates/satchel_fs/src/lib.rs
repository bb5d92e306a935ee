//! # Satchel FileSystem Bundles
//!
//! A local bundle directory for Satchel.
//!
//! [`BlobStore`] keeps a `catalog.json` next to content-addressed blobs, and
//! [`LocalProvider`] implements [`ResourceProvider`](satchel_core::traits::ResourceProvider)
//! on top of it.
//!
//! ## Features
//!
//! * **Atomic Writes**: Blobs and catalogs are written to a temporary file and renamed, so a crash never leaves a partial asset behind.
//! * **Verified Reads**: Loaded assets are checked against the SHA256 recorded in the catalog.
//!
//! ## Usage
//!
//! ```no_run
//! use satchel_fs::LocalProvider;
//!
//! let provider = LocalProvider::new("./bundles");
//! ```

mod provider;
mod store;

pub use provider::LocalProvider;
pub use store::{BlobStore, ByteStream, content_hash};
