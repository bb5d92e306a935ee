use bytes::Bytes;
use futures::{Stream, StreamExt};
use satchel_core::prelude::*;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const CATALOG_FILE: &str = "catalog.json";
const BLOB_DIR: &str = "blobs";

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Hex encoded SHA256 of `data`, the name a blob is stored under.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

async fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ProviderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");

    fs::write(&tmp_path, data).await?;
    fs::rename(&tmp_path, path).await?;

    Ok(())
}

/// A bundle directory: `catalog.json` plus content-addressed files under
/// `blobs/`. Blobs are written to a temporary file and renamed into place,
/// so readers never observe a partial blob.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join(BLOB_DIR).join(hash)
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub async fn contains(&self, hash: &str) -> Result<bool, ProviderError> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }

    /// Returns `false` when the blob was already present.
    pub async fn write(&self, hash: &str, data: Bytes) -> Result<bool, ProviderError> {
        let path = self.blob_path(hash);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        atomic_write(&path, &data).await?;
        Ok(true)
    }

    /// Streams a blob to disk and checks its hash before it becomes visible.
    /// `on_chunk` sees the length of every chunk written.
    pub async fn write_stream(
        &self,
        hash: &str,
        mut stream: ByteStream,
        mut on_chunk: impl FnMut(u64) + Send,
    ) -> Result<bool, ProviderError> {
        let path = self.blob_path(hash);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp_path).await?;
        let mut hasher = Sha256::new();

        while let Some(res) = stream.next().await {
            let chunk = res?;
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            on_chunk(chunk.len() as u64);
        }
        file.flush().await?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        if actual != hash {
            fs::remove_file(&tmp_path).await?;
            return Err(ProviderError::HashMismatch {
                key: hash.to_string(),
                expected: hash.to_string(),
                actual,
            });
        }

        fs::rename(&tmp_path, path).await?;
        Ok(true)
    }

    pub async fn read(&self, hash: &str) -> Result<Bytes, ProviderError> {
        let path = self.blob_path(hash);
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProviderError::NotFound(path.to_string_lossy().to_string()))
            }
            Err(e) => Err(ProviderError::Io(e)),
        }
    }

    /// Reads the blob for `key` and rejects content that does not match its hash.
    pub async fn read_verified(&self, key: &str, hash: &str) -> Result<Bytes, ProviderError> {
        let data = self.read(hash).await?;
        let actual = content_hash(&data);
        if actual != hash {
            return Err(ProviderError::HashMismatch {
                key: key.to_string(),
                expected: hash.to_string(),
                actual,
            });
        }
        Ok(data)
    }

    pub async fn write_catalog(&self, catalog: &CatalogManifest) -> Result<(), ProviderError> {
        let data = serde_json::to_vec_pretty(catalog)?;
        atomic_write(&self.catalog_path(), &data).await
    }

    pub async fn read_catalog(&self) -> Result<CatalogManifest, ProviderError> {
        let path = self.catalog_path();
        match fs::read(&path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProviderError::NotFound(path.to_string_lossy().to_string()))
            }
            Err(e) => Err(ProviderError::Io(e)),
        }
    }
}
