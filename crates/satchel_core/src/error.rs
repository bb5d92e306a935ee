use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Content hash mismatch for {key}: expected {expected}, got {actual}")]
    HashMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Provider is not initialized")]
    NotInitialized,

    #[error("Provider backend error: {0}")]
    Generic(String),
}

/// Failure taxonomy delivered to error observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CatalogCheckFailed,
    CatalogUpdateFailed,
    DownloadFailed,
    DownloadCanceled,
    SceneLoadFailed,
    SceneUnloadFailed,
    AssetNotFound,
    InstantiateFailed,
    Canceled,
}

/// Immutable failure report handed to `on_error` observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    kind: ErrorKind,
    category: String,
    detail: String,
}

impl ErrorMessage {
    pub fn builder(kind: ErrorKind) -> ErrorMessageBuilder {
        ErrorMessageBuilder {
            kind,
            category: "error".to_string(),
            detail: String::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn asset_not_found() -> Self {
        Self::builder(ErrorKind::AssetNotFound)
            .with_message("error", "asset not found")
            .build()
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.detail)
    }
}

#[derive(Debug, Clone)]
pub struct ErrorMessageBuilder {
    kind: ErrorKind,
    category: String,
    detail: String,
}

impl ErrorMessageBuilder {
    pub fn with_message(mut self, category: impl Into<String>, detail: impl Into<String>) -> Self {
        self.category = category.into();
        self.detail = detail.into();
        self
    }

    pub fn build(self) -> ErrorMessage {
        ErrorMessage {
            kind: self.kind,
            category: self.category,
            detail: self.detail,
        }
    }
}
