use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::ops::Deref;

use crate::error::ProviderError;

/// A type that can be produced from a loaded asset payload.
pub trait Asset: Sized + Send + Sync + 'static {
    fn decode(key: &str, data: Bytes) -> Result<Self, ProviderError>;
}

impl Asset for Bytes {
    fn decode(_key: &str, data: Bytes) -> Result<Self, ProviderError> {
        Ok(data)
    }
}

impl Asset for Vec<u8> {
    fn decode(_key: &str, data: Bytes) -> Result<Self, ProviderError> {
        Ok(data.to_vec())
    }
}

impl Asset for String {
    fn decode(key: &str, data: Bytes) -> Result<Self, ProviderError> {
        String::from_utf8(data.to_vec())
            .map_err(|e| ProviderError::Generic(format!("{key} is not UTF-8: {e}")))
    }
}

/// JSON document asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: DeserializeOwned + Send + Sync + 'static> Asset for Json<T> {
    fn decode(_key: &str, data: Bytes) -> Result<Self, ProviderError> {
        Ok(Json(serde_json::from_slice(&data)?))
    }
}
