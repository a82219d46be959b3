/// Error types for Tenant Lens
use thiserror::Error;

/// Result type for Tenant Lens operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Key is not a UUID in any accepted spelling
    #[error("Invalid tenant UUID: {0:?}")]
    InvalidUuid(String),

    /// Tenant name is empty after trimming
    #[error("Tenant name must not be empty")]
    EmptyName,

    /// Settings item would not fit into one chrome.storage.sync item
    #[error("Settings need {bytes} bytes, sync storage allows {limit}")]
    QuotaExceeded { bytes: usize, limit: usize },

    /// JSON parse or encode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure crossing the JS boundary (storage API, DOM)
    #[error("Browser error: {0}")]
    Browser(String),
}

impl From<serde_wasm_bindgen::Error> for Error {
    fn from(e: serde_wasm_bindgen::Error) -> Self {
        Error::Browser(e.to_string())
    }
}

impl From<wasm_bindgen::JsValue> for Error {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Error::Browser(format!("{:?}", value))
    }
}
