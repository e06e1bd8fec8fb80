// cid-blockstore/src/error.rs

use crate::key::Key;
use thiserror::Error;

/// Error type for the blockstore and the datastores underneath it.
#[derive(Error, Debug)]
pub enum BlockstoreError {
    #[error("Not a valid cid: {0}")]
    InvalidCid(String),

    #[error("Invalid block: {0}")]
    InvalidBlock(String),

    #[error("Not a valid key: {0}")]
    InvalidKey(String),

    #[error("Malformed store key {key}: {reason}")]
    MalformedKey { key: String, reason: String },

    #[error("Key not found in store: {0}")]
    NotFound(Key),

    #[error("Storage operation failed: {0}")]
    StorageError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Specified shard function {expected} does not match repo shard function {found}")]
    ShardingMismatch { expected: String, found: String },

    #[error("Invalid shard function: {0}")]
    InvalidShardFunction(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Wasm/JS interop error: {0}")]
    WasmInteropError(String),
}

impl BlockstoreError {
    /// True for the not-found outcome of a `get`, as opposed to any other failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlockstoreError::NotFound(_))
    }
}

/// Result type alias for blockstore operations.
pub type Result<T> = std::result::Result<T, BlockstoreError>;

// Helper for converting JsValue errors from wasm-bindgen
#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for BlockstoreError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        BlockstoreError::WasmInteropError(format!("{:?}", value))
    }
}
