//! The store interface shared by the disk and LRU tiers.

use super::{Kind, RunResult};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("creating result directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("writing result {id}: {source}")]
    Write {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reading result {id}: {source}")]
    Read {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding result {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("decoding result {id}: {source}")]
    Decode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("run {id} is a {got} run, not a {want} run")]
    KindMismatch { id: String, got: Kind, want: Kind },
}

/// Persists and retrieves run results.
pub trait Store: Send + Sync {
    fn save(&self, result: &RunResult) -> Result<(), StoreError>;
    fn load(&self, run_id: &str) -> Result<RunResult, StoreError>;
}
