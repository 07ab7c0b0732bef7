//! crates/cm_io/src/lib.rs
//! Ingestion and artifact I/O for the comparative metrics engine.
//!
//! - Manifest (JSON) → resolved, offline-only input paths.
//! - CSV tables → `TabularDataset`s (two layouts), joins, batch spec.
//! - JSON Schema (2020-12) checks, canonical JSON, SHA-256 digests and ids.
//!
//! One shared error type (`IoError`); details live in the submodules.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for cm_io.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    /// JSON parse/shape errors with a JSON Pointer to the offending node.
    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    /// JSON Schema violations (first error, with its instance pointer).
    #[error("schema error at {pointer}: {msg}")]
    Schema { pointer: String, msg: String },

    #[error("csv error: {0}")]
    Csv(String),

    /// Manifest shape, offline policy or digest problems.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Table content rejected by the dataset invariants.
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("io/path error: {0}")]
    Path(String),

    #[error("limit exceeded: {0}")]
    Limit(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        // serde_json keeps no pointer; callers enrich when they know the location.
        IoError::Json { pointer: "/".to_string(), msg: e.to_string() }
    }
}

impl From<csv::Error> for IoError {
    fn from(e: csv::Error) -> Self {
        IoError::Csv(e.to_string())
    }
}

impl From<cm_core::CoreError> for IoError {
    fn from(e: cm_core::CoreError) -> Self {
        IoError::Dataset(e.to_string())
    }
}

pub mod canonical_json;
pub mod csv_table;
pub mod hasher;
pub mod loader;
pub mod manifest;
pub mod schema;

/// Returns true if `s` looks like a URL (any `<scheme>://`, or a bare `http:`/`https:` prefix).
pub fn looks_like_url(s: &str) -> bool {
    let t = s.trim();
    t.contains("://") || t.starts_with("http:") || t.starts_with("https:")
}

pub mod prelude {
    pub use crate::{looks_like_url, IoError, IoResult};

    pub use crate::canonical_json;
    pub use crate::hasher;
    pub use crate::loader;
    pub use crate::manifest;
    pub use crate::schema;

    pub use crate::canonical_json::{to_canonical_bytes, write_canonical_file};
    pub use crate::hasher::{sha256_canonical, sha256_hex};
    pub use crate::loader::{load_all_from_manifest, LoadedContext};
}
