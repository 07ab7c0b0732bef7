//! Loader: manifest → datasets (+ joins) → metric batch.
//!
//! Every JSON input is size-checked, validated against its Draft 2020-12
//! schema and only then deserialized. Tables are read from local paths only.
//! The returned `LoadedContext` is everything the pipeline needs.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use cm_core::{BatchSpec, DatasetCatalog};
use log::{debug, info};
use serde_json::Value;

use crate::manifest::{self as man, Manifest};
use crate::{csv_table, hasher, schema, IoError};

const MAX_JSON_BYTES: u64 = 4 * 1024 * 1024;
const MAX_JSON_DEPTH: usize = 64;

/// Digests of the inputs a run depended on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDigests {
    /// sha256 of raw bytes, keyed by the path as written in the manifest.
    pub files: BTreeMap<String, String>,
    /// sha256 of the canonical batch spec.
    pub batch_sha256: String,
}

/// Loaded, validated context for the pipeline.
#[derive(Debug)]
pub struct LoadedContext {
    pub manifest_id: Option<String>,
    pub catalog: DatasetCatalog,
    pub batch: BatchSpec,
    pub digests: InputDigests,
}

/// Load everything reachable from a manifest file.
pub fn load_all_from_manifest(path: &Path) -> Result<LoadedContext, IoError> {
    let v = read_json_value_with_limits(path)?;
    schema::validate_value(schema::SchemaKind::Manifest, &v)?;
    let manifest: Manifest = serde_json::from_value(v)
        .map_err(|e| IoError::Json { pointer: "/".into(), msg: format!("manifest: {e}") })?;
    man::validate_manifest(&manifest)?;

    let base_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let resolved = man::resolve_paths(base_dir, &manifest)?;
    man::verify_digests(&resolved)?;

    let mut catalog = DatasetCatalog::new();
    let mut files = BTreeMap::new();
    for ds in &resolved.datasets {
        for f in &ds.files {
            files.insert(f.label.clone(), hasher::sha256_file(&f.path)?);
        }
        catalog.insert(csv_table::load_dataset(ds)?);
    }
    for j in &resolved.joins {
        let (Some(left), Some(right)) = (catalog.get(&j.left), catalog.get(&j.right)) else {
            return Err(IoError::Manifest(format!("join {} references an unloaded dataset", j.id)));
        };
        let joined = csv_table::join(left, right, j.id.clone())?;
        debug!("join {}: {} + {}", j.id, j.left, j.right);
        catalog.insert(joined);
    }

    let batch = load_batch(&resolved.batch_path)?;
    files.insert(resolved.batch_label.clone(), hasher::sha256_file(&resolved.batch_path)?);
    let batch_sha256 = hasher::sha256_canonical(&batch)?;

    info!(
        "loaded {} datasets, {} metrics from {}",
        catalog.len(),
        batch.metrics.len(),
        path.display()
    );

    Ok(LoadedContext {
        manifest_id: resolved.id,
        catalog,
        batch,
        digests: InputDigests { files, batch_sha256 },
    })
}

/// Read, schema-check and deserialize a metric batch.
pub fn load_batch(path: &Path) -> Result<BatchSpec, IoError> {
    let v = read_json_value_with_limits(path)?;
    parse_batch_value(v)
}

pub fn parse_batch_value(v: Value) -> Result<BatchSpec, IoError> {
    schema::validate_value(schema::SchemaKind::Batch, &v)?;
    serde_json::from_value(v).map_err(|e| IoError::Json { pointer: "/metrics".into(), msg: format!("batch: {e}") })
}

/// Read a JSON file with a byte cap and a nesting cap.
pub fn read_json_value_with_limits(path: &Path) -> Result<Value, IoError> {
    let f = File::open(path).map_err(|e| IoError::Read(format!("{} ({e})", path.display())))?;
    let mut buf = Vec::new();
    f.take(MAX_JSON_BYTES + 1)
        .read_to_end(&mut buf)
        .map_err(|e| IoError::Read(format!("{} ({e})", path.display())))?;
    if buf.len() as u64 > MAX_JSON_BYTES {
        return Err(IoError::Limit(format!("{} exceeds {MAX_JSON_BYTES} bytes", path.display())));
    }
    let v: Value = serde_json::from_slice(&buf)
        .map_err(|e| IoError::Json { pointer: "/".into(), msg: format!("{}: {e}", path.display()) })?;
    if depth(&v) > MAX_JSON_DEPTH {
        return Err(IoError::Limit(format!("{} nests deeper than {MAX_JSON_DEPTH}", path.display())));
    }
    Ok(v)
}

fn depth(v: &Value) -> usize {
    match v {
        Value::Array(a) => 1 + a.iter().map(depth).max().unwrap_or(0),
        Value::Object(m) => 1 + m.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}
