// crates/cm_io/src/manifest.rs
//
// - Manifest types (datasets, joins, batch path, optional input digests)
// - Shape checks beyond the JSON Schema (unique ids, join references, layout rules)
// - Offline policy: any path with a scheme is rejected
// - Path resolution relative to the manifest directory + existence checks
// - Digest verification over raw input bytes

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use cm_core::{ColumnId, DatasetId, EntityId};
use serde::{Deserialize, Serialize};

use crate::{hasher, looks_like_url, IoError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One table, headers `<Entity>_<Column>` for the declared entities.
    EntityPrefixed,
    /// One table per entity, headers are column names.
    EntityPerFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileRef {
    Path(String),
    Entity { entity: EntityId, path: String },
}

impl FileRef {
    pub fn path(&self) -> &str {
        match self {
            FileRef::Path(p) | FileRef::Entity { path: p, .. } => p,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetEntry {
    pub id: DatasetId,
    pub layout: Layout,
    #[serde(default)]
    pub entities: Vec<EntityId>,
    pub files: Vec<FileRef>,
    #[serde(default)]
    pub cumulative_columns: Vec<ColumnId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinEntry {
    pub id: DatasetId,
    pub left: DatasetId,
    pub right: DatasetId,
}

/// External manifest. `id` is informative only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub id: Option<String>,
    pub datasets: Vec<DatasetEntry>,
    #[serde(default)]
    pub joins: Vec<JoinEntry>,
    pub batch_path: String,
    /// Expected sha256 of input files, keyed by the path as written in the manifest.
    #[serde(default)]
    pub inputs_sha256: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedFile {
    /// Set for the one-table-per-entity layout.
    pub entity: Option<EntityId>,
    /// Path as written in the manifest; used as the digest key.
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedDataset {
    pub id: DatasetId,
    pub layout: Layout,
    pub entities: Vec<EntityId>,
    pub files: Vec<ResolvedFile>,
    pub cumulative_columns: Vec<ColumnId>,
}

#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub id: Option<String>,
    pub base_dir: PathBuf,
    pub datasets: Vec<ResolvedDataset>,
    pub joins: Vec<JoinEntry>,
    pub batch_label: String,
    pub batch_path: PathBuf,
    pub digests: BTreeMap<String, String>,
}

// ---------- validation (no I/O) ----------

pub fn validate_manifest(man: &Manifest) -> Result<(), IoError> {
    if man.datasets.is_empty() {
        return Err(IoError::Manifest("no datasets declared".into()));
    }
    offline_check("batch_path", &man.batch_path)?;

    let mut ids: BTreeSet<&DatasetId> = BTreeSet::new();
    for ds in &man.datasets {
        if !ids.insert(&ds.id) {
            return Err(IoError::Manifest(format!("duplicate dataset id {}", ds.id)));
        }
        if ds.files.is_empty() {
            return Err(IoError::Manifest(format!("dataset {} has no files", ds.id)));
        }
        for f in &ds.files {
            offline_check(ds.id.as_str(), f.path())?;
        }
        match ds.layout {
            Layout::EntityPrefixed => {
                if ds.entities.is_empty() {
                    return Err(IoError::Manifest(format!("dataset {} must list its entities", ds.id)));
                }
                if ds.files.iter().any(|f| matches!(f, FileRef::Entity { .. })) {
                    return Err(IoError::Manifest(format!("dataset {}: prefixed layout takes plain paths", ds.id)));
                }
            }
            Layout::EntityPerFile => {
                let mut seen = BTreeSet::new();
                for f in &ds.files {
                    let FileRef::Entity { entity, .. } = f else {
                        return Err(IoError::Manifest(format!(
                            "dataset {}: per-file layout needs {{entity, path}} entries",
                            ds.id
                        )));
                    };
                    if !seen.insert(entity) {
                        return Err(IoError::Manifest(format!("dataset {}: entity {entity} listed twice", ds.id)));
                    }
                }
            }
        }
    }

    for j in &man.joins {
        for side in [&j.left, &j.right] {
            if !ids.contains(side) {
                return Err(IoError::Manifest(format!("join {} references unknown dataset {side}", j.id)));
            }
        }
        if j.left == j.right {
            return Err(IoError::Manifest(format!("join {} joins {} with itself", j.id, j.left)));
        }
        if !ids.insert(&j.id) {
            return Err(IoError::Manifest(format!("join id {} collides with another dataset", j.id)));
        }
    }

    for (label, hex) in &man.inputs_sha256 {
        if !cm_core::ids::is_valid_sha256(hex) {
            return Err(IoError::Manifest(format!("invalid sha256 for {label}: {hex}")));
        }
    }
    Ok(())
}

fn offline_check(label: &str, path: &str) -> Result<(), IoError> {
    if path.trim().is_empty() {
        return Err(IoError::Manifest(format!("empty path in {label}")));
    }
    if looks_like_url(path) {
        return Err(IoError::Manifest(format!("path must be local for {label}: {path}")));
    }
    Ok(())
}

// ---------- resolution ----------

fn join_under(base: &Path, rel: &str) -> PathBuf {
    let p = Path::new(rel);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

fn must_exist_file(label: &str, p: &Path) -> Result<(), IoError> {
    let md = fs::metadata(p).map_err(|e| IoError::Path(format!("{label}: {} ({e})", p.display())))?;
    if !md.is_file() {
        return Err(IoError::Path(format!("{label}: not a file: {}", p.display())));
    }
    Ok(())
}

/// Resolve every path under `base_dir` and check that each one is a file.
pub fn resolve_paths(base_dir: &Path, man: &Manifest) -> Result<ResolvedManifest, IoError> {
    let mut datasets = Vec::with_capacity(man.datasets.len());
    for ds in &man.datasets {
        let mut files = Vec::with_capacity(ds.files.len());
        for f in &ds.files {
            let path = join_under(base_dir, f.path());
            must_exist_file(ds.id.as_str(), &path)?;
            let entity = match f {
                FileRef::Entity { entity, .. } => Some(entity.clone()),
                FileRef::Path(_) => None,
            };
            files.push(ResolvedFile { entity, label: f.path().to_string(), path });
        }
        datasets.push(ResolvedDataset {
            id: ds.id.clone(),
            layout: ds.layout,
            entities: ds.entities.clone(),
            files,
            cumulative_columns: ds.cumulative_columns.clone(),
        });
    }

    let batch_path = join_under(base_dir, &man.batch_path);
    must_exist_file("batch_path", &batch_path)?;

    let known: BTreeSet<&str> = datasets
        .iter()
        .flat_map(|d| d.files.iter().map(|f| f.label.as_str()))
        .chain(core::iter::once(man.batch_path.as_str()))
        .collect();
    if let Some(label) = man.inputs_sha256.keys().find(|k| !known.contains(k.as_str())) {
        return Err(IoError::Manifest(format!("digest supplied for unknown input {label}")));
    }

    Ok(ResolvedManifest {
        id: man.id.clone(),
        base_dir: base_dir.to_path_buf(),
        datasets,
        joins: man.joins.clone(),
        batch_label: man.batch_path.clone(),
        batch_path,
        digests: man.inputs_sha256.clone(),
    })
}

/// Check declared digests against the raw bytes of each input.
pub fn verify_digests(resolved: &ResolvedManifest) -> Result<(), IoError> {
    let files = resolved
        .datasets
        .iter()
        .flat_map(|d| d.files.iter().map(|f| (f.label.as_str(), f.path.as_path())))
        .chain(core::iter::once((resolved.batch_label.as_str(), resolved.batch_path.as_path())));
    for (label, path) in files {
        if let Some(want) = resolved.digests.get(label) {
            let got = hasher::sha256_file(path)?;
            if &got != want {
                return Err(IoError::Manifest(format!("sha256 mismatch for {label}: expected={want} got={got}")));
            }
        }
    }
    Ok(())
}
