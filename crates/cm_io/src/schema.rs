//! Embedded JSON Schemas (Draft 2020-12) for the manifest and the metric batch.

use serde_json::Value;

use crate::IoError;

const MANIFEST_SCHEMA: &str = include_str!("../schemas/manifest.schema.json");
const BATCH_SCHEMA: &str = include_str!("../schemas/batch.schema.json");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    Manifest,
    Batch,
}

impl SchemaKind {
    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::Manifest => "manifest",
            SchemaKind::Batch => "batch",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            SchemaKind::Manifest => MANIFEST_SCHEMA,
            SchemaKind::Batch => BATCH_SCHEMA,
        }
    }
}

/// Validate `v` against the embedded schema; the first violation is reported
/// with its instance pointer.
#[cfg(feature = "schemaval")]
pub fn validate_value(kind: SchemaKind, v: &Value) -> Result<(), IoError> {
    use jsonschema::{Draft, JSONSchema};

    let schema: Value = serde_json::from_str(kind.source()).map_err(|e| IoError::Schema {
        pointer: "/".into(),
        msg: format!("embedded {} schema: {e}", kind.name()),
    })?;
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(&schema)
        .map_err(|e| IoError::Schema { pointer: "/".into(), msg: format!("{} schema: {e}", kind.name()) })?;

    if let Err(mut errors) = compiled.validate(v) {
        if let Some(first) = errors.next() {
            let pointer = first.instance_path.to_string();
            return Err(IoError::Schema {
                pointer: if pointer.is_empty() { "/".into() } else { pointer },
                msg: format!("{}: {first}", kind.name()),
            });
        }
    }
    Ok(())
}

#[cfg(not(feature = "schemaval"))]
pub fn validate_value(kind: SchemaKind, _v: &Value) -> Result<(), IoError> {
    log::debug!("schema validation disabled; skipping {} schema", kind.name());
    Ok(())
}
