//! LOAD stage: manifest → cm_io loader → dataset catalog + batch.

use std::path::Path;

use cm_core::{BatchSpec, Year};
use cm_io::loader::{self, LoadedContext};
use log::{debug, info};

use crate::PipelineError;

pub fn load(path: &Path) -> Result<LoadedContext, PipelineError> {
    info!("load: {}", path.display());
    let ctx = loader::load_all_from_manifest(path)?;
    for ds in ctx.catalog.iter() {
        let years = ds.common_years();
        debug!(
            "dataset {}: {} entities, {} columns, years {:?}..{:?}",
            ds.id(),
            ds.entities().count(),
            ds.columns().count(),
            years.first(),
            years.last()
        );
    }
    Ok(ctx)
}

/// A command-line cut-off replaces the batch's global one. Per-dataset cut-offs still win.
pub fn apply_max_year(batch: &mut BatchSpec, max_year: Option<Year>) {
    if let Some(y) = max_year {
        if batch.as_of.max_year != Some(y) {
            info!("as_of.max_year {:?} overridden by {y}", batch.as_of.max_year);
        }
        batch.as_of.max_year = Some(y);
    }
}
