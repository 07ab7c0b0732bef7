//! RESOLVE_YEARS stage.
//!
//! `latest` is resolved once per dataset per batch: the greatest year of the
//! dataset's index at or below its cut-off (`as_of.per_dataset`, else
//! `as_of.max_year`, else no bound). Every metric referencing `latest` in that
//! dataset sees the same year. A dataset with no eligible year fails only the
//! metrics that reference its `latest`.

use std::collections::{BTreeMap, BTreeSet};

use cm_core::{BatchSpec, DatasetCatalog, DatasetId, MetricError, MetricSpec, ResolvedLatest, Year, YearRef};
use log::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    latest: BTreeMap<DatasetId, ResolvedLatest>,
}

impl Resolution {
    pub fn latest(&self, dataset: &DatasetId) -> Option<Year> {
        self.latest.get(dataset).and_then(|r| r.year)
    }

    /// One line per dataset whose `latest` was requested, in dataset order.
    pub fn diagnostics(&self) -> Vec<ResolvedLatest> {
        self.latest.values().cloned().collect()
    }

    /// Replace every `latest` with its resolved year.
    pub fn resolve(&self, spec: &MetricSpec<YearRef>) -> Result<MetricSpec<Year>, MetricError> {
        spec.map_years(&mut |t, y| match *y {
            YearRef::Year(y) => Ok(y),
            YearRef::Latest => self.latest(t.dataset).ok_or_else(|| MetricError::MissingDataPoint {
                entity: t.entity.clone(),
                column: t.column.clone(),
                year: None,
            }),
        })
    }
}

pub fn resolve_latest(catalog: &DatasetCatalog, batch: &BatchSpec) -> Resolution {
    let mut wanted: BTreeSet<DatasetId> = BTreeSet::new();
    for spec in &batch.metrics {
        spec.for_each_year(&mut |t, y| {
            if *y == YearRef::Latest {
                wanted.insert(t.dataset.clone());
            }
        });
    }

    let mut latest = BTreeMap::new();
    for id in wanted {
        let Some(ds) = catalog.get(&id) else {
            debug!("resolve: {id} not loaded");
            continue;
        };
        let cutoff = batch.as_of.cutoff_for(&id);
        let year = ds.latest_year(cutoff);
        match year {
            Some(y) => info!("resolve: {id} latest = {y} (cut-off {cutoff:?})"),
            None => info!("resolve: {id} has no year at or below {cutoff:?}"),
        }
        latest.insert(id.clone(), ResolvedLatest { dataset: id, cutoff, year });
    }
    Resolution { latest }
}
