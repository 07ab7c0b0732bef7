//! Direct lookups and running totals.
//!
//! Contract:
//! - `annual_value` is the dataset accessor, nothing more.
//! - `cumulative_total` sums every year of the series up to and including
//!   `upto_year`. `upto_year` must be in the column's year index and every
//!   value in the summed range must be present; a gap is a `MissingDataPoint`
//!   for the gap year, never a silent zero.
//! - A column whose values are already running totals degenerates to a lookup.
//! - `combined_total` adds several columns of one entity, each taken on the
//!   requested basis; a column listed twice is counted once.

use std::collections::BTreeSet;

use cm_core::{ColumnId, EntityId, MetricError, TabularDataset, ValueBasis, Year};

pub fn annual_value(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
) -> Result<f64, MetricError> {
    ds.value(entity, column, year)
}

pub fn cumulative_total(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    upto_year: Year,
    already_cumulative: bool,
) -> Result<f64, MetricError> {
    if already_cumulative {
        return ds.value(entity, column, upto_year);
    }

    let missing = |year: Year| MetricError::MissingDataPoint {
        entity: entity.clone(),
        column: column.clone(),
        year: Some(year),
    };

    let series = ds.series(entity, column)?;
    if series.get(upto_year).is_none() {
        return Err(missing(upto_year));
    }

    let mut total = 0.0_f64;
    for p in series.points().iter().take_while(|p| p.year <= upto_year) {
        match p.value {
            Some(v) => total += v,
            None => return Err(missing(p.year)),
        }
    }

    if total.is_finite() {
        Ok(total)
    } else {
        Err(MetricError::Overflow { entity: entity.clone(), column: column.clone() })
    }
}

/// `cumulative_total` using the column's declared semantics.
pub fn cumulative_total_declared(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    upto_year: Year,
) -> Result<f64, MetricError> {
    let already = ds.semantics(column).is_some_and(|s| s.is_cumulative());
    cumulative_total(ds, entity, column, upto_year, already)
}

/// One column's value at `year`, or its running total up to it.
pub fn basis_value(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
    basis: ValueBasis,
) -> Result<f64, MetricError> {
    match basis {
        ValueBasis::Annual => ds.value(entity, column, year),
        ValueBasis::Cumulative => cumulative_total_declared(ds, entity, column, year),
    }
}

/// Sum of `{column} ∪ with` for one entity.
pub fn combined_total(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
    with: &[ColumnId],
    basis: ValueBasis,
) -> Result<f64, MetricError> {
    let group: BTreeSet<&ColumnId> = with.iter().chain(core::iter::once(column)).collect();
    let mut total = 0.0_f64;
    for c in group {
        total += basis_value(ds, entity, c, year, basis)?;
    }
    if total.is_finite() {
        Ok(total)
    } else {
        Err(MetricError::Overflow { entity: entity.clone(), column: column.clone() })
    }
}
