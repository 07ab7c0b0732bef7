//! Shares: an entity's part of a peer group, or a column's part of an entity's mix.
//!
//! Contract:
//! - The group always contains the subject itself, counted once even if it is
//!   also listed among the peers (or in the mix).
//! - Every member must have a value; a missing member fails the share.
//! - A zero (or non-finite) denominator is `UndefinedShare`.

use std::collections::BTreeSet;

use cm_core::{ColumnId, EntityId, MetricError, TabularDataset, ValueBasis, Year};

use crate::lookup::basis_value;

/// `part / total`, `None` when the total is zero or the quotient is not finite.
pub fn share(part: f64, total: f64) -> Option<f64> {
    if total == 0.0 || !total.is_finite() {
        return None;
    }
    let s = part / total;
    s.is_finite().then_some(s)
}

pub fn share_of_total(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
    peers: &[EntityId],
) -> Result<f64, MetricError> {
    let part = ds.value(entity, column, year)?;
    let group: BTreeSet<&EntityId> = peers.iter().chain(core::iter::once(entity)).collect();

    let mut total = 0.0;
    for e in group {
        total += ds.value(e, column, year)?;
    }
    share(part, total).ok_or_else(|| MetricError::UndefinedShare { column: column.clone(), year })
}

/// Share of `column` among `mix ∪ {column}` for one entity.
pub fn mix_share(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
    mix: &[ColumnId],
    basis: ValueBasis,
) -> Result<f64, MetricError> {
    let term = |c: &ColumnId| basis_value(ds, entity, c, year, basis);

    let part = term(column)?;
    let group: BTreeSet<&ColumnId> = mix.iter().chain(core::iter::once(column)).collect();

    let mut total = 0.0;
    for c in group {
        total += term(c)?;
    }
    share(part, total).ok_or_else(|| MetricError::UndefinedShare { column: column.clone(), year })
}
