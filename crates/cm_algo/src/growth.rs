//! Growth rates: year-over-year, compound annual, and total change over a window.
//!
//! Contract:
//! - YoY compares `year` with the previous calendar year `year - 1`. Only a zero
//!   base is undefined; negative growth is an ordinary value.
//! - CAGR and period growth check the window first (`end > start`), then look
//!   up both endpoints, then judge the values.
//! - CAGR needs a strictly positive start and a non-negative end: a fractional
//!   power of a negative ratio has no real value.
//! - Any result that is not finite is `UndefinedGrowthRate { issue: NonFinite }`.

use cm_core::{ColumnId, EntityId, GrowthIssue, MetricError, TabularDataset, Year};

/// `(end - base) / base`
pub fn relative_change(base: f64, end: f64) -> Result<f64, GrowthIssue> {
    if base == 0.0 {
        return Err(GrowthIssue::ZeroBase);
    }
    finite((end - base) / base)
}

/// `(end / start)^(1 / periods) - 1`
pub fn compound_rate(start: f64, end: f64, periods: u32) -> Result<f64, GrowthIssue> {
    if start == 0.0 {
        return Err(GrowthIssue::ZeroBase);
    }
    if start < 0.0 {
        return Err(GrowthIssue::NegativeBase);
    }
    if end < 0.0 {
        return Err(GrowthIssue::NegativeEnd);
    }
    if periods == 0 {
        return Err(GrowthIssue::NonFinite);
    }
    finite((end / start).powf(1.0 / f64::from(periods)) - 1.0)
}

pub fn yoy_growth_rate(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    year: Year,
) -> Result<f64, MetricError> {
    let current = ds.value(entity, column, year)?;
    let prev_year = year.checked_sub(1).ok_or_else(|| MetricError::MissingDataPoint {
        entity: entity.clone(),
        column: column.clone(),
        year: None,
    })?;
    let previous = ds.value(entity, column, prev_year)?;
    relative_change(previous, current).map_err(|issue| undefined(entity, column, issue))
}

pub fn cagr(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    start_year: Year,
    end_year: Year,
) -> Result<f64, MetricError> {
    let periods = window(start_year, end_year)?;
    let start = ds.value(entity, column, start_year)?;
    let end = ds.value(entity, column, end_year)?;
    compound_rate(start, end, periods).map_err(|issue| undefined(entity, column, issue))
}

/// Total relative change `v[end] / v[start] - 1`; the start must be positive.
pub fn period_growth(
    ds: &TabularDataset,
    entity: &EntityId,
    column: &ColumnId,
    start_year: Year,
    end_year: Year,
) -> Result<f64, MetricError> {
    window(start_year, end_year)?;
    let start = ds.value(entity, column, start_year)?;
    let end = ds.value(entity, column, end_year)?;
    if start < 0.0 {
        return Err(undefined(entity, column, GrowthIssue::NegativeBase));
    }
    relative_change(start, end).map_err(|issue| undefined(entity, column, issue))
}

fn window(start: Year, end: Year) -> Result<u32, MetricError> {
    if end <= start {
        return Err(MetricError::InvalidWindow { start, end });
    }
    // end > start, so the difference is positive and fits in u32
    Ok(end.abs_diff(start))
}

fn finite(x: f64) -> Result<f64, GrowthIssue> {
    if x.is_finite() {
        Ok(x)
    } else {
        Err(GrowthIssue::NonFinite)
    }
}

fn undefined(entity: &EntityId, column: &ColumnId, issue: GrowthIssue) -> MetricError {
    MetricError::UndefinedGrowthRate { entity: entity.clone(), column: column.clone(), issue }
}
