//! Year-indexed comparative datasets.
//!
//! A `TabularDataset` maps entity → column → ordered `(year, value)` series.
//! Invariants (checked once, in `DatasetBuilder::build`):
//! - years strictly increasing inside every series;
//! - all entities share the same year index for a given column;
//! - all entities carry the same column set;
//! - present values are finite. Gaps are explicit (`value: None`).
//!
//! Datasets are immutable after construction. All "which year" decisions are
//! inputs from the caller; nothing here reads positionally ("last row").

use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::report::MetricError;
use crate::tokens::{ColumnId, DatasetId, EntityId};

pub type Year = i32;

/// Declared meaning of a column's values.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ColumnSemantics {
    /// One value per period.
    #[default]
    Annual,
    /// Running total since the first period.
    Cumulative,
}

impl ColumnSemantics {
    pub fn is_cumulative(self) -> bool {
        matches!(self, ColumnSemantics::Cumulative)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataPoint {
    pub year: Year,
    /// `None` marks an explicit gap at a year that is part of the index.
    pub value: Option<f64>,
}

impl DataPoint {
    pub fn new(year: Year, value: f64) -> Self {
        Self { year, value: Some(value) }
    }

    pub fn gap(year: Year) -> Self {
        Self { year, value: None }
    }
}

/// Ordered series for one (entity, column).
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    points: Vec<DataPoint>,
}

impl Series {
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn years(&self) -> impl Iterator<Item = Year> + '_ {
        self.points.iter().map(|p| p.year)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `year`, if the year is part of the index.
    pub fn get(&self, year: Year) -> Option<&DataPoint> {
        self.points
            .binary_search_by(|p| p.year.cmp(&year))
            .ok()
            .map(|i| &self.points[i])
    }
}

/// Immutable comparative dataset.
#[derive(Clone, Debug, PartialEq)]
pub struct TabularDataset {
    id: DatasetId,
    semantics: BTreeMap<ColumnId, ColumnSemantics>,
    entity_columns: BTreeMap<EntityId, BTreeMap<ColumnId, Series>>,
}

impl TabularDataset {
    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityId> + '_ {
        self.entity_columns.keys()
    }

    pub fn has_entity(&self, entity: &EntityId) -> bool {
        self.entity_columns.contains_key(entity)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&ColumnId, ColumnSemantics)> + '_ {
        self.semantics.iter().map(|(c, s)| (c, *s))
    }

    pub fn has_column(&self, column: &ColumnId) -> bool {
        self.semantics.contains_key(column)
    }

    pub fn semantics(&self, column: &ColumnId) -> Option<ColumnSemantics> {
        self.semantics.get(column).copied()
    }

    /// Full ordered series for (entity, column).
    pub fn series(&self, entity: &EntityId, column: &ColumnId) -> Result<&Series, MetricError> {
        self.entity_columns
            .get(entity)
            .and_then(|cols| cols.get(column))
            .ok_or_else(|| MetricError::MissingDataPoint {
                entity: entity.clone(),
                column: column.clone(),
                year: None,
            })
    }

    /// Value at (entity, column, year); absent year or explicit gap → `MissingDataPoint`.
    pub fn value(&self, entity: &EntityId, column: &ColumnId, year: Year) -> Result<f64, MetricError> {
        let missing = || MetricError::MissingDataPoint {
            entity: entity.clone(),
            column: column.clone(),
            year: Some(year),
        };
        let series = self.series(entity, column).map_err(|_| missing())?;
        series.get(year).and_then(|p| p.value).ok_or_else(missing)
    }

    /// Year index of `column` (shared by every entity).
    pub fn years(&self, column: &ColumnId) -> Option<Vec<Year>> {
        self.entity_columns
            .values()
            .next()
            .and_then(|cols| cols.get(column))
            .map(|s| s.years().collect())
    }

    /// Years present in the index of *every* column.
    pub fn common_years(&self) -> BTreeSet<Year> {
        let mut out: Option<BTreeSet<Year>> = None;
        for column in self.semantics.keys() {
            let ys: BTreeSet<Year> = self.years(column).unwrap_or_default().into_iter().collect();
            out = Some(match out {
                None => ys,
                Some(acc) => acc.intersection(&ys).copied().collect(),
            });
        }
        out.unwrap_or_default()
    }

    /// Greatest common year not after `cutoff` (no cutoff → greatest common year).
    pub fn latest_year(&self, cutoff: Option<Year>) -> Option<Year> {
        self.common_years()
            .into_iter()
            .rev()
            .find(|y| cutoff.map_or(true, |c| *y <= c))
    }

    /// Join two datasets over the same entities with disjoint columns.
    pub fn join(&self, other: &TabularDataset, id: DatasetId) -> Result<TabularDataset, CoreError> {
        let mine: BTreeSet<&EntityId> = self.entity_columns.keys().collect();
        let theirs: BTreeSet<&EntityId> = other.entity_columns.keys().collect();
        if mine != theirs {
            return Err(CoreError::JoinEntityMismatch);
        }
        if let Some(c) = other.semantics.keys().find(|c| self.semantics.contains_key(*c)) {
            return Err(CoreError::JoinColumnCollision(c.to_string()));
        }

        let mut semantics = self.semantics.clone();
        semantics.extend(other.semantics.iter().map(|(c, s)| (c.clone(), *s)));

        let mut entity_columns = self.entity_columns.clone();
        for (entity, cols) in &other.entity_columns {
            if let Some(target) = entity_columns.get_mut(entity) {
                target.extend(cols.iter().map(|(c, s)| (c.clone(), s.clone())));
            }
        }
        Ok(TabularDataset { id, semantics, entity_columns })
    }
}

/// Incremental constructor used by ingestion and tests.
#[derive(Debug)]
pub struct DatasetBuilder {
    id: DatasetId,
    semantics: BTreeMap<ColumnId, ColumnSemantics>,
    entity_columns: BTreeMap<EntityId, BTreeMap<ColumnId, Vec<DataPoint>>>,
}

impl DatasetBuilder {
    pub fn new(id: DatasetId) -> Self {
        Self { id, semantics: BTreeMap::new(), entity_columns: BTreeMap::new() }
    }

    /// Declare a column's semantics. Undeclared columns default to `Annual`.
    pub fn column(mut self, column: ColumnId, semantics: ColumnSemantics) -> Self {
        self.semantics.insert(column, semantics);
        self
    }

    pub fn declare(&mut self, column: ColumnId, semantics: ColumnSemantics) {
        self.semantics.insert(column, semantics);
    }

    pub fn series(mut self, entity: EntityId, column: ColumnId, points: Vec<DataPoint>) -> Self {
        self.push_series(entity, column, points);
        self
    }

    pub fn push_series(&mut self, entity: EntityId, column: ColumnId, points: Vec<DataPoint>) {
        self.semantics.entry(column.clone()).or_default();
        self.entity_columns.entry(entity).or_default().insert(column, points);
    }

    pub fn build(self) -> Result<TabularDataset, CoreError> {
        if self.entity_columns.is_empty() {
            return Err(CoreError::EmptyDataset);
        }

        let mut entity_columns = BTreeMap::new();
        let mut year_index: BTreeMap<&ColumnId, Vec<Year>> = BTreeMap::new();

        for (entity, cols) in &self.entity_columns {
            if cols.len() != self.semantics.len() || !self.semantics.keys().all(|c| cols.contains_key(c)) {
                return Err(CoreError::ColumnSetMismatch { entity: entity.to_string() });
            }
            let mut built = BTreeMap::new();
            for (column, points) in cols {
                check_points(entity, column, points)?;
                let years: Vec<Year> = points.iter().map(|p| p.year).collect();
                match year_index.get(column) {
                    Some(expected) if *expected != years => {
                        return Err(CoreError::YearSetMismatch { column: column.to_string() });
                    }
                    Some(_) => {}
                    None => {
                        year_index.insert(column, years);
                    }
                }
                built.insert(column.clone(), Series { points: points.clone() });
            }
            entity_columns.insert(entity.clone(), built);
        }

        Ok(TabularDataset { id: self.id, semantics: self.semantics, entity_columns })
    }
}

fn check_points(entity: &EntityId, column: &ColumnId, points: &[DataPoint]) -> Result<(), CoreError> {
    let mut prev: Option<Year> = None;
    for p in points {
        if prev.is_some_and(|y| p.year <= y) {
            return Err(CoreError::YearsNotIncreasing {
                entity: entity.to_string(),
                column: column.to_string(),
                year: p.year,
            });
        }
        if p.value.is_some_and(|v| !v.is_finite()) {
            return Err(CoreError::NonFiniteValue {
                entity: entity.to_string(),
                column: column.to_string(),
                year: p.year,
            });
        }
        prev = Some(p.year);
    }
    Ok(())
}

/// Datasets available to one batch, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct DatasetCatalog {
    datasets: BTreeMap<DatasetId, TabularDataset>,
}

impl DatasetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a dataset; returns the previous one with the same id, if any.
    pub fn insert(&mut self, dataset: TabularDataset) -> Option<TabularDataset> {
        self.datasets.insert(dataset.id().clone(), dataset)
    }

    pub fn get(&self, id: &DatasetId) -> Option<&TabularDataset> {
        self.datasets.get(id)
    }

    pub fn contains(&self, id: &DatasetId) -> bool {
        self.datasets.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TabularDataset> + '_ {
        self.datasets.values()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl FromIterator<TabularDataset> for DatasetCatalog {
    fn from_iter<I: IntoIterator<Item = TabularDataset>>(iter: I) -> Self {
        let mut c = DatasetCatalog::new();
        for d in iter {
            c.insert(d);
        }
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id<T: core::str::FromStr>(s: &str) -> T
    where
        T::Err: core::fmt::Debug,
    {
        s.parse().expect("token")
    }

    fn pts(rows: &[(Year, f64)]) -> Vec<DataPoint> {
        rows.iter().map(|&(y, v)| DataPoint::new(y, v)).collect()
    }

    fn gov() -> TabularDataset {
        DatasetBuilder::new(id("gov"))
            .series(id("US"), id("Government"), pts(&[(2014, 100.0), (2015, 110.0)]))
            .series(id("China"), id("Government"), pts(&[(2014, 50.0), (2015, 80.0)]))
            .build()
            .expect("dataset")
    }

    #[test]
    fn value_lookup_and_missing_year() {
        let ds = gov();
        assert_eq!(ds.value(&id("US"), &id("Government"), 2015), Ok(110.0));
        let err = ds.value(&id("US"), &id("Government"), 2016).unwrap_err();
        assert_eq!(
            err,
            MetricError::MissingDataPoint { entity: id("US"), column: id("Government"), year: Some(2016) }
        );
    }

    #[test]
    fn unknown_entity_is_missing_data() {
        let ds = gov();
        assert!(matches!(
            ds.value(&id("EU"), &id("Government"), 2015),
            Err(MetricError::MissingDataPoint { .. })
        ));
    }

    #[test]
    fn explicit_gap_is_missing_data() {
        let ds = DatasetBuilder::new(id("gaps"))
            .series(id("US"), id("Total"), vec![DataPoint::new(2014, 1.0), DataPoint::gap(2015)])
            .build()
            .expect("dataset");
        assert!(ds.value(&id("US"), &id("Total"), 2015).is_err());
        assert_eq!(ds.years(&id("Total")), Some(vec![2014, 2015]));
    }

    #[test]
    fn rejects_unordered_years() {
        let err = DatasetBuilder::new(id("bad"))
            .series(id("US"), id("Total"), pts(&[(2015, 1.0), (2014, 2.0)]))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::YearsNotIncreasing { year: 2014, .. }));
    }

    #[test]
    fn rejects_year_set_mismatch_between_entities() {
        let err = DatasetBuilder::new(id("bad"))
            .series(id("US"), id("Total"), pts(&[(2014, 1.0), (2015, 2.0)]))
            .series(id("China"), id("Total"), pts(&[(2014, 1.0)]))
            .build()
            .unwrap_err();
        assert_eq!(err, CoreError::YearSetMismatch { column: "Total".into() });
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = DatasetBuilder::new(id("bad"))
            .series(id("US"), id("Total"), pts(&[(2014, f64::NAN)]))
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::NonFiniteValue { .. }));
    }

    #[test]
    fn rejects_uneven_column_sets() {
        let err = DatasetBuilder::new(id("bad"))
            .series(id("US"), id("A"), pts(&[(2014, 1.0)]))
            .series(id("US"), id("B"), pts(&[(2014, 1.0)]))
            .series(id("China"), id("A"), pts(&[(2014, 1.0)]))
            .build()
            .unwrap_err();
        assert_eq!(err, CoreError::ColumnSetMismatch { entity: "China".into() });
    }

    #[test]
    fn latest_year_honors_cutoff() {
        let ds = gov();
        assert_eq!(ds.latest_year(None), Some(2015));
        assert_eq!(ds.latest_year(Some(2014)), Some(2014));
        assert_eq!(ds.latest_year(Some(2000)), None);
    }

    #[test]
    fn join_merges_disjoint_columns() {
        let private = DatasetBuilder::new(id("private"))
            .series(id("US"), id("Private"), pts(&[(2014, 10.0), (2015, 20.0)]))
            .series(id("China"), id("Private"), pts(&[(2014, 1.0), (2015, 2.0)]))
            .build()
            .expect("dataset");
        let joined = gov().join(&private, id("funding")).expect("join");
        assert_eq!(joined.value(&id("China"), &id("Private"), 2015), Ok(2.0));
        assert_eq!(joined.value(&id("China"), &id("Government"), 2015), Ok(80.0));
        assert_eq!(joined.columns().count(), 2);

        assert_eq!(gov().join(&gov(), id("x")).unwrap_err(), CoreError::JoinColumnCollision("Government".into()));
    }
}
