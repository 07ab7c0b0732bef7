//! Metric requests.
//!
//! A `MetricSpec` names one derived metric over explicit dataset/entity/column
//! targets. Years are `YearRef`s in a request (`2023` or `"latest"`) and plain
//! `Year`s once the batch has been resolved (`MetricSpec<Year>`); resolution
//! happens once per batch in the pipeline, never per metric.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::Year;
use crate::tokens::{ColumnId, DatasetId, EntityId};

/// Explicit year, or the dataset's latest year under the batch cut-off.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawYearRef", into = "RawYearRef"))]
pub enum YearRef {
    Year(Year),
    Latest,
}

impl From<Year> for YearRef {
    fn from(y: Year) -> Self {
        YearRef::Year(y)
    }
}

impl core::fmt::Display for YearRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            YearRef::Year(y) => write!(f, "{y}"),
            YearRef::Latest => f.write_str("latest"),
        }
    }
}

/// Wire shape of a year reference: an integer or the string `"latest"`.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawYearRef {
    Year(Year),
    Token(String),
}

#[cfg(feature = "serde")]
impl TryFrom<RawYearRef> for YearRef {
    type Error = String;
    fn try_from(raw: RawYearRef) -> Result<Self, Self::Error> {
        match raw {
            RawYearRef::Year(y) => Ok(YearRef::Year(y)),
            RawYearRef::Token(t) if t == "latest" => Ok(YearRef::Latest),
            RawYearRef::Token(t) => Err(format!("expected a year or \"latest\", got {t:?}")),
        }
    }
}

#[cfg(feature = "serde")]
impl From<YearRef> for RawYearRef {
    fn from(y: YearRef) -> Self {
        match y {
            YearRef::Year(y) => RawYearRef::Year(y),
            YearRef::Latest => RawYearRef::Token("latest".to_string()),
        }
    }
}

/// Which values feed a mix share: the values at the year, or running totals up to it.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueBasis {
    #[default]
    Annual,
    Cumulative,
}

impl ValueBasis {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueBasis::Annual => "annual",
            ValueBasis::Cumulative => "cumulative",
        }
    }
}

/// Metric family; the first component of every report key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MetricKind {
    AnnualValue,
    CumulativeTotal,
    CombinedTotal,
    YoyGrowthRate,
    Cagr,
    PeriodGrowth,
    ShareOfTotal,
    MixShare,
    LeaderRatio,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::AnnualValue => "annual_value",
            MetricKind::CumulativeTotal => "cumulative_total",
            MetricKind::CombinedTotal => "combined_total",
            MetricKind::YoyGrowthRate => "yoy_growth_rate",
            MetricKind::Cagr => "cagr",
            MetricKind::PeriodGrowth => "period_growth",
            MetricKind::ShareOfTotal => "share_of_total",
            MetricKind::MixShare => "mix_share",
            MetricKind::LeaderRatio => "leader_ratio",
        }
    }

    /// Kinds whose value is a fraction (rendered as a percentage).
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            MetricKind::YoyGrowthRate
                | MetricKind::Cagr
                | MetricKind::PeriodGrowth
                | MetricKind::ShareOfTotal
                | MetricKind::MixShare
        )
    }
}

impl core::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed (dataset, entity, column) triple of a single-target metric.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Target<'a> {
    pub dataset: &'a DatasetId,
    pub entity: &'a EntityId,
    pub column: &'a ColumnId,
}

/// Borrowed view of a spec: a single target or a pair of operands.
#[derive(Debug)]
pub enum Shape<'a, Y> {
    Single(Target<'a>),
    Ratio(&'a MetricSpec<Y>, &'a MetricSpec<Y>),
}

/// One requested metric. `Y` is `YearRef` in requests and `Year` once resolved.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum MetricSpec<Y = YearRef> {
    AnnualValue {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        year: Y,
    },
    CumulativeTotal {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        upto_year: Y,
    },
    /// Sum of `column` and every column in `with` for one entity.
    CombinedTotal {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        year: Y,
        with: Vec<ColumnId>,
        #[cfg_attr(feature = "serde", serde(default))]
        basis: ValueBasis,
    },
    YoyGrowthRate {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        year: Y,
    },
    Cagr {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        start_year: Y,
        end_year: Y,
    },
    PeriodGrowth {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        start_year: Y,
        end_year: Y,
    },
    ShareOfTotal {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        year: Y,
        peers: Vec<EntityId>,
    },
    MixShare {
        dataset: DatasetId,
        entity: EntityId,
        column: ColumnId,
        year: Y,
        mix: Vec<ColumnId>,
        #[cfg_attr(feature = "serde", serde(default))]
        basis: ValueBasis,
    },
    LeaderRatio {
        left: Box<MetricSpec<Y>>,
        right: Box<MetricSpec<Y>>,
    },
}

impl<Y> MetricSpec<Y> {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSpec::AnnualValue { .. } => MetricKind::AnnualValue,
            MetricSpec::CumulativeTotal { .. } => MetricKind::CumulativeTotal,
            MetricSpec::CombinedTotal { .. } => MetricKind::CombinedTotal,
            MetricSpec::YoyGrowthRate { .. } => MetricKind::YoyGrowthRate,
            MetricSpec::Cagr { .. } => MetricKind::Cagr,
            MetricSpec::PeriodGrowth { .. } => MetricKind::PeriodGrowth,
            MetricSpec::ShareOfTotal { .. } => MetricKind::ShareOfTotal,
            MetricSpec::MixShare { .. } => MetricKind::MixShare,
            MetricSpec::LeaderRatio { .. } => MetricKind::LeaderRatio,
        }
    }

    /// One target, or the two operands of a ratio.
    pub fn shape(&self) -> Shape<'_, Y> {
        match self {
            MetricSpec::AnnualValue { dataset, entity, column, .. }
            | MetricSpec::CumulativeTotal { dataset, entity, column, .. }
            | MetricSpec::CombinedTotal { dataset, entity, column, .. }
            | MetricSpec::YoyGrowthRate { dataset, entity, column, .. }
            | MetricSpec::Cagr { dataset, entity, column, .. }
            | MetricSpec::PeriodGrowth { dataset, entity, column, .. }
            | MetricSpec::ShareOfTotal { dataset, entity, column, .. }
            | MetricSpec::MixShare { dataset, entity, column, .. } => Shape::Single(Target { dataset, entity, column }),
            MetricSpec::LeaderRatio { left, right } => Shape::Ratio(left, right),
        }
    }

    /// Target of a single-target metric; `None` for ratios.
    pub fn target(&self) -> Option<Target<'_>> {
        match self.shape() {
            Shape::Single(t) => Some(t),
            Shape::Ratio(..) => None,
        }
    }

    /// Every dataset this metric reads (both operands for ratios).
    pub fn datasets(&self) -> Vec<&DatasetId> {
        match self {
            MetricSpec::LeaderRatio { left, right } => {
                let mut v = left.datasets();
                v.extend(right.datasets());
                v
            }
            other => other.target().map(|t| vec![t.dataset]).unwrap_or_default(),
        }
    }

    /// The year (single-year kinds) or `(start, end)` window of this metric.
    pub fn years(&self) -> (&Y, Option<&Y>) {
        match self {
            MetricSpec::AnnualValue { year, .. }
            | MetricSpec::YoyGrowthRate { year, .. }
            | MetricSpec::ShareOfTotal { year, .. }
            | MetricSpec::MixShare { year, .. }
            | MetricSpec::CombinedTotal { year, .. } => (year, None),
            MetricSpec::CumulativeTotal { upto_year, .. } => (upto_year, None),
            MetricSpec::Cagr { start_year, end_year, .. }
            | MetricSpec::PeriodGrowth { start_year, end_year, .. } => (start_year, Some(end_year)),
            MetricSpec::LeaderRatio { left, .. } => left.years(),
        }
    }

    /// Visit every year reference with the target it belongs to.
    pub fn for_each_year<F>(&self, f: &mut F)
    where
        F: FnMut(Target<'_>, &Y),
    {
        match self {
            MetricSpec::LeaderRatio { left, right } => {
                left.for_each_year(f);
                right.for_each_year(f);
            }
            other => {
                if let Some(t) = other.target() {
                    let (year, end) = other.years();
                    f(t, year);
                    if let Some(end) = end {
                        f(t, end);
                    }
                }
            }
        }
    }

    /// Rewrite every year through `f`, which sees the target each year belongs to.
    pub fn map_years<Z, E, F>(&self, f: &mut F) -> Result<MetricSpec<Z>, E>
    where
        F: FnMut(Target<'_>, &Y) -> Result<Z, E>,
    {
        Ok(match self {
            MetricSpec::AnnualValue { dataset, entity, column, year } => {
                let t = Target { dataset, entity, column };
                MetricSpec::AnnualValue {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    year: f(t, year)?,
                }
            }
            MetricSpec::CumulativeTotal { dataset, entity, column, upto_year } => {
                let t = Target { dataset, entity, column };
                MetricSpec::CumulativeTotal {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    upto_year: f(t, upto_year)?,
                }
            }
            MetricSpec::CombinedTotal { dataset, entity, column, year, with, basis } => {
                let t = Target { dataset, entity, column };
                MetricSpec::CombinedTotal {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    year: f(t, year)?,
                    with: with.clone(),
                    basis: *basis,
                }
            }
            MetricSpec::YoyGrowthRate { dataset, entity, column, year } => {
                let t = Target { dataset, entity, column };
                MetricSpec::YoyGrowthRate {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    year: f(t, year)?,
                }
            }
            MetricSpec::Cagr { dataset, entity, column, start_year, end_year } => {
                let t = Target { dataset, entity, column };
                MetricSpec::Cagr {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    start_year: f(t, start_year)?,
                    end_year: f(t, end_year)?,
                }
            }
            MetricSpec::PeriodGrowth { dataset, entity, column, start_year, end_year } => {
                let t = Target { dataset, entity, column };
                MetricSpec::PeriodGrowth {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    start_year: f(t, start_year)?,
                    end_year: f(t, end_year)?,
                }
            }
            MetricSpec::ShareOfTotal { dataset, entity, column, year, peers } => {
                let t = Target { dataset, entity, column };
                MetricSpec::ShareOfTotal {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    year: f(t, year)?,
                    peers: peers.clone(),
                }
            }
            MetricSpec::MixShare { dataset, entity, column, year, mix, basis } => {
                let t = Target { dataset, entity, column };
                MetricSpec::MixShare {
                    dataset: dataset.clone(),
                    entity: entity.clone(),
                    column: column.clone(),
                    year: f(t, year)?,
                    mix: mix.clone(),
                    basis: *basis,
                }
            }
            MetricSpec::LeaderRatio { left, right } => MetricSpec::LeaderRatio {
                left: Box::new(left.map_years(f)?),
                right: Box::new(right.map_years(f)?),
            },
        })
    }
}

/// Cut-off used to resolve `latest`: the greatest year considered, globally or per dataset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AsOf {
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_year: Option<Year>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub per_dataset: BTreeMap<DatasetId, Year>,
}

impl AsOf {
    /// Per-dataset cut-off wins over the global one.
    pub fn cutoff_for(&self, dataset: &DatasetId) -> Option<Year> {
        self.per_dataset.get(dataset).copied().or(self.max_year)
    }
}

/// A batch of metric requests evaluated into one report.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BatchSpec {
    #[cfg_attr(feature = "serde", serde(default))]
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub as_of: AsOf,
    pub metrics: Vec<MetricSpec<YearRef>>,
}
