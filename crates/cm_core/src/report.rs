//! The comparison report and the metric failure taxonomy.
//!
//! Every requested metric ends up as exactly one `ReportEntry`: a value, or an
//! explicit unavailable marker carrying the `MetricError` that explains why.
//! Failures are ordinary data here; nothing in evaluation aborts a batch.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dataset::Year;
use crate::spec::{MetricKind, YearRef};
use crate::tokens::{ColumnId, DatasetId, EntityId};

/// Why a growth rate could not be computed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum GrowthIssue {
    ZeroBase,
    NegativeBase,
    NegativeEnd,
    NonFinite,
}

impl GrowthIssue {
    pub fn as_str(self) -> &'static str {
        match self {
            GrowthIssue::ZeroBase => "zero base",
            GrowthIssue::NegativeBase => "negative base",
            GrowthIssue::NegativeEnd => "negative end value",
            GrowthIssue::NonFinite => "non-finite result",
        }
    }
}

/// Recoverable, per-metric failure.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "error", rename_all = "snake_case"))]
pub enum MetricError {
    /// `year: None` means the entity or column itself is absent.
    MissingDataPoint { entity: EntityId, column: ColumnId, year: Option<Year> },
    UndefinedGrowthRate { entity: EntityId, column: ColumnId, issue: GrowthIssue },
    UndefinedShare { column: ColumnId, year: Year },
    UndefinedRatio,
    InvalidWindow { start: Year, end: Year },
    /// A running total left the finite range.
    Overflow { entity: EntityId, column: ColumnId },
}

impl MetricError {
    /// Short machine-friendly tag.
    pub fn code(&self) -> &'static str {
        match self {
            MetricError::MissingDataPoint { .. } => "missing_data_point",
            MetricError::UndefinedGrowthRate { .. } => "undefined_growth_rate",
            MetricError::UndefinedShare { .. } => "undefined_share",
            MetricError::UndefinedRatio => "undefined_ratio",
            MetricError::InvalidWindow { .. } => "invalid_window",
            MetricError::Overflow { .. } => "overflow",
        }
    }
}

impl fmt::Display for MetricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricError::MissingDataPoint { entity, column, year: Some(y) } => {
                write!(f, "no data for {entity}/{column} in {y}")
            }
            MetricError::MissingDataPoint { entity, column, year: None } => {
                write!(f, "no series {entity}/{column}")
            }
            MetricError::UndefinedGrowthRate { entity, column, issue } => {
                write!(f, "growth undefined for {entity}/{column}: {}", issue.as_str())
            }
            MetricError::UndefinedShare { column, year } => {
                write!(f, "share undefined: {column} sums to zero in {year}")
            }
            MetricError::UndefinedRatio => f.write_str("ratio undefined: zero denominator"),
            MetricError::InvalidWindow { start, end } => write!(f, "invalid window {start}..{end}"),
            MetricError::Overflow { entity, column } => write!(f, "running total overflowed for {entity}/{column}"),
        }
    }
}

impl std::error::Error for MetricError {}

/// Which side of a comparison holds the larger magnitude.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Leader {
    Left,
    Right,
    Tie,
}

/// A symmetric comparison of two values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RatioValue {
    pub left: f64,
    pub right: f64,
    /// `left / right`
    pub ratio: f64,
    pub leader: Leader,
    /// Larger magnitude over smaller; `None` when the smaller one is zero.
    pub multiple: Option<f64>,
    /// `|left - right|`
    pub gap: f64,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MetricValue {
    Scalar(f64),
    Ratio(RatioValue),
}

impl MetricValue {
    /// Headline number: the scalar itself, or the ratio `left / right`.
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Scalar(v) => *v,
            MetricValue::Ratio(r) => r.ratio,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", content = "result", rename_all = "snake_case"))]
pub enum Outcome {
    Value(MetricValue),
    Unavailable(MetricError),
}

impl Outcome {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn value(&self) -> Option<&MetricValue> {
        match self {
            Outcome::Value(v) => Some(v),
            Outcome::Unavailable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&MetricError> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Unavailable(e) => Some(e),
        }
    }
}

impl From<Result<MetricValue, MetricError>> for Outcome {
    fn from(r: Result<MetricValue, MetricError>) -> Self {
        match r {
            Ok(v) => Outcome::Value(v),
            Err(e) => Outcome::Unavailable(e),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Subject {
    Entity(EntityId),
    Pair { left: EntityId, right: EntityId },
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Entity(e) => write!(f, "{e}"),
            Subject::Pair { left, right } => write!(f, "{left} vs {right}"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Period {
    Year(YearRef),
    Window { start: YearRef, end: YearRef },
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{y}"),
            Period::Window { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

/// Report key. `dataset`/`column` are joined with `|` when ratio operands differ.
///
/// `variant` carries what else tells two requests on the same target apart:
/// the peer group of a share, the basis and mix of a mix share, the basis of a
/// combined total.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetricKey {
    pub kind: MetricKind,
    /// Kind of the left operand of a ratio; `None` for single-target metrics.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub operand: Option<MetricKind>,
    pub dataset: String,
    pub column: String,
    pub subject: Subject,
    pub period: Period,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub variant: Option<String>,
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Some(op) => write!(f, "{}({op})", self.kind)?,
            None => write!(f, "{}", self.kind)?,
        }
        write!(f, " {}/{} [{}] {}", self.dataset, self.column, self.subject, self.period)?;
        match &self.variant {
            Some(v) => write!(f, " ({v})"),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReportEntry {
    pub key: MetricKey,
    pub outcome: Outcome,
}

/// How `latest` was resolved for one dataset.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolvedLatest {
    pub dataset: DatasetId,
    pub cutoff: Option<Year>,
    /// `None` when no year in the index is at or below the cut-off.
    pub year: Option<Year>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostics {
    pub resolved_latest: Vec<ResolvedLatest>,
    pub evaluated: usize,
    pub failed: usize,
    pub failures: Vec<String>,
}

/// Immutable result of one batch.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComparisonReport {
    title: String,
    entries: Vec<ReportEntry>,
    diagnostics: Diagnostics,
}

impl ComparisonReport {
    /// Entries keep the given order; counts and failure lines are derived here.
    pub fn new(title: impl Into<String>, entries: Vec<ReportEntry>, resolved_latest: Vec<ResolvedLatest>) -> Self {
        let failures: Vec<String> = entries
            .iter()
            .filter_map(|e| e.outcome.error().map(|err| format!("{}: {err}", e.key)))
            .collect();
        let diagnostics = Diagnostics {
            resolved_latest,
            evaluated: entries.len(),
            failed: failures.len(),
            failures,
        };
        ComparisonReport { title: title.into(), entries, diagnostics }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn get(&self, key: &MetricKey) -> Option<&Outcome> {
        self.entries.iter().find(|e| &e.key == key).map(|e| &e.outcome)
    }

    pub fn value(&self, key: &MetricKey) -> Option<&MetricValue> {
        self.get(key).and_then(Outcome::value)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&MetricKey, &MetricError)> + '_ {
        self.entries.iter().filter_map(|e| e.outcome.error().map(|err| (&e.key, err)))
    }

    pub fn latest_for(&self, dataset: &DatasetId) -> Option<&ResolvedLatest> {
        self.diagnostics.resolved_latest.iter().find(|r| &r.dataset == dataset)
    }
}
