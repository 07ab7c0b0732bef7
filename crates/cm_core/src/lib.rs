//! cm_core: core types for the comparative metrics engine.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! workspace (`cm_algo`, `cm_io`, `cm_pipeline`, `cm_report`, `cm_cli`).
//!
//! - Tokens: `EntityId`, `ColumnId`, `DatasetId`
//! - Year-indexed datasets (`TabularDataset`) and their catalog
//! - Metric requests (`MetricSpec`, `BatchSpec`) with explicit or `latest` years
//! - The `ComparisonReport` and the metric failure taxonomy (`MetricError`)
//! - Output IDs: `RPT:`, `RUN:`
//!
//! Serialization derives are gated behind the `serde` feature.

#![forbid(unsafe_code)]

pub mod errors {
    use core::fmt;

    /// Construction / parsing errors for core types.
    #[derive(Clone, Debug, Eq, PartialEq)]
    pub enum CoreError {
        InvalidId,
        InvalidToken,
        InvalidTimestamp,
        EmptyDataset,
        YearsNotIncreasing { entity: String, column: String, year: i32 },
        NonFiniteValue { entity: String, column: String, year: i32 },
        YearSetMismatch { column: String },
        ColumnSetMismatch { entity: String },
        JoinEntityMismatch,
        JoinColumnCollision(String),
    }

    impl fmt::Display for CoreError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                CoreError::InvalidId => write!(f, "invalid id"),
                CoreError::InvalidToken => write!(f, "invalid token"),
                CoreError::InvalidTimestamp => write!(f, "invalid timestamp"),
                CoreError::EmptyDataset => write!(f, "dataset has no entities"),
                CoreError::YearsNotIncreasing { entity, column, year } => {
                    write!(f, "years not strictly increasing in {entity}/{column} at {year}")
                }
                CoreError::NonFiniteValue { entity, column, year } => {
                    write!(f, "non-finite value in {entity}/{column} at {year}")
                }
                CoreError::YearSetMismatch { column } => {
                    write!(f, "entities disagree on the year set of column {column}")
                }
                CoreError::ColumnSetMismatch { entity } => {
                    write!(f, "entity {entity} does not carry the dataset's column set")
                }
                CoreError::JoinEntityMismatch => write!(f, "joined datasets have different entities"),
                CoreError::JoinColumnCollision(c) => write!(f, "column {c} present in both joined datasets"),
            }
        }
    }

    impl std::error::Error for CoreError {}
}

pub mod tokens {
    //! Name tokens (`EntityId`, `ColumnId`, `DatasetId`) with a strict charset.

    use crate::errors::CoreError;
    use core::fmt;
    use core::str::FromStr;

    #[cfg(feature = "serde")]
    use serde::{Deserialize, Serialize};

    fn is_token(s: &str) -> bool {
        let len = s.len();
        if !(1..=64).contains(&len) { return false; }
        s.bytes().all(|b| matches!(b,
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' |
            b'_' | b'-' | b':' | b'.'
        ))
    }

    macro_rules! def_token {
        ($name:ident) => {
            #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
            #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
            #[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
            pub struct $name(String);

            impl $name {
                pub fn as_str(&self) -> &str { &self.0 }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
            }

            impl FromStr for $name {
                type Err = CoreError;
                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    if is_token(s) { Ok(Self(s.to_string())) } else { Err(CoreError::InvalidToken) }
                }
            }

            impl TryFrom<String> for $name {
                type Error = CoreError;
                fn try_from(s: String) -> Result<Self, Self::Error> {
                    if is_token(&s) { Ok(Self(s)) } else { Err(CoreError::InvalidToken) }
                }
            }

            impl From<$name> for String {
                fn from(t: $name) -> String { t.0 }
            }
        }
    }

    def_token!(EntityId);
    def_token!(ColumnId);
    def_token!(DatasetId);

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn accepts_csv_style_names() {
            assert!("Government_Millions".parse::<ColumnId>().is_ok());
            assert!("US".parse::<EntityId>().is_ok());
            assert!("funding.gov-2024".parse::<DatasetId>().is_ok());
        }

        #[test]
        fn rejects_blank_and_spaced_names() {
            assert_eq!("".parse::<EntityId>(), Err(CoreError::InvalidToken));
            assert_eq!("South Korea".parse::<EntityId>(), Err(CoreError::InvalidToken));
            assert!("x".repeat(65).parse::<ColumnId>().is_err());
        }
    }
}

pub mod dataset;
pub mod ids;
pub mod report;
pub mod spec;

pub use dataset::{ColumnSemantics, DataPoint, DatasetBuilder, DatasetCatalog, Series, TabularDataset, Year};
pub use errors::CoreError;
pub use report::{
    ComparisonReport, Diagnostics, GrowthIssue, Leader, MetricError, MetricKey, MetricValue, Outcome,
    Period, RatioValue, ReportEntry, ResolvedLatest, Subject,
};
pub use spec::{AsOf, BatchSpec, MetricKind, MetricSpec, Shape, Target, ValueBasis, YearRef};
pub use tokens::{ColumnId, DatasetId, EntityId};
