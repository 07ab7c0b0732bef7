// crates/cm_algo/src/lib.rs
//! Comparative metrics engine.
//!
//! One pure function per metric kind. Every function takes the dataset and
//! explicit years and returns a value or a tagged `MetricError`; none of them
//! panics, logs, or returns `NaN`/`inf`. "Which year" is always an argument:
//! resolving `latest` is the caller's job.
#![forbid(unsafe_code)]

// ----------------------------- Lookups (always on) -----------------------------------

pub mod lookup;
pub use lookup::{annual_value, basis_value, combined_total, cumulative_total, cumulative_total_declared};

// ----------------------------- Metric families ---------------------------------------

#[cfg(feature = "growth")]
pub mod growth;
#[cfg(feature = "growth")]
pub use growth::{cagr, compound_rate, period_growth, relative_change, yoy_growth_rate};

#[cfg(feature = "share")]
pub mod share;
#[cfg(feature = "share")]
pub use share::{mix_share, share, share_of_total};

#[cfg(feature = "ratio")]
pub mod ratio;
#[cfg(feature = "ratio")]
pub use ratio::leader_ratio;

// Types callers match on, re-exported so the engine can be used with one import.
pub use cm_core::{GrowthIssue, Leader, MetricError, RatioValue, ValueBasis};
