//! # Error Types
//!
//! All fallible library operations return [`TideError`]. Data-quality problems
//! that the engine degrades around (unknown station constituents, compound
//! names that cannot be decomposed) are logged instead of surfaced here.

use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Errors raised while building the constituent registry, selecting a nodal
/// strategy, or setting up a prediction.
#[derive(Error, Debug)]
pub enum TideError {
    /// Nodal strategy name was neither `iho` nor `schureman`
    #[error("unknown nodal correction strategy `{0}` (expected `iho` or `schureman`)")]
    UnknownStrategy(String),

    /// Prediction span must have `end > start`
    #[error("invalid time span: end {end} is not after start {start}")]
    InvalidSpan {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Timeline sampling interval must be positive
    #[error("time fidelity must be a positive number of seconds, got {0}")]
    InvalidTimeFidelity(i64),

    /// Dataset or station JSON could not be parsed
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Station file could not be read
    #[error("IO: {0}")]
    Io(#[from] io::Error),

    /// Two dataset records claim the same name or alias
    #[error("constituent name `{0}` is defined more than once")]
    DuplicateName(String),

    /// A record references a constituent that is not in the dataset
    #[error("constituent `{constituent}` references unknown constituent `{member}`")]
    UnknownMember { constituent: String, member: String },

    /// A nodal-correction code letter outside the known table
    #[error("constituent `{constituent}` has unknown nodal correction code `{code}`")]
    UnknownNodalCode { constituent: String, code: String },

    /// XDO strings are seven letters from `R..Z..H`
    #[error("constituent `{constituent}` has malformed XDO `{xdo}`")]
    InvalidXdo { constituent: String, xdo: String },

    /// Constituent has neither coefficients, an XDO, nor resolvable members
    #[error("constituent `{0}` has no coefficients and no resolvable members")]
    MissingCoefficients(String),

    /// Member graph must be acyclic
    #[error("constituent member graph has a cycle through `{0}`")]
    MemberCycle(String),
}
