//! # Harmonic Tide Prediction Library
//!
//! Predicts water levels and high/low waters from a station's harmonic
//! constants.
//!
//! ## Pipeline
//!
//! 1. **Astronomy** ([`astronomy`]): mean longitudes of the Moon, Sun, lunar
//!    perigee and node, plus the node-dependent angles used by nodal
//!    corrections.
//! 2. **Constituents** ([`registry`], [`compound`]): the standard constituent
//!    list, with compound names like `2MK3` decomposed into their members
//!    following IHO Annex B.
//! 3. **Nodal corrections** ([`nodal`]): amplitude factor `f` and phase
//!    correction `u` for the 18.6-year lunar cycle, using IHO or Schureman
//!    formulas and composed recursively for compounds.
//! 4. **Prediction** ([`prediction`], [`offsets`]): harmonic synthesis,
//!    timelines, extrema by bisection, and subordinate stations derived from a
//!    reference station through time and height offsets.
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use tide_harmonics::{predict, ExtremesOptions, HarmonicConstituent, PredictionOptions, Registry};
//!
//! let constituents = vec![HarmonicConstituent {
//!     name: "M2".to_string(),
//!     amplitude: 1.61,
//!     phase: 180.1,
//! }];
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let prediction = predict(
//!     Registry::standard(),
//!     &constituents,
//!     start,
//!     start + Duration::hours(25),
//!     &PredictionOptions::default(),
//! )
//! .unwrap();
//!
//! let extremes = prediction.extremes(&ExtremesOptions::default());
//! assert!(extremes.len() >= 3);
//! ```
//!
//! The standard registry is built once per process and shared read-only, so
//! predictions for different stations may run on separate threads freely.

pub mod astronomy;
pub mod compound;
pub mod config;
pub mod constituent;
pub mod error;
pub mod nodal;
pub mod offsets;
pub mod prediction;
pub mod registry;
pub mod renderer;
pub mod station;

#[cfg(test)]
mod tests;

pub use constituent::{Constituent, ConstituentId, ConstituentMember};
pub use error::TideError;
pub use nodal::{resolve_nodal_strategy, NodalCorrection, NodalStrategy, Strategy};
pub use offsets::{ExtremeOffsets, HeightOffsets, OffsetKind, TimeOffsets};
pub use prediction::{
    predict, water_level_at_time, Extreme, ExtremeLabels, ExtremesOptions, HarmonicConstituent,
    Prediction, PredictionOptions, TimelineOptions, TimelinePoint,
};
pub use registry::{build_registry, Registry};
pub use station::Station;
