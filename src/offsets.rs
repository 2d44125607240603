//! # Subordinate Station Offsets
//!
//! A subordinate station has no constituents of its own. Its tide is the
//! reference station's tide with high and low waters shifted in time and
//! scaled (or raised) in height.
//!
//! Every reference extreme becomes a [`Keyframe`]: the subordinate time it
//! maps to, the reference time it came from, and the height adjustment for
//! its type. Between keyframes the time offset is interpolated linearly and
//! the height adjustment with a cosine ease, so the curve passes through the
//! adjusted extremes without corners.

use crate::prediction::TurningPoint;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// How height offsets combine with the reference level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetKind {
    /// Multiply the reference level
    #[default]
    Ratio,
    /// Add to the reference level
    Fixed,
}

/// Height adjustments at high and low water.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeightOffsets {
    pub high: f64,
    pub low: f64,
    #[serde(rename = "type", default)]
    pub kind: OffsetKind,
}

/// Time shifts at high and low water, in minutes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeOffsets {
    pub high: f64,
    pub low: f64,
}

/// Offsets turning a reference station into a subordinate one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtremeOffsets {
    pub height: HeightOffsets,
    pub time: TimeOffsets,
}

impl Default for ExtremeOffsets {
    fn default() -> Self {
        ExtremeOffsets::identity()
    }
}

impl ExtremeOffsets {
    /// Offsets that leave the reference tide unchanged.
    pub fn identity() -> Self {
        ExtremeOffsets {
            height: HeightOffsets {
                high: 1.0,
                low: 1.0,
                kind: OffsetKind::Ratio,
            },
            time: TimeOffsets::default(),
        }
    }

    pub fn minutes_for(&self, high: bool) -> f64 {
        if high {
            self.time.high
        } else {
            self.time.low
        }
    }

    pub fn height_for(&self, high: bool) -> f64 {
        if high {
            self.height.high
        } else {
            self.height.low
        }
    }

    /// Apply a (possibly interpolated) height adjustment to a level.
    pub fn apply_height(&self, level: f64, adjustment: f64) -> f64 {
        match self.height.kind {
            OffsetKind::Ratio => level * adjustment,
            OffsetKind::Fixed => level + adjustment,
        }
    }

    /// Adjustment used when there are too few extremes to interpolate.
    fn mean_adjustment(&self) -> f64 {
        0.5 * (self.height.high + self.height.low)
    }
}

/// A reference extreme placed on the subordinate time axis. Times are hours
/// since the span start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Keyframe {
    pub subordinate: f64,
    pub reference: f64,
    pub adjustment: f64,
}

impl Keyframe {
    /// Keyframes for `turning` points, ordered by subordinate time.
    pub fn from_turning_points(turning: &[TurningPoint], offsets: &ExtremeOffsets) -> Vec<Keyframe> {
        let mut keyframes: Vec<Keyframe> = turning
            .iter()
            .map(|point| Keyframe {
                subordinate: point.hour + offsets.minutes_for(point.high) / 60.0,
                reference: point.hour,
                adjustment: offsets.height_for(point.high),
            })
            .collect();
        keyframes.sort_by(|a, b| a.subordinate.total_cmp(&b.subordinate));
        keyframes
    }

    /// Time offset in hours (subordinate minus reference).
    fn shift(&self) -> f64 {
        self.subordinate - self.reference
    }
}

/// Maps subordinate times to reference times and height adjustments.
///
/// Queries are expected in increasing time order; the cursor only moves
/// forward, so a timeline is mapped in a single pass.
pub(crate) struct Interpolator<'a> {
    keyframes: &'a [Keyframe],
    offsets: &'a ExtremeOffsets,
    cursor: usize,
}

impl<'a> Interpolator<'a> {
    pub fn new(keyframes: &'a [Keyframe], offsets: &'a ExtremeOffsets) -> Self {
        Interpolator {
            keyframes,
            offsets,
            cursor: 0,
        }
    }

    /// Reference time and height adjustment for subordinate time `hour`.
    pub fn map(&mut self, hour: f64) -> (f64, f64) {
        let (first, last) = match self.keyframes {
            [] | [_] => return self.fallback(hour),
            [first, .., last] => (first, last),
        };
        if hour <= first.subordinate {
            return (hour - first.shift(), first.adjustment);
        }
        if hour >= last.subordinate {
            return (hour - last.shift(), last.adjustment);
        }

        while self.cursor + 2 < self.keyframes.len()
            && self.keyframes[self.cursor + 1].subordinate <= hour
        {
            self.cursor += 1;
        }
        let before = &self.keyframes[self.cursor];
        let after = &self.keyframes[self.cursor + 1];

        let width = after.subordinate - before.subordinate;
        let frac = if width > 0.0 {
            ((hour - before.subordinate) / width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let shift = before.shift() + (after.shift() - before.shift()) * frac;
        let ease = (1.0 - (PI * frac).cos()) / 2.0;
        let adjustment = before.adjustment + (after.adjustment - before.adjustment) * ease;
        (hour - shift, adjustment)
    }

    fn fallback(&self, hour: f64) -> (f64, f64) {
        match self.keyframes.first() {
            Some(only) => (hour - only.shift(), only.adjustment),
            None => (hour, self.offsets.mean_adjustment()),
        }
    }
}
