//! # Harmonic Synthesis and Extrema
//!
//! A prediction folds every active station constituent into three numbers,
//! amplitude `A = amplitude·f`, angular speed `ω` (rad/hour) and phase
//! `φ = V₀ + u − phase` (radians), and evaluates
//!
//! ```text
//! h(t)  =  Σ Aᵢ·cos(ωᵢt + φᵢ)
//! h′(t) = −Σ Aᵢωᵢ·sin(ωᵢt + φᵢ)
//! h″(t) = −Σ Aᵢωᵢ²·cos(ωᵢt + φᵢ)
//! ```
//!
//! with `t` in hours since the span start.
//!
//! ## Nodal corrections
//! `V₀` is computed once at the span start. `f` and `u` change over weeks,
//! not hours, so they are recomputed at the midpoint of fixed 24-hour chunks
//! counted from the span start. Chunk `k` always covers `[24k, 24k + 24)`,
//! whatever range a query asks for.
//!
//! ## Extrema
//! High and low waters are the zeros of `h′`. The search steps through a grid
//! of quarter-periods of the fastest constituent, anchored at `t = 0`, and
//! bisects every grid cell where `h′` changes sign down to one second. `h″`
//! classifies the root. Results depend only on the constituents and the
//! search range, never on the timeline sampling interval.

use crate::astronomy::{astro, D2R};
use crate::constituent::ConstituentId;
use crate::error::TideError;
use crate::nodal::{NodalStrategy, Strategy};
use crate::offsets::{ExtremeOffsets, Interpolator, Keyframe};
use crate::registry::{ConstituentLookup, Registry};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, trace};

/// Hours per nodal-correction chunk.
const CHUNK_HOURS: f64 = 24.0;

/// Bisection stops once the bracket is narrower than one second.
const ROOT_TOLERANCE_HOURS: f64 = 1.0 / 3600.0;

/// Extra search range either side of the span when deriving subordinate
/// stations, so every output instant sits between two reference extremes.
pub(crate) const SUBORDINATE_BUFFER_HOURS: f64 = 36.0;

/// Default timeline sampling interval.
pub const DEFAULT_TIME_FIDELITY_SECS: i64 = 600;

/// One station constituent as published in station data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarmonicConstituent {
    pub name: String,
    pub amplitude: f64,
    /// Phase lag in degrees
    pub phase: f64,
}

/// Water level at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub time: DateTime<Utc>,
    pub level: f64,
}

/// A high or low water. `high == !low` always.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Extreme {
    pub time: DateTime<Utc>,
    pub level: f64,
    pub high: bool,
    pub low: bool,
    pub label: String,
}

/// Labels attached to extremes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtremeLabels {
    pub high: String,
    pub low: String,
}

impl Default for ExtremeLabels {
    fn default() -> Self {
        ExtremeLabels {
            high: "High".to_string(),
            low: "Low".to_string(),
        }
    }
}

/// Settings fixed for the lifetime of a [`Prediction`].
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionOptions {
    /// Timeline sampling interval
    pub time_fidelity: Duration,
    pub strategy: Strategy,
    /// Constant added to every level (datum shift)
    pub offset: f64,
}

impl Default for PredictionOptions {
    fn default() -> Self {
        PredictionOptions {
            time_fidelity: Duration::seconds(DEFAULT_TIME_FIDELITY_SECS),
            strategy: Strategy::default(),
            offset: 0.0,
        }
    }
}

/// Per-call options for [`Prediction::timeline`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelineOptions {
    pub offsets: Option<ExtremeOffsets>,
}

/// Per-call options for [`Prediction::extremes`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtremesOptions {
    pub labels: ExtremeLabels,
    pub offsets: Option<ExtremeOffsets>,
}

/// A station constituent resolved against the registry.
#[derive(Clone, Copy, Debug)]
struct Term {
    id: ConstituentId,
    amplitude: f64,
    /// Radians per hour
    speed: f64,
    /// `V₀ − phase` in radians
    phase: f64,
}

/// Flat parameters of one term within one chunk.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Param {
    amplitude: f64,
    speed: f64,
    phase: f64,
}

/// A turning point of the curve, in hours since the span start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct TurningPoint {
    pub hour: f64,
    pub level: f64,
    pub high: bool,
}

/// Prepared prediction for one station over one span.
///
/// Holds only resolved constituent parameters; every query allocates its own
/// working data and leaves the prediction untouched.
pub struct Prediction<'r> {
    registry: &'r Registry,
    corrections: &'static dyn NodalStrategy,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    time_fidelity: Duration,
    offset: f64,
    terms: Vec<Term>,
}

/// Prepare a prediction for `constituents` over `[start, end]`.
///
/// Constituents with zero amplitude are ignored and names missing from the
/// registry are skipped; neither is an error.
pub fn predict<'r>(
    registry: &'r Registry,
    constituents: &[HarmonicConstituent],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &PredictionOptions,
) -> Result<Prediction<'r>, TideError> {
    if end <= start {
        return Err(TideError::InvalidSpan { start, end });
    }
    if options.time_fidelity <= Duration::zero() {
        return Err(TideError::InvalidTimeFidelity(
            options.time_fidelity.num_seconds(),
        ));
    }

    let origin = astro(start);
    let mut terms = Vec::with_capacity(constituents.len());
    for input in constituents.iter().filter(|c| c.amplitude > 0.0) {
        let Some(id) = registry.id_of(&input.name) else {
            debug!(constituent = %input.name, "skipping constituent missing from registry");
            continue;
        };
        let constituent = registry.get(id);
        terms.push(Term {
            id,
            amplitude: input.amplitude,
            speed: constituent.speed * D2R,
            phase: (constituent.value(&origin) - input.phase) * D2R,
        });
    }
    debug!(
        active = terms.len(),
        supplied = constituents.len(),
        strategy = %options.strategy,
        "prepared harmonic prediction"
    );

    Ok(Prediction {
        registry,
        corrections: options.strategy.corrections(),
        start,
        end,
        time_fidelity: options.time_fidelity,
        offset: options.offset,
        terms,
    })
}

/// Water level at a single instant.
pub fn water_level_at_time(
    registry: &Registry,
    constituents: &[HarmonicConstituent],
    time: DateTime<Utc>,
    strategy: Strategy,
) -> Result<TimelinePoint, TideError> {
    let options = PredictionOptions {
        strategy,
        ..PredictionOptions::default()
    };
    let prediction = predict(
        registry,
        constituents,
        time,
        time + Duration::hours(1),
        &options,
    )?;
    Ok(prediction.level_at(time))
}

impl<'r> Prediction<'r> {
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Number of constituents that contribute to the curve.
    pub fn active_constituents(&self) -> usize {
        self.terms.len()
    }

    /// Levels from `start` to `end` inclusive, every `time_fidelity`.
    ///
    /// With `offsets`, the curve is that of a subordinate station derived
    /// from this (reference) station.
    pub fn timeline(&self, options: &TimelineOptions) -> Vec<TimelinePoint> {
        let span = self.span_hours();
        let times = self.sample_hours();

        match &options.offsets {
            None => {
                let synthesis = self.synthesis(0.0, span);
                times
                    .into_iter()
                    .map(|hour| TimelinePoint {
                        time: self.instant(hour),
                        level: synthesis.level(hour),
                    })
                    .collect()
            }
            Some(offsets) => {
                let (synthesis, turning) = self.buffered_turning_points();
                let keyframes = Keyframe::from_turning_points(&turning, offsets);
                let mut interpolator = Interpolator::new(&keyframes, offsets);
                times
                    .into_iter()
                    .map(|hour| {
                        let (reference, adjustment) = interpolator.map(hour);
                        TimelinePoint {
                            time: self.instant(hour),
                            level: offsets.apply_height(synthesis.level(reference), adjustment),
                        }
                    })
                    .collect()
            }
        }
    }

    /// High and low waters within `[start, end]`, in time order.
    pub fn extremes(&self, options: &ExtremesOptions) -> Vec<Extreme> {
        let span = self.span_hours();
        let labelled = |point: TurningPoint| Extreme {
            time: self.instant(point.hour),
            level: point.level,
            high: point.high,
            low: !point.high,
            label: if point.high {
                options.labels.high.clone()
            } else {
                options.labels.low.clone()
            },
        };

        match &options.offsets {
            None => {
                let (lo, hi) = self.grid_bounds(0.0, span);
                let synthesis = self.synthesis(lo, hi);
                self.turning_points(&synthesis, 0.0, span)
                    .into_iter()
                    .map(labelled)
                    .collect()
            }
            Some(offsets) => {
                let (_, turning) = self.buffered_turning_points();
                let mut shifted: Vec<TurningPoint> = turning
                    .into_iter()
                    .map(|point| TurningPoint {
                        hour: point.hour + offsets.minutes_for(point.high) / 60.0,
                        level: offsets.apply_height(point.level, offsets.height_for(point.high)),
                        high: point.high,
                    })
                    .filter(|point| (0.0..=span).contains(&point.hour))
                    .collect();
                shifted.sort_by(|a, b| a.hour.total_cmp(&b.hour));
                shifted.into_iter().map(labelled).collect()
            }
        }
    }

    /// Level at an arbitrary instant, using the chunk that contains it.
    pub fn level_at(&self, time: DateTime<Utc>) -> TimelinePoint {
        let hour = self.hours_since_start(time);
        let synthesis = self.synthesis(hour, hour);
        TimelinePoint {
            time,
            level: synthesis.level(hour),
        }
    }

    fn span_hours(&self) -> f64 {
        self.hours_since_start(self.end)
    }

    fn hours_since_start(&self, time: DateTime<Utc>) -> f64 {
        (time - self.start).num_milliseconds() as f64 / 3_600_000.0
    }

    fn instant(&self, hour: f64) -> DateTime<Utc> {
        self.start + Duration::milliseconds((hour * 3_600_000.0).round() as i64)
    }

    fn sample_hours(&self) -> Vec<f64> {
        let step = self.time_fidelity.num_milliseconds();
        let total = (self.end - self.start).num_milliseconds();
        (0..=total / step)
            .map(|n| (n * step) as f64 / 3_600_000.0)
            .collect()
    }

    /// Fastest angular speed among active terms, rad/hour.
    fn max_speed(&self) -> f64 {
        self.terms.iter().map(|t| t.speed).fold(0.0, f64::max)
    }

    fn bracket_step(&self) -> Option<f64> {
        let fastest = self.max_speed();
        (fastest > 0.0).then(|| PI / (2.0 * fastest))
    }

    /// Grid-aligned range covering `[lo, hi]`.
    fn grid_bounds(&self, lo: f64, hi: f64) -> (f64, f64) {
        match self.bracket_step() {
            Some(step) => ((lo / step).floor() * step, (hi / step).ceil() * step),
            None => (lo, hi),
        }
    }

    fn buffered_turning_points(&self) -> (Synthesis, Vec<TurningPoint>) {
        let lo = -SUBORDINATE_BUFFER_HOURS;
        let hi = self.span_hours() + SUBORDINATE_BUFFER_HOURS;
        let (grid_lo, grid_hi) = self.grid_bounds(lo, hi);
        let synthesis = self.synthesis(grid_lo, grid_hi);
        let turning = self.turning_points(&synthesis, lo, hi);
        (synthesis, turning)
    }

    /// Nodal-corrected parameters for every chunk touching `[lo, hi]`.
    fn synthesis(&self, lo: f64, hi: f64) -> Synthesis {
        let first = (lo / CHUNK_HOURS).floor() as i64;
        let last = (hi / CHUNK_HOURS).floor() as i64;
        let chunks = (first..=last)
            .map(|chunk| {
                let midpoint = self.instant((chunk as f64 + 0.5) * CHUNK_HOURS);
                let data = astro(midpoint);
                self.terms
                    .iter()
                    .map(|term| {
                        let correction = self.corrections.compute(
                            self.registry,
                            self.registry.get(term.id),
                            &data,
                        );
                        Param {
                            amplitude: term.amplitude * correction.f,
                            speed: term.speed,
                            phase: term.phase + correction.u * D2R,
                        }
                    })
                    .collect()
            })
            .collect();
        Synthesis {
            first_chunk: first,
            chunks,
            offset: self.offset,
        }
    }

    /// Roots of `h′` within `[lo, hi]`. The synthesis must cover the grid
    /// cells around that range.
    fn turning_points(&self, synthesis: &Synthesis, lo: f64, hi: f64) -> Vec<TurningPoint> {
        let Some(step) = self.bracket_step() else {
            return Vec::new();
        };
        let first = (lo / step).floor() as i64;
        let last = (hi / step).ceil() as i64;

        let mut points = Vec::new();
        let mut left = synthesis.velocity(first as f64 * step);
        for cell in first..last {
            let a = cell as f64 * step;
            let b = (cell + 1) as f64 * step;
            let right = synthesis.velocity(b);
            if (left > 0.0) != (right > 0.0) {
                let hour = bisect(synthesis, a, b, left > 0.0);
                if (lo..=hi).contains(&hour) {
                    points.push(TurningPoint {
                        hour,
                        level: synthesis.level(hour),
                        high: synthesis.acceleration(hour) < 0.0,
                    });
                }
            }
            left = right;
        }
        trace!(
            cells = last - first,
            roots = points.len(),
            step_hours = step,
            "extrema search"
        );
        points
    }
}

/// Narrow `[a, b]` around the sign change of `h′`.
fn bisect(synthesis: &Synthesis, mut a: f64, mut b: f64, left_positive: bool) -> f64 {
    while b - a > ROOT_TOLERANCE_HOURS {
        let mid = 0.5 * (a + b);
        if (synthesis.velocity(mid) > 0.0) == left_positive {
            a = mid;
        } else {
            b = mid;
        }
    }
    0.5 * (a + b)
}

/// Chunked parameter table for one query.
pub(crate) struct Synthesis {
    first_chunk: i64,
    chunks: Vec<Vec<Param>>,
    offset: f64,
}

impl Synthesis {
    fn params(&self, hour: f64) -> &[Param] {
        let chunk = (hour / CHUNK_HOURS).floor() as i64 - self.first_chunk;
        let index = chunk.clamp(0, self.chunks.len() as i64 - 1) as usize;
        &self.chunks[index]
    }

    pub(crate) fn level(&self, hour: f64) -> f64 {
        self.offset
            + self
                .params(hour)
                .iter()
                .map(|p| p.amplitude * (p.speed * hour + p.phase).cos())
                .sum::<f64>()
    }

    fn velocity(&self, hour: f64) -> f64 {
        -self
            .params(hour)
            .iter()
            .map(|p| p.amplitude * p.speed * (p.speed * hour + p.phase).sin())
            .sum::<f64>()
    }

    fn acceleration(&self, hour: f64) -> f64 {
        -self
            .params(hour)
            .iter()
            .map(|p| p.amplitude * p.speed * p.speed * (p.speed * hour + p.phase).cos())
            .sum::<f64>()
    }
}
