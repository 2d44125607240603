//! # End-to-End Prediction Tests
//!
//! These tests run whole predictions through the standard registry and check
//! properties that must hold for any station: extremes agree with the
//! timeline, results do not depend on the sampling interval, and subordinate
//! stations with identity offsets reproduce their reference exactly.

use crate::astronomy::astro;
use crate::nodal::Strategy;
use crate::offsets::{ExtremeOffsets, HeightOffsets, OffsetKind, TimeOffsets};
use crate::prediction::{
    predict, Extreme, ExtremesOptions, HarmonicConstituent, Prediction, PredictionOptions,
    TimelineOptions, TimelinePoint,
};
use crate::registry::Registry;
use crate::station::Station;
use chrono::{DateTime, Duration, TimeZone, Utc};

fn constituent(name: &str, amplitude: f64, phase: f64) -> HarmonicConstituent {
    HarmonicConstituent {
        name: name.to_string(),
        amplitude,
        phase,
    }
}

/// Semidiurnal station with a modest diurnal inequality and overtide.
fn mixed_station() -> Vec<HarmonicConstituent> {
    vec![
        constituent("M2", 1.5, 210.0),
        constituent("S2", 0.4, 235.0),
        constituent("N2", 0.3, 190.0),
        constituent("K1", 0.35, 105.0),
        constituent("O1", 0.25, 90.0),
        constituent("M4", 0.05, 40.0),
        constituent("MS4", 0.03, 75.0),
    ]
}

fn m2_station() -> Vec<HarmonicConstituent> {
    vec![constituent("M2", 1.61, 180.1)]
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, 0, 0, 0).unwrap()
}

fn prediction_for(
    constituents: &[HarmonicConstituent],
    hours: i64,
    options: &PredictionOptions,
) -> Prediction<'static> {
    predict(
        Registry::standard(),
        constituents,
        start(),
        start() + Duration::hours(hours),
        options,
    )
    .unwrap()
}

fn level_bounds(timeline: &[TimelinePoint]) -> (f64, f64) {
    timeline
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
            (min.min(p.level), max.max(p.level))
        })
}

fn ratio_offsets(high: f64, low: f64, high_minutes: f64, low_minutes: f64) -> ExtremeOffsets {
    ExtremeOffsets {
        height: HeightOffsets {
            high,
            low,
            kind: OffsetKind::Ratio,
        },
        time: TimeOffsets {
            high: high_minutes,
            low: low_minutes,
        },
    }
}

/// Every extreme must lie within the range of the sampled curve.
#[test]
fn extremes_lie_within_timeline_range() {
    let prediction = prediction_for(&mixed_station(), 72, &PredictionOptions::default());
    let timeline = prediction.timeline(&TimelineOptions::default());
    let extremes = prediction.extremes(&ExtremesOptions::default());
    let (min, max) = level_bounds(&timeline);

    assert!(extremes.len() >= 10, "expected ~11 extremes in 72 hours, got {}", extremes.len());
    for extreme in &extremes {
        assert!(
            extreme.level >= min - 0.01 && extreme.level <= max + 0.01,
            "extreme {:.4} at {} outside timeline range [{:.4}, {:.4}]",
            extreme.level,
            extreme.time,
            min,
            max
        );
        assert!(extreme.time >= prediction.start() && extreme.time <= prediction.end());
    }
}

/// High and low waters alternate and are in time order.
#[test]
fn extremes_alternate_between_high_and_low() {
    let prediction = prediction_for(&mixed_station(), 96, &PredictionOptions::default());
    let extremes = prediction.extremes(&ExtremesOptions::default());

    for pair in extremes.windows(2) {
        assert!(pair[0].time < pair[1].time, "extremes out of order");
        assert_ne!(
            pair[0].high, pair[1].high,
            "two consecutive extremes of the same type at {} and {}",
            pair[0].time, pair[1].time
        );
        if pair[0].high {
            assert!(pair[0].level > pair[1].level, "high water below the following low");
        } else {
            assert!(pair[0].level < pair[1].level, "low water above the following high");
        }
    }
}

/// Between consecutive extremes the sampled curve stays between their levels.
#[test]
fn timeline_between_extremes_stays_bounded() {
    let prediction = prediction_for(&mixed_station(), 48, &PredictionOptions::default());
    let timeline = prediction.timeline(&TimelineOptions::default());
    let extremes = prediction.extremes(&ExtremesOptions::default());

    for pair in extremes.windows(2) {
        let (lo, hi) = if pair[0].high {
            (pair[1].level, pair[0].level)
        } else {
            (pair[0].level, pair[1].level)
        };
        for point in timeline
            .iter()
            .filter(|p| p.time > pair[0].time && p.time < pair[1].time)
        {
            assert!(
                point.level >= lo - 1e-3 && point.level <= hi + 1e-3,
                "level {:.5} at {} escapes [{:.5}, {:.5}]",
                point.level,
                point.time,
                lo,
                hi
            );
        }
    }
}

/// Extremes do not depend on how finely the timeline is sampled.
#[test]
fn extremes_independent_of_time_fidelity() {
    let coarse = prediction_for(&mixed_station(), 48, &PredictionOptions::default());
    let fine = prediction_for(
        &mixed_station(),
        48,
        &PredictionOptions {
            time_fidelity: Duration::seconds(60),
            ..PredictionOptions::default()
        },
    );

    let coarse_extremes = coarse.extremes(&ExtremesOptions::default());
    let fine_extremes = fine.extremes(&ExtremesOptions::default());
    assert_eq!(coarse_extremes, fine_extremes);

    assert_eq!(coarse.timeline(&TimelineOptions::default()).len(), 289);
    assert_eq!(fine.timeline(&TimelineOptions::default()).len(), 2881);
}

/// Identity offsets reproduce the reference station bit for bit.
#[test]
fn identity_offsets_reproduce_reference_exactly() {
    let prediction = prediction_for(&mixed_station(), 36, &PredictionOptions::default());
    let identity = Some(ExtremeOffsets::identity());

    let reference_timeline = prediction.timeline(&TimelineOptions::default());
    let subordinate_timeline = prediction.timeline(&TimelineOptions { offsets: identity });
    assert_eq!(reference_timeline, subordinate_timeline);

    let reference_extremes = prediction.extremes(&ExtremesOptions::default());
    let subordinate_extremes = prediction.extremes(&ExtremesOptions {
        offsets: identity,
        ..ExtremesOptions::default()
    });
    assert_eq!(reference_extremes, subordinate_extremes);
}

/// Subordinate extremes are the reference extremes shifted and scaled.
#[test]
fn subordinate_extremes_follow_offsets() {
    let offsets = ratio_offsets(1.1, 0.9, 60.0, 30.0);
    let prediction = prediction_for(&m2_station(), 48, &PredictionOptions::default());
    let reference = prediction.extremes(&ExtremesOptions::default());
    let subordinate = prediction.extremes(&ExtremesOptions {
        offsets: Some(offsets),
        ..ExtremesOptions::default()
    });

    assert!(!subordinate.is_empty());
    for extreme in subordinate.iter().filter(|e| e.time >= start() + Duration::hours(1)) {
        let shift = Duration::minutes(if extreme.high { 60 } else { 30 });
        let source: &Extreme = reference
            .iter()
            .find(|r| ((r.time + shift) - extreme.time).num_milliseconds().abs() <= 1)
            .unwrap_or_else(|| panic!("no reference extreme for {}", extreme.time));
        assert_eq!(source.high, extreme.high);
        let ratio = if extreme.high { 1.1 } else { 0.9 };
        assert!(
            (source.level * ratio - extreme.level).abs() < 1e-9,
            "expected {:.6}, got {:.6}",
            source.level * ratio,
            extreme.level
        );
    }
}

/// The subordinate curve peaks at its adjusted extremes.
#[test]
fn subordinate_timeline_passes_through_extremes() {
    let offsets = ratio_offsets(1.1, 0.9, 60.0, 30.0);
    let prediction = prediction_for(&m2_station(), 48, &PredictionOptions::default());
    let timeline = prediction.timeline(&TimelineOptions {
        offsets: Some(offsets),
    });
    let extremes = prediction.extremes(&ExtremesOptions {
        offsets: Some(offsets),
        ..ExtremesOptions::default()
    });

    let (min, max) = level_bounds(&timeline);
    let highest = extremes.iter().map(|e| e.level).fold(f64::NEG_INFINITY, f64::max);
    let lowest = extremes.iter().map(|e| e.level).fold(f64::INFINITY, f64::min);
    assert!((max - highest).abs() < 0.01, "max {max:.4} vs highest extreme {highest:.4}");
    assert!((min - lowest).abs() < 0.01, "min {min:.4} vs lowest extreme {lowest:.4}");
}

/// Fixed height offsets with no time shift raise the whole curve.
#[test]
fn fixed_offsets_raise_curve() {
    let offsets = ExtremeOffsets {
        height: HeightOffsets {
            high: 0.5,
            low: 0.5,
            kind: OffsetKind::Fixed,
        },
        time: TimeOffsets::default(),
    };
    let prediction = prediction_for(&mixed_station(), 24, &PredictionOptions::default());
    let reference = prediction.timeline(&TimelineOptions::default());
    let raised = prediction.timeline(&TimelineOptions {
        offsets: Some(offsets),
    });

    assert_eq!(reference.len(), raised.len());
    for (r, s) in reference.iter().zip(&raised) {
        assert_eq!(r.time, s.time);
        assert!((s.level - r.level - 0.5).abs() < 1e-12);
    }
}

/// A single M2 term over one lunar day swings ±1.61·f with two highs and two lows.
#[test]
fn m2_over_one_lunar_day() {
    let registry = Registry::standard();
    let end = start() + Duration::minutes(24 * 60 + 50);
    let prediction = predict(
        registry,
        &m2_station(),
        start(),
        end,
        &PredictionOptions::default(),
    )
    .unwrap();

    let m2 = registry.find("M2").unwrap();
    let f = Strategy::Iho
        .corrections()
        .compute(registry, m2, &astro(start() + Duration::hours(12)))
        .f;
    let amplitude = 1.61 * f;

    let timeline = prediction.timeline(&TimelineOptions::default());
    let (min, max) = level_bounds(&timeline);
    assert!((max - amplitude).abs() < 0.01, "max {max:.4}, expected {amplitude:.4}");
    assert!((min + amplitude).abs() < 0.01, "min {min:.4}, expected {:.4}", -amplitude);

    let extremes = prediction.extremes(&ExtremesOptions::default());
    let highs: Vec<&Extreme> = extremes.iter().filter(|e| e.high).collect();
    let lows: Vec<&Extreme> = extremes.iter().filter(|e| e.low).collect();
    assert!((4..=5).contains(&extremes.len()), "got {} extremes", extremes.len());
    assert!(highs.len() >= 2 && lows.len() >= 2);

    for extreme in &extremes {
        assert_eq!(extreme.high, extreme.level > 0.0);
        assert!((extreme.level.abs() - amplitude).abs() < 1e-3);
    }

    let period = 360.0 / m2.speed;
    for pair in highs.windows(2) {
        let gap = (pair[1].time - pair[0].time).num_seconds() as f64 / 3600.0;
        assert!((gap - period).abs() < 0.02, "high waters {gap:.4} h apart");
    }
}

/// A month-long span crosses many correction chunks without losing extremes.
#[test]
fn long_span_extreme_count() {
    let prediction = prediction_for(&m2_station(), 720, &PredictionOptions::default());
    let extremes = prediction.extremes(&ExtremesOptions::default());
    // One extreme every half M2 period (~6.21 hours)
    assert!(
        (114..=117).contains(&extremes.len()),
        "got {} extremes over 30 days",
        extremes.len()
    );
}

/// Datum offsets shift every level without moving extremes in time.
#[test]
fn datum_offset_shifts_levels() {
    let shifted = prediction_for(
        &mixed_station(),
        24,
        &PredictionOptions {
            offset: 3.1,
            ..PredictionOptions::default()
        },
    );
    let plain = prediction_for(&mixed_station(), 24, &PredictionOptions::default());

    let shifted_extremes = shifted.extremes(&ExtremesOptions::default());
    let plain_extremes = plain.extremes(&ExtremesOptions::default());
    assert_eq!(shifted_extremes.len(), plain_extremes.len());
    for (s, p) in shifted_extremes.iter().zip(&plain_extremes) {
        assert_eq!(s.time, p.time);
        assert!((s.level - p.level - 3.1).abs() < 1e-9);
    }
}

/// The two nodal strategies predict nearly the same curve.
#[test]
fn strategies_agree_on_levels() {
    let iho = prediction_for(&mixed_station(), 24, &PredictionOptions::default());
    let schureman = prediction_for(
        &mixed_station(),
        24,
        &PredictionOptions {
            strategy: Strategy::Schureman,
            ..PredictionOptions::default()
        },
    );
    let a = iho.timeline(&TimelineOptions::default());
    let b = schureman.timeline(&TimelineOptions::default());
    for (x, y) in a.iter().zip(&b) {
        assert!(
            (x.level - y.level).abs() < 0.02,
            "strategies differ by {:.4} at {}",
            (x.level - y.level).abs(),
            x.time
        );
    }
}

/// NOAA-style upper-case names resolve through aliases.
#[test]
fn aliases_resolve_in_station_data() {
    let lower = prediction_for(
        &[constituent("MSf", 0.1, 20.0), constituent("Sa", 0.2, 10.0)],
        24,
        &PredictionOptions::default(),
    );
    let upper = prediction_for(
        &[constituent("MSF", 0.1, 20.0), constituent("SA", 0.2, 10.0)],
        24,
        &PredictionOptions::default(),
    );
    assert_eq!(upper.active_constituents(), 2);
    assert_eq!(
        lower.timeline(&TimelineOptions::default()),
        upper.timeline(&TimelineOptions::default())
    );
}

/// Subordinate station files drive predictions through their reference.
#[test]
fn subordinate_station_from_json() {
    let reference = Station::from_json(
        r#"{"id": "ref", "name": "Reference",
            "harmonic_constituents": [{"name": "M2", "amplitude": 1.61, "phase": 180.1}],
            "datums": {"MSL": 1.0}}"#,
    )
    .unwrap();
    let subordinate = Station::from_json(
        r#"{"id": "sub", "name": "Subordinate", "reference_id": "ref",
            "offsets": {"height": {"high": 1.0, "low": 1.0, "type": "ratio"},
                        "time": {"high": 0, "low": 0}}}"#,
    )
    .unwrap();

    let prediction = reference
        .predict(
            Registry::standard(),
            start(),
            start() + Duration::hours(24),
            &PredictionOptions::default(),
        )
        .unwrap();
    let own = prediction.extremes(&ExtremesOptions::default());
    let derived = prediction.extremes(&ExtremesOptions {
        offsets: subordinate.offsets,
        ..ExtremesOptions::default()
    });
    assert_eq!(own, derived);
}

/// The shared registry can be used from several threads at once.
#[test]
fn concurrent_predictions_share_registry() {
    let expected = prediction_for(&mixed_station(), 24, &PredictionOptions::default())
        .extremes(&ExtremesOptions::default());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    prediction_for(&mixed_station(), 24, &PredictionOptions::default())
                        .extremes(&ExtremesOptions::default())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
