//! Astronomical arguments for harmonic tide prediction.
//!
//! Mean longitudes of the Moon, Sun, lunar perigee, lunar node and solar
//! perigee are low-degree polynomials in Julian centuries from J2000.0
//! (Meeus, *Astronomical Algorithms*, ch. 22 and 47). The inclination terms
//! `I, ξ, ν, ν′, ν″` follow Schureman, *Manual of Harmonic Analysis and
//! Prediction of Tides* (1958), equations 191-232.
//!
//! Every argument is returned as an [`AstroArgument`]: the value in degrees
//! reduced to `[0, 360)` (or `(-180, 180]` for the small inclination terms),
//! plus its rate in degrees per hour.

use chrono::{DateTime, Utc};
use std::f64::consts::PI;

/// Degrees to radians.
pub const D2R: f64 = PI / 180.0;
/// Radians to degrees.
pub const R2D: f64 = 180.0 / PI;

/// Inclination of the lunar orbit to the ecliptic (degrees).
const LUNAR_INCLINATION: f64 = 5.145;

/// Hours in a Julian century; converts polynomial rates to degrees/hour.
const HOURS_PER_CENTURY: f64 = 36_525.0 * 24.0;

/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Julian date of J2000.0.
const J2000_JD: f64 = 2_451_545.0;

// Polynomial coefficients in ascending powers of T (centuries since J2000).
const MOON_LONGITUDE: [f64; 5] = [
    218.316_447_7,
    481_267.881_234_21,
    -0.001_578_6,
    1.0 / 538_841.0,
    -1.0 / 65_194_000.0,
];
const SUN_LONGITUDE: [f64; 3] = [280.466_46, 36_000.769_83, 0.000_303_2];
const LUNAR_PERIGEE: [f64; 5] = [
    83.353_246_5,
    4_069.013_728_7,
    -0.010_320_0,
    -1.0 / 80_053.0,
    1.0 / 18_999_000.0,
];
const LUNAR_NODE: [f64; 5] = [
    125.044_547_9,
    -1_934.136_289_1,
    0.002_075_4,
    1.0 / 467_441.0,
    -1.0 / 60_616_000.0,
];
const SOLAR_PERIGEE: [f64; 3] = [282.937_35, 1.719_46, 0.000_46];
const OBLIQUITY: [f64; 4] = [23.439_291_1, -0.013_004_166_7, -1.6389e-7, 5.0361e-7];

/// Step (degrees of node longitude) for the numeric rate of the node-derived terms.
const NODE_STEP: f64 = 0.01;

/// One astronomical argument at an instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AstroArgument {
    /// Angle in degrees
    pub value: f64,
    /// Rate in degrees per hour
    pub speed: f64,
}

impl AstroArgument {
    const fn fixed(value: f64) -> Self {
        AstroArgument { value, speed: 0.0 }
    }
}

/// The full set of astronomical arguments at one instant.
///
/// Computed fresh for every query instant; nothing here is cached.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AstroData {
    /// Mean lunar time, τ = T + h − s
    pub tau: AstroArgument,
    /// Mean longitude of the Moon
    pub s: AstroArgument,
    /// Mean longitude of the Sun
    pub h: AstroArgument,
    /// Longitude of the lunar perigee
    pub p: AstroArgument,
    /// Longitude of the Moon's ascending node
    pub n: AstroArgument,
    /// Longitude of the solar perigee
    pub pp: AstroArgument,
    /// Inclination of the lunar orbit to the ecliptic
    pub i: AstroArgument,
    /// Obliquity of the ecliptic
    pub omega: AstroArgument,
    /// Inclination of the lunar orbit to the equator
    pub big_i: AstroArgument,
    /// Longitude in the Moon's orbit of its intersection with the equator
    pub xi: AstroArgument,
    /// Right ascension of that intersection
    pub nu: AstroArgument,
    /// Schureman ν′ (K1 phase term)
    pub nu_prime: AstroArgument,
    /// Schureman ν″ (K2 phase term)
    pub nu_double_prime: AstroArgument,
    /// Lunar perigee measured from the orbit intersection, P = p − ξ
    pub big_p: AstroArgument,
}

impl AstroData {
    /// Arguments multiplied by a constituent's seven Doodson coefficients:
    /// `[τ, s, h, p, N′ (= −N), p′, 90°]`.
    pub fn doodson_arguments(&self) -> [AstroArgument; 7] {
        [
            self.tau,
            self.s,
            self.h,
            self.p,
            AstroArgument {
                value: modulus(-self.n.value),
                speed: -self.n.speed,
            },
            self.pp,
            AstroArgument::fixed(90.0),
        ]
    }
}

/// Compute every astronomical argument at `time`.
///
/// Defined for any representable instant. Precision degrades slowly far from
/// J2000 but nothing here can fail or produce NaN.
pub fn astro(time: DateTime<Utc>) -> AstroData {
    let seconds = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    let centuries = (seconds / 86_400.0 + UNIX_EPOCH_JD - J2000_JD) / 36_525.0;

    let s = polynomial_argument(&MOON_LONGITUDE, centuries);
    let h = polynomial_argument(&SUN_LONGITUDE, centuries);
    let p = polynomial_argument(&LUNAR_PERIGEE, centuries);
    let n = polynomial_argument(&LUNAR_NODE, centuries);
    let pp = polynomial_argument(&SOLAR_PERIGEE, centuries);
    let omega = AstroArgument {
        value: evaluate(&OBLIQUITY, centuries),
        speed: derivative(&OBLIQUITY, centuries) / HOURS_PER_CENTURY,
    };
    let i = AstroArgument::fixed(LUNAR_INCLINATION);

    // Mean solar time: 180° at midnight UT, advancing 15°/hour
    let hour_of_day = seconds.rem_euclid(86_400.0) / 3_600.0;
    let tau = AstroArgument {
        value: modulus(180.0 + 15.0 * hour_of_day + h.value - s.value),
        speed: 15.0 + h.speed - s.speed,
    };

    let terms = |node: f64| NodeTerms::new(node, i.value, omega.value);
    let now = terms(n.value);
    let ahead = terms(n.value + NODE_STEP);
    let behind = terms(n.value - NODE_STEP);
    let rate = |f: fn(&NodeTerms) -> f64| {
        wrap180(f(&ahead) - f(&behind)) / (2.0 * NODE_STEP) * n.speed
    };

    let big_i = AstroArgument {
        value: now.big_i,
        speed: rate(|t| t.big_i),
    };
    let xi = AstroArgument {
        value: now.xi,
        speed: rate(|t| t.xi),
    };
    let nu = AstroArgument {
        value: now.nu,
        speed: rate(|t| t.nu),
    };
    let nu_prime = AstroArgument {
        value: now.nu_prime,
        speed: rate(|t| t.nu_prime),
    };
    let nu_double_prime = AstroArgument {
        value: now.nu_double_prime,
        speed: rate(|t| t.nu_double_prime),
    };
    let big_p = AstroArgument {
        value: modulus(p.value - xi.value),
        speed: p.speed - xi.speed,
    };

    AstroData {
        tau,
        s,
        h,
        p,
        n,
        pp,
        i,
        omega,
        big_i,
        xi,
        nu,
        nu_prime,
        nu_double_prime,
        big_p,
    }
}

/// Reduce an angle in degrees to `[0, 360)`.
pub fn modulus(degrees: f64) -> f64 {
    let reduced = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if reduced >= 360.0 {
        0.0
    } else {
        reduced
    }
}

/// Reduce an angle in degrees to `(-180, 180]`.
pub fn wrap180(degrees: f64) -> f64 {
    let reduced = modulus(degrees);
    if reduced > 180.0 {
        reduced - 360.0
    } else {
        reduced
    }
}

fn polynomial_argument(coefficients: &[f64], centuries: f64) -> AstroArgument {
    AstroArgument {
        value: modulus(evaluate(coefficients, centuries)),
        speed: derivative(coefficients, centuries) / HOURS_PER_CENTURY,
    }
}

fn evaluate(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

fn derivative(coefficients: &[f64], t: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .rev()
        .fold(0.0, |acc, (k, c)| acc * t + k as f64 * c)
}

/// Schureman's node-dependent inclination terms, all in degrees.
struct NodeTerms {
    big_i: f64,
    xi: f64,
    nu: f64,
    nu_prime: f64,
    nu_double_prime: f64,
}

impl NodeTerms {
    fn new(node: f64, inclination: f64, obliquity: f64) -> Self {
        let n = D2R * node;
        let i = D2R * inclination;
        let w = D2R * obliquity;

        let cos_big_i = i.cos() * w.cos() - i.sin() * w.sin() * n.cos();
        let big_i = cos_big_i.clamp(-1.0, 1.0).acos();

        let half_tan = (0.5 * n).tan();
        let e1 = ((0.5 * (w - i)).cos() / (0.5 * (w + i)).cos() * half_tan).atan() - 0.5 * n;
        let e2 = ((0.5 * (w - i)).sin() / (0.5 * (w + i)).sin() * half_tan).atan() - 0.5 * n;
        let xi = wrap180(-(e1 + e2) * R2D);
        let nu = wrap180((e1 - e2) * R2D);

        let nu_rad = D2R * nu;
        let nu_prime = ((2.0 * big_i).sin() * nu_rad.sin())
            .atan2((2.0 * big_i).sin() * nu_rad.cos() + 0.3347)
            * R2D;
        let sin2_big_i = big_i.sin().powi(2);
        let nu_double_prime = 0.5
            * (sin2_big_i * (2.0 * nu_rad).sin())
                .atan2(sin2_big_i * (2.0 * nu_rad).cos() + 0.0727)
            * R2D;

        NodeTerms {
            big_i: big_i * R2D,
            xi,
            nu,
            nu_prime,
            nu_double_prime,
        }
    }
}
