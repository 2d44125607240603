//! # Nodal Corrections
//!
//! The 18.6-year regression of the lunar node modulates every lunar
//! constituent. A nodal correction is an amplitude factor `f` and a phase
//! shift `u` (degrees), valid at one instant.
//!
//! Two interchangeable strategies tabulate closed-form `f`/`u` for the
//! fundamental constituents:
//!
//! - [`Iho`]: the harmonic series in the lunar node longitude `N` and the
//!   perigee `p` from IHO Annex A.
//! - [`Schureman`]: Schureman's formulas in the orbital inclination terms
//!   `I, ν, ξ, ν′, ν″, P`.
//!
//! Everything else is composed recursively from the constituent's members by
//! [`NodalStrategy::compute`], so constituent definitions never depend on the
//! chosen strategy.

use crate::astronomy::{AstroData, D2R, R2D};
use crate::constituent::Constituent;
use crate::error::TideError;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Amplitude factor and phase correction for one constituent at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodalCorrection {
    pub f: f64,
    /// Degrees
    pub u: f64,
}

impl NodalCorrection {
    pub const UNITY: NodalCorrection = NodalCorrection { f: 1.0, u: 0.0 };

    /// Convert `f·sin u` and `f·cos u` into `f` and `u`.
    fn from_components(f_sin_u: f64, f_cos_u: f64) -> Self {
        NodalCorrection {
            f: f_sin_u.hypot(f_cos_u),
            u: f_sin_u.atan2(f_cos_u) * R2D,
        }
    }
}

/// A source of nodal corrections.
pub trait NodalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Closed-form correction for a tabulated fundamental, `None` otherwise.
    fn fundamental(&self, name: &str, astro: &AstroData) -> Option<NodalCorrection>;

    /// Correction for a fundamental by name; unknown names get unity.
    fn get(&self, name: &str, astro: &AstroData) -> NodalCorrection {
        self.fundamental(name, astro)
            .unwrap_or(NodalCorrection::UNITY)
    }

    /// Correction for any constituent.
    ///
    /// Fundamentals use their own formula. Compounds fold their members:
    /// `u = Σ factor·u(member)` and `f = Π f(member)^|factor|`. `f` is
    /// multiplied even for negative factors; IHO Annex B never divides by
    /// `f`. Recursion depth is bounded because the registry rejects member
    /// cycles when it is built.
    fn compute(
        &self,
        registry: &Registry,
        constituent: &Constituent,
        astro: &AstroData,
    ) -> NodalCorrection {
        if let Some(correction) = self.fundamental(&constituent.name, astro) {
            return correction;
        }
        let Some(members) = &constituent.members else {
            return NodalCorrection::UNITY;
        };
        members
            .iter()
            .filter(|member| member.constituent != constituent.id)
            .fold(NodalCorrection::UNITY, |acc, member| {
                let part = self.compute(registry, registry.get(member.constituent), astro);
                NodalCorrection {
                    f: acc.f * part.f.powf(member.factor.abs()),
                    u: acc.u + member.factor * part.u,
                }
            })
    }
}

/// IHO Annex A formulas.
#[derive(Clone, Copy, Debug, Default)]
pub struct Iho;

impl NodalStrategy for Iho {
    fn name(&self) -> &'static str {
        "iho"
    }

    fn fundamental(&self, name: &str, astro: &AstroData) -> Option<NodalCorrection> {
        let n = D2R * astro.n.value;
        let p = D2R * astro.p.value;
        let pp = D2R * astro.pp.value;
        let series = |f: f64, u: f64| Some(NodalCorrection { f, u });

        match name {
            "Mm" => series(1.0 - 0.130 * n.cos() + 0.0013 * (2.0 * n).cos(), 0.0),
            "Mf" => series(
                1.043 + 0.414 * n.cos(),
                -23.7 * n.sin() + 2.7 * (2.0 * n).sin() - 0.4 * (3.0 * n).sin(),
            ),
            "O1" => series(
                1.009 + 0.187 * n.cos() - 0.015 * (2.0 * n).cos(),
                10.8 * n.sin() - 1.3 * (2.0 * n).sin() + 0.2 * (3.0 * n).sin(),
            ),
            "K1" => series(
                1.006 + 0.115 * n.cos() - 0.009 * (2.0 * n).cos(),
                -8.9 * n.sin() + 0.7 * (2.0 * n).sin(),
            ),
            "J1" => series(
                1.013 + 0.168 * n.cos() - 0.017 * (2.0 * n).cos(),
                -12.9 * n.sin() + 1.3 * (2.0 * n).sin() - 0.2 * (3.0 * n).sin(),
            ),
            "OO1" => series(
                1.137 + 0.640 * n.cos() + 0.134 * (2.0 * n).cos(),
                -36.7 * n.sin() + 4.0 * (2.0 * n).sin() - 0.6 * (3.0 * n).sin(),
            ),
            "M2" => series(
                1.0004 - 0.0373 * n.cos() + 0.0002 * (2.0 * n).cos(),
                -2.14 * n.sin(),
            ),
            "K2" => series(
                1.024 + 0.286 * n.cos() + 0.008 * (2.0 * n).cos(),
                -17.7 * n.sin() + 0.7 * (2.0 * n).sin(),
            ),
            "M1" => Some(NodalCorrection::from_components(
                p.sin() + 0.2 * (p - n).sin(),
                2.0 * p.cos() + 0.4 * (p - n).cos(),
            )),
            "L2" => Some(NodalCorrection::from_components(
                -0.2505 * (2.0 * p).sin()
                    - 0.1102 * (2.0 * p - n).sin()
                    - 0.0156 * (2.0 * p - 2.0 * n).sin()
                    - 0.037 * n.sin(),
                1.0 - 0.2505 * (2.0 * p).cos()
                    - 0.1102 * (2.0 * p - n).cos()
                    - 0.0156 * (2.0 * p - 2.0 * n).cos()
                    - 0.037 * n.cos(),
            )),
            "gamma2" => Some(NodalCorrection::from_components(
                0.147 * (2.0 * (n - p)).sin(),
                1.0 + 0.147 * (2.0 * (n - p)).cos(),
            )),
            "alpha2" => Some(NodalCorrection::from_components(
                -0.0446 * (p - pp).sin(),
                1.0 - 0.0446 * (p - pp).cos(),
            )),
            "delta2" => Some(NodalCorrection::from_components(
                -0.477 * n.sin(),
                1.0 + 0.477 * n.cos(),
            )),
            "xi2" | "eta2" => Some(NodalCorrection::from_components(
                0.439 * n.sin(),
                1.0 - 0.439 * n.cos(),
            )),
            _ => None,
        }
    }
}

/// Schureman (1958) formulas.
#[derive(Clone, Copy, Debug, Default)]
pub struct Schureman;

impl Schureman {
    fn f_o1(i: f64) -> f64 {
        i.sin() * (0.5 * i).cos().powi(2) / 0.3800
    }

    fn f_m2(i: f64) -> f64 {
        (0.5 * i).cos().powi(4) / 0.9154
    }
}

impl NodalStrategy for Schureman {
    fn name(&self) -> &'static str {
        "schureman"
    }

    fn fundamental(&self, name: &str, astro: &AstroData) -> Option<NodalCorrection> {
        let i = D2R * astro.big_i.value;
        let nu = D2R * astro.nu.value;
        let big_p = D2R * astro.big_p.value;
        let xi = astro.xi.value;
        let nu_deg = astro.nu.value;
        let correction = |f: f64, u: f64| Some(NodalCorrection { f, u });

        match name {
            // Eq. 73, 74
            "Mm" => correction((2.0 / 3.0 - i.sin().powi(2)) / 0.5021, 0.0),
            "Mf" => correction(i.sin().powi(2) / 0.1578, -2.0 * xi),
            // Eq. 75-77
            "O1" => correction(Self::f_o1(i), 2.0 * xi - nu_deg),
            "J1" => correction((2.0 * i).sin() / 0.7214, -nu_deg),
            "OO1" => correction(
                i.sin() * (0.5 * i).sin().powi(2) / 0.0164,
                -2.0 * xi - nu_deg,
            ),
            // Eq. 78
            "M2" => correction(Self::f_m2(i), 2.0 * xi - 2.0 * nu_deg),
            // Eq. 227
            "K1" => correction(
                (0.8965 * (2.0 * i).sin().powi(2) + 0.6001 * (2.0 * i).sin() * nu.cos() + 0.1006)
                    .sqrt(),
                -astro.nu_prime.value,
            ),
            // Eq. 235
            "K2" => correction(
                (19.0444 * i.sin().powi(4) + 2.7702 * i.sin().powi(2) * (2.0 * nu).cos() + 0.0981)
                    .sqrt(),
                -2.0 * astro.nu_double_prime.value,
            ),
            // Eq. 197, 206, 207
            "M1" => {
                let half = (0.5 * i).cos();
                let q_a = (0.25 + 1.5 * i.cos() * (2.0 * big_p).cos() / half.sqrt()
                    + 2.25 * i.cos().powi(2) / half.powi(4))
                .sqrt();
                let q = ((5.0 * i.cos() - 1.0) * big_p.sin())
                    .atan2((7.0 * i.cos() + 1.0) * big_p.cos())
                    * R2D;
                correction(Self::f_o1(i) * q_a, xi - nu_deg + q)
            }
            // Eq. 213-215
            "L2" => {
                let tan_half = (0.5 * i).tan();
                let r_a = (1.0 - 12.0 * tan_half.powi(2) * (2.0 * big_p).cos()
                    + 36.0 * tan_half.powi(4))
                .sqrt();
                let r = (2.0 * big_p)
                    .sin()
                    .atan2(tan_half.powi(-2) / 6.0 - (2.0 * big_p).cos())
                    * R2D;
                correction(Self::f_m2(i) * r_a, 2.0 * xi - 2.0 * nu_deg - r)
            }
            _ => None,
        }
    }
}

static IHO: Iho = Iho;
static SCHUREMAN: Schureman = Schureman;

/// Strategy selector, as named in configuration and on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Iho,
    Schureman,
}

impl Strategy {
    pub fn corrections(self) -> &'static dyn NodalStrategy {
        match self {
            Strategy::Iho => &IHO,
            Strategy::Schureman => &SCHUREMAN,
        }
    }
}

impl FromStr for Strategy {
    type Err = TideError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "iho" => Ok(Strategy::Iho),
            "schureman" => Ok(Strategy::Schureman),
            _ => Err(TideError::UnknownStrategy(name.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.corrections().name())
    }
}

/// Select a strategy by name; `None` selects IHO.
pub fn resolve_nodal_strategy(name: Option<&str>) -> Result<&'static dyn NodalStrategy, TideError> {
    Ok(name
        .map(str::parse::<Strategy>)
        .transpose()?
        .unwrap_or_default()
        .corrections())
}
