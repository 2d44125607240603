//! # Tidal Constituents
//!
//! A constituent is one periodic term of the tide-generating force. Its
//! equilibrium argument is a linear combination of the astronomical arguments
//! with seven Doodson coefficients `[τ, s, h, p, N′, p′, 90°]`; the first
//! coefficient is the *species* (0 long-period, 1 diurnal, 2 semidiurnal, ...).
//!
//! Compound constituents (shallow-water and interaction terms such as `MS4`)
//! point at the simpler constituents they are built from through
//! [`ConstituentMember`] edges. The edges form a DAG stored inside the
//! [`Registry`](crate::registry::Registry) arena and addressed by
//! [`ConstituentId`].

use crate::astronomy::{modulus, AstroData};
use crate::error::TideError;
use std::fmt;
use std::str::FromStr;

/// Seven Doodson coefficients `[τ, s, h, p, N′, p′, 90°]`.
///
/// Stored as `f64` because compounds built from half-integer factors (`M3`,
/// `MA5`) sum member coefficients with fractional weights.
pub type Coefficients = [f64; 7];

/// Index of a constituent inside its registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstituentId(pub(crate) usize);

impl ConstituentId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Signed edge from a compound constituent to one of its building blocks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstituentMember {
    pub constituent: ConstituentId,
    /// Integer or half-integer multiplier; negative for subtracted members
    pub factor: f64,
}

/// One tidal constituent. Immutable once the registry is built.
#[derive(Clone, Debug, PartialEq)]
pub struct Constituent {
    pub id: ConstituentId,
    pub name: String,
    pub aliases: Vec<String>,
    /// Doodson coefficients, given directly or derived from members
    pub coefficients: Coefficients,
    /// Angular speed in degrees per hour
    pub speed: f64,
    /// `None` means no nodal correction (f = 1, u = 0)
    pub members: Option<Vec<ConstituentMember>>,
    /// True when the dataset gave no coefficients and they were summed from members
    pub derived: bool,
}

impl Constituent {
    /// Tidal species (first Doodson number).
    pub fn species(&self) -> i32 {
        self.coefficients[0].round() as i32
    }

    /// Equilibrium argument V in degrees, reduced to `[0, 360)`.
    pub fn value(&self, astro: &AstroData) -> f64 {
        let args = astro.doodson_arguments();
        modulus(
            self.coefficients
                .iter()
                .zip(args.iter())
                .map(|(c, a)| c * a.value)
                .sum(),
        )
    }

    /// Speed in degrees per hour recomputed from the astronomical rates.
    pub fn speed_at(&self, astro: &AstroData) -> f64 {
        let args = astro.doodson_arguments();
        self.coefficients
            .iter()
            .zip(args.iter())
            .map(|(c, a)| c * a.speed)
            .sum()
    }

    pub fn is_compound(&self) -> bool {
        self.derived
    }

    /// Letter-encoded coefficients, or `None` when any coefficient is fractional
    /// or outside the XDO alphabet.
    pub fn xdo(&self) -> Option<String> {
        encode_xdo(&self.coefficients)
    }
}

/// Decode an XDO string: `Z` is 0, `A`, `B`, ... are +1, +2, ... and
/// `Y`, `X`, ... are −1, −2, .... Spaces are ignored.
pub fn decode_xdo(xdo: &str) -> Option<Coefficients> {
    let letters: Vec<char> = xdo.chars().filter(|c| !c.is_whitespace()).collect();
    if letters.len() != 7 {
        return None;
    }
    let mut coefficients = [0.0; 7];
    for (slot, letter) in coefficients.iter_mut().zip(letters) {
        *slot = match letter {
            'Z' => 0.0,
            'A'..='H' => f64::from(letter as u8 - b'A' + 1),
            'R'..='Y' => -f64::from(b'Z' - letter as u8),
            _ => return None,
        };
    }
    Some(coefficients)
}

/// Inverse of [`decode_xdo`].
pub fn encode_xdo(coefficients: &Coefficients) -> Option<String> {
    coefficients
        .iter()
        .map(|&c| {
            if c.fract() != 0.0 || !(-8.0..=8.0).contains(&c) {
                return None;
            }
            let c = c as i32;
            Some(match c {
                0 => 'Z',
                1.. => char::from(b'A' + (c - 1) as u8),
                _ => char::from((i32::from(b'Z') + c) as u8),
            })
        })
        .collect()
}

/// Single-letter code telling the registry how to derive a constituent's
/// nodal correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodalCode {
    /// `z`: no correction
    None,
    /// Correction of a tabulated fundamental, e.g. `m` uses M2
    Fundamental(&'static str),
    /// Correction of a fixed compound, e.g. `p` uses 2MN2
    Compound(&'static str),
    /// `x`: decompose the constituent's own name
    Decompose,
}

impl NodalCode {
    pub fn letter(self) -> char {
        match self {
            NodalCode::None => 'z',
            NodalCode::Decompose => 'x',
            NodalCode::Fundamental(name) | NodalCode::Compound(name) => NODAL_CODES
                .iter()
                .find(|(_, code)| match code {
                    NodalCode::Fundamental(n) | NodalCode::Compound(n) => *n == name,
                    _ => false,
                })
                .map_or('?', |(letter, _)| *letter),
        }
    }
}

const NODAL_CODES: [(char, NodalCode); 19] = [
    ('z', NodalCode::None),
    ('y', NodalCode::Fundamental("Mm")),
    ('f', NodalCode::Fundamental("Mf")),
    ('o', NodalCode::Fundamental("O1")),
    ('k', NodalCode::Fundamental("K1")),
    ('j', NodalCode::Fundamental("J1")),
    ('b', NodalCode::Fundamental("OO1")),
    ('c', NodalCode::Fundamental("M1")),
    ('m', NodalCode::Fundamental("M2")),
    ('h', NodalCode::Fundamental("K2")),
    ('l', NodalCode::Fundamental("L2")),
    ('g', NodalCode::Fundamental("gamma2")),
    ('a', NodalCode::Fundamental("alpha2")),
    ('t', NodalCode::Fundamental("delta2")),
    ('e', NodalCode::Fundamental("eta2")),
    ('p', NodalCode::Compound("2MN2")),
    ('d', NodalCode::Compound("KQ1")),
    ('q', NodalCode::Compound("NKM2")),
    ('x', NodalCode::Decompose),
];

impl FromStr for NodalCode {
    type Err = String;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let mut chars = code.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => NODAL_CODES
                .iter()
                .find(|(l, _)| *l == letter)
                .map(|(_, code)| *code)
                .ok_or_else(|| code.to_string()),
            _ => Err(code.to_string()),
        }
    }
}

impl fmt::Display for NodalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Parse a nodal code, naming the constituent on failure.
pub(crate) fn parse_nodal_code(constituent: &str, code: &str) -> Result<NodalCode, TideError> {
    code.parse().map_err(|code| TideError::UnknownNodalCode {
        constituent: constituent.to_string(),
        code,
    })
}
