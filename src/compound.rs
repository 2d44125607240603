//! # Compound Constituent Decomposition
//!
//! Shallow-water and interaction constituents are named after the
//! constituents they combine, following IHO Annex B: `2MS6` is
//! `2·M2 + S2`, `MSN2` is `M2 + S2 − N2`, `2MK3` is `2·M2 − K1`. The trailing
//! digits give the target species; the letters give the members, and the
//! signs are whatever makes the member species add up to the target.
//!
//! Decomposition runs once per constituent while the registry is built, so
//! the exhaustive sign search below is never on the prediction path.

use crate::constituent::ConstituentMember;
use crate::registry::ConstituentLookup;
use thiserror::Error;
use tracing::trace;

/// Longest token list [`resolve_signs`] will search. Standard names have at
/// most four tokens.
pub const MAX_TOKENS: usize = 10;

/// One letter of a compound name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Letter {
    M,
    S,
    N,
    K,
    O,
    P,
    Q,
    L,
    J,
    T,
    R,
    Nu,
    Lambda,
}

impl Letter {
    fn from_char(c: char) -> Option<Letter> {
        Some(match c {
            'M' => Letter::M,
            'S' => Letter::S,
            'N' => Letter::N,
            'K' => Letter::K,
            'O' => Letter::O,
            'P' => Letter::P,
            'Q' => Letter::Q,
            'L' => Letter::L,
            'J' => Letter::J,
            'T' => Letter::T,
            'R' => Letter::R,
            _ => return None,
        })
    }

    /// Species of the letter's own constituent; `None` for the ambiguous K.
    pub fn species(self) -> Option<i32> {
        match self {
            Letter::K => None,
            Letter::O | Letter::P | Letter::Q | Letter::J => Some(1),
            _ => Some(2),
        }
    }

    /// Registry key of the constituent this letter stands for at `species`.
    ///
    /// Each letter maps to its own constituent (`N` is `N2`), never to the
    /// fundamental that supplies its correction.
    pub fn key(self, species: i32) -> &'static str {
        match self {
            Letter::M => "M2",
            Letter::S => "S2",
            Letter::N => "N2",
            Letter::K if species == 1 => "K1",
            Letter::K => "K2",
            Letter::O => "O1",
            Letter::P => "P1",
            Letter::Q => "Q1",
            Letter::L => "L2",
            Letter::J => "J1",
            Letter::T => "T2",
            Letter::R => "R2",
            Letter::Nu => "nu2",
            Letter::Lambda => "lambda2",
        }
    }
}

/// A letter with its leading multiplier (`2M` in `2MS6`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Token {
    pub letter: Letter,
    pub multiplier: u32,
}

/// Tokens of a compound name plus its target species.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedName {
    pub tokens: Vec<Token>,
    pub species: u32,
}

/// A token after sign and species resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedToken {
    pub letter: Letter,
    pub species: i32,
    pub factor: f64,
}

/// Why a name could not be read as a compound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameParseError {
    #[error("`{0}` has no trailing species digits")]
    NoSpecies(String),
    #[error("species 0 cannot be decomposed")]
    ZeroSpecies,
    #[error("no constituent letters before the species")]
    NoLetters,
    #[error("unknown letter `{0}`")]
    UnknownLetter(char),
    #[error("`{0}` is only valid in the MA<n>/MB<n> pattern")]
    AnnualLetter(char),
    #[error("unclosed group")]
    UnclosedGroup,
    #[error("empty group")]
    EmptyGroup,
    #[error("multiplier without a following letter")]
    DanglingMultiplier,
    #[error("zero multiplier")]
    ZeroMultiplier,
}

/// Split a compound name into multiplier/letter tokens and the target species.
///
/// Grammar, left to right after the trailing species digits are removed:
/// an optional integer multiplier, then one uppercase letter, one of the
/// tokens `nu`/`lambda`, or a parenthesised group of letters that the
/// multiplier distributes over.
pub fn parse_name(name: &str) -> Result<ParsedName, NameParseError> {
    let digits_at = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)
        .ok_or_else(|| NameParseError::NoSpecies(name.to_string()))?;
    let (body, species) = name.split_at(digits_at);
    let species: u32 = species
        .parse()
        .map_err(|_| NameParseError::NoSpecies(name.to_string()))?;
    if species == 0 {
        return Err(NameParseError::ZeroSpecies);
    }
    if body.is_empty() {
        return Err(NameParseError::NoLetters);
    }

    let chars: Vec<char> = body.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let start = pos;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
        let multiplier = if pos > start {
            let digits: String = chars[start..pos].iter().collect();
            let value: u32 = digits
                .parse()
                .map_err(|_| NameParseError::DanglingMultiplier)?;
            if value == 0 {
                return Err(NameParseError::ZeroMultiplier);
            }
            value
        } else {
            1
        };
        if pos > start && chars.get(pos).map_or(true, |&c| c == ')') {
            return Err(NameParseError::DanglingMultiplier);
        }

        if chars[pos] == '(' {
            let close = chars[pos..]
                .iter()
                .position(|&c| c == ')')
                .map(|offset| pos + offset)
                .ok_or(NameParseError::UnclosedGroup)?;
            if close == pos + 1 {
                return Err(NameParseError::EmptyGroup);
            }
            let mut inner = pos + 1;
            while inner < close {
                let (letter, width) = read_letter(&chars[inner..close])?;
                tokens.push(Token { letter, multiplier });
                inner += width;
            }
            pos = close + 1;
        } else {
            let (letter, width) = read_letter(&chars[pos..])?;
            tokens.push(Token { letter, multiplier });
            pos += width;
        }
    }

    Ok(ParsedName { tokens, species })
}

/// Read one letter token, returning it with the number of chars consumed.
fn read_letter(chars: &[char]) -> Result<(Letter, usize), NameParseError> {
    if chars.starts_with(&['n', 'u']) {
        return Ok((Letter::Nu, 2));
    }
    if chars.starts_with(&['l', 'a', 'm', 'b', 'd', 'a']) {
        return Ok((Letter::Lambda, 6));
    }
    match chars.first() {
        None => Err(NameParseError::DanglingMultiplier),
        Some(&c @ ('A' | 'B')) => Err(NameParseError::AnnualLetter(c)),
        Some(&c) => Letter::from_char(c)
            .map(|letter| (letter, 1))
            .ok_or(NameParseError::UnknownLetter(c)),
    }
}

/// Assign a species and a sign to every token so the signed species sum
/// equals `target`.
///
/// A lone letter whose own species differs from the target is an overtide
/// (`M4` is `2·M2`, `M5` is `2.5·M2`). Otherwise every K is tried as K2
/// and as K1 (all-K2 first). For each assignment the signs are first fixed by
/// flipping tokens greedily from the right; if that misses the target, every
/// sign pattern is enumerated and the one with the fewest flips wins, ties
/// going to the pattern whose flips sit on later tokens. This tie-break
/// reproduces the IHO Annex B examples and must not change.
///
/// Token lists longer than [`MAX_TOKENS`] resolve to `None` without a search.
pub fn resolve_signs(tokens: &[Token], target: u32) -> Option<Vec<ResolvedToken>> {
    if tokens.len() > MAX_TOKENS {
        trace!(tokens = tokens.len(), "too many tokens to resolve");
        return None;
    }
    if let [token] = tokens {
        if token.multiplier == 1 {
            let species = token
                .letter
                .species()
                .unwrap_or(if target % 2 == 0 { 2 } else { 1 });
            if i64::from(species) != i64::from(target) {
                return Some(vec![ResolvedToken {
                    letter: token.letter,
                    species,
                    factor: f64::from(target) / f64::from(species),
                }]);
            }
        }
    }

    let k_positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| t.letter == Letter::K)
        .map(|(i, _)| i)
        .collect();

    let target = i64::from(target);
    for k_mask in 0..(1u32 << k_positions.len()) {
        let species: Vec<i32> = tokens
            .iter()
            .enumerate()
            .map(|(i, token)| match token.letter.species() {
                Some(s) => s,
                None => {
                    let bit = k_positions.iter().position(|&k| k == i).unwrap_or(0);
                    if k_mask >> bit & 1 == 1 {
                        1
                    } else {
                        2
                    }
                }
            })
            .collect();
        let weights: Vec<i64> = tokens
            .iter()
            .zip(&species)
            .map(|(token, &s)| i64::from(token.multiplier) * i64::from(s))
            .collect();

        let flips = greedy_flips(&weights, target).or_else(|| fewest_flips(&weights, target));
        if let Some(flips) = flips {
            trace!(?tokens, target, k_mask, flips, "resolved compound signs");
            return Some(
                tokens
                    .iter()
                    .zip(&species)
                    .enumerate()
                    .map(|(i, (token, &s))| ResolvedToken {
                        letter: token.letter,
                        species: s,
                        factor: if flips >> i & 1 == 1 {
                            -f64::from(token.multiplier)
                        } else {
                            f64::from(token.multiplier)
                        },
                    })
                    .collect(),
            );
        }
    }
    None
}

/// Flip signs right to left (never the leading token) while the running
/// total stays at or above the target. Returns the flip mask on success.
fn greedy_flips(weights: &[i64], target: i64) -> Option<u64> {
    let mut total: i64 = weights.iter().sum();
    let mut mask = 0u64;
    for j in (1..weights.len()).rev() {
        if total == target {
            break;
        }
        if total - 2 * weights[j] >= target {
            total -= 2 * weights[j];
            mask |= 1 << j;
        }
    }
    (total == target).then_some(mask)
}

/// Exhaustive search over all sign patterns.
fn fewest_flips(weights: &[i64], target: i64) -> Option<u64> {
    (0..(1u64 << weights.len()))
        .filter(|mask| {
            weights
                .iter()
                .enumerate()
                .map(|(i, w)| if mask >> i & 1 == 1 { -w } else { *w })
                .sum::<i64>()
                == target
        })
        .min_by(|a, b| {
            a.count_ones()
                .cmp(&b.count_ones())
                .then_with(|| b.cmp(a))
        })
}

/// Resolve a compound name into signed members.
///
/// `species` is the species the caller expects; a name whose trailing
/// digits disagree is rejected. Returns `None` for anything that cannot be
/// parsed, has no valid sign assignment, or names a member missing from
/// `lookup`. Callers treat `None` as "no nodal correction".
pub fn decompose_compound<L>(
    name: &str,
    species: u32,
    lookup: &L,
) -> Option<Vec<ConstituentMember>>
where
    L: ConstituentLookup + ?Sized,
{
    if let Some(members) = annual_overtide(name, species, lookup) {
        return members;
    }

    let parsed = match parse_name(name) {
        Ok(parsed) => parsed,
        Err(reason) => {
            trace!(name, %reason, "not a decomposable compound name");
            return None;
        }
    };
    if parsed.species != species {
        trace!(name, species, parsed = parsed.species, "species mismatch");
        return None;
    }

    resolve_signs(&parsed.tokens, parsed.species)?
        .into_iter()
        .map(|token| {
            lookup
                .id_of(token.letter.key(token.species))
                .map(|constituent| ConstituentMember {
                    constituent,
                    factor: token.factor,
                })
        })
        .collect()
}

/// `MA<n>` is `(n/2)·M2 − Sa` and `MB<n>` is `(n/2)·M2 + Sa`.
///
/// Outer `None` means the name is not of this form; `Some(None)` means it
/// is but cannot be resolved.
fn annual_overtide<L>(
    name: &str,
    species: u32,
    lookup: &L,
) -> Option<Option<Vec<ConstituentMember>>>
where
    L: ConstituentLookup + ?Sized,
{
    let (sign, digits) = if let Some(rest) = name.strip_prefix("MA") {
        (-1.0, rest)
    } else if let Some(rest) = name.strip_prefix("MB") {
        (1.0, rest)
    } else {
        return None;
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let n: u32 = match digits.parse() {
        Ok(n) if n == species && n > 0 => n,
        _ => return Some(None),
    };
    let member = |key: &str, factor: f64| -> Option<ConstituentMember> {
        Some(ConstituentMember {
            constituent: lookup.id_of(key)?,
            factor,
        })
    };
    Some(
        member("M2", f64::from(n) / 2.0)
            .zip(member("Sa", sign))
            .map(|(m2, sa)| vec![m2, sa]),
    )
}
