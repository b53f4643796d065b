//! Dice rolling primitives.
//!
//! Every roll in the engine draws from a [`RandomSource`], so callers can
//! use the thread RNG, seed a reproducible generator, or script the faces
//! outright in tests. Damage dice use the `NdM[+/-K]` notation (`2d6+3`,
//! `1d4-1`, `8d6`).

use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified in {0:?}")]
    NoDice(String),
    #[error("Too many dice: {0} (limit {max})", max = MAX_DICE)]
    TooManyDice(u32),
}

/// Largest dice count a single notation may ask for.
pub const MAX_DICE: u32 = 100;

// ============================================================================
// Randomness
// ============================================================================

/// A uniform source of randomness in `[0, 1)`.
///
/// Implemented for any `FnMut() -> f64` closure, so `&mut || 0.7` is a valid
/// source, and for [`RngSource`] which wraps a `rand` generator.
pub trait RandomSource {
    /// Next uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;

    /// Roll a single die with `sides` faces.
    ///
    /// A unit value `r` maps to face `floor(r * sides) + 1`, clamped into
    /// `1..=sides` for sources that stray outside `[0, 1)`.
    fn roll_die(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        let face = (self.next_unit() * f64::from(sides)).floor() as i64 + 1;
        face.clamp(1, i64::from(sides)) as u32
    }
}

impl<F> RandomSource for F
where
    F: FnMut() -> f64,
{
    fn next_unit(&mut self) -> f64 {
        self()
    }
}

/// Adapter from a `rand` generator to a [`RandomSource`].
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl RngSource<ThreadRng> {
    /// Non-deterministic source backed by the thread-local RNG.
    pub fn thread() -> Self {
        Self(rand::thread_rng())
    }
}

impl RngSource<StdRng> {
    /// Reproducible source for hosts that seed their own dice.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    fn roll_die(&mut self, sides: u32) -> u32 {
        self.0.gen_range(1..=sides.max(1))
    }
}

// ============================================================================
// Damage types
// ============================================================================

/// Common D&D damage types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Slashing,
    Piercing,
    Bludgeoning,
    Fire,
    Cold,
    Lightning,
    Thunder,
    Acid,
    Poison,
    Necrotic,
    Radiant,
    Force,
    Psychic,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Slashing => "slashing",
            DamageType::Piercing => "piercing",
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Fire => "fire",
            DamageType::Cold => "cold",
            DamageType::Lightning => "lightning",
            DamageType::Thunder => "thunder",
            DamageType::Acid => "acid",
            DamageType::Poison => "poison",
            DamageType::Necrotic => "necrotic",
            DamageType::Radiant => "radiant",
            DamageType::Force => "force",
            DamageType::Psychic => "psychic",
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Damage notation
// ============================================================================

/// A parsed `NdM[+/-K]` expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageNotation {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
    pub original: String,
}

impl DamageNotation {
    /// Parse a damage notation string such as `2d6+3`.
    ///
    /// Whitespace is ignored and the `d` is case-insensitive. A missing dice
    /// count means one die (`d8` is `1d8`).
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if compact.is_empty() {
            return Err(DiceError::NoDice(notation.to_string()));
        }

        let invalid = || DiceError::InvalidNotation(notation.to_string());

        let (count_str, rest) = compact.split_once('d').ok_or_else(invalid)?;

        let (sides_str, modifier) = match rest.find(|c: char| c == '+' || c == '-') {
            Some(pos) => {
                let (sides_str, signed) = rest.split_at(pos);
                let magnitude = parse_digits(&signed[1..]).ok_or_else(invalid)?;
                let magnitude = i32::try_from(magnitude).map_err(|_| invalid())?;
                let modifier = if signed.starts_with('-') {
                    -magnitude
                } else {
                    magnitude
                };
                (sides_str, modifier)
            }
            None => (rest, 0),
        };

        let count = if count_str.is_empty() {
            1
        } else {
            parse_digits(count_str).ok_or_else(invalid)?
        };
        if count == 0 {
            return Err(DiceError::NoDice(notation.to_string()));
        }
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice(count));
        }

        let sides = parse_digits(sides_str).ok_or_else(invalid)?;
        if sides == 0 {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(DamageNotation {
            count,
            sides,
            modifier,
            original: compact,
        })
    }

    /// Roll this expression. Critical hits double the dice count, never the
    /// modifier.
    pub fn roll<R: RandomSource + ?Sized>(
        &self,
        is_critical: bool,
        damage_type: DamageType,
        rng: &mut R,
    ) -> DamageRoll {
        let dice_count = if is_critical {
            self.count.saturating_mul(2)
        } else {
            self.count
        };

        let rolls: Vec<u32> = (0..dice_count).map(|_| rng.roll_die(self.sides)).collect();
        let dice_total: i64 = rolls.iter().map(|&r| i64::from(r)).sum();
        let total = (dice_total + i64::from(self.modifier)).clamp(0, i64::from(u32::MAX)) as u32;

        DamageRoll {
            notation: self.original.clone(),
            dice_count,
            die_size: self.sides,
            modifier: self.modifier,
            rolls,
            total,
            damage_type,
            is_critical,
        }
    }
}

fn parse_digits(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl FromStr for DamageNotation {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DamageNotation::parse(s)
    }
}

impl fmt::Display for DamageNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of a damage roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    /// Normalized notation as written by the caller.
    pub notation: String,
    /// Number of dice actually rolled (doubled on a critical hit).
    pub dice_count: u32,
    pub die_size: u32,
    pub modifier: i32,
    /// Individual die faces, in roll order.
    pub rolls: Vec<u32>,
    /// `max(0, sum(rolls) + modifier)`.
    pub total: u32,
    pub damage_type: DamageType,
    pub is_critical: bool,
}

impl DamageRoll {
    /// Format the individual dice results for display.
    pub fn dice_display(&self) -> String {
        let faces = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.modifier {
            0 => format!("[{faces}]"),
            m if m > 0 => format!("[{faces}] + {m}"),
            m => format!("[{faces}] - {}", m.unsigned_abs()),
        }
    }
}

impl fmt::Display for DamageRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d{} {} = {} {}",
            self.dice_count,
            self.die_size,
            self.dice_display(),
            self.total,
            self.damage_type
        )
    }
}

/// Parse `notation` and roll it.
///
/// Malformed notation is a data error and comes back as `Err`; callers
/// normally propagate it with `?`.
pub fn roll_damage<R: RandomSource + ?Sized>(
    notation: &str,
    is_critical: bool,
    damage_type: DamageType,
    rng: &mut R,
) -> Result<DamageRoll, DiceError> {
    let expr = DamageNotation::parse(notation)?;
    let roll = expr.roll(is_critical, damage_type, rng);
    tracing::debug!(
        notation = %expr,
        is_critical,
        dice = roll.dice_count,
        total = roll.total,
        "damage rolled"
    );
    Ok(roll)
}

/// Roll damage with the thread RNG.
pub fn roll_damage_random(
    notation: &str,
    is_critical: bool,
    damage_type: DamageType,
) -> Result<DamageRoll, DiceError> {
    roll_damage(notation, is_critical, damage_type, &mut RngSource::thread())
}
