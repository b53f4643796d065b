//! d20 roll resolution.
//!
//! A [`RollContext`] collects everything that feeds a single d20 roll:
//! where advantage and disadvantage come from, and the flat bonuses. The
//! sources are kept as tagged lists rather than collapsed into a flag so a
//! log can say *why* a roll had disadvantage.

use crate::character::Ability;
use crate::dice::{RandomSource, RngSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The natural face that scores a critical hit unless a feature widens it.
pub const DEFAULT_CRITICAL_THRESHOLD: u32 = 20;

/// What kind of d20 roll is being made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollType {
    Attack,
    Save,
    Check,
    Initiative,
}

impl RollType {
    pub fn name(&self) -> &'static str {
        match self {
            RollType::Attack => "attack",
            RollType::Save => "save",
            RollType::Check => "check",
            RollType::Initiative => "initiative",
        }
    }
}

impl fmt::Display for RollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RollState {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl RollState {
    pub fn name(&self) -> &'static str {
        match self {
            RollState::Normal => "normal",
            RollState::Advantage => "advantage",
            RollState::Disadvantage => "disadvantage",
        }
    }
}

impl fmt::Display for RollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One reason a roll has advantage or disadvantage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSource {
    /// Stable identifier, e.g. `prone` or `target-paralyzed`.
    pub source: String,
    pub reason: Option<String>,
}

impl ModifierSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ModifierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{} ({reason})", self.source),
            None => write!(f, "{}", self.source),
        }
    }
}

/// Input to a single d20 roll. Built fresh per roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollContext {
    pub roll_type: RollType,
    /// Ability behind the roll, when it matters for conditions (saves).
    pub ability: Option<Ability>,
    pub advantage_sources: Vec<ModifierSource>,
    pub disadvantage_sources: Vec<ModifierSource>,
    pub bonuses: Vec<i32>,
    /// Lowest natural face that counts as a critical hit.
    pub critical_threshold: u32,
}

impl RollContext {
    pub fn new(roll_type: RollType) -> Self {
        Self {
            roll_type,
            ability: None,
            advantage_sources: Vec::new(),
            disadvantage_sources: Vec::new(),
            bonuses: Vec::new(),
            critical_threshold: DEFAULT_CRITICAL_THRESHOLD,
        }
    }

    pub fn with_bonus(mut self, bonus: i32) -> Self {
        self.bonuses.push(bonus);
        self
    }

    pub fn with_ability(mut self, ability: Ability) -> Self {
        self.ability = Some(ability);
        self
    }

    pub fn with_critical_threshold(mut self, threshold: u32) -> Self {
        self.critical_threshold = threshold.clamp(1, 20);
        self
    }

    pub fn with_advantage(mut self, source: impl Into<String>, reason: Option<&str>) -> Self {
        self.advantage_sources.push(make_source(source, reason));
        self
    }

    pub fn with_disadvantage(mut self, source: impl Into<String>, reason: Option<&str>) -> Self {
        self.disadvantage_sources.push(make_source(source, reason));
        self
    }

    /// Sum of all flat bonuses.
    pub fn total_bonus(&self) -> i32 {
        self.bonuses.iter().sum()
    }

    /// The advantage state these sources resolve to.
    pub fn roll_state(&self) -> RollState {
        determine_roll_state(&self.advantage_sources, &self.disadvantage_sources)
    }
}

fn make_source(source: impl Into<String>, reason: Option<&str>) -> ModifierSource {
    let source = ModifierSource::new(source);
    match reason {
        Some(reason) => source.with_reason(reason),
        None => source,
    }
}

/// Create a context for a roll of `roll_type` seeded with flat bonuses.
pub fn create_roll_context(
    roll_type: RollType,
    bonuses: impl IntoIterator<Item = i32>,
) -> RollContext {
    let mut context = RollContext::new(roll_type);
    context.bonuses.extend(bonuses);
    context
}

/// Return a copy of `context` with one more advantage source.
pub fn add_advantage(
    context: &RollContext,
    source: impl Into<String>,
    reason: Option<&str>,
) -> RollContext {
    context.clone().with_advantage(source, reason)
}

/// Return a copy of `context` with one more disadvantage source.
pub fn add_disadvantage(
    context: &RollContext,
    source: impl Into<String>,
    reason: Option<&str>,
) -> RollContext {
    context.clone().with_disadvantage(source, reason)
}

/// Presence test: any advantage and any disadvantage cancel to normal, no
/// matter how many of each there are.
pub fn determine_roll_state(
    advantage_sources: &[ModifierSource],
    disadvantage_sources: &[ModifierSource],
) -> RollState {
    match (advantage_sources.is_empty(), disadvantage_sources.is_empty()) {
        (false, true) => RollState::Advantage,
        (true, false) => RollState::Disadvantage,
        _ => RollState::Normal,
    }
}

/// Complete result of a d20 roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub roll_type: RollType,
    /// Every die rolled: one value for a normal roll, two otherwise.
    pub rolls: Vec<u32>,
    /// The die that counts.
    pub final_roll: u32,
    pub bonus: i32,
    pub total: i32,
    pub roll_state: RollState,
    pub advantage_sources: Vec<ModifierSource>,
    pub disadvantage_sources: Vec<ModifierSource>,
    pub natural_20: bool,
    pub natural_1: bool,
    pub critical_hit: bool,
}

impl RollResult {
    /// Stand-in for a roll that never happened (an auto-failed save).
    pub fn placeholder(roll_type: RollType) -> Self {
        Self {
            roll_type,
            rolls: vec![0],
            final_roll: 0,
            bonus: 0,
            total: 0,
            roll_state: RollState::Normal,
            advantage_sources: Vec::new(),
            disadvantage_sources: Vec::new(),
            natural_20: false,
            natural_1: false,
            critical_hit: false,
        }
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }

    /// Format the dice for display, marking the discarded die in parentheses.
    pub fn dice_display(&self) -> String {
        match self.rolls.as_slice() {
            [a, b] => {
                let (kept, dropped) = if *a == self.final_roll { (a, b) } else { (b, a) };
                format!("[{kept}, ({dropped})]")
            }
            rolls => format!(
                "[{}]",
                rolls
                    .iter()
                    .map(|r| r.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d20 {}", self.dice_display())?;
        match self.bonus {
            0 => {}
            b if b > 0 => write!(f, " + {b}")?,
            b => write!(f, " - {}", b.unsigned_abs())?,
        }
        write!(f, " = {}", self.total)?;
        if self.roll_state != RollState::Normal {
            write!(f, " ({})", self.roll_state)?;
        }
        Ok(())
    }
}

/// Roll a d20 for `context`, drawing dice from `rng`.
pub fn make_d20_roll_with<R: RandomSource + ?Sized>(
    context: &RollContext,
    rng: &mut R,
) -> RollResult {
    let roll_state = context.roll_state();

    let (rolls, final_roll) = match roll_state {
        RollState::Normal => {
            let roll = rng.roll_die(20);
            (vec![roll], roll)
        }
        RollState::Advantage => {
            let (a, b) = (rng.roll_die(20), rng.roll_die(20));
            (vec![a, b], a.max(b))
        }
        RollState::Disadvantage => {
            let (a, b) = (rng.roll_die(20), rng.roll_die(20));
            (vec![a, b], a.min(b))
        }
    };

    let bonus = context.total_bonus();
    let total = final_roll as i32 + bonus;

    let result = RollResult {
        roll_type: context.roll_type,
        rolls,
        final_roll,
        bonus,
        total,
        roll_state,
        advantage_sources: context.advantage_sources.clone(),
        disadvantage_sources: context.disadvantage_sources.clone(),
        natural_20: final_roll == 20,
        natural_1: final_roll == 1,
        critical_hit: final_roll >= context.critical_threshold,
    };

    tracing::debug!(
        roll_type = %context.roll_type,
        roll_state = %roll_state,
        rolls = ?result.rolls,
        total,
        "d20 rolled"
    );

    result
}

/// Roll a d20 for `context` with the thread RNG.
pub fn make_d20_roll(context: &RollContext) -> RollResult {
    make_d20_roll_with(context, &mut RngSource::thread())
}
