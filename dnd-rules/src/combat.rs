//! Combat resolution.
//!
//! [`RulesEngine`] composes roll mechanics, condition effects and state
//! operations into single-step outcomes: an attack, a saving throw, an
//! ability check, initiative, a concentration check or a death save. Each
//! resolver reads borrowed states and returns a result holding the updated
//! state plus an ordered, human-readable log.
//!
//! Only malformed damage notation is an `Err`; every gameplay outcome,
//! including misses and failed saves, is an `Ok` result.

use crate::character::{Ability, CharacterId, CharacterState, DerivedStats};
use crate::conditions::{
    apply_conditions_to_roll, auto_fail_save_sources, check_auto_crit, is_incapacitated,
    ActiveCondition,
};
use crate::config::RulesConfig;
use crate::dice::{DamageNotation, DamageRoll, DamageType, DiceError, RandomSource};
use crate::resources::take_damage;
use crate::roll::{create_roll_context, make_d20_roll_with, RollResult, RollState, RollType};
use serde::{Deserialize, Serialize};

// ============================================================================
// Actions
// ============================================================================

/// Damage dealt by an effect: dice notation and type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageSpec {
    pub dice: String,
    pub damage_type: DamageType,
}

impl DamageSpec {
    pub fn new(dice: impl Into<String>, damage_type: DamageType) -> Self {
        Self {
            dice: dice.into(),
            damage_type,
        }
    }
}

/// A single weapon or spell attack.
#[derive(Debug, Clone)]
pub struct AttackAction<'a> {
    pub attacker: &'a CharacterState,
    pub defender: &'a CharacterState,
    pub attack_bonus: i32,
    pub damage_dice: &'a str,
    pub damage_type: DamageType,
    /// Melee attack from within 5 feet. Gates auto-crits only; defender
    /// conditions always apply in full.
    pub is_melee_within_5_feet: bool,
}

impl<'a> AttackAction<'a> {
    pub fn new(
        attacker: &'a CharacterState,
        defender: &'a CharacterState,
        attack_bonus: i32,
        damage_dice: &'a str,
        damage_type: DamageType,
    ) -> Self {
        Self {
            attacker,
            defender,
            attack_bonus,
            damage_dice,
            damage_type,
            is_melee_within_5_feet: false,
        }
    }

    pub fn melee_within_5_feet(mut self, within: bool) -> Self {
        self.is_melee_within_5_feet = within;
        self
    }
}

/// A saving throw against a fixed DC.
///
/// Half damage on a success is encoded by the caller in `damage_on_success`
/// (`4d6` against `8d6`); the engine never halves.
#[derive(Debug, Clone)]
pub struct SavingThrowAction<'a> {
    pub character: &'a CharacterState,
    pub ability: Ability,
    pub save_bonus: i32,
    pub save_dc: i32,
    pub damage_on_fail: Option<DamageSpec>,
    pub damage_on_success: Option<DamageSpec>,
}

impl<'a> SavingThrowAction<'a> {
    pub fn new(
        character: &'a CharacterState,
        ability: Ability,
        save_bonus: i32,
        save_dc: i32,
    ) -> Self {
        Self {
            character,
            ability,
            save_bonus,
            save_dc,
            damage_on_fail: None,
            damage_on_success: None,
        }
    }

    pub fn with_damage_on_fail(mut self, dice: impl Into<String>, damage_type: DamageType) -> Self {
        self.damage_on_fail = Some(DamageSpec::new(dice, damage_type));
        self
    }

    pub fn with_damage_on_success(
        mut self,
        dice: impl Into<String>,
        damage_type: DamageType,
    ) -> Self {
        self.damage_on_success = Some(DamageSpec::new(dice, damage_type));
        self
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackResult {
    pub attack_roll: RollResult,
    pub is_hit: bool,
    /// Natural crit or auto-crit.
    pub is_critical: bool,
    pub is_auto_crit: bool,
    /// Present only on a hit.
    pub damage_roll: Option<DamageRoll>,
    /// Present only on a hit.
    pub updated_defender: Option<CharacterState>,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingThrowResult {
    /// Zeroed placeholder when the save failed without rolling.
    pub roll: RollResult,
    pub success: bool,
    pub auto_fail: bool,
    pub damage_roll: Option<DamageRoll>,
    pub updated_state: CharacterState,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityCheckResult {
    pub roll: RollResult,
    pub success: bool,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeResult {
    pub roll: RollResult,
    /// Input state with `initiative` set to the roll total.
    pub updated_state: CharacterState,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcentrationCheckResult {
    pub dc: i32,
    /// Placeholder when no roll was made.
    pub roll: RollResult,
    pub auto_fail: bool,
    pub maintained: bool,
    pub updated_state: CharacterState,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathSaveOutcome {
    /// Character is above 0 HP; nothing rolled.
    NotDying,
    Success,
    Failure,
    /// Natural 20: back up with 1 HP.
    Revived,
    /// Natural 1: two failures.
    CriticalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaveResult {
    pub roll: RollResult,
    pub outcome: DeathSaveOutcome,
    /// Three or more successes.
    pub stable: bool,
    /// Three or more failures.
    pub dead: bool,
    pub updated_state: CharacterState,
    pub log: Vec<String>,
}

// ============================================================================
// Engine
// ============================================================================

/// Resolves actions under a [`RulesConfig`].
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    config: RulesConfig,
}

impl RulesEngine {
    pub fn new(config: RulesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    /// Fresh runtime state, using the configured default walking speed.
    pub fn initialize_character_state(
        &self,
        id: CharacterId,
        derived: &DerivedStats,
    ) -> CharacterState {
        CharacterState::from_derived(id, derived, self.config.default_walk_speed)
    }

    /// Resolve an attack against `defender_ac`.
    ///
    /// Attacker conditions apply first, then the defender's. A hit is
    /// `total >= AC` or any critical. A miss rolls no damage and leaves the
    /// defender alone.
    pub fn resolve_attack<R: RandomSource + ?Sized>(
        &self,
        action: &AttackAction<'_>,
        defender_ac: i32,
        rng: &mut R,
    ) -> Result<AttackResult, DiceError> {
        let notation = DamageNotation::parse(action.damage_dice)?;

        let context = create_roll_context(RollType::Attack, [action.attack_bonus])
            .with_critical_threshold(self.config.critical_threshold);
        let context = apply_conditions_to_roll(&context, &action.attacker.conditions, false);
        let context = apply_conditions_to_roll(&context, &action.defender.conditions, true);

        let attack_roll = make_d20_roll_with(&context, rng);
        let is_auto_crit =
            check_auto_crit(&action.defender.conditions, action.is_melee_within_5_feet);
        let is_critical = attack_roll.critical_hit || is_auto_crit;
        let fumbled = self.config.natural_one_always_misses && attack_roll.natural_1;
        let is_hit = !fumbled && (attack_roll.total >= defender_ac || is_critical);

        let mut log = vec![format!(
            "Attack roll: {attack_roll} vs AC {defender_ac}{}",
            sources_note(&attack_roll)
        )];

        tracing::debug!(
            attacker = %action.attacker.character_id,
            defender = %action.defender.character_id,
            total = attack_roll.total,
            defender_ac,
            is_hit,
            is_critical,
            "attack resolved"
        );

        if !is_hit {
            log.push(if fumbled {
                "Natural 1, miss!".to_string()
            } else {
                "Miss!".to_string()
            });
            return Ok(AttackResult {
                attack_roll,
                is_hit,
                is_critical: false,
                is_auto_crit,
                damage_roll: None,
                updated_defender: None,
                log,
            });
        }

        log.push(match (is_critical, is_auto_crit) {
            (true, true) if !attack_roll.critical_hit => {
                "Critical hit! (automatic against a helpless target)".to_string()
            }
            (true, _) => "Critical hit!".to_string(),
            (false, _) => "Hit!".to_string(),
        });

        let damage_roll = notation.roll(is_critical, action.damage_type, rng);
        log.push(format!("Damage: {damage_roll}"));

        let update = take_damage(action.defender, damage_amount(&damage_roll));
        log.extend(update.changes.iter().cloned());

        Ok(AttackResult {
            attack_roll,
            is_hit,
            is_critical,
            is_auto_crit,
            damage_roll: Some(damage_roll),
            updated_defender: Some(update.into_state()),
            log,
        })
    }

    /// Resolve a saving throw. Conditions that fail the save outright skip
    /// the roll.
    pub fn resolve_saving_throw<R: RandomSource + ?Sized>(
        &self,
        action: &SavingThrowAction<'_>,
        rng: &mut R,
    ) -> Result<SavingThrowResult, DiceError> {
        let character = action.character;
        let auto_fail_by = auto_fail_save_sources(&character.conditions, action.ability);
        let auto_fail = !auto_fail_by.is_empty();

        let mut log = Vec::new();
        let (roll, success) = if auto_fail {
            log.push(format!(
                "{} save automatically fails ({})",
                action.ability,
                auto_fail_by.join(", ")
            ));
            (RollResult::placeholder(RollType::Save), false)
        } else {
            let roll = self.roll_d20(
                RollType::Save,
                Some(action.ability),
                action.save_bonus,
                &character.conditions,
                rng,
            );
            let success = roll.meets_dc(action.save_dc);
            log.push(format!(
                "{} save: {roll} vs DC {}{}",
                action.ability,
                action.save_dc,
                sources_note(&roll)
            ));
            log.push(if success { "Success!" } else { "Failure!" }.to_string());
            (roll, success)
        };

        tracing::debug!(
            character = %character.character_id,
            ability = %action.ability,
            dc = action.save_dc,
            total = roll.total,
            success,
            auto_fail,
            "saving throw resolved"
        );

        let damage = if success {
            &action.damage_on_success
        } else {
            &action.damage_on_fail
        };

        let (damage_roll, updated_state) = match damage {
            Some(spec) => {
                let damage_roll =
                    DamageNotation::parse(&spec.dice)?.roll(false, spec.damage_type, rng);
                log.push(format!("Damage: {damage_roll}"));
                let update = take_damage(character, damage_amount(&damage_roll));
                log.extend(update.changes.iter().cloned());
                (Some(damage_roll), update.into_state())
            }
            None => (None, character.clone()),
        };

        Ok(SavingThrowResult {
            roll,
            success,
            auto_fail,
            damage_roll,
            updated_state,
            log,
        })
    }

    /// Roll an ability check against `dc`.
    pub fn resolve_ability_check<R: RandomSource + ?Sized>(
        &self,
        character: &CharacterState,
        ability: Ability,
        bonus: i32,
        dc: i32,
        rng: &mut R,
    ) -> AbilityCheckResult {
        let roll = self.roll_d20(RollType::Check, Some(ability), bonus, &character.conditions, rng);
        let success = roll.meets_dc(dc);
        let log = vec![
            format!("{ability} check: {roll} vs DC {dc}{}", sources_note(&roll)),
            if success { "Success!" } else { "Failure!" }.to_string(),
        ];
        tracing::debug!(
            character = %character.character_id,
            %ability,
            dc,
            total = roll.total,
            success,
            "ability check resolved"
        );
        AbilityCheckResult { roll, success, log }
    }

    /// Roll initiative and record it on the returned state.
    pub fn roll_initiative<R: RandomSource + ?Sized>(
        &self,
        character: &CharacterState,
        bonus: i32,
        rng: &mut R,
    ) -> InitiativeResult {
        let roll = self.roll_d20(RollType::Initiative, None, bonus, &character.conditions, rng);
        let mut updated_state = character.clone();
        updated_state.initiative = Some(roll.total);
        tracing::debug!(
            character = %character.character_id,
            total = roll.total,
            "initiative rolled"
        );
        InitiativeResult {
            log: vec![format!("Initiative: {roll}{}", sources_note(&roll))],
            roll,
            updated_state,
        }
    }

    /// CON save to keep concentrating after taking `damage`.
    ///
    /// DC is half the damage, floored at the configured minimum. An
    /// incapacitated character loses concentration without rolling.
    pub fn concentration_check<R: RandomSource + ?Sized>(
        &self,
        character: &CharacterState,
        damage: i32,
        con_save_bonus: i32,
        rng: &mut R,
    ) -> ConcentrationCheckResult {
        let dc = self.config.concentration_min_dc.max(damage / 2);
        let placeholder = RollResult::placeholder(RollType::Save);

        let Some(concentration) = &character.concentration else {
            return ConcentrationCheckResult {
                dc,
                roll: placeholder,
                auto_fail: false,
                maintained: false,
                updated_state: character.clone(),
                log: vec!["Not concentrating".to_string()],
            };
        };

        let mut log = Vec::new();
        let auto_fail = is_incapacitated(&character.conditions)
            || !auto_fail_save_sources(&character.conditions, Ability::Constitution).is_empty();

        let (roll, maintained) = if auto_fail {
            log.push("Concentration automatically fails (incapacitated)".to_string());
            (placeholder, false)
        } else {
            let roll = self.roll_d20(
                RollType::Save,
                Some(Ability::Constitution),
                con_save_bonus,
                &character.conditions,
                rng,
            );
            let maintained = roll.meets_dc(dc);
            log.push(format!("Concentration save: {roll} vs DC {dc}{}", sources_note(&roll)));
            (roll, maintained)
        };

        let mut updated_state = character.clone();
        if maintained {
            log.push(format!("Maintained concentration on {}", concentration.effect));
        } else {
            log.push(format!("Lost concentration on {}", concentration.effect));
            updated_state.concentration = None;
        }

        tracing::debug!(
            character = %character.character_id,
            dc,
            total = roll.total,
            maintained,
            "concentration check resolved"
        );

        ConcentrationCheckResult {
            dc,
            roll,
            auto_fail,
            maintained,
            updated_state,
            log,
        }
    }

    /// Roll a death save for a character at 0 HP.
    ///
    /// Counters are not clamped; `stable` and `dead` tell the caller when a
    /// threshold has been reached.
    pub fn resolve_death_save<R: RandomSource + ?Sized>(
        &self,
        character: &CharacterState,
        rng: &mut R,
    ) -> DeathSaveResult {
        if !character.hit_points.is_at_zero() {
            return DeathSaveResult {
                roll: RollResult::placeholder(RollType::Save),
                outcome: DeathSaveOutcome::NotDying,
                stable: false,
                dead: false,
                updated_state: character.clone(),
                log: vec!["Not dying".to_string()],
            };
        }

        let roll = self.roll_d20(RollType::Save, None, 0, &character.conditions, rng);
        let mut state = character.clone();

        let outcome = if roll.natural_20 {
            state.hit_points.current = 1;
            state.death_save_successes = 0;
            state.death_save_failures = 0;
            DeathSaveOutcome::Revived
        } else if roll.natural_1 {
            state.death_save_failures = state.death_save_failures.saturating_add(2);
            DeathSaveOutcome::CriticalFailure
        } else if roll.meets_dc(self.config.death_save_dc) {
            state.death_save_successes = state.death_save_successes.saturating_add(1);
            DeathSaveOutcome::Success
        } else {
            state.death_save_failures = state.death_save_failures.saturating_add(1);
            DeathSaveOutcome::Failure
        };

        let stable = state.death_save_successes >= 3;
        let dead = state.death_save_failures >= 3;

        let mut log = vec![format!("Death save: {roll}")];
        log.push(match outcome {
            DeathSaveOutcome::Revived => "Natural 20! Regains 1 HP".to_string(),
            _ => format!(
                "Successes: {}, failures: {}",
                state.death_save_successes, state.death_save_failures
            ),
        });
        if dead {
            log.push("Dead".to_string());
        } else if stable {
            log.push("Stable".to_string());
        }

        tracing::debug!(
            character = %character.character_id,
            total = roll.total,
            ?outcome,
            successes = state.death_save_successes,
            failures = state.death_save_failures,
            "death save resolved"
        );

        DeathSaveResult {
            roll,
            outcome,
            stable,
            dead,
            updated_state: state,
            log,
        }
    }

    /// d20 roll in the actor role: bonus, conditions, configured crit range.
    fn roll_d20<R: RandomSource + ?Sized>(
        &self,
        roll_type: RollType,
        ability: Option<Ability>,
        bonus: i32,
        conditions: &[ActiveCondition],
        rng: &mut R,
    ) -> RollResult {
        let mut context = create_roll_context(roll_type, [bonus])
            .with_critical_threshold(self.config.critical_threshold);
        context.ability = ability;
        let context = apply_conditions_to_roll(&context, conditions, false);
        make_d20_roll_with(&context, rng)
    }
}

fn damage_amount(roll: &DamageRoll) -> i32 {
    i32::try_from(roll.total).unwrap_or(i32::MAX)
}

/// ` [prone, target-blinded]` naming the sources behind a non-normal roll.
fn sources_note(roll: &RollResult) -> String {
    let sources = match roll.roll_state {
        RollState::Normal => return String::new(),
        RollState::Advantage => &roll.advantage_sources,
        RollState::Disadvantage => &roll.disadvantage_sources,
    };
    let names = sources
        .iter()
        .map(|s| s.source.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(" [{names}]")
}

// ============================================================================
// Default-engine entry points
// ============================================================================

/// [`RulesEngine::resolve_attack`] under the default rules.
pub fn resolve_attack<R: RandomSource + ?Sized>(
    action: &AttackAction<'_>,
    defender_ac: i32,
    rng: &mut R,
) -> Result<AttackResult, DiceError> {
    RulesEngine::default().resolve_attack(action, defender_ac, rng)
}

/// [`RulesEngine::resolve_saving_throw`] under the default rules.
pub fn resolve_saving_throw<R: RandomSource + ?Sized>(
    action: &SavingThrowAction<'_>,
    rng: &mut R,
) -> Result<SavingThrowResult, DiceError> {
    RulesEngine::default().resolve_saving_throw(action, rng)
}
