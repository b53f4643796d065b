//! D&D 5e conditions and their mechanical effects.
//!
//! Per-condition behavior is data, not code: [`CONDITION_MECHANICS`] maps a
//! condition id to a flat record of effects, and the functions below read
//! that record. Adding a condition means adding a row.
//!
//! Active conditions are stored by id string. Ids missing from the table
//! are skipped everywhere they are consulted so newer data does not break
//! older engines.

use crate::character::Ability;
use crate::roll::{RollContext, RollType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("No mechanics defined for condition '{0}'")]
    Unknown(String),
}

// ============================================================================
// Condition ids
// ============================================================================

/// D&D 5e conditions with a row in the mechanics table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
}

impl Condition {
    /// Table key.
    pub fn id(&self) -> &'static str {
        match self {
            Condition::Blinded => "blinded",
            Condition::Charmed => "charmed",
            Condition::Deafened => "deafened",
            Condition::Frightened => "frightened",
            Condition::Grappled => "grappled",
            Condition::Incapacitated => "incapacitated",
            Condition::Invisible => "invisible",
            Condition::Paralyzed => "paralyzed",
            Condition::Petrified => "petrified",
            Condition::Poisoned => "poisoned",
            Condition::Prone => "prone",
            Condition::Restrained => "restrained",
            Condition::Stunned => "stunned",
            Condition::Unconscious => "unconscious",
        }
    }

    pub fn from_id(id: &str) -> Option<Condition> {
        Condition::all().into_iter().find(|c| c.id() == id)
    }

    pub fn all() -> [Condition; 14] {
        [
            Condition::Blinded,
            Condition::Charmed,
            Condition::Deafened,
            Condition::Frightened,
            Condition::Grappled,
            Condition::Incapacitated,
            Condition::Invisible,
            Condition::Paralyzed,
            Condition::Petrified,
            Condition::Poisoned,
            Condition::Prone,
            Condition::Restrained,
            Condition::Stunned,
            Condition::Unconscious,
        ]
    }

    pub fn mechanics(&self) -> Option<&'static ConditionMechanics> {
        lookup(self.id())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mechanics() {
            Some(m) => write!(f, "{}", m.name),
            None => write!(f, "{}", self.id()),
        }
    }
}

// ============================================================================
// Mechanics table
// ============================================================================

/// Effect of a condition on its bearer's own rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollEffect {
    Advantage,
    Disadvantage,
    AutoFail,
}

/// Effect of a condition on attacks made against its bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncomingEffect {
    Advantage,
    Disadvantage,
}

/// Effect on melee attacks from within 5 feet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeleeEffect {
    Advantage,
    CritOnHit,
}

/// Rule effects of one condition. Every field is optional; an empty record
/// (charmed, deafened) has no effect on rolls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionMechanics {
    pub name: &'static str,
    pub summary: &'static str,
    pub attack_rolls: Option<RollEffect>,
    pub ability_checks: Option<RollEffect>,
    pub saving_throws: Option<RollEffect>,
    pub incoming_attacks: Option<IncomingEffect>,
    pub incoming_melee_attacks: Option<MeleeEffect>,
    pub auto_fail_saves: &'static [Ability],
    pub save_disadvantage: &'static [Ability],
    pub speed_zero: bool,
    pub incapacitated: bool,
    pub cannot_move_or_speak: bool,
    pub drops_items: bool,
    pub falls_prone: bool,
}

const STR_DEX: &[Ability] = &[Ability::Strength, Ability::Dexterity];

lazy_static::lazy_static! {
    /// Mechanics for every known condition, keyed by id.
    pub static ref CONDITION_MECHANICS: BTreeMap<&'static str, ConditionMechanics> = {
        let rows = [
            ConditionMechanics {
                name: "Blinded",
                summary: "Can't see. Attacks against it have advantage; \
                          its attacks have disadvantage.",
                attack_rolls: Some(RollEffect::Disadvantage),
                incoming_attacks: Some(IncomingEffect::Advantage),
                ..Default::default()
            },
            ConditionMechanics {
                name: "Charmed",
                summary: "Can't attack the charmer; the charmer has advantage on social checks.",
                ..Default::default()
            },
            ConditionMechanics {
                name: "Deafened",
                summary: "Can't hear and fails checks that require hearing.",
                ..Default::default()
            },
            ConditionMechanics {
                name: "Frightened",
                summary: "Disadvantage on ability checks and attacks while the source is in sight.",
                attack_rolls: Some(RollEffect::Disadvantage),
                ability_checks: Some(RollEffect::Disadvantage),
                ..Default::default()
            },
            ConditionMechanics {
                name: "Grappled",
                summary: "Speed becomes 0.",
                speed_zero: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Incapacitated",
                summary: "Can't take actions or reactions.",
                incapacitated: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Invisible",
                summary: "Attacks against it have disadvantage; its attacks have advantage.",
                attack_rolls: Some(RollEffect::Advantage),
                incoming_attacks: Some(IncomingEffect::Disadvantage),
                ..Default::default()
            },
            ConditionMechanics {
                name: "Paralyzed",
                summary: "Incapacitated and can't move or speak. Fails STR and DEX saves. \
                          Attacks against it have advantage; \
                          melee hits within 5 feet are critical.",
                incoming_attacks: Some(IncomingEffect::Advantage),
                incoming_melee_attacks: Some(MeleeEffect::CritOnHit),
                auto_fail_saves: STR_DEX,
                speed_zero: true,
                incapacitated: true,
                cannot_move_or_speak: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Petrified",
                summary: "Turned to stone: incapacitated, can't move or speak, \
                          fails STR and DEX saves. Attacks against it have advantage.",
                incoming_attacks: Some(IncomingEffect::Advantage),
                auto_fail_saves: STR_DEX,
                speed_zero: true,
                incapacitated: true,
                cannot_move_or_speak: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Poisoned",
                summary: "Disadvantage on attack rolls and ability checks.",
                attack_rolls: Some(RollEffect::Disadvantage),
                ability_checks: Some(RollEffect::Disadvantage),
                ..Default::default()
            },
            ConditionMechanics {
                name: "Prone",
                summary: "Disadvantage on attack rolls. \
                          Melee attacks from within 5 feet have advantage.",
                attack_rolls: Some(RollEffect::Disadvantage),
                incoming_melee_attacks: Some(MeleeEffect::Advantage),
                ..Default::default()
            },
            ConditionMechanics {
                name: "Restrained",
                summary: "Speed 0. Disadvantage on attacks and DEX saves; \
                          attacks against it have advantage.",
                attack_rolls: Some(RollEffect::Disadvantage),
                incoming_attacks: Some(IncomingEffect::Advantage),
                save_disadvantage: &[Ability::Dexterity],
                speed_zero: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Stunned",
                summary: "Incapacitated, can't move. Fails STR and DEX saves. \
                          Attacks against it have advantage.",
                incoming_attacks: Some(IncomingEffect::Advantage),
                auto_fail_saves: STR_DEX,
                speed_zero: true,
                incapacitated: true,
                ..Default::default()
            },
            ConditionMechanics {
                name: "Unconscious",
                summary: "Incapacitated, can't move or speak, drops what it holds and falls prone. \
                          Fails STR and DEX saves. Attacks against it have advantage; \
                          melee hits within 5 feet are critical.",
                incoming_attacks: Some(IncomingEffect::Advantage),
                incoming_melee_attacks: Some(MeleeEffect::CritOnHit),
                auto_fail_saves: STR_DEX,
                speed_zero: true,
                incapacitated: true,
                cannot_move_or_speak: true,
                drops_items: true,
                falls_prone: true,
                ..Default::default()
            },
        ];

        Condition::all().into_iter().map(|c| c.id()).zip(rows).collect()
    };
}

/// Mechanics for `id`, or `None` if the table has no row for it.
pub fn lookup(id: &str) -> Option<&'static ConditionMechanics> {
    CONDITION_MECHANICS.get(id)
}

/// Strict lookup for data-authoring code, where a missing row is a bug.
pub fn condition_mechanics(id: &str) -> Result<&'static ConditionMechanics, ConditionError> {
    lookup(id).ok_or_else(|| ConditionError::Unknown(id.to_string()))
}

// ============================================================================
// Active conditions
// ============================================================================

/// How long an applied condition lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConditionDuration {
    Rounds(u32),
    Instant,
    Indefinite,
}

/// A saving throw the bearer can make to shake the condition off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveToEnd {
    pub ability: Ability,
    pub dc: i32,
}

/// A condition applied to a creature with tracking info.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCondition {
    pub condition_id: String,
    pub source: Option<String>,
    pub duration: Option<ConditionDuration>,
    pub save_to_end: Option<SaveToEnd>,
}

impl ActiveCondition {
    pub fn new(condition: Condition) -> Self {
        Self::from_id(condition.id())
    }

    /// Apply a condition by raw id, which may not be in the table.
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            condition_id: id.into(),
            source: None,
            duration: None,
            save_to_end: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_duration(mut self, duration: ConditionDuration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_save_to_end(mut self, ability: Ability, dc: i32) -> Self {
        self.save_to_end = Some(SaveToEnd { ability, dc });
        self
    }

    pub fn mechanics(&self) -> Option<&'static ConditionMechanics> {
        lookup(&self.condition_id)
    }
}

/// Pair each active condition with its mechanics, skipping unknown ids.
pub fn active_mechanics(
    conditions: &[ActiveCondition],
) -> impl Iterator<Item = (&ActiveCondition, &'static ConditionMechanics)> {
    conditions.iter().filter_map(|active| match active.mechanics() {
        Some(mechanics) => Some((active, mechanics)),
        None => {
            tracing::warn!(
                condition = %active.condition_id,
                "skipping condition with no mechanics"
            );
            None
        }
    })
}

// ============================================================================
// Applying conditions to rolls
// ============================================================================

/// Return a copy of `context` with the advantage and disadvantage that
/// `conditions` impose.
///
/// With `is_defender == false` the conditions belong to the roller and are
/// matched against the roll type. With `is_defender == true` they belong to
/// the target of an attack; only attack contexts are affected. The melee
/// advantage from a prone target is granted unconditionally here, so pass
/// defender conditions only for attacks where that applies.
///
/// Sources are tagged `<id>`, `target-<id>` or `target-<id>-melee`.
pub fn apply_conditions_to_roll(
    context: &RollContext,
    conditions: &[ActiveCondition],
    is_defender: bool,
) -> RollContext {
    let mut context = context.clone();

    for (active, mechanics) in active_mechanics(conditions) {
        let id = active.condition_id.as_str();
        let before = (
            context.advantage_sources.len(),
            context.disadvantage_sources.len(),
        );

        if is_defender {
            if context.roll_type != RollType::Attack {
                continue;
            }
            match mechanics.incoming_attacks {
                Some(IncomingEffect::Advantage) => {
                    context = context.with_advantage(format!("target-{id}"), Some(mechanics.name));
                }
                Some(IncomingEffect::Disadvantage) => {
                    context =
                        context.with_disadvantage(format!("target-{id}"), Some(mechanics.name));
                }
                None => {}
            }
            if mechanics.incoming_melee_attacks == Some(MeleeEffect::Advantage) {
                context =
                    context.with_advantage(format!("target-{id}-melee"), Some(mechanics.name));
            }
        } else {
            let effect = match context.roll_type {
                RollType::Attack => mechanics.attack_rolls,
                RollType::Check | RollType::Initiative => mechanics.ability_checks,
                RollType::Save => mechanics.saving_throws,
            };
            match effect {
                Some(RollEffect::Advantage) => {
                    context = context.with_advantage(id, Some(mechanics.name));
                }
                Some(RollEffect::Disadvantage) => {
                    context = context.with_disadvantage(id, Some(mechanics.name));
                }
                // Auto-fail is answered by `check_auto_fail_save`, not by the roll.
                Some(RollEffect::AutoFail) | None => {}
            }
            if context.roll_type == RollType::Save {
                if let Some(ability) = context.ability {
                    if mechanics.save_disadvantage.contains(&ability) {
                        context = context.with_disadvantage(id, Some(mechanics.name));
                    }
                }
            }
        }

        tracing::trace!(
            condition = id,
            is_defender,
            advantage_added = context.advantage_sources.len() - before.0,
            disadvantage_added = context.disadvantage_sources.len() - before.1,
            "condition applied to roll"
        );
    }

    context
}

/// Ids of the active conditions that make a save with `ability` fail outright.
pub fn auto_fail_save_sources(conditions: &[ActiveCondition], ability: Ability) -> Vec<&str> {
    active_mechanics(conditions)
        .filter(|(_, m)| {
            m.auto_fail_saves.contains(&ability) || m.saving_throws == Some(RollEffect::AutoFail)
        })
        .map(|(active, _)| active.condition_id.as_str())
        .collect()
}

/// Whether a save with `ability` fails without rolling.
pub fn check_auto_fail_save(conditions: &[ActiveCondition], ability: Ability) -> bool {
    !auto_fail_save_sources(conditions, ability).is_empty()
}

pub fn is_incapacitated(conditions: &[ActiveCondition]) -> bool {
    active_mechanics(conditions).any(|(_, m)| m.incapacitated)
}

/// Whether a hit against a creature with `conditions` is automatically
/// critical. Only melee attacks from within 5 feet qualify.
pub fn check_auto_crit(conditions: &[ActiveCondition], is_melee_within_5_feet: bool) -> bool {
    is_melee_within_5_feet
        && active_mechanics(conditions)
            .any(|(_, m)| m.incoming_melee_attacks == Some(MeleeEffect::CritOnHit))
}

pub fn speed_is_zero(conditions: &[ActiveCondition]) -> bool {
    active_mechanics(conditions).any(|(_, m)| m.speed_zero)
}

pub fn can_move_or_speak(conditions: &[ActiveCondition]) -> bool {
    !active_mechanics(conditions).any(|(_, m)| m.cannot_move_or_speak)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roll::create_roll_context;

    fn active(conditions: &[Condition]) -> Vec<ActiveCondition> {
        conditions.iter().copied().map(ActiveCondition::new).collect()
    }

    fn source_ids(sources: &[crate::roll::ModifierSource]) -> Vec<&str> {
        sources.iter().map(|s| s.source.as_str()).collect()
    }

    #[test]
    fn test_table_covers_every_condition() {
        assert_eq!(CONDITION_MECHANICS.len(), Condition::all().len());
        for condition in Condition::all() {
            let mechanics = condition.mechanics().expect("row for every condition");
            assert_eq!(mechanics.name.to_lowercase(), condition.id());
            assert_eq!(Condition::from_id(condition.id()), Some(condition));
        }
    }

    #[test]
    fn test_every_auto_crit_condition_also_incapacitates() {
        for (id, mechanics) in CONDITION_MECHANICS.iter() {
            if mechanics.incoming_melee_attacks == Some(MeleeEffect::CritOnHit) {
                assert!(mechanics.incapacitated, "{id} grants auto-crit without incapacitating");
                assert_eq!(mechanics.auto_fail_saves, STR_DEX, "{id}");
            }
        }
    }

    #[test]
    fn test_unconscious_extras() {
        let m = Condition::Unconscious.mechanics().unwrap();
        assert!(m.drops_items && m.falls_prone && m.speed_zero && m.cannot_move_or_speak);
        let p = Condition::Paralyzed.mechanics().unwrap();
        assert!(!p.drops_items && !p.falls_prone);
    }

    #[test]
    fn test_strict_lookup() {
        assert!(condition_mechanics("prone").is_ok());
        assert_eq!(
            condition_mechanics("dazed"),
            Err(ConditionError::Unknown("dazed".to_string()))
        );
    }

    #[test]
    fn test_actor_conditions_match_roll_type() {
        let poisoned = active(&[Condition::Poisoned]);

        let attack = create_roll_context(RollType::Attack, []);
        let attack = apply_conditions_to_roll(&attack, &poisoned, false);
        assert_eq!(source_ids(&attack.disadvantage_sources), vec!["poisoned"]);

        let check = create_roll_context(RollType::Check, []);
        let check = apply_conditions_to_roll(&check, &poisoned, false);
        assert_eq!(source_ids(&check.disadvantage_sources), vec!["poisoned"]);

        let save = create_roll_context(RollType::Save, []);
        let save = apply_conditions_to_roll(&save, &poisoned, false);
        assert!(save.disadvantage_sources.is_empty());
    }

    #[test]
    fn test_initiative_counts_as_check() {
        let frightened = active(&[Condition::Frightened]);
        let ctx = apply_conditions_to_roll(
            &create_roll_context(RollType::Initiative, []),
            &frightened,
            false,
        );
        assert_eq!(source_ids(&ctx.disadvantage_sources), vec!["frightened"]);
    }

    #[test]
    fn test_defender_conditions_tagged() {
        let ctx = create_roll_context(RollType::Attack, [4]);

        let vs_prone = apply_conditions_to_roll(&ctx, &active(&[Condition::Prone]), true);
        assert_eq!(source_ids(&vs_prone.advantage_sources), vec!["target-prone-melee"]);

        let vs_invisible = apply_conditions_to_roll(&ctx, &active(&[Condition::Invisible]), true);
        assert_eq!(source_ids(&vs_invisible.disadvantage_sources), vec!["target-invisible"]);

        let vs_stunned = apply_conditions_to_roll(&ctx, &active(&[Condition::Stunned]), true);
        assert_eq!(source_ids(&vs_stunned.advantage_sources), vec!["target-stunned"]);

        // Defender conditions never touch non-attack rolls.
        let save = apply_conditions_to_roll(
            &create_roll_context(RollType::Save, []),
            &active(&[Condition::Stunned]),
            true,
        );
        assert!(save.advantage_sources.is_empty());
    }

    #[test]
    fn test_defender_role_ignores_own_attack_effects() {
        // A poisoned defender doesn't make attacks against it worse.
        let ctx = apply_conditions_to_roll(
            &create_roll_context(RollType::Attack, []),
            &active(&[Condition::Poisoned]),
            true,
        );
        assert!(ctx.disadvantage_sources.is_empty());
        assert!(ctx.advantage_sources.is_empty());
    }

    #[test]
    fn test_duplicates_each_apply() {
        let ctx = apply_conditions_to_roll(
            &create_roll_context(RollType::Attack, []),
            &active(&[Condition::Poisoned, Condition::Poisoned]),
            false,
        );
        assert_eq!(ctx.disadvantage_sources.len(), 2);
    }

    #[test]
    fn test_unknown_condition_skipped() {
        let conditions = vec![
            ActiveCondition::from_id("dazed").with_source("homebrew"),
            ActiveCondition::new(Condition::Blinded),
        ];
        let ctx = create_roll_context(RollType::Attack, []);
        let ctx = apply_conditions_to_roll(&ctx, &conditions, false);
        assert_eq!(source_ids(&ctx.disadvantage_sources), vec!["blinded"]);
        assert!(!is_incapacitated(&[ActiveCondition::from_id("dazed")]));
        assert!(!check_auto_fail_save(&[ActiveCondition::from_id("dazed")], Ability::Strength));
    }

    #[test]
    fn test_restrained_dex_save_disadvantage() {
        let restrained = active(&[Condition::Restrained]);
        let dex = apply_conditions_to_roll(
            &create_roll_context(RollType::Save, []).with_ability(Ability::Dexterity),
            &restrained,
            false,
        );
        assert_eq!(source_ids(&dex.disadvantage_sources), vec!["restrained"]);

        let wis = apply_conditions_to_roll(
            &create_roll_context(RollType::Save, []).with_ability(Ability::Wisdom),
            &restrained,
            false,
        );
        assert!(wis.disadvantage_sources.is_empty());
    }

    #[test]
    fn test_auto_fail_only_str_dex() {
        for condition in [Condition::Paralyzed, Condition::Unconscious, Condition::Stunned] {
            let conditions = active(&[condition]);
            for ability in Ability::all() {
                let expected = matches!(ability, Ability::Strength | Ability::Dexterity);
                assert_eq!(
                    check_auto_fail_save(&conditions, ability),
                    expected,
                    "{condition} {ability}"
                );
            }
        }
        let prone_and_stunned = active(&[Condition::Prone, Condition::Stunned]);
        assert_eq!(
            auto_fail_save_sources(&prone_and_stunned, Ability::Dexterity),
            vec!["stunned"]
        );
    }

    #[test]
    fn test_auto_crit_requires_melee_within_5_feet() {
        for condition in [Condition::Paralyzed, Condition::Unconscious] {
            let conditions = active(&[condition]);
            assert!(check_auto_crit(&conditions, true));
            assert!(!check_auto_crit(&conditions, false));
        }
        assert!(!check_auto_crit(&active(&[Condition::Stunned]), true));
        assert!(!check_auto_crit(&active(&[Condition::Prone]), true));
    }

    #[test]
    fn test_incapacitation_and_movement() {
        assert!(is_incapacitated(&active(&[Condition::Charmed, Condition::Stunned])));
        assert!(!is_incapacitated(&active(&[Condition::Restrained])));
        assert!(speed_is_zero(&active(&[Condition::Grappled])));
        assert!(can_move_or_speak(&active(&[Condition::Stunned])));
        assert!(!can_move_or_speak(&active(&[Condition::Petrified])));
    }
}
