//! State transitions over [`CharacterState`].
//!
//! Every operation borrows the input and returns a [`StateUpdate`]. Failures
//! and no-ops hand back the *same* state (`Cow::Borrowed`), so a caller can
//! tell nothing happened without comparing fields. Real changes come back as
//! a fresh `Cow::Owned` copy. Nothing here panics or returns `Err`: expected
//! gameplay failures travel in [`StateUpdate::error`].

use crate::character::{ActionEconomy, CharacterState, Concentration, RestorationType};
use crate::conditions::{speed_is_zero, ActiveCondition};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Expected, recoverable failures of a state operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Resource '{0}' does not exist")]
    UnknownResource(String),

    #[error("Not enough {id}: {available}/{max} available, {requested} required")]
    InsufficientResource {
        id: String,
        available: u32,
        max: u32,
        requested: u32,
    },

    #[error("Character has no spell slots")]
    NotASpellcaster,

    #[error("Character has no level {0} spell slots")]
    UnknownSpellSlotLevel(u8),

    #[error("No level {level} spell slots remaining ({available}/{max} available)")]
    InsufficientSpellSlots { level: u8, available: u32, max: u32 },

    #[error("{0} already used this turn")]
    ActionUnavailable(ActionKind),

    #[error("Not enough movement: {requested} ft requested, {remaining} ft remaining")]
    InsufficientMovement { requested: u32, remaining: u32 },
}

/// Outcome of a state operation.
#[derive(Debug, Clone)]
pub struct StateUpdate<'a> {
    pub state: Cow<'a, CharacterState>,
    pub error: Option<StateError>,
    /// Human-readable description of what changed.
    pub changes: Vec<String>,
}

impl<'a> StateUpdate<'a> {
    fn changed(state: CharacterState, changes: Vec<String>) -> Self {
        tracing::debug!(character = %state.character_id, ?changes, "state updated");
        Self {
            state: Cow::Owned(state),
            error: None,
            changes,
        }
    }

    fn unchanged(state: &'a CharacterState, note: impl Into<String>) -> Self {
        Self {
            state: Cow::Borrowed(state),
            error: None,
            changes: vec![note.into()],
        }
    }

    fn noop(state: &'a CharacterState) -> Self {
        Self {
            state: Cow::Borrowed(state),
            error: None,
            changes: Vec::new(),
        }
    }

    fn failed(state: &'a CharacterState, error: StateError) -> Self {
        tracing::debug!(character = %state.character_id, %error, "state operation rejected");
        Self {
            state: Cow::Borrowed(state),
            error: Some(error),
            changes: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// True when the input state was handed back untouched.
    pub fn is_unchanged(&self) -> bool {
        matches!(self.state, Cow::Borrowed(_))
    }

    pub fn into_state(self) -> CharacterState {
        self.state.into_owned()
    }
}

/// How much of a resource to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreAmount {
    Max,
    Amount(u32),
}

impl RestoreAmount {
    fn apply(self, current: u32, max: u32) -> u32 {
        match self {
            RestoreAmount::Max => max,
            RestoreAmount::Amount(n) => current.saturating_add(n).min(max),
        }
    }
}

/// Which spell slot levels to restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotLevel {
    All,
    Level(u8),
}

// ============================================================================
// Resources
// ============================================================================

pub fn consume_resource<'a>(state: &'a CharacterState, id: &str, amount: u32) -> StateUpdate<'a> {
    let Some(resource) = state.resources.get(id) else {
        return StateUpdate::failed(state, StateError::UnknownResource(id.to_string()));
    };

    let Some(remaining) = resource.current.checked_sub(amount) else {
        return StateUpdate::failed(
            state,
            StateError::InsufficientResource {
                id: id.to_string(),
                available: resource.current,
                max: resource.max,
                requested: amount,
            },
        );
    };

    let max = resource.max;
    let mut next = state.clone();
    if let Some(resource) = next.resources.get_mut(id) {
        resource.current = remaining;
    }
    StateUpdate::changed(
        next,
        vec![format!("Used {amount} {id} ({remaining}/{max} remaining)")],
    )
}

pub fn restore_resource<'a>(
    state: &'a CharacterState,
    id: &str,
    amount: RestoreAmount,
) -> StateUpdate<'a> {
    let Some(resource) = state.resources.get(id) else {
        return StateUpdate::failed(state, StateError::UnknownResource(id.to_string()));
    };

    let restored = amount.apply(resource.current, resource.max);
    if restored == resource.current {
        return StateUpdate::unchanged(
            state,
            format!("{id} already at {}/{}", resource.current, resource.max),
        );
    }

    let (old, max) = (resource.current, resource.max);
    let mut next = state.clone();
    if let Some(resource) = next.resources.get_mut(id) {
        resource.current = restored;
    }
    StateUpdate::changed(
        next,
        vec![format!("Restored {} {id} ({restored}/{max})", restored - old)],
    )
}

// ============================================================================
// Spell slots
// ============================================================================

pub fn consume_spell_slot(state: &CharacterState, level: u8) -> StateUpdate<'_> {
    let Some(slots) = state.spell_slots.as_ref() else {
        return StateUpdate::failed(state, StateError::NotASpellcaster);
    };
    let Some(slot) = slots.get(&level) else {
        return StateUpdate::failed(state, StateError::UnknownSpellSlotLevel(level));
    };
    if slot.current == 0 {
        return StateUpdate::failed(
            state,
            StateError::InsufficientSpellSlots {
                level,
                available: slot.current,
                max: slot.max,
            },
        );
    }

    let (remaining, max) = (slot.current - 1, slot.max);
    let mut next = state.clone();
    if let Some(slot) = next.spell_slots.as_mut().and_then(|s| s.get_mut(&level)) {
        slot.current = remaining;
    }
    StateUpdate::changed(
        next,
        vec![format!("Used a level {level} spell slot ({remaining}/{max} remaining)")],
    )
}

pub fn restore_spell_slots(
    state: &CharacterState,
    level: SlotLevel,
    amount: RestoreAmount,
) -> StateUpdate<'_> {
    let Some(slots) = state.spell_slots.as_ref() else {
        return StateUpdate::failed(state, StateError::NotASpellcaster);
    };
    let levels: Vec<u8> = match level {
        SlotLevel::All => slots.keys().copied().collect(),
        SlotLevel::Level(level) if slots.contains_key(&level) => vec![level],
        SlotLevel::Level(level) => {
            return StateUpdate::failed(state, StateError::UnknownSpellSlotLevel(level));
        }
    };

    let mut next = state.clone();
    let mut changes = Vec::new();
    if let Some(next_slots) = next.spell_slots.as_mut() {
        for level in &levels {
            if let Some(slot) = next_slots.get_mut(level) {
                let restored = amount.apply(slot.current, slot.max);
                if restored != slot.current {
                    changes.push(format!(
                        "Restored {} level {level} spell slot(s) ({restored}/{})",
                        restored - slot.current,
                        slot.max
                    ));
                    slot.current = restored;
                }
            }
        }
    }

    if changes.is_empty() {
        let note = match levels.as_slice() {
            [level] => format!("Level {level} spell slots already at maximum"),
            _ => "All spell slots already at maximum".to_string(),
        };
        return StateUpdate::unchanged(state, note);
    }
    StateUpdate::changed(next, changes)
}

// ============================================================================
// Hit points
// ============================================================================

/// Apply damage. Temporary HP soaks first; current HP never drops below 0.
pub fn take_damage(state: &CharacterState, damage: i32) -> StateUpdate<'_> {
    if damage <= 0 {
        return StateUpdate::noop(state);
    }

    let mut next = state.clone();
    let mut changes = Vec::new();
    let hp = &mut next.hit_points;

    let absorbed = hp.temporary.min(damage);
    if absorbed > 0 {
        hp.temporary -= absorbed;
        changes.push(format!(
            "Temporary HP absorbed {absorbed} damage ({} remaining)",
            hp.temporary
        ));
    }

    let remaining = damage - absorbed;
    if remaining > 0 {
        let old = hp.current;
        hp.current = (hp.current - remaining).max(0);
        changes.push(format!(
            "Took {remaining} damage (HP {old} -> {}/{})",
            hp.current, hp.maximum
        ));
        if hp.current == 0 && old > 0 {
            changes.push("Dropped to 0 HP".to_string());
        }
    }

    StateUpdate::changed(next, changes)
}

pub fn heal(state: &CharacterState, amount: i32) -> StateUpdate<'_> {
    if amount <= 0 {
        return StateUpdate::noop(state);
    }

    let hp = &state.hit_points;
    let healed = hp.current.saturating_add(amount).min(hp.maximum);
    if healed <= hp.current {
        return StateUpdate::unchanged(state, "Already at maximum HP");
    }

    let old = hp.current;
    let mut next = state.clone();
    next.hit_points.current = healed;
    StateUpdate::changed(
        next,
        vec![format!(
            "Healed {} HP ({old} -> {healed}/{})",
            healed - old,
            state.hit_points.maximum
        )],
    )
}

/// Temporary HP don't stack: the higher of old and new wins.
pub fn gain_temp_hp(state: &CharacterState, amount: i32) -> StateUpdate<'_> {
    if amount <= 0 {
        return StateUpdate::noop(state);
    }

    let current = state.hit_points.temporary;
    if amount <= current {
        return StateUpdate::unchanged(
            state,
            format!("Kept {current} temporary HP ({amount} is not higher)"),
        );
    }

    let mut next = state.clone();
    next.hit_points.temporary = amount;
    StateUpdate::changed(
        next,
        vec![format!("Gained {amount} temporary HP (was {current})")],
    )
}

// ============================================================================
// Rests
// ============================================================================

fn restore_matching(next: &mut CharacterState, restorations: &[RestorationType]) -> Vec<String> {
    let mut changes = Vec::new();
    for (id, resource) in next.resources.iter_mut() {
        if restorations.contains(&resource.restoration) && resource.current < resource.max {
            changes.push(format!(
                "Restored {} {id} ({}/{})",
                resource.max - resource.current,
                resource.max,
                resource.max
            ));
            resource.current = resource.max;
        }
    }
    changes
}

/// Restore every short-rest resource.
pub fn short_rest(state: &CharacterState) -> StateUpdate<'_> {
    let mut next = state.clone();
    let changes = restore_matching(&mut next, &[RestorationType::ShortRest]);
    if changes.is_empty() {
        return StateUpdate::unchanged(state, "Nothing to recover on a short rest");
    }
    StateUpdate::changed(next, changes)
}

/// Restore short- and long-rest resources, spell slots and HP; clear temp HP
/// and death saves; lower exhaustion by one.
pub fn long_rest(state: &CharacterState) -> StateUpdate<'_> {
    let mut next = state.clone();
    let mut changes = restore_matching(
        &mut next,
        &[RestorationType::ShortRest, RestorationType::LongRest],
    );

    if let Some(slots) = next.spell_slots.as_mut() {
        if slots.values().any(|slot| slot.current < slot.max) {
            for slot in slots.values_mut() {
                slot.current = slot.max;
            }
            changes.push("Restored all spell slots".to_string());
        }
    }

    let hp = &mut next.hit_points;
    if hp.current < hp.maximum {
        changes.push(format!("Recovered to full HP ({})", hp.maximum));
        hp.current = hp.maximum;
    }
    if hp.temporary > 0 {
        changes.push("Temporary HP expired".to_string());
        hp.temporary = 0;
    }

    if next.death_save_successes > 0 || next.death_save_failures > 0 {
        next.death_save_successes = 0;
        next.death_save_failures = 0;
        changes.push("Death saves reset".to_string());
    }

    if next.exhaustion_level > 0 {
        next.exhaustion_level -= 1;
        changes.push(format!("Exhaustion reduced to {}", next.exhaustion_level));
    }

    if changes.is_empty() {
        return StateUpdate::unchanged(state, "Already fully rested");
    }
    StateUpdate::changed(next, changes)
}

// ============================================================================
// Action economy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Action,
    BonusAction,
    Reaction,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Action => write!(f, "Action"),
            ActionKind::BonusAction => write!(f, "Bonus action"),
            ActionKind::Reaction => write!(f, "Reaction"),
        }
    }
}

/// Fresh action economy for a new turn. Movement is 0 while any condition
/// zeroes speed.
pub fn start_turn(state: &CharacterState) -> StateUpdate<'_> {
    let movement = if speed_is_zero(&state.conditions) {
        0
    } else {
        state.walk_speed
    };

    let mut next = state.clone();
    next.action_economy = ActionEconomy::fresh(movement);
    StateUpdate::changed(next, vec![format!("Turn started ({movement} ft movement)")])
}

pub fn use_action(state: &CharacterState, kind: ActionKind) -> StateUpdate<'_> {
    let economy = &state.action_economy;
    let available = match kind {
        ActionKind::Action => economy.action,
        ActionKind::BonusAction => economy.bonus_action,
        ActionKind::Reaction => economy.reaction,
    };
    if !available {
        return StateUpdate::failed(state, StateError::ActionUnavailable(kind));
    }

    let mut next = state.clone();
    let economy = &mut next.action_economy;
    match kind {
        ActionKind::Action => economy.action = false,
        ActionKind::BonusAction => economy.bonus_action = false,
        ActionKind::Reaction => economy.reaction = false,
    }
    StateUpdate::changed(next, vec![format!("{kind} used")])
}

pub fn spend_movement(state: &CharacterState, feet: u32) -> StateUpdate<'_> {
    if feet == 0 {
        return StateUpdate::noop(state);
    }
    let remaining = state.action_economy.movement_remaining;
    let Some(left) = remaining.checked_sub(feet) else {
        return StateUpdate::failed(
            state,
            StateError::InsufficientMovement {
                requested: feet,
                remaining,
            },
        );
    };

    let mut next = state.clone();
    next.action_economy.movement_remaining = left;
    StateUpdate::changed(next, vec![format!("Moved {feet} ft ({left} ft remaining)")])
}

// ============================================================================
// Conditions, concentration, inspiration
// ============================================================================

pub fn add_condition(state: &CharacterState, condition: ActiveCondition) -> StateUpdate<'_> {
    let label = condition
        .mechanics()
        .map(|m| m.name.to_string())
        .unwrap_or_else(|| condition.condition_id.clone());
    let mut next = state.clone();
    next.conditions.push(condition);
    StateUpdate::changed(next, vec![format!("Now {label}")])
}

/// Remove every instance of `condition_id`.
pub fn remove_condition<'a>(state: &'a CharacterState, condition_id: &str) -> StateUpdate<'a> {
    let count = state
        .conditions
        .iter()
        .filter(|c| c.condition_id == condition_id)
        .count();
    if count == 0 {
        return StateUpdate::unchanged(state, format!("Not {condition_id}"));
    }

    let mut next = state.clone();
    next.conditions.retain(|c| c.condition_id != condition_id);
    StateUpdate::changed(next, vec![format!("No longer {condition_id}")])
}

/// Begin concentrating on `effect`, dropping whatever came before.
pub fn start_concentration(
    state: &CharacterState,
    effect: impl Into<String>,
    source: Option<String>,
) -> StateUpdate<'_> {
    let effect = effect.into();
    let mut changes = Vec::new();
    if let Some(previous) = &state.concentration {
        changes.push(format!("Stopped concentrating on {}", previous.effect));
    }
    changes.push(format!("Concentrating on {effect}"));

    let mut next = state.clone();
    next.concentration = Some(Concentration { effect, source });
    StateUpdate::changed(next, changes)
}

pub fn end_concentration(state: &CharacterState) -> StateUpdate<'_> {
    match &state.concentration {
        None => StateUpdate::unchanged(state, "Not concentrating"),
        Some(current) => {
            let line = format!("Stopped concentrating on {}", current.effect);
            let mut next = state.clone();
            next.concentration = None;
            StateUpdate::changed(next, vec![line])
        }
    }
}

pub fn set_inspiration(state: &CharacterState, has_inspiration: bool) -> StateUpdate<'_> {
    if state.has_inspiration == has_inspiration {
        return StateUpdate::noop(state);
    }
    let mut next = state.clone();
    next.has_inspiration = has_inspiration;
    let line = if has_inspiration {
        "Gained inspiration"
    } else {
        "Spent inspiration"
    };
    StateUpdate::changed(next, vec![line.to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Condition;
    use crate::testing::{fighter_state, wizard_state};
    use proptest::prelude::*;

    #[test]
    fn test_consume_resource() {
        let state = fighter_state();
        let update = consume_resource(&state, "second_wind", 1);
        assert!(update.is_success());
        assert!(!update.is_unchanged());
        assert_eq!(update.state.resource("second_wind").unwrap().current, 0);
        assert_eq!(update.changes, vec!["Used 1 second_wind (0/1 remaining)"]);
        assert_eq!(state.resource("second_wind").unwrap().current, 1);
    }

    #[test]
    fn test_consume_unknown_resource() {
        let state = fighter_state();
        let update = consume_resource(&state, "ki", 1);
        assert!(!update.is_success());
        assert!(update.is_unchanged());
        let message = update.error.unwrap().to_string();
        assert!(message.contains("does not exist"), "{message}");
    }

    #[test]
    fn test_consume_too_much() {
        let state = fighter_state();
        let update = consume_resource(&state, "action_surge", 2);
        assert!(update.is_unchanged());
        assert_eq!(
            update.error,
            Some(StateError::InsufficientResource {
                id: "action_surge".to_string(),
                available: 1,
                max: 1,
                requested: 2,
            })
        );
        assert_eq!(*update.state, state);
        assert!(update
            .error
            .as_ref()
            .unwrap()
            .to_string()
            .contains("1/1 available"));
    }

    #[test]
    fn test_restore_resource_clamps() {
        let state = fighter_state();
        let spent = consume_resource(&state, "second_wind", 1).into_state();
        let update = restore_resource(&spent, "second_wind", RestoreAmount::Amount(5));
        assert!(update.is_success());
        assert_eq!(update.state.resource("second_wind").unwrap().current, 1);
    }

    #[test]
    fn test_restore_full_resource_returns_same_state() {
        let state = fighter_state();
        let update = restore_resource(&state, "second_wind", RestoreAmount::Max);
        assert!(update.is_success());
        assert!(update.is_unchanged());
        assert!(std::ptr::eq(update.state.as_ref(), &state));
        assert!(update.changes[0].contains("already at"));

        assert!(!restore_resource(&state, "rage", RestoreAmount::Max).is_success());
    }

    #[test]
    fn test_spell_slots_require_caster() {
        let state = fighter_state();
        assert_eq!(consume_spell_slot(&state, 1).error, Some(StateError::NotASpellcaster));
        assert_eq!(
            restore_spell_slots(&state, SlotLevel::All, RestoreAmount::Max).error,
            Some(StateError::NotASpellcaster)
        );
    }

    #[test]
    fn test_consume_spell_slot() {
        let state = wizard_state();
        let update = consume_spell_slot(&state, 2);
        assert!(update.is_success());
        assert_eq!(update.state.spell_slot(2).unwrap().current, 1);

        assert_eq!(
            consume_spell_slot(&state, 5).error,
            Some(StateError::UnknownSpellSlotLevel(5))
        );

        let drained = consume_spell_slot(&update.state, 2).into_state();
        let update = consume_spell_slot(&drained, 2);
        assert!(update.is_unchanged());
        assert!(matches!(
            update.error,
            Some(StateError::InsufficientSpellSlots { level: 2, available: 0, max: 2 })
        ));
    }

    #[test]
    fn test_restore_all_spell_slots() {
        let state = wizard_state();
        let used = consume_spell_slot(&state, 1).into_state();
        let used = consume_spell_slot(&used, 1).into_state();
        let used = consume_spell_slot(&used, 2).into_state();

        let update = restore_spell_slots(&used, SlotLevel::All, RestoreAmount::Max);
        assert_eq!(update.changes.len(), 2);
        assert_eq!(update.state.spell_slots, state.spell_slots);

        let update = restore_spell_slots(&state, SlotLevel::All, RestoreAmount::Max);
        assert!(update.is_unchanged());
        assert_eq!(update.changes, vec!["All spell slots already at maximum"]);

        let partial = restore_spell_slots(&used, SlotLevel::Level(1), RestoreAmount::Amount(1));
        assert_eq!(partial.state.spell_slot(1).unwrap().current, 3);
        assert_eq!(partial.state.spell_slot(2).unwrap().current, 1);
        assert_eq!(
            restore_spell_slots(&used, SlotLevel::Level(9), RestoreAmount::Amount(1)).error,
            Some(StateError::UnknownSpellSlotLevel(9))
        );
    }

    #[test]
    fn test_temp_hp_absorbs_first() {
        let state = gain_temp_hp(&fighter_state(), 5).into_state();
        let update = take_damage(&state, 8);
        assert_eq!(update.state.hit_points.temporary, 0);
        assert_eq!(update.state.hit_points.current, state.hit_points.current - 3);
        assert_eq!(update.changes.len(), 2);
        assert!(update.changes[0].contains("absorbed 5"));
    }

    #[test]
    fn test_temp_hp_soaks_everything() {
        let state = gain_temp_hp(&fighter_state(), 10).into_state();
        let update = take_damage(&state, 4);
        assert_eq!(update.state.hit_points.temporary, 6);
        assert_eq!(update.state.hit_points.current, state.hit_points.current);
        assert_eq!(update.changes.len(), 1);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let state = fighter_state();
        let update = take_damage(&state, 500);
        assert_eq!(update.state.hit_points.current, 0);
        assert!(update.changes.iter().any(|c| c == "Dropped to 0 HP"));
    }

    #[test]
    fn test_non_positive_amounts_are_noops() {
        let state = fighter_state();
        for update in [take_damage(&state, 0), heal(&state, -3), gain_temp_hp(&state, 0)] {
            assert!(update.is_success());
            assert!(update.is_unchanged());
        }
    }

    #[test]
    fn test_heal_caps_at_max() {
        let hurt = take_damage(&fighter_state(), 4).into_state();
        let update = heal(&hurt, 10);
        assert_eq!(update.state.hit_points.current, hurt.hit_points.maximum);
        assert!(update.changes[0].starts_with("Healed 4 HP"));

        let again = heal(&update.state, 1);
        assert!(again.is_unchanged());
        assert_eq!(again.changes, vec!["Already at maximum HP"]);
    }

    #[test]
    fn test_heal_huge_amount_saturates() {
        let hurt = take_damage(&fighter_state(), 5).into_state();
        let update = heal(&hurt, i32::MAX);
        assert!(!update.is_unchanged());
        assert_eq!(update.state.hit_points.current, hurt.hit_points.maximum);
        assert!(update.changes[0].starts_with("Healed 5 HP"));
    }

    #[test]
    fn test_temp_hp_takes_higher() {
        let state = gain_temp_hp(&fighter_state(), 8).into_state();
        let lower = gain_temp_hp(&state, 5);
        assert!(lower.is_unchanged());
        assert_eq!(lower.state.hit_points.temporary, 8);

        let higher = gain_temp_hp(&state, 12);
        assert_eq!(higher.state.hit_points.temporary, 12);
    }

    #[test]
    fn test_short_and_long_rest() {
        let state = wizard_state();
        let worn = consume_resource(&state, "arcane_recovery", 1).into_state();
        let worn = consume_spell_slot(&worn, 1).into_state();
        let mut worn = take_damage(&worn, 5).into_state();
        worn.exhaustion_level = 2;
        worn.death_save_failures = 1;

        // Arcane recovery is a long-rest resource.
        let short = short_rest(&worn);
        assert!(short.is_unchanged());

        let long = long_rest(&worn);
        let rested = long.state.as_ref();
        assert_eq!(rested.resources, state.resources);
        assert_eq!(rested.spell_slots, state.spell_slots);
        assert_eq!(rested.hit_points.current, rested.hit_points.maximum);
        assert_eq!(rested.exhaustion_level, 1);
        assert_eq!(rested.death_save_failures, 0);
    }

    #[test]
    fn test_short_rest_restores_short_rest_resources() {
        let spent = consume_resource(&fighter_state(), "second_wind", 1).into_state();
        let update = short_rest(&spent);
        assert_eq!(update.state.resource("second_wind").unwrap().current, 1);
        assert_eq!(update.changes.len(), 1);
    }

    #[test]
    fn test_action_economy() {
        let state = fighter_state();
        let acted = use_action(&state, ActionKind::Action).into_state();
        assert!(!acted.action_economy.action);

        let again = use_action(&acted, ActionKind::Action);
        assert_eq!(again.error, Some(StateError::ActionUnavailable(ActionKind::Action)));
        assert_eq!(again.error.unwrap().to_string(), "Action already used this turn");

        let moved = spend_movement(&acted, 20).into_state();
        assert_eq!(moved.action_economy.movement_remaining, 10);
        assert!(!spend_movement(&moved, 15).is_success());

        let fresh = start_turn(&moved).into_state();
        assert!(fresh.action_economy.action);
        assert_eq!(fresh.action_economy.movement_remaining, 30);
    }

    #[test]
    fn test_start_turn_while_grappled() {
        let grappled =
            add_condition(&fighter_state(), ActiveCondition::new(Condition::Grappled)).into_state();
        let turn = start_turn(&grappled).into_state();
        assert_eq!(turn.action_economy.movement_remaining, 0);
    }

    #[test]
    fn test_condition_bookkeeping() {
        let state = fighter_state();
        let once = add_condition(&state, ActiveCondition::new(Condition::Prone)).into_state();
        let twice = add_condition(&once, ActiveCondition::new(Condition::Prone)).into_state();
        assert_eq!(twice.conditions.len(), 2);
        assert!(twice.has_condition(Condition::Prone));

        let cleared = remove_condition(&twice, "prone");
        assert!(cleared.state.conditions.is_empty());
        assert!(remove_condition(&state, "prone").is_unchanged());
    }

    #[test]
    fn test_concentration_replaces_previous() {
        let state = wizard_state();
        let first = start_concentration(&state, "Bless", None).into_state();
        let second = start_concentration(&first, "Hold Person", Some("spell".to_string()));
        assert_eq!(second.changes[0], "Stopped concentrating on Bless");
        assert_eq!(second.state.concentration.as_ref().unwrap().effect, "Hold Person");

        let ended = end_concentration(&second.state).into_state();
        assert!(!ended.is_concentrating());
        assert!(end_concentration(&ended).is_unchanged());
    }

    #[test]
    fn test_inspiration() {
        let state = fighter_state();
        let inspired = set_inspiration(&state, true).into_state();
        assert!(inspired.has_inspiration);
        assert!(set_inspiration(&inspired, true).is_unchanged());
    }

    proptest! {
        #[test]
        fn prop_hp_never_negative(temp in 0i32..30, damage in -10i32..200) {
            let state = gain_temp_hp(&fighter_state(), temp).into_state();
            let after = take_damage(&state, damage).into_state();
            prop_assert!(after.hit_points.current >= 0);
            prop_assert!(after.hit_points.temporary >= 0);
            if damage > 0 {
                let absorbed = temp.min(damage);
                prop_assert_eq!(after.hit_points.temporary, temp - absorbed);
                let expected = (state.hit_points.current - (damage - absorbed)).max(0);
                prop_assert_eq!(after.hit_points.current, expected);
            }
        }

        #[test]
        fn prop_temp_hp_takes_max(old in 0i32..50, new in 1i32..50) {
            let state = gain_temp_hp(&fighter_state(), old).into_state();
            let after = gain_temp_hp(&state, new).into_state();
            prop_assert_eq!(after.hit_points.temporary, old.max(new));
        }

        #[test]
        fn prop_overdraw_leaves_state_untouched(extra in 1u32..10) {
            let state = fighter_state();
            let update = consume_resource(&state, "second_wind", 1 + extra);
            prop_assert!(!update.is_success());
            prop_assert_eq!(update.state.as_ref(), &state);
        }
    }
}
