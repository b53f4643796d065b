//! QA tests for resource, spell slot and rest bookkeeping across a day.
//!
//! Run with: `cargo test -p dnd-rules --test qa_resources`

use dnd_rules::resources::{
    consume_resource, consume_spell_slot, long_rest, restore_resource, restore_spell_slots,
    short_rest, RestoreAmount, SlotLevel,
};
use dnd_rules::testing::{fighter_state, wizard_state};
use dnd_rules::{DerivedStats, RulesEngine, StateError};

// =============================================================================
// TEST 1: Failures leave state untouched
// =============================================================================

#[test]
fn test_failed_operations_return_input() {
    let fighter = fighter_state();

    for update in [
        consume_resource(&fighter, "rage", 1),
        consume_resource(&fighter, "second_wind", 2),
        consume_spell_slot(&fighter, 1),
        restore_spell_slots(&fighter, SlotLevel::All, RestoreAmount::Max),
    ] {
        assert!(!update.is_success());
        assert!(update.is_unchanged());
        assert_eq!(update.state.as_ref(), &fighter);
        println!("{}", update.error.unwrap());
    }
}

// =============================================================================
// TEST 2: A wizard's adventuring day
// =============================================================================

#[test]
fn test_wizard_day() {
    let morning = wizard_state();

    let state = consume_spell_slot(&morning, 1).into_state();
    let state = consume_spell_slot(&state, 1).into_state();
    let state = consume_spell_slot(&state, 2).into_state();
    let state = consume_spell_slot(&state, 2).into_state();

    let out = consume_spell_slot(&state, 2);
    assert_eq!(
        out.error,
        Some(StateError::InsufficientSpellSlots { level: 2, available: 0, max: 2 })
    );

    let state = consume_resource(&state, "arcane_recovery", 1).into_state();
    let state =
        restore_spell_slots(&state, SlotLevel::Level(1), RestoreAmount::Amount(2)).into_state();
    assert_eq!(state.spell_slot(1).unwrap().current, 4);

    // Arcane recovery only comes back on a long rest.
    let after_short = short_rest(&state);
    assert!(after_short.is_unchanged());
    assert!(!restore_resource(&state, "arcane_recovery", RestoreAmount::Max).is_unchanged());

    let evening = long_rest(&state).into_state();
    assert_eq!(evening.spell_slots, morning.spell_slots);
    assert_eq!(evening.resources, morning.resources);
}

// =============================================================================
// TEST 3: State from JSON derivation output
// =============================================================================

#[test]
fn test_state_from_json_derivation() {
    let derived = DerivedStats::from_json(
        r#"{
            "hit_points": 31,
            "proficiency_bonus": 2,
            "resources": [
                { "id": "rage", "max": 3, "restoration": "long_rest" },
                { "id": "reckless_attack", "max": 1, "restoration": "manual" }
            ]
        }"#,
    )
    .unwrap();

    let engine = RulesEngine::default();
    let barbarian = engine.initialize_character_state(Default::default(), &derived);
    assert_eq!(barbarian.walk_speed, 30);
    assert_eq!(barbarian.resource("rage").unwrap().current, 3);

    let raging = consume_resource(&barbarian, "rage", 1).into_state();
    let rested = long_rest(&raging).into_state();
    assert_eq!(rested.resource("rage").unwrap().current, 3);

    let json = serde_json::to_string(&rested).unwrap();
    let restored: dnd_rules::CharacterState = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, rested);
}
