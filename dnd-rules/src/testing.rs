//! Testing utilities for the rules engine.
//!
//! This module provides:
//! - `ScriptedRolls`, a [`RandomSource`] that hands out queued die faces
//! - Derived-stat fixtures for a fighter and a wizard

use crate::character::{
    initialize_character_state, CharacterId, CharacterState, DerivedStats, ResourceDefinition,
    RestorationType,
};
use crate::dice::RandomSource;
use std::collections::VecDeque;

/// Deterministic dice: each roll takes the next queued face.
///
/// Panics when the queue runs dry or a face doesn't fit the die, which
/// surfaces a test that rolls more (or different) dice than it expects.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRolls {
    faces: VecDeque<u32>,
}

impl ScriptedRolls {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    /// Faces not yet consumed.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }

    fn next_face(&mut self) -> u32 {
        match self.faces.pop_front() {
            Some(face) => face,
            None => panic!("ScriptedRolls exhausted"),
        }
    }
}

impl RandomSource for ScriptedRolls {
    /// Reads the next face as a d20 face. Panics on anything outside `1..=20`.
    fn next_unit(&mut self) -> f64 {
        let face = self.next_face();
        assert!(
            (1..=20).contains(&face),
            "scripted face {face} does not fit a d20"
        );
        (f64::from(face) - 0.5) / 20.0
    }

    fn roll_die(&mut self, sides: u32) -> u32 {
        let face = self.next_face();
        assert!(
            (1..=sides).contains(&face),
            "scripted face {face} does not fit a d{sides}"
        );
        face
    }
}

/// Level 1 fighter: 20 HP, walk 30, Second Wind and Action Surge.
pub fn sample_fighter() -> DerivedStats {
    DerivedStats::new(20, 2)
        .with_speed(30)
        .with_resource(ResourceDefinition::new("second_wind", 1, RestorationType::ShortRest))
        .with_resource(ResourceDefinition::new("action_surge", 1, RestorationType::ShortRest))
}

/// Level 3 wizard: 14 HP, Arcane Recovery, four 1st- and two 2nd-level slots.
pub fn sample_wizard() -> DerivedStats {
    DerivedStats::new(14, 2)
        .with_speed(30)
        .with_resource(ResourceDefinition::new("arcane_recovery", 1, RestorationType::LongRest))
        .with_spell_slots([(1, 4), (2, 2)])
}

/// Fresh runtime state for [`sample_fighter`].
pub fn fighter_state() -> CharacterState {
    initialize_character_state(CharacterId::new(), &sample_fighter())
}

/// Fresh runtime state for [`sample_wizard`].
pub fn wizard_state() -> CharacterState {
    initialize_character_state(CharacterId::new(), &sample_wizard())
}
