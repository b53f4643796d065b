//! D&D 5e rules engine.
//!
//! This crate provides:
//! - d20 rolls with advantage and disadvantage sources
//! - A data table of condition mechanics and their effect on rolls
//! - Copy-on-write character state with resource, spell slot and HP operations
//! - Combat resolution for attacks, saving throws and related rolls
//!
//! # Quick Start
//!
//! ```
//! use dnd_rules::{
//!     initialize_character_state, resolve_attack, AttackAction, CharacterId, DamageType,
//!     DerivedStats, RngSource,
//! };
//!
//! let derived = DerivedStats::new(20, 2).with_speed(30);
//! let fighter = initialize_character_state(CharacterId::new(), &derived);
//! let goblin = initialize_character_state(CharacterId::new(), &DerivedStats::new(7, 2));
//!
//! let action = AttackAction::new(&fighter, &goblin, 5, "1d8+3", DamageType::Slashing)
//!     .melee_within_5_feet(true);
//! let result = resolve_attack(&action, 15, &mut RngSource::thread())?;
//! for line in &result.log {
//!     println!("{line}");
//! }
//! # Ok::<(), dnd_rules::DiceError>(())
//! ```

pub mod character;
pub mod combat;
pub mod conditions;
pub mod config;
pub mod dice;
pub mod resources;
pub mod roll;
pub mod testing;

// Primary public API
pub use character::{
    clone_character_state, initialize_character_state, reset_to_full_resources, Ability,
    CharacterId, CharacterState, DerivedStats, RestorationType,
};
pub use combat::{
    resolve_attack, resolve_saving_throw, AttackAction, AttackResult, RulesEngine,
    SavingThrowAction, SavingThrowResult,
};
pub use conditions::{ActiveCondition, Condition, ConditionMechanics, CONDITION_MECHANICS};
pub use config::{ConfigError, RulesConfig};
pub use dice::{roll_damage, DamageRoll, DamageType, DiceError, RandomSource, RngSource};
pub use resources::{StateError, StateUpdate};
pub use roll::{make_d20_roll, make_d20_roll_with, RollContext, RollResult, RollState, RollType};
