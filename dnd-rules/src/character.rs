//! Character runtime state.
//!
//! [`DerivedStats`] is what character creation hands us: maxima only.
//! [`CharacterState`] is the mutable gameplay record built from it once and
//! then threaded through every operation in [`crate::resources`] and
//! [`crate::combat`], which return new values instead of mutating.

use crate::conditions::{ActiveCondition, Condition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Ability::Strength => "Strength",
            Ability::Dexterity => "Dexterity",
            Ability::Constitution => "Constitution",
            Ability::Intelligence => "Intelligence",
            Ability::Wisdom => "Wisdom",
            Ability::Charisma => "Charisma",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

// ============================================================================
// Derived stats (input boundary)
// ============================================================================

/// Movement speeds. `walk` is optional because some derivations omit it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speed {
    pub walk: Option<u32>,
    pub swim: Option<u32>,
    pub fly: Option<u32>,
    pub climb: Option<u32>,
}

impl Speed {
    pub fn new(walk: u32) -> Self {
        Self {
            walk: Some(walk),
            ..Self::default()
        }
    }
}

/// When a limited-use resource comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorationType {
    ShortRest,
    LongRest,
    Dawn,
    /// Only restored explicitly by the host.
    Manual,
}

/// A resource as declared by character derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    pub id: String,
    pub max: u32,
    pub restoration: RestorationType,
}

impl ResourceDefinition {
    pub fn new(id: impl Into<String>, max: u32, restoration: RestorationType) -> Self {
        Self {
            id: id.into(),
            max,
            restoration,
        }
    }
}

/// Snapshot produced by character derivation (class, species, level).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStats {
    /// Maximum hit points.
    pub hit_points: i32,
    pub proficiency_bonus: i32,
    #[serde(default)]
    pub speed: Speed,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
    /// Spell level to slot count. `None` for non-casters.
    #[serde(default)]
    pub spell_slots: Option<BTreeMap<u8, u32>>,
}

impl DerivedStats {
    pub fn new(hit_points: i32, proficiency_bonus: i32) -> Self {
        Self {
            hit_points,
            proficiency_bonus,
            speed: Speed::default(),
            resources: Vec::new(),
            spell_slots: None,
        }
    }

    pub fn with_speed(mut self, walk: u32) -> Self {
        self.speed = Speed::new(walk);
        self
    }

    pub fn with_resource(mut self, resource: ResourceDefinition) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_spell_slots(mut self, slots: impl IntoIterator<Item = (u8, u32)>) -> Self {
        self.spell_slots = Some(slots.into_iter().collect());
        self
    }

    /// Parse derivation output delivered as JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Runtime state
// ============================================================================

/// Hit points tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
    /// Separate absorbing pool, spent before `current`.
    pub temporary: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
            temporary: 0,
        }
    }

    pub fn is_at_zero(&self) -> bool {
        self.current <= 0
    }
}

/// Tracked uses of a limited resource. `current` stays within `0..=max`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceState {
    pub current: u32,
    pub max: u32,
    pub restoration: RestorationType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlotState {
    pub current: u32,
    pub max: u32,
}

/// What the character may still do this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEconomy {
    pub action: bool,
    pub bonus_action: bool,
    pub reaction: bool,
    pub movement_remaining: u32,
}

impl ActionEconomy {
    pub fn fresh(movement: u32) -> Self {
        Self {
            action: true,
            bonus_action: true,
            reaction: true,
            movement_remaining: movement,
        }
    }
}

/// The single effect a character is concentrating on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concentration {
    pub effect: String,
    pub source: Option<String>,
}

/// Mutable gameplay record for one combatant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterState {
    pub character_id: CharacterId,
    pub hit_points: HitPoints,
    pub resources: BTreeMap<String, ResourceState>,
    /// `None` means not a spellcaster, distinct from an empty table.
    pub spell_slots: Option<BTreeMap<u8, SpellSlotState>>,
    /// Duplicates are allowed and each one counts.
    pub conditions: Vec<ActiveCondition>,
    pub concentration: Option<Concentration>,
    pub action_economy: ActionEconomy,
    pub death_save_successes: u8,
    pub death_save_failures: u8,
    pub initiative: Option<i32>,
    pub exhaustion_level: u8,
    pub has_inspiration: bool,
    /// Walking speed the action economy resets to.
    pub walk_speed: u32,
}

impl CharacterState {
    /// Build a fresh state from derived stats: everything at maximum.
    pub fn from_derived(id: CharacterId, derived: &DerivedStats, default_walk_speed: u32) -> Self {
        let walk_speed = derived.speed.walk.unwrap_or(default_walk_speed);

        let resources = derived
            .resources
            .iter()
            .map(|def| {
                (
                    def.id.clone(),
                    ResourceState {
                        current: def.max,
                        max: def.max,
                        restoration: def.restoration,
                    },
                )
            })
            .collect();

        let spell_slots = derived.spell_slots.as_ref().map(|slots| {
            slots
                .iter()
                .map(|(&level, &max)| (level, SpellSlotState { current: max, max }))
                .collect()
        });

        Self {
            character_id: id,
            hit_points: HitPoints::new(derived.hit_points),
            resources,
            spell_slots,
            conditions: Vec::new(),
            concentration: None,
            action_economy: ActionEconomy::fresh(walk_speed),
            death_save_successes: 0,
            death_save_failures: 0,
            initiative: None,
            exhaustion_level: 0,
            has_inspiration: false,
            walk_speed,
        }
    }

    pub fn resource(&self, id: &str) -> Option<&ResourceState> {
        self.resources.get(id)
    }

    pub fn spell_slot(&self, level: u8) -> Option<&SpellSlotState> {
        self.spell_slots.as_ref().and_then(|slots| slots.get(&level))
    }

    pub fn is_spellcaster(&self) -> bool {
        self.spell_slots.is_some()
    }

    pub fn has_condition(&self, condition: Condition) -> bool {
        self.conditions
            .iter()
            .any(|active| active.condition_id == condition.id())
    }

    pub fn is_concentrating(&self) -> bool {
        self.concentration.is_some()
    }
}

/// Initialize runtime state with the default rules configuration.
pub fn initialize_character_state(id: CharacterId, derived: &DerivedStats) -> CharacterState {
    CharacterState::from_derived(id, derived, crate::config::DEFAULT_WALK_SPEED)
}

/// Independent copy of `state`; mutating one never affects the other.
pub fn clone_character_state(state: &CharacterState) -> CharacterState {
    state.clone()
}

/// Everything back to maximum: resources, slots, HP. Temp HP and death saves
/// are cleared. Conditions and concentration are left alone.
pub fn reset_to_full_resources(state: &CharacterState) -> CharacterState {
    let mut next = state.clone();
    for resource in next.resources.values_mut() {
        resource.current = resource.max;
    }
    if let Some(slots) = next.spell_slots.as_mut() {
        for slot in slots.values_mut() {
            slot.current = slot.max;
        }
    }
    next.hit_points.current = next.hit_points.maximum;
    next.hit_points.temporary = 0;
    next.death_save_successes = 0;
    next.death_save_failures = 0;
    next
}
