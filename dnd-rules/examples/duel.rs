//! Two fighters trade blows until one drops.
//!
//! Run with: `RUST_LOG=dnd_rules=debug cargo run -p dnd-rules --example duel -- 42`
//! The optional argument seeds the dice.

use dnd_rules::combat::RulesEngine;
use dnd_rules::resources::start_turn;
use dnd_rules::testing::sample_fighter;
use dnd_rules::{AttackAction, CharacterId, CharacterState, DamageType, RngSource, RulesConfig};

const ARMOR_CLASS: i32 = 16;
const MAX_ROUNDS: u32 = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let seed = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 7,
    };
    let mut rng = RngSource::seeded(seed);
    let engine = RulesEngine::new(RulesConfig::default().with_critical_threshold(19));

    let mut fighters = [
        ("Roland", engine.initialize_character_state(CharacterId::new(), &sample_fighter())),
        ("Brakka", engine.initialize_character_state(CharacterId::new(), &sample_fighter())),
    ];

    println!("=== Duel (seed {seed}) ===\n");

    for (name, state) in fighters.iter_mut() {
        let initiative = engine.roll_initiative(state, 1, &mut rng);
        println!("{name}: {}", initiative.log.join(" "));
        *state = initiative.updated_state;
    }
    if fighters[1].1.initiative > fighters[0].1.initiative {
        fighters.swap(0, 1);
    }

    for round in 1..=MAX_ROUNDS {
        println!("\n--- Round {round} ---");
        for attacker in 0..2 {
            let defender = 1 - attacker;
            let (attacker_name, attacker_state) = &fighters[attacker];
            let attacker_state: CharacterState = start_turn(attacker_state).into_state();

            let action = AttackAction::new(
                &attacker_state,
                &fighters[defender].1,
                5,
                "1d8+3",
                DamageType::Slashing,
            )
            .melee_within_5_feet(true);
            let result = engine.resolve_attack(&action, ARMOR_CLASS, &mut rng)?;

            println!("{attacker_name} swings:");
            for line in &result.log {
                println!("  {line}");
            }

            let attacker_name = *attacker_name;
            fighters[attacker].1 = attacker_state;
            if let Some(updated) = result.updated_defender {
                fighters[defender].1 = updated;
            }
            if fighters[defender].1.hit_points.is_at_zero() {
                println!("\n{} falls. {attacker_name} wins!", fighters[defender].0);
                return Ok(());
            }
        }
    }

    println!("\nBoth fighters are still standing after {MAX_ROUNDS} rounds.");
    Ok(())
}
