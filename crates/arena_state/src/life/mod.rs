//! Life module
//!
//! InitialSpawn → Eliminated ⇄ Respawned. Переходы пишет только server
//! (по depletion primary stat'а и по таймеру respawn'а), реакции — у всех peers.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod state;
pub mod systems;

pub use state::{LifeError, LifeState, PlayerLife, SpawnPoint};
pub use systems::LifeStateChanged;

/// Life Plugin
///
/// Порядок:
/// 1. eliminate_depleted — server: смерть по ledger
/// 2. respawn_eliminated — server: respawn по таймеру
/// 3. react_to_life_changes — все: LifeStateChanged + owner resets
pub struct LifePlugin;

impl Plugin for LifePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<LifeStateChanged>();

        app.add_systems(
            FixedUpdate,
            (
                systems::eliminate_depleted,
                systems::respawn_eliminated,
                systems::react_to_life_changes,
            )
                .chain()
                .in_set(SimulationSet::Life),
        );
    }
}
