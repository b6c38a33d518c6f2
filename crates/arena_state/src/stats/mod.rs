//! Stats module
//!
//! ECS ответственность:
//! - StatLedger: Health/Stamina/... с min/max/regen, мутации только authority (server)
//! - Events: StatChanged, StatDepleted, AliveChanged
//!
//! Damage/heal/consumption приходят из combat и interaction через `StatLedger::modify`.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod ledger;
pub mod stat;
pub mod systems;


pub use ledger::{LedgerError, LedgerEvent, SourceKind, StatLedger, StatSource, StatsUpdate};
pub use stat::{Stat, StatDef, StatKey};
pub use systems::{AliveChanged, StatChanged, StatDepleted};

/// Stats Plugin
///
/// Порядок:
/// 1. regenerate_stats — регенерация (authority)
/// 2. publish_ledger_events — LedgerEvent → ECS events
pub struct StatsPlugin;

impl Plugin for StatsPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<StatChanged>()
            .add_event::<StatDepleted>()
            .add_event::<AliveChanged>();

        app.add_systems(
            FixedUpdate,
            (systems::regenerate_stats, systems::publish_ledger_events)
                .chain()
                .in_set(SimulationSet::Stats),
        );
    }
}
