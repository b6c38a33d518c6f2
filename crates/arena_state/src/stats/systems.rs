//! Stat systems: регенерация + публикация ledger events в ECS

use bevy::prelude::*;

use super::ledger::{LedgerEvent, StatLedger, StatSource};
use super::stat::StatKey;
use crate::life::PlayerLife;
use crate::net::LocalPeer;

/// Event: stat изменился (UI, HUD, damage numbers)
#[derive(Event, Debug, Clone)]
pub struct StatChanged {
    pub entity: Entity,
    pub key: StatKey,
    pub old: f32,
    pub new: f32,
    pub source: StatSource,
}

/// Event: stat опустился до 0 (edge-triggered, один раз на crossing)
#[derive(Event, Debug, Clone)]
pub struct StatDepleted {
    pub entity: Entity,
    pub key: StatKey,
    pub source: StatSource,
}

/// Event: liveness (primary stat > 0) изменился
#[derive(Event, Debug, Clone)]
pub struct AliveChanged {
    pub entity: Entity,
    pub alive: bool,
}

/// Система: regenerate stats для всех ledgers, которыми владеет этот peer
///
/// Работает в FixedUpdate для детерминизма.
/// Eliminated игрок не регенерирует до respawn, даже если его вылечили.
pub fn regenerate_stats(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut ledgers: Query<(Entity, &mut StatLedger, Option<&PlayerLife>)>,
) {
    let dt = time.delta_secs();
    let now = time.elapsed_secs_f64();

    for (entity, mut ledger, life) in ledgers.iter_mut() {
        if ledger.authority() != local.0 || life.is_some_and(|life| life.is_eliminated()) {
            continue;
        }
        if let Err(err) = ledger.regenerate(local.0, dt, now) {
            crate::logger::log_warning(&format!("Stat regen for {:?} rejected: {}", entity, err));
        }
    }
}

/// Система: LedgerEvent → ECS events (на всех peers, включая observers)
pub fn publish_ledger_events(
    mut ledgers: Query<(Entity, &mut StatLedger)>,
    mut changed_events: EventWriter<StatChanged>,
    mut depleted_events: EventWriter<StatDepleted>,
    mut alive_events: EventWriter<AliveChanged>,
) {
    for (entity, mut ledger) in ledgers.iter_mut() {
        for event in ledger.drain_events() {
            match event {
                LedgerEvent::Changed { key, old, new, source } => {
                    changed_events.write(StatChanged {
                        entity,
                        key,
                        old,
                        new,
                        source,
                    });
                }
                LedgerEvent::Depleted { key, source } => {
                    crate::logger::log(&format!("{:?}: {} depleted by {:?}", entity, key, source.kind));
                    depleted_events.write(StatDepleted { entity, key, source });
                }
                LedgerEvent::AliveChanged { alive } => {
                    alive_events.write(AliveChanged { entity, alive });
                }
            }
        }
    }
}
