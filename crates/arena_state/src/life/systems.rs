//! Life systems: elimination по ledger, respawn по таймеру, reset зависимых систем

use bevy::prelude::*;

use super::state::{LifeState, PlayerLife, SpawnPoint};
use crate::combat::Weapon;
use crate::config::SimulationConfig;
use crate::movement::{teleport_character, CharacterMotor, MotionState};
use crate::net::{LocalPeer, Ownership};
use crate::stats::StatLedger;

/// Event: life state сменился (на каждом peer'е, включая observers)
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifeStateChanged {
    pub entity: Entity,
    pub from: LifeState,
    pub to: LifeState,
}

/// Система (server): primary stat ушёл в 0 → Eliminated, таймер respawn'а
pub fn eliminate_depleted(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    config: Res<SimulationConfig>,
    mut query: Query<(Entity, &StatLedger, &mut PlayerLife)>,
) {
    let now = time.elapsed_secs_f64();

    for (entity, ledger, mut life) in query.iter_mut() {
        if !life.state.is_authority(local.0) || ledger.is_alive() || life.is_eliminated() {
            continue;
        }
        match life.transition(local.0, LifeState::Eliminated) {
            Ok(_) => {
                life.respawn_at = Some(now + config.respawn_delay as f64);
                crate::logger::log_info(&format!(
                    "{:?} eliminated, respawn in {:.1}s",
                    entity, config.respawn_delay
                ));
            }
            Err(err) => crate::logger::log_warning(&format!("Elimination of {:?} failed: {}", entity, err)),
        }
    }
}

/// Система (server): respawn по таймеру + ledger в max
pub fn respawn_eliminated(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut query: Query<(Entity, &mut PlayerLife, &mut StatLedger)>,
) {
    let now = time.elapsed_secs_f64();

    for (entity, mut life, mut ledger) in query.iter_mut() {
        if !life.state.is_authority(local.0) || !life.is_eliminated() {
            continue;
        }
        // Допуск на накопленную ошибку fixed timestep
        if life.respawn_at.is_some_and(|at| now + 1e-6 < at) {
            continue;
        }

        if let Err(err) = life.transition(local.0, LifeState::Respawned) {
            crate::logger::log_warning(&format!("Respawn of {:?} failed: {}", entity, err));
            continue;
        }
        life.respawn_at = None;

        if let Err(err) = ledger.reset_to_max(local.0) {
            crate::logger::log_warning(&format!("Ledger reset of {:?} failed: {}", entity, err));
        }
        crate::logger::log_info(&format!("{:?} respawned", entity));
    }
}

/// Система (все peers): реакция на смену life state
///
/// Owner сбрасывает то, чем владеет сам: мотор, оружие, позицию (teleport на SpawnPoint).
#[allow(clippy::type_complexity)]
pub fn react_to_life_changes(
    local: Res<LocalPeer>,
    mut query: Query<(
        Entity,
        &Ownership,
        &mut PlayerLife,
        &mut Transform,
        Option<&SpawnPoint>,
        Option<&mut CharacterMotor>,
        Option<&mut Weapon>,
        Option<&mut MotionState>,
    )>,
    mut changed_events: EventWriter<LifeStateChanged>,
) {
    for (entity, ownership, mut life, mut transform, spawn, mut motor, weapon, mut motion) in query.iter_mut() {
        let Some((from, to)) = life.take_observed_change() else {
            continue;
        };
        changed_events.write(LifeStateChanged { entity, from, to });

        if !ownership.is_owner(local.0) {
            continue;
        }

        match to {
            LifeState::Eliminated => {
                if let Some(motor) = motor.as_deref_mut() {
                    motor.reset_forces();
                }
                if let Some(mut weapon) = weapon {
                    weapon.release_trigger();
                }
            }
            LifeState::Respawned => {
                if let Some(motor) = motor.as_deref_mut() {
                    motor.reset();
                }
                if let Some(mut weapon) = weapon {
                    if let Err(err) = weapon.refill(local.0) {
                        crate::logger::log_warning(&format!("Weapon refill of {:?} failed: {}", entity, err));
                    }
                }

                let Some(spawn) = spawn else {
                    crate::logger::log_warning(&format!("{:?} respawned in place: no SpawnPoint", entity));
                    continue;
                };
                if let Err(err) = teleport_character(
                    local.0,
                    &mut transform,
                    motor.as_deref_mut(),
                    motion.as_deref_mut(),
                    spawn.position,
                    Some(spawn.yaw),
                ) {
                    crate::logger::log_warning(&format!("Respawn teleport of {:?} failed: {}", entity, err));
                }
            }
            LifeState::InitialSpawn => {}
        }
    }
}
