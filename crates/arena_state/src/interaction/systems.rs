//! Interaction systems (FixedUpdate)
//!
//! Sequence исполняет owner interactable'а (обычно server). Команды effects
//! применяются там, где живёт authority цели: мотор у owner'а персонажа,
//! ledger у server'а. Чужое — через AuthorityRequest.

use bevy::prelude::*;

use super::effect::EffectCommand;
use super::events::{CancelInteraction, EffectCue, InteractionCommand, InteractionFinished, InteractionRequest};
use super::interactable::{Interactable, TriggerVolume};
use super::trigger::{InteractorInfo, TriggerEvent};
use crate::life::PlayerLife;
use crate::movement::{teleport_character, CharacterMotor, MotionState, MovementInput};
use crate::net::{LocalPeer, NetId, Ownership, PeerId};
use crate::replication::{AuthorityRequest, ReplicationOutbox};
use crate::stats::{SourceKind, StatLedger, StatSource};

type InteractorQuery<'w, 's> = Query<
    'w,
    's,
    (&'static Transform, Option<&'static Ownership>, Option<&'static PlayerLife>),
    Without<Interactable>,
>;

fn interactor_info(interactors: &InteractorQuery, entity: Entity) -> Option<InteractorInfo> {
    let (transform, ownership, life) = interactors.get(entity).ok()?;
    Some(InteractorInfo {
        entity,
        peer: ownership.map_or(PeerId::SERVER, |ownership| ownership.owner),
        alive: !life.is_some_and(|life| life.is_eliminated()),
        position: transform.translation,
    })
}

/// Система: персонаж вошёл в TriggerVolume → InteractionRequest(VolumeEnter)
pub fn detect_volume_entries(
    local: Res<LocalPeer>,
    mut volumes: Query<(Entity, &Ownership, &Transform, &mut TriggerVolume), With<Interactable>>,
    characters: Query<(Entity, &Transform), (With<MovementInput>, Without<TriggerVolume>)>,
    mut requests: EventWriter<InteractionRequest>,
) {
    for (target, ownership, transform, mut volume) in volumes.iter_mut() {
        if !ownership.is_owner(local.0) {
            continue;
        }
        let center = transform.translation;

        let mut inside = std::collections::HashSet::new();
        for (interactor, character) in characters.iter() {
            if !volume.contains(center, character.translation) {
                continue;
            }
            inside.insert(interactor);
            if !volume.inside.contains(&interactor) {
                requests.write(InteractionRequest {
                    interactor,
                    target,
                    trigger: TriggerEvent::VolumeEnter,
                });
            }
        }
        volume.inside = inside;
    }
}

/// Система: InteractionRequest → trigger gate → старт EffectSequence
///
/// Interactable чужой → AuthorityRequest::Interact его owner'у.
pub fn handle_interaction_requests(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut outbox: ResMut<ReplicationOutbox>,
    mut requests: EventReader<InteractionRequest>,
    mut interactables: Query<(&Ownership, &mut Interactable)>,
    interactors: InteractorQuery,
    net_ids: Query<&NetId>,
) {
    let now = time.elapsed_secs_f64();

    for request in requests.read() {
        let Ok((ownership, mut interactable)) = interactables.get_mut(request.target) else {
            crate::logger::log_warning(&format!(
                "InteractionRequest for {:?} ignored: not an Interactable",
                request.target
            ));
            continue;
        };

        if !ownership.is_owner(local.0) {
            match (net_ids.get(request.interactor), net_ids.get(request.target)) {
                (Ok(interactor), Ok(target)) => outbox.request(AuthorityRequest::Interact {
                    interactor: *interactor,
                    target: *target,
                    trigger: request.trigger,
                }),
                _ => crate::logger::log_warning(&format!(
                    "InteractionRequest for {:?} dropped: remote interactable without NetId",
                    request.target
                )),
            }
            continue;
        }

        let Some(info) = interactor_info(&interactors, request.interactor) else {
            crate::logger::log_warning(&format!(
                "InteractionRequest from {:?} ignored: interactor has no Transform",
                request.interactor
            ));
            continue;
        };

        match interactable.begin(request.trigger, &info, request.target, now) {
            Ok(_) => crate::logger::log(&format!(
                "{:?} started interaction with {:?} ({:?})",
                request.interactor, request.target, request.trigger
            )),
            Err(reason) => crate::logger::log(&format!(
                "Interaction {:?} → {:?} rejected: {:?}",
                request.interactor, request.target, reason
            )),
        }
    }
}

/// Система: cancel requests + тик активных sequences
///
/// Cancel чужого interactable'а уходит его owner'у (AuthorityRequest::Cancel).
#[allow(clippy::too_many_arguments)]
pub fn run_effect_sequences(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut outbox: ResMut<ReplicationOutbox>,
    mut cancels: EventReader<CancelInteraction>,
    mut interactables: Query<(Entity, &Ownership, &mut Interactable)>,
    interactors: InteractorQuery,
    net_ids: Query<&NetId>,
    mut commands_out: EventWriter<InteractionCommand>,
    mut finished_events: EventWriter<InteractionFinished>,
) {
    let dt = time.delta_secs();
    let now = time.elapsed_secs_f64();

    for cancel in cancels.read() {
        let Ok((_, ownership, interactable)) = interactables.get(cancel.target) else {
            crate::logger::log_warning(&format!(
                "CancelInteraction for {:?} ignored: not an Interactable",
                cancel.target
            ));
            continue;
        };

        if !ownership.is_owner(local.0) {
            match net_ids.get(cancel.target) {
                Ok(target) => outbox.request(AuthorityRequest::Cancel { target: *target }),
                Err(_) => crate::logger::log_warning(&format!(
                    "CancelInteraction for {:?} dropped: remote interactable without NetId",
                    cancel.target
                )),
            }
            continue;
        }

        if !interactable.cancel() {
            crate::logger::log(&format!("CancelInteraction for {:?}: nothing running", cancel.target));
        }
    }

    let mut buffer = Vec::new();
    for (source, ownership, mut interactable) in interactables.iter_mut() {
        if !ownership.is_owner(local.0) {
            continue;
        }
        let Some(sequence) = interactable.active_sequence() else {
            continue;
        };
        let interactor = sequence.context().interactor;
        let interactor_valid = interactor_info(&interactors, interactor).is_some_and(|info| info.alive);

        let finished = interactable.tick(dt, interactor_valid, now, &mut buffer);
        for command in buffer.drain(..) {
            commands_out.write(InteractionCommand { source, command });
        }

        if let Some((ctx, outcome)) = finished {
            crate::logger::log_info(&format!(
                "Interaction {:?} → {:?} finished: {:?}",
                ctx.interactor, ctx.source, outcome
            ));
            finished_events.write(InteractionFinished {
                target: ctx.source,
                interactor: ctx.interactor,
                outcome,
            });
        }
    }
}

/// Система: EffectCommand → мир (или AuthorityRequest, если цель чужая)
#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn apply_interaction_commands(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut outbox: ResMut<ReplicationOutbox>,
    mut incoming: EventReader<InteractionCommand>,
    net_ids: Query<&NetId>,
    mut characters: Query<(&Ownership, &mut Transform, Option<&mut CharacterMotor>, Option<&mut MotionState>)>,
    mut ledgers: Query<&mut StatLedger>,
    mut cue_events: EventWriter<EffectCue>,
) {
    let now = time.elapsed_secs_f64();

    for InteractionCommand { source, command } in incoming.read() {
        match command {
            EffectCommand::ApplyForce { target, impulse } => {
                let Ok((ownership, _, motor, _)) = characters.get_mut(*target) else {
                    crate::logger::log_warning(&format!("Force effect on {:?} ignored: not a character", target));
                    continue;
                };
                if !ownership.is_owner(local.0) {
                    if let Ok(target_id) = net_ids.get(*target) {
                        outbox.request(AuthorityRequest::Impulse {
                            target: *target_id,
                            impulse: *impulse,
                        });
                    }
                    continue;
                }
                match motor {
                    Some(mut motor) => motor.add_force(*impulse),
                    None => crate::logger::log_warning(&format!("Force effect on {:?} ignored: no CharacterMotor", target)),
                }
            }
            EffectCommand::Teleport { target, destination, yaw } => {
                let Ok((ownership, mut transform, mut motor, mut motion)) = characters.get_mut(*target) else {
                    crate::logger::log_warning(&format!("Teleport effect on {:?} ignored: not a character", target));
                    continue;
                };
                if !ownership.is_owner(local.0) {
                    if let Ok(target_id) = net_ids.get(*target) {
                        outbox.request(AuthorityRequest::Teleport {
                            target: *target_id,
                            position: *destination,
                            yaw: *yaw,
                        });
                    }
                    continue;
                }
                if let Err(err) = teleport_character(
                    local.0,
                    &mut transform,
                    motor.as_deref_mut(),
                    motion.as_deref_mut(),
                    *destination,
                    *yaw,
                ) {
                    crate::logger::log_warning(&format!("Teleport of {:?} failed: {}", target, err));
                }
            }
            EffectCommand::ModifyStat { target, key, delta } => {
                let source_id = net_ids.get(*source).map_or(0, |id| id.0);
                let Ok(mut ledger) = ledgers.get_mut(*target) else {
                    crate::logger::log_warning(&format!("Stat effect on {:?} ignored: no StatLedger", target));
                    continue;
                };
                if ledger.authority() == local.0 {
                    let stat_source = StatSource::new(source_id, SourceKind::Effect);
                    if let Err(err) = ledger.modify(local.0, *key, *delta, stat_source, now) {
                        crate::logger::log_warning(&format!("Stat effect on {:?} rejected: {}", target, err));
                    }
                } else if let Ok(target_id) = net_ids.get(*target) {
                    outbox.request(AuthorityRequest::ModifyStat {
                        target: *target_id,
                        key: *key,
                        delta: *delta,
                        source: source_id,
                    });
                }
            }
            EffectCommand::StartCue { kind, name, at } | EffectCommand::StopCue { kind, name, at } => {
                cue_events.write(EffectCue {
                    source: *at,
                    kind: *kind,
                    name: name.clone(),
                    active: matches!(command, EffectCommand::StartCue { .. }),
                });
            }
            EffectCommand::Despawn { entity } => {
                crate::logger::log_info(&format!("Interactable {:?} despawned by effect", entity));
                commands.entity(*entity).despawn();
            }
        }
    }
}

/// Система: delayed self-removal после завершения single-use interaction
pub fn despawn_expired_interactables(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    interactables: Query<(Entity, &Ownership, &Interactable)>,
) {
    let now = time.elapsed_secs_f64();

    for (entity, ownership, interactable) in interactables.iter() {
        if !ownership.is_owner(local.0) {
            continue;
        }
        if interactable.removal_at().is_some_and(|at| now + 1e-6 >= at) {
            crate::logger::log_info(&format!("Interactable {:?} removed", entity));
            commands.entity(entity).despawn();
        }
    }
}
