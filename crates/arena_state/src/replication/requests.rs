//! Authority side: выполнение AuthorityRequest, пришедших от других peers
//!
//! Request выполняется, только если этот peer действительно authority цели
//! (ledger → authority ledger'а, мотор и оружие → owner, interactable → owner).
//! Иначе warning и drop:
//! transport доставил request не тому peer'у.

use std::collections::HashMap;

use bevy::prelude::*;

use super::channel::SetRequest;
use super::delta::{AuthorityRequest, ReplicationInbox};
use crate::combat::Weapon;
use crate::interaction::{CancelInteraction, InteractionRequest};
use crate::movement::{teleport_character, CharacterMotor, MotionState};
use crate::net::{LocalPeer, NetId, Ownership, PeerId};
use crate::stats::{SourceKind, StatKey, StatLedger, StatSource};

#[allow(clippy::too_many_arguments, clippy::type_complexity)]
pub fn process_authority_requests(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut inbox: ResMut<ReplicationInbox>,
    ids: Query<(Entity, &NetId)>,
    mut ledgers: Query<&mut StatLedger>,
    mut characters: Query<(&Ownership, &mut Transform, Option<&mut CharacterMotor>, Option<&mut MotionState>)>,
    mut weapons: Query<&mut Weapon>,
    owners: Query<&Ownership>,
    mut interaction_requests: EventWriter<InteractionRequest>,
    mut cancel_events: EventWriter<CancelInteraction>,
) {
    let requests = inbox.take_requests();
    if requests.is_empty() {
        return;
    }
    let now = time.elapsed_secs_f64();
    let index: HashMap<NetId, Entity> = ids.iter().map(|(entity, net_id)| (*net_id, entity)).collect();

    for (sender, request) in requests {
        match request {
            AuthorityRequest::Damage { target, amount, source } => {
                let Some(mut ledger) = index.get(&target).and_then(|entity| ledgers.get_mut(*entity).ok()) else {
                    drop_request(sender, "damage", target);
                    continue;
                };
                let key = ledger.primary();
                modify_ledger(local.0, &mut ledger, key, -amount, StatSource::new(source, SourceKind::Damage), now);
            }
            AuthorityRequest::ModifyStat { target, key, delta, source } => {
                let Some(mut ledger) = index.get(&target).and_then(|entity| ledgers.get_mut(*entity).ok()) else {
                    drop_request(sender, "modify_stat", target);
                    continue;
                };
                modify_ledger(local.0, &mut ledger, key, delta, StatSource::new(source, SourceKind::Effect), now);
            }
            AuthorityRequest::Impulse { target, impulse } => {
                let Some((ownership, _, motor, _)) = index.get(&target).and_then(|entity| characters.get_mut(*entity).ok())
                else {
                    drop_request(sender, "impulse", target);
                    continue;
                };
                match motor {
                    Some(mut motor) if ownership.is_owner(local.0) => motor.add_force(impulse),
                    _ => drop_request(sender, "impulse", target),
                }
            }
            AuthorityRequest::Teleport { target, position, yaw } => {
                let Some((ownership, mut transform, mut motor, mut motion)) =
                    index.get(&target).and_then(|entity| characters.get_mut(*entity).ok())
                else {
                    drop_request(sender, "teleport", target);
                    continue;
                };
                if !ownership.is_owner(local.0) {
                    drop_request(sender, "teleport", target);
                    continue;
                }
                if let Err(err) = teleport_character(
                    local.0,
                    &mut transform,
                    motor.as_deref_mut(),
                    motion.as_deref_mut(),
                    position,
                    yaw,
                ) {
                    crate::logger::log_warning(&format!("Teleport request for {:?} failed: {}", target, err));
                }
            }
            AuthorityRequest::Interact { interactor, target, trigger } => {
                match (index.get(&interactor), index.get(&target)) {
                    (Some(interactor), Some(target)) => {
                        interaction_requests.write(InteractionRequest {
                            interactor: *interactor,
                            target: *target,
                            trigger,
                        });
                    }
                    _ => drop_request(sender, "interact", target),
                }
            }
            AuthorityRequest::Cancel { target } => {
                let owned = index
                    .get(&target)
                    .filter(|entity| owners.get(**entity).is_ok_and(|ownership| ownership.is_owner(local.0)));
                match owned {
                    Some(entity) => {
                        cancel_events.write(CancelInteraction { target: *entity });
                    }
                    None => drop_request(sender, "cancel", target),
                }
            }
            AuthorityRequest::WeaponState { target, state } => {
                // Применится в tick_weapons через Weapon::apply_state_requests
                match index.get(&target).and_then(|entity| weapons.get_mut(*entity).ok()) {
                    Some(mut weapon) if weapon.state.is_authority(local.0) => {
                        weapon.state_requests.submit(SetRequest {
                            requester: sender,
                            value: state,
                        });
                    }
                    _ => drop_request(sender, "weapon_state", target),
                }
            }
        }
    }
}

fn modify_ledger(local: PeerId, ledger: &mut StatLedger, key: StatKey, delta: f32, source: StatSource, now: f64) {
    if let Err(err) = ledger.modify(local, key, delta, source, now) {
        crate::logger::log_warning(&format!("Stat request ({} {:+}) rejected: {}", key, delta, err));
    }
}

fn drop_request(sender: PeerId, kind: &str, target: NetId) {
    crate::logger::log_warning(&format!(
        "{} request from {} for {:?} dropped: target unknown or not owned here",
        kind, sender, target
    ));
}
