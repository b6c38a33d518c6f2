//! Combat systems (FixedUpdate)
//!
//! Weapon и aim — owner-authoritative: стреляет и резолвит попадания peer-владелец.
//! Урон идёт в ledger жертвы; ledger у server'а, поэтому client шлёт AuthorityRequest.

use std::collections::HashSet;

use bevy::prelude::*;

use super::aim::{AimInput, AimState};
use super::events::{FireIntent, HolsterIntent, ReloadCompleted, ReloadIntent, ReloadStarted, ShotHit, WeaponFired};
use super::hit::{resolve_hitscan, HitSphere, HitTarget, Projectile, ProjectileStep};
use super::weapon::{FireOutcome, ShotKind, Weapon, WeaponTickEvent};
use crate::life::PlayerLife;
use crate::net::{LocalPeer, NetId, Ownership};
use crate::physics::StaticColliders;
use crate::replication::{AuthorityRequest, ReplicationOutbox, SetOutcome};
use crate::stats::{SourceKind, StatLedger, StatSource};
use crate::DeterministicRng;

type TargetQuery<'w, 's> = Query<'w, 's, (Entity, &'static HitSphere, &'static Transform, Option<&'static PlayerLife>), Without<Projectile>>;

/// Живые hit spheres (кроме `exclude`)
fn collect_targets(targets: &TargetQuery, exclude: Option<Entity>) -> Vec<HitTarget> {
    targets
        .iter()
        .filter(|(entity, _, _, life)| Some(*entity) != exclude && !life.is_some_and(|life| life.is_eliminated()))
        .map(|(entity, sphere, transform, _)| HitTarget {
            entity,
            center: sphere.center(transform.translation),
            radius: sphere.radius,
        })
        .collect()
}

/// Система: owner пересчитывает aim по camera input
pub fn update_aim(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    colliders: Res<StaticColliders>,
    mut query: Query<(Entity, &Ownership, &AimInput, &Transform, &mut AimState)>,
) {
    let now = time.elapsed_secs_f64();

    for (entity, ownership, input, transform, mut aim) in query.iter_mut() {
        if !ownership.is_owner(local.0) {
            continue;
        }
        let (chest, muzzle) = aim.chest_and_muzzle(transform.translation, input.camera_forward);
        if let Err(err) = aim.update(
            local.0,
            now,
            input.camera_origin,
            input.camera_forward,
            chest,
            muzzle,
            &*colliders,
        ) {
            crate::logger::log_warning(&format!("Aim update for {:?} rejected: {}", entity, err));
        }
    }
}

/// Система: ReloadIntent → Weapon::start_reload
pub fn handle_reload_intents(
    local: Res<LocalPeer>,
    mut intents: EventReader<ReloadIntent>,
    mut weapons: Query<&mut Weapon>,
    mut started_events: EventWriter<ReloadStarted>,
) {
    for intent in intents.read() {
        let Ok(mut weapon) = weapons.get_mut(intent.shooter) else {
            crate::logger::log_warning(&format!("ReloadIntent for {:?} ignored: no Weapon", intent.shooter));
            continue;
        };
        match weapon.start_reload(local.0) {
            Ok(true) => {
                started_events.write(ReloadStarted {
                    shooter: intent.shooter,
                    duration: weapon.config.reload_time,
                });
            }
            Ok(false) => {}
            Err(err) => crate::logger::log_warning(&format!("Reload of {:?} rejected: {}", intent.shooter, err)),
        }
    }
}

/// Система: HolsterIntent → holster/equip
///
/// Owner применяет сразу. Остальные peers кладут intent в request channel оружия,
/// оттуда он уходит owner'у как AuthorityRequest::WeaponState.
pub fn handle_holster_intents(
    local: Res<LocalPeer>,
    mut intents: EventReader<HolsterIntent>,
    mut weapons: Query<(&mut Weapon, Option<&NetId>)>,
    mut outbox: ResMut<ReplicationOutbox>,
) {
    for intent in intents.read() {
        let Ok((mut weapon, net_id)) = weapons.get_mut(intent.shooter) else {
            crate::logger::log_warning(&format!("HolsterIntent for {:?} ignored: no Weapon", intent.shooter));
            continue;
        };
        if weapon.set_holstered(local.0, intent.holstered) != SetOutcome::Requested {
            continue;
        }

        let Some(net_id) = net_id.copied() else {
            crate::logger::log_warning(&format!(
                "HolsterIntent for {:?} dropped: remote weapon but no NetId",
                intent.shooter
            ));
            weapon.state_requests.drain().for_each(drop);
            continue;
        };
        for request in weapon.state_requests.drain() {
            outbox.request(AuthorityRequest::WeaponState {
                target: net_id,
                state: request.value,
            });
        }
    }
}

/// Система: FireIntent → Weapon::fire → hitscan / projectile
///
/// Стрелки без intent'а в этом тике отпускают trigger.
#[allow(clippy::too_many_arguments)]
pub fn handle_fire_intents(
    mut commands: Commands,
    local: Res<LocalPeer>,
    colliders: Res<StaticColliders>,
    mut rng: ResMut<DeterministicRng>,
    mut intents: EventReader<FireIntent>,
    mut shooters: Query<(Entity, &mut Weapon, &AimState, Option<&PlayerLife>)>,
    targets: TargetQuery,
    mut fired_events: EventWriter<WeaponFired>,
    mut hit_events: EventWriter<ShotHit>,
    mut reload_events: EventWriter<ReloadStarted>,
) {
    let pressed: HashSet<Entity> = intents.read().map(|intent| intent.shooter).collect();

    for (shooter, mut weapon, aim, life) in shooters.iter_mut() {
        if !weapon.state.is_authority(local.0) {
            continue;
        }
        if !pressed.contains(&shooter) {
            weapon.release_trigger();
            continue;
        }
        if life.is_some_and(|life| life.is_eliminated()) {
            crate::logger::log(&format!("FireIntent from eliminated {:?} ignored", shooter));
            continue;
        }

        // Muzzle тот же, что update_aim проверил на obstruction
        let Some(muzzle) = aim.muzzle() else {
            crate::logger::log_warning(&format!("FireIntent from {:?} ignored: aim not computed yet", shooter));
            continue;
        };
        let aim_point = aim.precise_point(local.0);

        let outcome = match weapon.fire(local.0, aim.is_obstructed(), muzzle, aim_point, &mut rng.rng) {
            Ok(outcome) => outcome,
            Err(err) => {
                crate::logger::log_warning(&format!("Fire of {:?} rejected: {}", shooter, err));
                continue;
            }
        };

        match outcome {
            FireOutcome::Fired(shot) => {
                fired_events.write(WeaponFired {
                    shooter,
                    origin: shot.origin,
                    direction: shot.direction,
                    ammo_left: weapon.ammo_count(),
                });

                match shot.kind {
                    ShotKind::Hitscan { range } => {
                        let candidates = collect_targets(&targets, Some(shooter));
                        if let Some(impact) = resolve_hitscan(&*colliders, shot.origin, shot.direction, range, &candidates) {
                            hit_events.write(ShotHit {
                                shooter,
                                target: impact.target,
                                point: impact.point,
                                normal: impact.normal,
                                damage: shot.damage,
                            });
                        }
                    }
                    ShotKind::Projectile { speed, max_range } => {
                        commands.spawn((
                            Projectile::new(shooter, shot.direction, speed, shot.damage, max_range),
                            Transform::from_translation(shot.origin),
                        ));
                    }
                }
            }
            FireOutcome::ReloadTriggered => {
                reload_events.write(ReloadStarted {
                    shooter,
                    duration: weapon.config.reload_time,
                });
            }
            FireOutcome::Rejected(reason) => {
                crate::logger::log(&format!("{:?} fire rejected: {:?}", shooter, reason));
            }
            FireOutcome::OutOfAmmo => {
                crate::logger::log(&format!("{:?} is out of ammo", shooter));
            }
        }
    }
}

/// Система: таймеры оружия (cooldown, reload, spread recovery)
pub fn tick_weapons(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut weapons: Query<(Entity, &mut Weapon)>,
    mut completed_events: EventWriter<ReloadCompleted>,
) {
    let dt = time.delta_secs();

    for (entity, mut weapon) in weapons.iter_mut() {
        if !weapon.state.is_authority(local.0) {
            continue;
        }
        if let Err(err) = weapon.apply_state_requests(local.0) {
            crate::logger::log_warning(&format!("Weapon requests of {:?} rejected: {}", entity, err));
        }
        match weapon.tick(local.0, dt) {
            Ok(Some(WeaponTickEvent::ReloadCompleted)) => {
                completed_events.write(ReloadCompleted { shooter: entity });
            }
            Ok(None) => {}
            Err(err) => crate::logger::log_warning(&format!("Weapon tick of {:?} rejected: {}", entity, err)),
        }
    }
}

/// Система: полёт снарядов
pub fn tick_projectiles(
    mut commands: Commands,
    time: Res<Time<Fixed>>,
    colliders: Res<StaticColliders>,
    mut projectiles: Query<(Entity, &mut Projectile, &mut Transform)>,
    targets: TargetQuery,
    mut hit_events: EventWriter<ShotHit>,
) {
    let dt = time.delta_secs();

    for (entity, mut projectile, mut transform) in projectiles.iter_mut() {
        let candidates = collect_targets(&targets, Some(projectile.shooter));
        match projectile.step(transform.translation, dt, &*colliders, &candidates) {
            ProjectileStep::Flying(position) => transform.translation = position,
            ProjectileStep::Hit(impact) => {
                hit_events.write(ShotHit {
                    shooter: projectile.shooter,
                    target: impact.target,
                    point: impact.point,
                    normal: impact.normal,
                    damage: projectile.damage,
                });
                commands.entity(entity).despawn();
            }
            ProjectileStep::Expired => {
                commands.entity(entity).despawn();
            }
        }
    }
}

/// Система: ShotHit по игроку → урон в primary stat жертвы
///
/// Ledger authority = этот peer → modify сразу, иначе AuthorityRequest::Damage.
pub fn apply_shot_damage(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut outbox: ResMut<ReplicationOutbox>,
    mut hits: EventReader<ShotHit>,
    net_ids: Query<&NetId>,
    mut ledgers: Query<&mut StatLedger>,
) {
    let now = time.elapsed_secs_f64();

    for hit in hits.read() {
        let Some(target) = hit.target else {
            continue;
        };
        let source_id = net_ids.get(hit.shooter).map_or(0, |id| id.0);

        let Ok(mut ledger) = ledgers.get_mut(target) else {
            crate::logger::log_warning(&format!("ShotHit on {:?} ignored: target has no StatLedger", target));
            continue;
        };

        if ledger.authority() == local.0 {
            let key = ledger.primary();
            let source = StatSource::new(source_id, SourceKind::Damage);
            if let Err(err) = ledger.modify(local.0, key, -hit.damage, source, now) {
                crate::logger::log_warning(&format!("Damage to {:?} rejected: {}", target, err));
            }
            continue;
        }

        let Ok(target_id) = net_ids.get(target) else {
            crate::logger::log_warning(&format!(
                "ShotHit on {:?} dropped: remote ledger but target has no NetId",
                target
            ));
            continue;
        };
        outbox.request(AuthorityRequest::Damage {
            target: *target_id,
            amount: hit.damage,
            source: source_id,
        });
    }
}
