//! Platform systems + rider tracking

use bevy::prelude::*;

use super::waypoint::PlatformMover;
use crate::movement::{CharacterMotor, DisplacementHook, MotionState};
use crate::net::{LocalPeer, Ownership};
use crate::physics::{ColliderId, StaticColliders};

/// Box collider платформы в StaticColliders (центр = Transform + offset)
#[derive(Component, Debug, Clone, Copy, Reflect)]
#[reflect(Component)]
pub struct PlatformCollider {
    pub box_id: u32,
    pub offset: Vec3,
}

/// Персонаж стоит на платформе
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct PlatformRider {
    pub platform: Entity,
}

/// Система: authority двигает платформы по пути
///
/// Observers получают position через MotionState, collider подтягивается к Transform.
pub fn tick_platforms(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    mut colliders: ResMut<StaticColliders>,
    mut platforms: Query<(
        Entity,
        &Ownership,
        &mut PlatformMover,
        &mut Transform,
        Option<&PlatformCollider>,
        Option<&mut MotionState>,
    )>,
) {
    let dt = time.delta_secs();

    for (entity, ownership, mut mover, mut transform, collider, motion) in platforms.iter_mut() {
        if ownership.is_owner(local.0) {
            mover.tick(dt);
            transform.translation = mover.position();

            if let Some(mut motion) = motion {
                if let Err(err) = motion.record(local.0, transform.translation, 0.0, false) {
                    crate::logger::log_warning(&format!("Platform {:?} motion not recorded: {}", entity, err));
                }
            }
        } else {
            // Transform уже подтянут sync_remote_motion прошлого тика
            mover.follow(transform.translation);
        }

        if let Some(collider) = collider {
            sync_collider(&mut colliders, entity, collider, transform.translation);
        }
    }
}

fn sync_collider(colliders: &mut StaticColliders, entity: Entity, collider: &PlatformCollider, position: Vec3) {
    let Some(center) = colliders.box_center(collider.box_id) else {
        crate::logger::log_warning(&format!(
            "Platform {:?}: collider box {} missing in StaticColliders",
            entity, collider.box_id
        ));
        return;
    };
    let delta = position + collider.offset - center;
    if delta != Vec3::ZERO {
        colliders.translate_box(collider.box_id, delta);
    }
}

/// Система: grounded персонаж на box'е платформы → PlatformRider
pub fn track_platform_riders(
    mut commands: Commands,
    colliders: Res<StaticColliders>,
    platforms: Query<(Entity, &PlatformCollider)>,
    characters: Query<(Entity, &CharacterMotor, &Transform, Option<&PlatformRider>)>,
) {
    for (entity, motor, transform, rider) in characters.iter() {
        let standing_on = motor
            .is_grounded()
            .then(|| motor.probe_ground(&*colliders, transform.translation))
            .flatten()
            .and_then(|hit| match hit.collider {
                ColliderId::Box(id) => platforms
                    .iter()
                    .find(|(_, collider)| collider.box_id == id)
                    .map(|(platform, _)| platform),
                ColliderId::Ground => None,
            });

        match (standing_on, rider) {
            (Some(platform), Some(rider)) if rider.platform == platform => {}
            (Some(platform), _) => {
                commands.entity(entity).insert(PlatformRider { platform });
            }
            (None, Some(_)) => {
                commands.entity(entity).remove::<PlatformRider>();
            }
            (None, None) => {}
        }
    }
}

/// Система: смещение платформы за тик → Carry hook rider'а
pub fn carry_platform_riders(
    local: Res<LocalPeer>,
    platforms: Query<&PlatformMover>,
    mut riders: Query<(Entity, &Ownership, &PlatformRider, &mut CharacterMotor)>,
) {
    for (entity, ownership, rider, mut motor) in riders.iter_mut() {
        // Мотор тикает только у owner'а, чужим hook копить незачем
        if !ownership.is_owner(local.0) {
            continue;
        }
        let Ok(mover) = platforms.get(rider.platform) else {
            crate::logger::log_warning(&format!(
                "Rider {:?}: platform {:?} no longer exists",
                entity, rider.platform
            ));
            continue;
        };
        let delta = mover.last_delta();
        if delta != Vec3::ZERO {
            motor.set_displacement_hook(DisplacementHook::Carry(delta));
        }
    }
}
