//! Factories: явная сборка entities из компонентов
//!
//! Каждый peer спавнит одни и те же entities с одинаковыми NetId —
//! по ним replication связывает локальные Entity разных App.
//! Config (motor, weapon, aim, stats) берётся из `SimulationConfig` в world.

use bevy::prelude::*;

use crate::combat::{AimInput, AimState, HitSphere, Weapon};
use crate::config::SimulationConfig;
use crate::interaction::{Interactable, TriggerVolume};
use crate::life::{PlayerLife, SpawnPoint};
use crate::movement::{CharacterMotor, MotionState, MovementInput};
use crate::net::{NetId, Ownership, PeerId};
use crate::physics::{character_physics_bundle, PhysicsBackend, StaticColliders};
use crate::platform::{PlatformCollider, PlatformMover, WaypointPath};
use crate::stats::{StatKey, StatLedger};

/// Capsule персонажа для rapier backend
const CHARACTER_RADIUS: f32 = 0.4;
const CHARACTER_HALF_HEIGHT: f32 = 0.5;

/// Игрок: движение/прицел/оружие у `owner`, ledger и life у server
pub fn spawn_player(world: &mut World, net_id: NetId, owner: PeerId, spawn: SpawnPoint) -> Entity {
    let config = world.get_resource::<SimulationConfig>().cloned().unwrap_or_default();
    let backend = world.get_resource::<PhysicsBackend>().copied().unwrap_or_default();

    let primary = config.stats.first().map_or(StatKey::Health, |def| def.key);

    let mut motor = CharacterMotor::with_default_abilities(config.motor.clone());
    motor.snap_yaw(spawn.yaw);

    let mut entity = world.spawn((
        Name::new(format!("Player {}", net_id.0)),
        Transform::from_translation(spawn.position).with_rotation(Quat::from_rotation_y(spawn.yaw)),
        net_id,
        Ownership::new(owner),
        spawn,
        // Movement (owner)
        (
            motor,
            MovementInput {
                camera_yaw: spawn.yaw,
                ..default()
            },
            MotionState::new(owner, spawn.position, spawn.yaw),
        ),
        // Combat (owner)
        (
            Weapon::new(config.weapon.clone(), owner),
            AimState::new(config.aim.clone(), owner),
            AimInput::default(),
            HitSphere::default(),
        ),
        // Server-authoritative
        (
            StatLedger::new(&config.stats, primary, PeerId::SERVER),
            PlayerLife::new(PeerId::SERVER),
        ),
    ));

    if backend == PhysicsBackend::Rapier {
        entity.insert(character_physics_bundle(CHARACTER_RADIUS, CHARACTER_HALF_HEIGHT));
    }

    let id = entity.id();
    crate::logger::log_info(&format!("Spawned player {:?} ({:?}, owner {})", id, net_id, owner));
    id
}

/// Движущаяся платформа (server). Верх box'а — на уровне Transform.
pub fn spawn_platform(world: &mut World, net_id: NetId, path: WaypointPath, half_extents: Vec3) -> Entity {
    let mover = PlatformMover::new(path);
    let position = mover.position();
    let offset = Vec3::new(0.0, -half_extents.y, 0.0);

    if !world.contains_resource::<StaticColliders>() {
        world.insert_resource(StaticColliders::with_ground(0.0));
    }
    let box_id = world
        .resource_mut::<StaticColliders>()
        .add_box(position + offset, half_extents);

    let id = world
        .spawn((
            Name::new(format!("Platform {}", net_id.0)),
            Transform::from_translation(position),
            net_id,
            Ownership::new(PeerId::SERVER),
            mover,
            PlatformCollider { box_id, offset },
            MotionState::new(PeerId::SERVER, position, 0.0),
        ))
        .id();

    crate::logger::log_info(&format!("Spawned platform {:?} ({:?}, box {})", id, net_id, box_id));
    id
}

/// Interactable (server). `volume` = VolumeEnter trigger вокруг позиции.
pub fn spawn_interactable(
    world: &mut World,
    net_id: NetId,
    position: Vec3,
    interactable: Interactable,
    volume: Option<TriggerVolume>,
) -> Entity {
    let mut entity = world.spawn((
        Name::new(format!("Interactable {}", net_id.0)),
        Transform::from_translation(position),
        net_id,
        Ownership::new(PeerId::SERVER),
        interactable,
    ));
    if let Some(volume) = volume {
        entity.insert(volume);
    }

    let id = entity.id();
    crate::logger::log_info(&format!("Spawned interactable {:?} ({:?})", id, net_id));
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{InteractionTrigger, TriggerKind};
    use crate::platform::PathMode;

    #[test]
    fn test_player_authority_split() {
        let mut world = World::new();
        let entity = spawn_player(&mut world, NetId(1), PeerId(3), SpawnPoint::new(Vec3::new(1.0, 0.0, 2.0), 0.5));

        let weapon = world.get::<Weapon>(entity).unwrap();
        assert_eq!(weapon.state.authority(), PeerId(3));
        let ledger = world.get::<StatLedger>(entity).unwrap();
        assert_eq!(ledger.authority(), PeerId::SERVER);
        assert_eq!(ledger.primary(), StatKey::Health);
        assert!(ledger.is_alive());
        assert_eq!(world.get::<Transform>(entity).unwrap().translation, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn test_platform_registers_collider() {
        let mut world = World::new();
        world.insert_resource(StaticColliders::with_ground(0.0));
        let path = WaypointPath::new(vec![Vec3::new(0.0, 2.0, 0.0), Vec3::new(5.0, 2.0, 0.0)], PathMode::PingPong, 1.0);

        let entity = spawn_platform(&mut world, NetId(7), path, Vec3::new(1.0, 0.25, 1.0));

        let collider = *world.get::<PlatformCollider>(entity).unwrap();
        let center = world.resource::<StaticColliders>().box_center(collider.box_id);
        assert_eq!(center, Some(Vec3::new(0.0, 1.75, 0.0)));
    }

    #[test]
    fn test_interactable_with_volume() {
        let mut world = World::new();
        let entity = spawn_interactable(
            &mut world,
            NetId(9),
            Vec3::ZERO,
            Interactable::new(InteractionTrigger::new(vec![TriggerKind::VolumeEnter]), Vec::new()),
            Some(TriggerVolume::new(Vec3::ONE)),
        );
        assert!(world.get::<TriggerVolume>(entity).is_some());
        assert_eq!(world.get::<Ownership>(entity).unwrap().owner, PeerId::SERVER);
    }
}
