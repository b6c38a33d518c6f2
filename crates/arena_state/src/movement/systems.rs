//! Movement systems (FixedUpdate)

use bevy::prelude::*;
use bevy_rapier3d::prelude::KinematicCharacterController;

use super::ability::AbilitySignal;
use super::events::{JumpIntent, Jumped, Landed};
use super::motion::MotionState;
use super::motor::{CharacterMotor, MovementInput};
use crate::life::PlayerLife;
use crate::net::{LocalPeer, Ownership, PeerId};
use crate::physics::{apply_displacement, PhysicsBackend, StaticColliders};
use crate::replication::ReplicationError;

/// Система: JumpIntent → MovementInput::jump на текущий тик
pub fn apply_jump_intents(mut intents: EventReader<JumpIntent>, mut inputs: Query<&mut MovementInput>) {
    for intent in intents.read() {
        match inputs.get_mut(intent.entity) {
            Ok(mut input) => input.jump = true,
            Err(_) => crate::logger::log_warning(&format!(
                "JumpIntent for {:?} ignored: entity has no MovementInput",
                intent.entity
            )),
        }
    }
}

/// Система: тик моторов для entities, которыми владеет этот peer
///
/// Eliminated персонажи не двигаются. Jump input одноразовый — сбрасывается после тика.
pub fn tick_character_motors(
    time: Res<Time<Fixed>>,
    local: Res<LocalPeer>,
    backend: Res<PhysicsBackend>,
    colliders: Res<StaticColliders>,
    mut motors: Query<(
        Entity,
        &Ownership,
        &mut CharacterMotor,
        &mut MovementInput,
        &mut Transform,
        &mut MotionState,
        Option<&mut KinematicCharacterController>,
        Option<&PlayerLife>,
    )>,
    mut landed_events: EventWriter<Landed>,
    mut jumped_events: EventWriter<Jumped>,
) {
    let dt = time.delta_secs();
    let now = time.elapsed_secs_f64();

    for (entity, ownership, mut motor, mut input, mut transform, mut motion, mut controller, life) in
        motors.iter_mut()
    {
        if !ownership.is_owner(local.0) {
            continue;
        }
        if life.is_some_and(|life| life.is_eliminated()) {
            input.jump = false;
            continue;
        }

        let probe = motor.probe_ground(&*colliders, transform.translation);
        let frame = motor.tick(dt, now, &input, probe);
        input.jump = false;

        if let Some(impact_speed) = frame.landed {
            landed_events.write(Landed { entity, impact_speed });
        }
        for signal in &frame.signals {
            match signal {
                AbilitySignal::Jumped { air_jump } => {
                    jumped_events.write(Jumped {
                        entity,
                        air_jump: *air_jump,
                    });
                }
            }
        }

        if frame.skipped {
            continue;
        }

        apply_displacement(
            *backend,
            &*colliders,
            &mut transform,
            controller.as_deref_mut(),
            frame.displacement,
        );
        transform.rotation = Quat::from_rotation_y(frame.yaw);

        if let Err(err) = motion.record(local.0, transform.translation, frame.yaw, frame.grounded) {
            crate::logger::log_warning(&format!("MotionState of {:?} not recorded: {}", entity, err));
        }
    }
}

/// Система: observers копируют replicated motion в Transform
pub fn sync_remote_motion(local: Res<LocalPeer>, mut query: Query<(&Ownership, &MotionState, &mut Transform)>) {
    for (ownership, motion, mut transform) in query.iter_mut() {
        if ownership.is_owner(local.0) {
            continue;
        }
        transform.translation = *motion.position.get();
        transform.rotation = Quat::from_rotation_y(*motion.yaw.get());
    }
}

/// Owner: мгновенно переместить персонажа (respawn, teleport effect)
///
/// Скорости и forces сбрасываются, позиция сразу уходит в MotionState.
pub fn teleport_character(
    local: PeerId,
    transform: &mut Transform,
    motor: Option<&mut CharacterMotor>,
    motion: Option<&mut MotionState>,
    position: Vec3,
    yaw: Option<f32>,
) -> Result<(), ReplicationError> {
    transform.translation = position;
    if let Some(yaw) = yaw {
        transform.rotation = Quat::from_rotation_y(yaw);
    }
    if let Some(motor) = motor {
        motor.reset_forces();
        if let Some(yaw) = yaw {
            motor.snap_yaw(yaw);
        }
    }
    match motion {
        Some(motion) => {
            let yaw = yaw.unwrap_or(*motion.yaw.get());
            motion.record(local, position, yaw, false)
        }
        None => Ok(()),
    }
}
