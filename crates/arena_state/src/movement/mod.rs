//! Movement module
//!
//! ECS ответственность:
//! - CharacterMotor: ground probe, abilities, gravity, forces, rotation
//! - MotionState: replicated position/yaw/grounded (owner → observers)
//! - Events: JumpIntent (input), Landed, Jumped
//!
//! Physical controller (коллизии) — physics module.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod ability;
pub mod events;
pub mod motion;
pub mod motor;
pub mod rotation;
pub mod systems;


pub use ability::{
    AbilityContext, AbilitySignal, DoubleJumpAbility, JumpAbility, MovementAbility, MovementModifier, WalkAbility,
    DOUBLE_JUMP_PRIORITY, JUMP_PRIORITY, WALK_PRIORITY,
};
pub use events::{JumpIntent, Jumped, Landed};
pub use motion::MotionState;
pub use motor::{CharacterMotor, DisplacementHook, GroundState, MotorConfig, MotorFrame, MovementInput};
pub use rotation::{delta_angle, smooth_damp, smooth_damp_angle, wrap_angle, yaw_from_direction, RotationMode};
pub use systems::teleport_character;

/// Movement Plugin
///
/// Порядок в FixedUpdate:
/// 1. apply_jump_intents — JumpIntent → MovementInput
/// 2. tick_character_motors — motor tick + displacement → controller
/// 3. sync_remote_motion — observers: MotionState → Transform
pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<JumpIntent>()
            .add_event::<Landed>()
            .add_event::<Jumped>();

        app.add_systems(
            FixedUpdate,
            (
                systems::apply_jump_intents,
                systems::tick_character_motors,
                systems::sync_remote_motion,
            )
                .chain()
                .in_set(SimulationSet::Movement),
        );
    }
}
