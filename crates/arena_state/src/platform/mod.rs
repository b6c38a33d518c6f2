//! Moving platforms
//!
//! Server двигает платформу по WaypointPath, её box collider в StaticColliders
//! едет вместе с ней. Персонаж, стоящий на box'е платформы, становится
//! `PlatformRider` и получает смещение платформы через `DisplacementHook::Carry`.

use bevy::prelude::*;

pub mod systems;
pub mod waypoint;

pub use systems::{PlatformCollider, PlatformRider};
pub use waypoint::{PathMode, PlatformMover, WaypointPath};

use crate::SimulationSet;

/// Platform Plugin
///
/// Порядок (до движения персонажей):
/// 1. tick_platforms — движение платформ + collider + replicated position
/// 2. track_platform_riders — кто стоит на какой платформе
/// 3. carry_platform_riders — Carry hook в мотор rider'а
pub struct PlatformPlugin;

impl Plugin for PlatformPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (
                systems::tick_platforms,
                systems::track_platform_riders,
                systems::carry_platform_riders,
            )
                .chain()
                .in_set(SimulationSet::Platforms),
        );
    }
}
