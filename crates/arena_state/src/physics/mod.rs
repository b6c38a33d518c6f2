//! Physics module
//!
//! - `spatial`: SpatialQuery trait + headless StaticColliders
//! - Bridge motor displacement → physical controller:
//!   Rapier `KinematicCharacterController` на host'е, прямая интеграция Transform в headless
//!
//! ECS НЕ симулирует коллизии персонажей сам — это работа controller'а.
//! В headless режиме есть только "пол не проваливается" (snap к ground/box top).

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

pub mod spatial;

pub use spatial::{ray_aabb, ray_sphere, ColliderId, RayHit, SpatialQuery, StaticBox, StaticColliders};

/// Максимальная высота ступеньки для headless snap (метры)
pub const HEADLESS_STEP_HEIGHT: f32 = 0.5;

/// Кто двигает персонажей
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhysicsBackend {
    /// Displacement сразу в Transform (тесты, dedicated server без rapier)
    #[default]
    Headless,
    /// Displacement пишется в `KinematicCharacterController::translation`,
    /// rapier сам разрешает коллизии в своём step
    Rapier,
}

/// Rapier компоненты персонажа (capsule, kinematic)
pub fn character_physics_bundle(radius: f32, half_height: f32) -> impl Bundle {
    (
        RigidBody::KinematicPositionBased,
        KinematicCharacterController {
            offset: CharacterLength::Absolute(0.02),
            ..default()
        },
        Collider::capsule_y(half_height, radius),
    )
}

/// Headless integration: position + displacement, без проваливания сквозь пол.
///
/// Если за тик ноги ушли ниже поверхности (ground plane / верх box'а в пределах
/// `HEADLESS_STEP_HEIGHT`), позиция прижимается к поверхности.
pub fn integrate_headless(spatial: &dyn SpatialQuery, feet: Vec3, displacement: Vec3) -> Vec3 {
    let mut target = feet + displacement;

    // Сканируем сверху вниз до новой позиции ног (поверхность могла и сама подняться — платформа)
    let origin = Vec3::new(target.x, feet.y.max(target.y) + HEADLESS_STEP_HEIGHT, target.z);
    let max_distance = origin.y - target.y;
    if let Some(hit) = spatial.raycast(origin, Vec3::NEG_Y, max_distance) {
        // distance 0 = origin внутри геометрии (упёрлись в стену), не телепортируем наверх
        if hit.distance > 0.0 && hit.point.y > target.y {
            target.y = hit.point.y;
        }
    }
    target
}

/// Применить motor displacement к entity
pub fn apply_displacement(
    backend: PhysicsBackend,
    spatial: &dyn SpatialQuery,
    transform: &mut Transform,
    controller: Option<&mut KinematicCharacterController>,
    displacement: Vec3,
) {
    match (backend, controller) {
        (PhysicsBackend::Rapier, Some(controller)) => {
            controller.translation = Some(displacement);
        }
        (PhysicsBackend::Rapier, None) => {
            crate::logger::log_warning(
                "apply_displacement: Rapier backend but entity has no KinematicCharacterController, integrating headless",
            );
            transform.translation = integrate_headless(spatial, transform.translation, displacement);
        }
        (PhysicsBackend::Headless, _) => {
            transform.translation = integrate_headless(spatial, transform.translation, displacement);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_does_not_sink() {
        let world = StaticColliders::with_ground(0.0);
        let result = integrate_headless(&world, Vec3::ZERO, Vec3::new(1.0, -0.4, 0.0));
        assert_eq!(result, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_headless_fast_fall_lands_on_ground() {
        let world = StaticColliders::with_ground(0.0);
        // 2 метра за тик — больше step height, всё равно не проваливаемся
        let result = integrate_headless(&world, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -3.0, 0.0));
        assert!(result.y.abs() < 1e-5);
    }

    #[test]
    fn test_headless_lands_on_box_top() {
        let mut world = StaticColliders::with_ground(0.0);
        world.add_box(Vec3::new(0.0, 0.5, 0.0), Vec3::new(2.0, 0.5, 2.0));

        let result = integrate_headless(&world, Vec3::new(0.0, 1.2, 0.0), Vec3::new(0.0, -0.5, 0.0));
        assert!((result.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_headless_upward_is_free() {
        let world = StaticColliders::with_ground(0.0);
        let result = integrate_headless(&world, Vec3::ZERO, Vec3::new(0.0, 0.3, 0.0));
        assert_eq!(result, Vec3::new(0.0, 0.3, 0.0));
    }

    #[test]
    fn test_rapier_backend_writes_translation() {
        let world = StaticColliders::with_ground(0.0);
        let mut transform = Transform::default();
        let mut controller = KinematicCharacterController::default();

        apply_displacement(
            PhysicsBackend::Rapier,
            &world,
            &mut transform,
            Some(&mut controller),
            Vec3::X,
        );

        assert_eq!(controller.translation, Some(Vec3::X));
        // Transform двигает rapier, не мы
        assert_eq!(transform.translation, Vec3::ZERO);
    }
}
