//! Hit resolution: hitscan ray и projectile шаг против мира и hit spheres игроков

use bevy::prelude::*;

use crate::physics::{ray_sphere, SpatialQuery};

/// Hit volume игрока (сфера вокруг торса)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct HitSphere {
    pub radius: f32,
    /// Центр сферы над позицией ног
    pub center_height: f32,
}

impl Default for HitSphere {
    fn default() -> Self {
        Self {
            radius: 0.6,
            center_height: 1.0,
        }
    }
}

impl HitSphere {
    pub fn center(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::Y * self.center_height
    }
}

/// Кандидат на попадание в этом тике (живой, не сам стрелок)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTarget {
    pub entity: Entity,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotImpact {
    /// None — статичная геометрия
    pub target: Option<Entity>,
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Ближайшее попадание луча: геометрия ограничивает дальность, игроки за стеной не задеваются
pub fn resolve_hitscan(
    spatial: &dyn SpatialQuery,
    origin: Vec3,
    direction: Vec3,
    range: f32,
    targets: &[HitTarget],
) -> Option<ShotImpact> {
    let direction = direction.try_normalize()?;
    if !(range > 0.0) {
        return None;
    }

    let mut best = spatial.raycast(origin, direction, range).map(|hit| ShotImpact {
        target: None,
        point: hit.point,
        normal: hit.normal,
        distance: hit.distance,
    });

    for target in targets {
        let limit = best.map_or(range, |impact| impact.distance);
        let Some(distance) = ray_sphere(origin, direction, target.center, target.radius, limit) else {
            continue;
        };
        if best.is_some_and(|impact| distance >= impact.distance) {
            continue;
        }
        let point = origin + direction * distance;
        best = Some(ShotImpact {
            target: Some(target.entity),
            point,
            normal: (point - target.center).try_normalize().unwrap_or(-direction),
            distance,
        });
    }

    best
}

/// Снаряд в полёте (локальная entity стрелявшего peer'а)
#[derive(Component, Debug, Clone)]
pub struct Projectile {
    pub shooter: Entity,
    pub velocity: Vec3,
    pub damage: f32,
    pub max_range: f32,
    pub travelled: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectileStep {
    Flying(Vec3),
    Hit(ShotImpact),
    /// Пролетел max_range
    Expired,
}

impl Projectile {
    pub fn new(shooter: Entity, direction: Vec3, speed: f32, damage: f32, max_range: f32) -> Self {
        Self {
            shooter,
            velocity: direction.normalize_or_zero() * speed,
            damage,
            max_range,
            travelled: 0.0,
        }
    }

    /// Один тик полёта: swept ray от текущей позиции на `velocity * dt`
    pub fn step(&mut self, position: Vec3, dt: f32, spatial: &dyn SpatialQuery, targets: &[HitTarget]) -> ProjectileStep {
        let remaining = self.max_range - self.travelled;
        let step_length = (self.velocity.length() * dt).min(remaining);
        if !(step_length > 0.0) {
            return ProjectileStep::Expired;
        }

        if let Some(impact) = resolve_hitscan(spatial, position, self.velocity, step_length, targets) {
            self.travelled += impact.distance;
            return ProjectileStep::Hit(impact);
        }

        self.travelled += step_length;
        let next = position + self.velocity.normalize_or_zero() * step_length;
        if self.travelled >= self.max_range {
            ProjectileStep::Expired
        } else {
            ProjectileStep::Flying(next)
        }
    }
}
