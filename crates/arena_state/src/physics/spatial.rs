//! Spatial queries (raycast / sphere cast)
//!
//! Movement (ground probe), aim (screen-center ray), weapon (obstruction + hitscan)
//! зависят только от trait `SpatialQuery`. Headless мир — `StaticColliders`
//! (ground plane + AABB boxes), на реальном host'е trait реализует physics backend.

use bevy::prelude::*;

/// Результат cast'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Точка контакта (world space)
    pub point: Vec3,
    /// Нормаль поверхности в точке контакта
    pub normal: Vec3,
    /// Дистанция вдоль направления cast'а
    pub distance: f32,
    /// Что задели
    pub collider: ColliderId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColliderId {
    Ground,
    Box(u32),
}

pub trait SpatialQuery {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit>;
}

/// Static box collider (axis-aligned)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaticBox {
    pub id: u32,
    pub min: Vec3,
    pub max: Vec3,
}

impl StaticBox {
    pub fn from_center(id: u32, center: Vec3, half_extents: Vec3) -> Self {
        Self {
            id,
            min: center - half_extents,
            max: center + half_extents,
        }
    }
}

/// Headless collision world
#[derive(Resource, Debug, Clone, Default)]
pub struct StaticColliders {
    /// Высота бесконечного пола (None = пола нет)
    pub ground_height: Option<f32>,
    pub boxes: Vec<StaticBox>,
}

impl StaticColliders {
    pub fn with_ground(height: f32) -> Self {
        Self {
            ground_height: Some(height),
            boxes: Vec::new(),
        }
    }

    pub fn add_box(&mut self, center: Vec3, half_extents: Vec3) -> u32 {
        let id = self.boxes.len() as u32;
        self.boxes.push(StaticBox::from_center(id, center, half_extents));
        id
    }

    /// Сдвинуть box (движущаяся платформа)
    pub fn translate_box(&mut self, id: u32, delta: Vec3) -> bool {
        match self.boxes.iter_mut().find(|collider| collider.id == id) {
            Some(collider) => {
                collider.min += delta;
                collider.max += delta;
                true
            }
            None => false,
        }
    }

    pub fn box_center(&self, id: u32) -> Option<Vec3> {
        self.boxes
            .iter()
            .find(|collider| collider.id == id)
            .map(|collider| (collider.min + collider.max) * 0.5)
    }

    /// Общий cast: плоскость поднята на `inflate`, boxes расширены на `inflate`
    /// (Minkowski sum для сферы, углы аппроксимируются box'ом)
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32, inflate: f32) -> Option<RayHit> {
        let dir = direction.try_normalize()?;
        if !(max_distance > 0.0) {
            return None;
        }

        let mut best: Option<RayHit> = None;

        if let Some(height) = self.ground_height {
            let plane = height + inflate;
            if dir.y < 0.0 && origin.y >= plane {
                let t = (plane - origin.y) / dir.y;
                if t <= max_distance {
                    best = Some(RayHit {
                        point: origin + dir * t - Vec3::Y * inflate,
                        normal: Vec3::Y,
                        distance: t,
                        collider: ColliderId::Ground,
                    });
                }
            }
        }

        for collider in &self.boxes {
            let min = collider.min - Vec3::splat(inflate);
            let max = collider.max + Vec3::splat(inflate);
            let Some((t, normal)) = ray_aabb(origin, dir, min, max, max_distance) else {
                continue;
            };
            if best.map_or(true, |hit| t < hit.distance) {
                best = Some(RayHit {
                    point: origin + dir * t - normal * inflate,
                    normal,
                    distance: t,
                    collider: ColliderId::Box(collider.id),
                });
            }
        }

        best
    }
}

impl SpatialQuery for StaticColliders {
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        self.cast(origin, direction, max_distance, 0.0)
    }

    fn sphere_cast(
        &self,
        origin: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit> {
        self.cast(origin, direction, max_distance, radius.max(0.0))
    }
}

/// Slab test: ray (normalized `dir`) против AABB.
///
/// Возвращает (distance, entry normal). Origin внутри box → distance 0, normal = -dir.
pub fn ray_aabb(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
    let mut t_enter = 0.0_f32;
    let mut t_exit = max_distance;
    let mut normal = Vec3::ZERO;

    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];

        if d.abs() < 1e-8 {
            // Параллельно граням этой оси
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }

        let inv = 1.0 / d;
        let mut t1 = (min[axis] - o) * inv;
        let mut t2 = (max[axis] - o) * inv;
        // Вход через min-грань → нормаль смотрит в -axis
        let mut sign = -1.0;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
            sign = 1.0;
        }

        if t1 > t_enter {
            t_enter = t1;
            normal = Vec3::ZERO;
            normal[axis] = sign;
        }
        t_exit = t_exit.min(t2);

        if t_enter > t_exit {
            return None;
        }
    }

    if normal == Vec3::ZERO {
        return Some((0.0, -dir));
    }
    Some((t_enter, normal))
}

/// Ray против сферы (hit volume игрока). `dir` должен быть normalized.
pub fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32, max_distance: f32) -> Option<f32> {
    let to_origin = origin - center;
    let b = to_origin.dot(dir);
    let c = to_origin.length_squared() - radius * radius;

    if c > 0.0 && b > 0.0 {
        // Снаружи и смотрим от сферы
        return None;
    }

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }

    let t = (-b - discriminant.sqrt()).max(0.0);
    (t <= max_distance).then_some(t)
}
