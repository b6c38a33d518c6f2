//! Rotation: coupling modes + critically damped smoothing

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Как персонаж выбирает target yaw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Reflect)]
pub enum RotationMode {
    /// Всегда смотрит туда же, куда камера (shooter aim)
    CameraCoupled,
    /// Поворачивается к камере только пока есть move input
    CoupledWhileMoving,
    /// Смотрит по направлению движения
    #[default]
    FaceMovement,
}

/// Угол в [-PI, PI]
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped.is_finite() {
        wrapped
    } else {
        0.0
    }
}

/// Кратчайшая разница углов (target - current) в [-PI, PI]
pub fn delta_angle(current: f32, target: f32) -> f32 {
    wrap_angle(target - current)
}

/// Yaw горизонтального направления (0 = -Z, как Bevy forward)
pub fn yaw_from_direction(direction: Vec3) -> Option<f32> {
    let planar = Vec3::new(direction.x, 0.0, direction.z);
    if planar.length_squared() < 1e-6 {
        return None;
    }
    Some((-planar.x).atan2(-planar.z))
}

/// Критически демпфированное приближение к target (Game Programming Gems 4, ch. 1.10)
///
/// `velocity` — состояние между вызовами. Не перелетает target.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * exp;
    let mut output = target + (change + temp) * exp;

    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}

/// smooth_damp по кратчайшей дуге, результат в [-PI, PI]
pub fn smooth_damp_angle(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    let unwrapped_target = current + delta_angle(current, target);
    wrap_angle(smooth_damp(current, unwrapped_target, velocity, smooth_time, dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-4 || (wrap_angle(3.0 * PI) + PI).abs() < 1e-4);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-6);
        assert!((wrap_angle(-TAU + 0.25) - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_delta_angle_shortest_path() {
        // 170° → -170° = +20°, не -340°
        let from = 170.0_f32.to_radians();
        let to = (-170.0_f32).to_radians();
        assert!((delta_angle(from, to) - 20.0_f32.to_radians()).abs() < 1e-4);
    }

    #[test]
    fn test_yaw_from_direction() {
        assert!(yaw_from_direction(Vec3::NEG_Z).unwrap().abs() < 1e-6);
        let yaw = yaw_from_direction(Vec3::NEG_X).unwrap();
        // Поворот на +90° вокруг Y переводит -Z в -X
        assert!((yaw - PI / 2.0).abs() < 1e-5);
        assert!(yaw_from_direction(Vec3::Y).is_none());
    }

    #[test]
    fn test_smooth_damp_converges_without_overshoot() {
        let mut value = 0.0;
        let mut velocity = 0.0;
        for _ in 0..240 {
            value = smooth_damp(value, 1.0, &mut velocity, 0.1, 1.0 / 60.0);
            assert!(value <= 1.0);
        }
        assert!((value - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_smooth_damp_angle_wraps() {
        let mut velocity = 0.0;
        let mut yaw = 170.0_f32.to_radians();
        let target = (-170.0_f32).to_radians();
        for _ in 0..240 {
            yaw = smooth_damp_angle(yaw, target, &mut velocity, 0.1, 1.0 / 60.0);
        }
        assert!(delta_angle(yaw, target).abs() < 1e-2);
    }
}
