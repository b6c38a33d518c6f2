//! AimState — owner-computed aim ray, replicated observers'ам
//!
//! Два replicated point'а:
//! - precise: куда реально летит пуля (screen-center ray hit)
//! - visual: для IK/анимации, на близкой дистанции уводится к дальней точке
//!   (иначе рука выворачивается при прицеливании в упор)
//!
//! Network updates ограничены по частоте и гистерезису (squared distance).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::net::PeerId;
use crate::physics::SpatialQuery;
use crate::replication::{ReplicatedField, ReplicationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct AimConfig {
    /// Длина screen-center ray (и точка "в бесконечности")
    pub max_distance: f32,
    /// Ближе этого visual point = дальняя точка
    pub min_distance: f32,
    /// На этом отрезке после min_distance visual плавно переходит к precise
    pub blend_distance: f32,
    /// Hz
    pub max_network_update_rate: f32,
    /// Squared distance, ниже которого update не отправляется
    pub network_threshold_sq: f32,
    /// Высота груди над ногами (начало obstruction ray)
    pub chest_height: f32,
    /// Вынос дула вперёд от груди
    pub muzzle_reach: f32,
}

impl Default for AimConfig {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            min_distance: 2.0,
            blend_distance: 3.0,
            max_network_update_rate: 20.0,
            network_threshold_sq: 0.01,
            chest_height: 1.4,
            muzzle_reach: 0.6,
        }
    }
}

/// Camera input (host пишет каждый тик)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct AimInput {
    pub camera_origin: Vec3,
    pub camera_forward: Vec3,
}

impl Default for AimInput {
    fn default() -> Self {
        Self {
            camera_origin: Vec3::ZERO,
            camera_forward: Vec3::NEG_Z,
        }
    }
}

/// Результат одного `update`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimSample {
    pub precise: Vec3,
    pub visual: Vec3,
    pub distance: f32,
    pub obstructed: bool,
    /// Значения ушли в replicated fields
    pub replicated: bool,
}

#[derive(Component, Debug)]
pub struct AimState {
    pub config: AimConfig,
    pub aim_point: ReplicatedField<Vec3>,
    pub visual_aim_point: ReplicatedField<Vec3>,
    /// Последние локально посчитанные значения (owner)
    local_precise: Vec3,
    local_visual: Vec3,
    obstructed: bool,
    /// Muzzle последнего update (из него же считался obstruction)
    muzzle: Option<Vec3>,
    last_network_update: Option<f64>,
}

impl AimState {
    pub fn new(config: AimConfig, owner: PeerId) -> Self {
        Self {
            config,
            aim_point: ReplicatedField::new(Vec3::ZERO, owner),
            visual_aim_point: ReplicatedField::new(Vec3::ZERO, owner),
            local_precise: Vec3::ZERO,
            local_visual: Vec3::ZERO,
            obstructed: false,
            muzzle: None,
            last_network_update: None,
        }
    }

    /// Куда стрелять: у owner — свежий локальный расчёт, у observers — replicated
    pub fn precise_point(&self, local: PeerId) -> Vec3 {
        if self.aim_point.is_authority(local) {
            self.local_precise
        } else {
            *self.aim_point.get()
        }
    }

    pub fn visual_point(&self, local: PeerId) -> Vec3 {
        if self.visual_aim_point.is_authority(local) {
            self.local_visual
        } else {
            *self.visual_aim_point.get()
        }
    }

    /// Кэш chest→muzzle obstruction с последнего update
    pub fn is_obstructed(&self) -> bool {
        self.obstructed
    }

    /// Откуда вылетает выстрел. None до первого update.
    pub fn muzzle(&self) -> Option<Vec3> {
        self.muzzle
    }

    /// Chest и muzzle персонажа по позиции ног и направлению взгляда
    pub fn chest_and_muzzle(&self, feet: Vec3, forward: Vec3) -> (Vec3, Vec3) {
        let chest = feet + Vec3::Y * self.config.chest_height;
        let planar = Vec3::new(forward.x, 0.0, forward.z).try_normalize().unwrap_or(Vec3::NEG_Z);
        (chest, chest + planar * self.config.muzzle_reach)
    }

    /// Пересчитать aim (owner). Replicated fields обновляются с rate limit + hysteresis.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        caller: PeerId,
        now: f64,
        camera_origin: Vec3,
        camera_forward: Vec3,
        chest: Vec3,
        muzzle: Vec3,
        spatial: &dyn SpatialQuery,
    ) -> Result<AimSample, ReplicationError> {
        if !self.aim_point.is_authority(caller) {
            return Err(ReplicationError::PermissionDenied {
                caller,
                authority: self.aim_point.authority(),
            });
        }

        let forward = camera_forward.try_normalize().unwrap_or(Vec3::NEG_Z);
        let max_distance = self.config.max_distance;
        let far_point = camera_origin + forward * max_distance;

        let (precise, distance) = match spatial.raycast(camera_origin, forward, max_distance) {
            Some(hit) => (hit.point, hit.distance),
            None => (far_point, max_distance),
        };

        let visual = visual_aim_point(precise, far_point, distance, self.config.min_distance, self.config.blend_distance);

        self.obstructed = match (muzzle - chest).try_normalize() {
            Some(direction) => spatial.raycast(chest, direction, chest.distance(muzzle)).is_some(),
            None => false,
        };

        self.muzzle = Some(muzzle);
        self.local_precise = precise;
        self.local_visual = visual;

        let replicated = self.maybe_replicate(caller, now)?;

        Ok(AimSample {
            precise,
            visual,
            distance,
            obstructed: self.obstructed,
            replicated,
        })
    }

    fn maybe_replicate(&mut self, caller: PeerId, now: f64) -> Result<bool, ReplicationError> {
        let rate = self.config.max_network_update_rate;
        let interval = if rate > 0.0 { 1.0 / rate as f64 } else { 0.0 };
        if let Some(last) = self.last_network_update {
            // Допуск на накопленную ошибку fixed timestep
            if now - last + 1e-6 < interval {
                return Ok(false);
            }
        }

        let threshold = self.config.network_threshold_sq;
        let precise_moved = self.local_precise.distance_squared(*self.aim_point.get()) > threshold;
        let visual_moved = self.local_visual.distance_squared(*self.visual_aim_point.get()) > threshold;
        if !precise_moved && !visual_moved {
            return Ok(false);
        }

        self.aim_point.set(caller, self.local_precise)?;
        self.visual_aim_point.set(caller, self.local_visual)?;
        self.last_network_update = Some(now);
        Ok(true)
    }
}

/// Visual point: на дистанции < min — дальняя точка, дальше min + blend — precise,
/// между ними линейный blend
pub fn visual_aim_point(precise: Vec3, far_point: Vec3, distance: f32, min_distance: f32, blend_distance: f32) -> Vec3 {
    let t = if blend_distance > 0.0 {
        ((distance - min_distance) / blend_distance).clamp(0.0, 1.0)
    } else if distance >= min_distance {
        1.0
    } else {
        0.0
    };
    far_point.lerp(precise, t)
}
