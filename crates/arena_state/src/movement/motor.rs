//! CharacterMotor — per-tick интеграция движения персонажа
//!
//! Порядок одного тика:
//! 1. Ground probe → Grounded/Airborne, landing detection
//! 2. Abilities (highest priority first) → сумма MovementModifier
//! 3. External force decay + добавление к planar velocity
//! 4. Gravity (если никто не запросил override), grounded stick clamp
//! 5. Displacement = velocity * dt, затем DisplacementHook (platform carry / scripted)
//! 6. Rotation: override yaw или RotationMode, critically damped
//!
//! NaN/inf displacement не доходит до physics: frame пропускается с warning.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::ability::{
    AbilityContext, AbilitySignal, DoubleJumpAbility, JumpAbility, MovementAbility, MovementModifier,
    WalkAbility,
};
use super::rotation::{smooth_damp_angle, yaw_from_direction, RotationMode};
use crate::physics::{RayHit, SpatialQuery};

/// Зазор над ногами, откуда стартует ground probe
const PROBE_SKIN: f32 = 0.05;

/// Тюнинг мотора (загружается из SimulationConfig)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct MotorConfig {
    /// m/s
    pub walk_speed: f32,
    pub sprint_multiplier: f32,
    /// m/s², отрицательная
    pub gravity: f32,
    /// Вертикальная скорость на земле (прижимает к полу без подпрыгиваний)
    pub stick_velocity: f32,
    /// Минимальная скорость падения для Landed event (m/s)
    pub landing_threshold: f32,
    pub probe_radius: f32,
    /// Насколько ниже ног ещё считаем "на земле"
    pub probe_distance: f32,
    pub max_slope_degrees: f32,
    /// Метры
    pub jump_height: f32,
    /// Секунды между прыжками
    pub jump_cooldown: f32,
    pub double_jump_height: f32,
    /// Окно прыжка после схода с края (sec)
    pub coyote_time: f32,
    /// 1/sec, скорость затухания external force
    pub force_decay: f32,
    pub rotation_smooth_time: f32,
    pub rotation_mode: RotationMode,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            walk_speed: 6.0,
            sprint_multiplier: 1.6,
            gravity: -20.0,
            stick_velocity: -2.0,
            landing_threshold: 6.0,
            probe_radius: 0.3,
            probe_distance: 0.15,
            max_slope_degrees: 50.0,
            jump_height: 1.25,
            jump_cooldown: 0.2,
            double_jump_height: 1.0,
            coyote_time: 0.12,
            force_decay: 4.0,
            rotation_smooth_time: 0.08,
            rotation_mode: RotationMode::FaceMovement,
        }
    }
}

/// Input персонажа за тик (заполняется host'ом или тестом)
#[derive(Component, Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Reflect)]
#[reflect(Component)]
pub struct MovementInput {
    /// x = strafe (right +), y = forward (+), длина ≤ 1
    pub move_axis: Vec2,
    pub sprint: bool,
    /// Jump нажат в этом тике (сбрасывается после тика мотора)
    pub jump: bool,
    /// Yaw камеры (radians, 0 = -Z)
    pub camera_yaw: f32,
}

impl MovementInput {
    /// Camera-relative направление в world space
    pub fn world_direction(&self) -> Vec3 {
        let axis = if self.move_axis.is_finite() {
            self.move_axis.clamp_length_max(1.0)
        } else {
            Vec2::ZERO
        };
        let yaw = if self.camera_yaw.is_finite() { self.camera_yaw } else { 0.0 };
        Quat::from_rotation_y(yaw) * Vec3::new(axis.x, 0.0, -axis.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum GroundState {
    Grounded,
    #[default]
    Airborne,
}

/// Post-processing displacement (один тик)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplacementHook {
    /// Добавить к displacement (движущаяся платформа под ногами)
    Carry(Vec3),
    /// Полностью заменить displacement (scripted arc, cutscene)
    Replace(Vec3),
}

/// Результат тика мотора
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotorFrame {
    /// Смещение для physical controller (world space)
    pub displacement: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub grounded: bool,
    /// Скорость удара при приземлении (если выше threshold)
    pub landed: Option<f32>,
    pub signals: Vec<AbilitySignal>,
    /// Frame отброшен (NaN/inf) — controller не трогаем
    pub skipped: bool,
}

#[derive(Component, Debug)]
pub struct CharacterMotor {
    pub config: MotorConfig,
    abilities: Vec<Box<dyn MovementAbility>>,
    ground: GroundState,
    vertical_velocity: f32,
    external_force: Vec3,
    last_grounded_at: f64,
    ground_normal: Vec3,
    yaw: f32,
    yaw_velocity: f32,
    target_yaw: f32,
    override_yaw: Option<f32>,
    hook: Option<DisplacementHook>,
}

impl CharacterMotor {
    /// Мотор без abilities (ничего не двигает, кроме gravity/forces)
    pub fn new(config: MotorConfig) -> Self {
        Self {
            config,
            abilities: Vec::new(),
            ground: GroundState::Airborne,
            vertical_velocity: 0.0,
            external_force: Vec3::ZERO,
            last_grounded_at: f64::NEG_INFINITY,
            ground_normal: Vec3::Y,
            yaw: 0.0,
            yaw_velocity: 0.0,
            target_yaw: 0.0,
            override_yaw: None,
            hook: None,
        }
    }

    /// Walk + Jump + DoubleJump
    pub fn with_default_abilities(config: MotorConfig) -> Self {
        let mut motor = Self::new(config);
        motor.register_ability(Box::new(WalkAbility));
        motor.register_ability(Box::new(JumpAbility::default()));
        motor.register_ability(Box::new(DoubleJumpAbility::default()));
        motor
    }

    /// Держим список отсортированным по убыванию приоритета.
    /// Равный приоритет — в порядке регистрации.
    pub fn register_ability(&mut self, ability: Box<dyn MovementAbility>) {
        let priority = ability.priority();
        let index = self
            .abilities
            .iter()
            .position(|existing| existing.priority() < priority)
            .unwrap_or(self.abilities.len());
        self.abilities.insert(index, ability);
    }

    pub fn remove_ability(&mut self, name: &str) -> bool {
        let before = self.abilities.len();
        self.abilities.retain(|ability| ability.name() != name);
        if self.abilities.len() == before {
            crate::logger::log_warning(&format!("CharacterMotor: unknown ability '{}'", name));
            return false;
        }
        true
    }

    pub fn has_ability(&self, name: &str) -> bool {
        self.abilities.iter().any(|ability| ability.name() == name)
    }

    /// Имена abilities в порядке выполнения
    pub fn ability_order(&self) -> Vec<&'static str> {
        self.abilities.iter().map(|ability| ability.name()).collect()
    }

    pub fn ground_state(&self) -> GroundState {
        self.ground
    }

    pub fn is_grounded(&self) -> bool {
        self.ground == GroundState::Grounded
    }

    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    pub fn external_force(&self) -> Vec3 {
        self.external_force
    }

    pub fn ground_normal(&self) -> Vec3 {
        self.ground_normal
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Мгновенно выставить yaw (spawn, teleport)
    pub fn snap_yaw(&mut self, yaw: f32) {
        self.yaw = yaw;
        self.target_yaw = yaw;
        self.yaw_velocity = 0.0;
    }

    /// External override rotation (None = вернуть RotationMode)
    pub fn set_override_yaw(&mut self, yaw: Option<f32>) {
        self.override_yaw = yaw.filter(|value| value.is_finite());
    }

    /// Внешний импульс (взрыв, jump pad); затухает экспоненциально
    pub fn add_force(&mut self, force: Vec3) {
        if !force.is_finite() {
            crate::logger::log_warning(&format!("CharacterMotor::add_force: ignoring {:?}", force));
            return;
        }
        self.external_force += force;
    }

    /// Сброс forces и вертикальной скорости (respawn, teleport)
    pub fn reset_forces(&mut self) {
        self.external_force = Vec3::ZERO;
        self.vertical_velocity = 0.0;
    }

    /// Полный сброс состояния (respawn)
    pub fn reset(&mut self) {
        self.reset_forces();
        self.ground = GroundState::Airborne;
        self.last_grounded_at = f64::NEG_INFINITY;
        self.hook = None;
        self.yaw_velocity = 0.0;
        for ability in &mut self.abilities {
            ability.reset();
        }
    }

    /// Hook на следующий тик (Carry от нескольких источников суммируется)
    pub fn set_displacement_hook(&mut self, hook: DisplacementHook) {
        self.hook = match (self.hook, hook) {
            (Some(DisplacementHook::Carry(a)), DisplacementHook::Carry(b)) => Some(DisplacementHook::Carry(a + b)),
            (Some(DisplacementHook::Replace(existing)), DisplacementHook::Carry(_)) => {
                Some(DisplacementHook::Replace(existing))
            }
            (_, new) => Some(new),
        };
    }

    /// Ground probe: sphere cast вниз от ног
    pub fn probe_ground(&self, spatial: &dyn SpatialQuery, feet: Vec3) -> Option<RayHit> {
        let radius = self.config.probe_radius;
        let origin = feet + Vec3::Y * (radius + PROBE_SKIN);
        spatial.sphere_cast(origin, radius, Vec3::NEG_Y, PROBE_SKIN + self.config.probe_distance)
    }

    /// Поверхность не круче max slope
    pub fn is_walkable(&self, normal: Vec3) -> bool {
        match normal.try_normalize() {
            Some(normal) => normal.angle_between(Vec3::Y) <= self.config.max_slope_degrees.to_radians(),
            None => false,
        }
    }

    /// Один тик движения
    pub fn tick(&mut self, dt: f32, now: f64, input: &MovementInput, probe: Option<RayHit>) -> MotorFrame {
        if !(dt > 0.0) || !dt.is_finite() {
            return MotorFrame {
                yaw: self.yaw,
                grounded: self.is_grounded(),
                skipped: true,
                ..default()
            };
        }

        // 1. Ground
        let was_airborne = self.ground == GroundState::Airborne;
        let walkable = probe.filter(|hit| self.is_walkable(hit.normal));
        let grounded = walkable.is_some() && self.vertical_velocity <= 0.0;

        let mut landed = None;
        if grounded {
            if was_airborne {
                let impact_speed = -self.vertical_velocity;
                if impact_speed >= self.config.landing_threshold {
                    landed = Some(impact_speed);
                }
            }
            self.ground = GroundState::Grounded;
            self.last_grounded_at = now;
            if let Some(hit) = walkable {
                self.ground_normal = hit.normal;
            }
            for ability in &mut self.abilities {
                ability.on_grounded();
            }
        } else {
            self.ground = GroundState::Airborne;
        }

        // 2. Abilities
        let move_direction = input.world_direction();
        let mut ctx = AbilityContext::new(
            dt,
            now,
            input,
            &self.config,
            grounded,
            self.last_grounded_at,
            move_direction,
            &mut self.vertical_velocity,
        );
        let mut modifier = MovementModifier::default();
        for ability in &mut self.abilities {
            modifier += ability.modify(&mut ctx);
        }
        let signals = ctx.into_signals();

        // 3. External force
        let decay = (self.config.force_decay * dt).clamp(0.0, 1.0);
        self.external_force = self.external_force.lerp(Vec3::ZERO, decay);
        let planar = modifier.planar_velocity + self.external_force;

        // 4. Gravity
        if !modifier.override_gravity {
            self.vertical_velocity += self.config.gravity * dt;
            if grounded && self.vertical_velocity < 0.0 {
                self.vertical_velocity = self.config.stick_velocity;
            }
        }

        // 5. Displacement
        let velocity = planar + Vec3::Y * self.vertical_velocity;
        let mut displacement = velocity * dt;
        match self.hook.take() {
            Some(DisplacementHook::Carry(extra)) => displacement += extra,
            Some(DisplacementHook::Replace(replacement)) => displacement = replacement,
            None => {}
        }

        if !displacement.is_finite() {
            crate::logger::log_warning(&format!(
                "CharacterMotor: non-finite displacement {:?}, frame skipped",
                displacement
            ));
            if !self.vertical_velocity.is_finite() {
                self.vertical_velocity = 0.0;
            }
            if !self.external_force.is_finite() {
                self.external_force = Vec3::ZERO;
            }
            return MotorFrame {
                yaw: self.yaw,
                grounded,
                landed,
                signals,
                skipped: true,
                ..default()
            };
        }

        // 6. Rotation
        self.update_rotation(dt, input, modifier.planar_velocity);

        MotorFrame {
            displacement,
            velocity,
            yaw: self.yaw,
            grounded,
            landed,
            signals,
            skipped: false,
        }
    }

    fn update_rotation(&mut self, dt: f32, input: &MovementInput, planar_velocity: Vec3) {
        let camera_yaw = input.camera_yaw.is_finite().then_some(input.camera_yaw);
        let moving = input.move_axis.is_finite() && input.move_axis.length_squared() > 1e-4;

        let target = match (self.override_yaw, self.config.rotation_mode) {
            (Some(yaw), _) => Some(yaw),
            (None, RotationMode::CameraCoupled) => camera_yaw,
            (None, RotationMode::CoupledWhileMoving) => camera_yaw.filter(|_| moving),
            (None, RotationMode::FaceMovement) => yaw_from_direction(planar_velocity),
        };
        if let Some(target) = target {
            self.target_yaw = target;
        }

        self.yaw = smooth_damp_angle(
            self.yaw,
            self.target_yaw,
            &mut self.yaw_velocity,
            self.config.rotation_smooth_time,
            dt,
        );
    }
}
