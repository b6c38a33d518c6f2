//! Movement abilities — pluggable per-tick velocity modifiers
//!
//! Каждая ability возвращает `MovementModifier`, мотор суммирует их все:
//! velocities складываются, `override_gravity` объединяется через OR.
//! Конфликтов не разрешаем: две ability с planar velocity просто стекаются.

use bevy::prelude::*;
use std::fmt::Debug;
use std::ops::{Add, AddAssign};

use super::motor::{MotorConfig, MovementInput};

/// Приоритеты встроенных abilities
pub const WALK_PRIORITY: i32 = 0;
pub const JUMP_PRIORITY: i32 = 10;
pub const DOUBLE_JUMP_PRIORITY: i32 = 15;

/// Вклад одной ability за тик (ephemeral)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementModifier {
    pub planar_velocity: Vec3,
    pub override_gravity: bool,
}

impl MovementModifier {
    pub fn planar(velocity: Vec3) -> Self {
        Self {
            planar_velocity: velocity,
            override_gravity: false,
        }
    }
}

impl Add for MovementModifier {
    type Output = MovementModifier;

    fn add(self, rhs: MovementModifier) -> MovementModifier {
        MovementModifier {
            planar_velocity: self.planar_velocity + rhs.planar_velocity,
            override_gravity: self.override_gravity || rhs.override_gravity,
        }
    }
}

impl AddAssign for MovementModifier {
    fn add_assign(&mut self, rhs: MovementModifier) {
        *self = *self + rhs;
    }
}

/// Что произошло внутри abilities за тик (мотор превращает в events)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbilitySignal {
    Jumped { air_jump: bool },
}

/// Состояние мотора, доступное abilities
pub struct AbilityContext<'a> {
    pub dt: f32,
    pub now: f64,
    pub input: &'a MovementInput,
    pub config: &'a MotorConfig,
    pub grounded: bool,
    pub last_grounded_at: f64,
    /// Camera-relative направление движения (world space, длина ≤ 1)
    pub move_direction: Vec3,
    vertical_velocity: &'a mut f32,
    jump_consumed: bool,
    signals: Vec<AbilitySignal>,
}

impl<'a> AbilityContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        dt: f32,
        now: f64,
        input: &'a MovementInput,
        config: &'a MotorConfig,
        grounded: bool,
        last_grounded_at: f64,
        move_direction: Vec3,
        vertical_velocity: &'a mut f32,
    ) -> Self {
        Self {
            dt,
            now,
            input,
            config,
            grounded,
            last_grounded_at,
            move_direction,
            vertical_velocity,
            jump_consumed: false,
            signals: Vec::new(),
        }
    }

    pub fn vertical_velocity(&self) -> f32 {
        *self.vertical_velocity
    }

    /// Jump нажат и ещё не использован другой ability в этом тике
    pub fn jump_requested(&self) -> bool {
        self.input.jump && !self.jump_consumed
    }

    /// Секунды с последнего касания земли
    pub fn time_since_grounded(&self) -> f64 {
        self.now - self.last_grounded_at
    }

    /// Чистый вертикальный запуск: vy = sqrt(height * -2 * gravity)
    ///
    /// Забирает jump input на этот тик. Ability должна вернуть override_gravity = true,
    /// иначе гравитация сразу съест часть скорости.
    pub fn launch(&mut self, height: f32, air_jump: bool) {
        let velocity = (height.max(0.0) * -2.0 * self.config.gravity).max(0.0).sqrt();
        *self.vertical_velocity = velocity;
        self.jump_consumed = true;
        self.signals.push(AbilitySignal::Jumped { air_jump });
    }

    pub(crate) fn into_signals(self) -> Vec<AbilitySignal> {
        self.signals
    }
}

/// Контракт ability: приоритет + modifier за тик
pub trait MovementAbility: Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn priority(&self) -> i32;

    fn modify(&mut self, ctx: &mut AbilityContext) -> MovementModifier;

    /// Персонаж коснулся земли (сброс air-state)
    fn on_grounded(&mut self) {}

    /// Полный сброс (respawn, teleport)
    fn reset(&mut self) {}
}

/// Ходьба/бег по camera-relative input
#[derive(Debug, Default)]
pub struct WalkAbility;

impl MovementAbility for WalkAbility {
    fn name(&self) -> &'static str {
        "walk"
    }

    fn priority(&self) -> i32 {
        WALK_PRIORITY
    }

    fn modify(&mut self, ctx: &mut AbilityContext) -> MovementModifier {
        let mut speed = ctx.config.walk_speed;
        if ctx.input.sprint {
            speed *= ctx.config.sprint_multiplier;
        }
        MovementModifier::planar(ctx.move_direction * speed)
    }
}

/// Обычный прыжок: с земли или в пределах coyote time, с cooldown
#[derive(Debug, Default)]
pub struct JumpAbility {
    last_jump_at: Option<f64>,
    /// Coyote jump уже использован в этом полёте
    airborne_jump_used: bool,
}

impl MovementAbility for JumpAbility {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn priority(&self) -> i32 {
        JUMP_PRIORITY
    }

    fn modify(&mut self, ctx: &mut AbilityContext) -> MovementModifier {
        if !ctx.jump_requested() {
            return MovementModifier::default();
        }

        let cooldown_ready = self
            .last_jump_at
            .map_or(true, |at| ctx.now - at >= ctx.config.jump_cooldown as f64);
        let within_coyote =
            !self.airborne_jump_used && ctx.time_since_grounded() <= ctx.config.coyote_time as f64;

        if !cooldown_ready || !(ctx.grounded || within_coyote) {
            return MovementModifier::default();
        }

        ctx.launch(ctx.config.jump_height, false);
        self.last_jump_at = Some(ctx.now);
        self.airborne_jump_used = true;

        MovementModifier {
            planar_velocity: Vec3::ZERO,
            override_gravity: true,
        }
    }

    fn on_grounded(&mut self) {
        self.airborne_jump_used = false;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Второй прыжок в воздухе, один раз за полёт
#[derive(Debug, Default)]
pub struct DoubleJumpAbility {
    used: bool,
}

impl MovementAbility for DoubleJumpAbility {
    fn name(&self) -> &'static str {
        "double_jump"
    }

    fn priority(&self) -> i32 {
        DOUBLE_JUMP_PRIORITY
    }

    fn modify(&mut self, ctx: &mut AbilityContext) -> MovementModifier {
        // Пока действует coyote window — это работа обычного прыжка
        let in_air = !ctx.grounded && ctx.time_since_grounded() > ctx.config.coyote_time as f64;
        if self.used || !in_air || !ctx.jump_requested() {
            return MovementModifier::default();
        }

        ctx.launch(ctx.config.double_jump_height, true);
        self.used = true;

        MovementModifier {
            planar_velocity: Vec3::ZERO,
            override_gravity: true,
        }
    }

    fn on_grounded(&mut self) {
        self.used = false;
    }

    fn reset(&mut self) {
        self.used = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_stack() {
        let a = MovementModifier::planar(Vec3::X);
        let b = MovementModifier {
            planar_velocity: Vec3::Z,
            override_gravity: true,
        };
        let sum = a + b + MovementModifier::default();

        assert_eq!(sum.planar_velocity, Vec3::new(1.0, 0.0, 1.0));
        assert!(sum.override_gravity);
    }

    #[test]
    fn test_launch_velocity_formula() {
        let input = MovementInput {
            jump: true,
            ..default()
        };
        let config = MotorConfig::default();
        let mut vy = -2.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 0.0, &input, &config, true, 0.0, Vec3::ZERO, &mut vy);

        ctx.launch(1.25, false);
        assert!(!ctx.jump_requested());
        assert_eq!(ctx.into_signals(), vec![AbilitySignal::Jumped { air_jump: false }]);
        // sqrt(1.25 * 2 * 20) = 7.0710678
        assert!((vy - (1.25_f32 * 40.0).sqrt()).abs() < 1e-5);
    }

    #[test]
    fn test_jump_respects_cooldown() {
        let input = MovementInput {
            jump: true,
            ..default()
        };
        let config = MotorConfig::default();
        let mut jump = JumpAbility::default();

        let mut vy = 0.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 1.0, &input, &config, true, 1.0, Vec3::ZERO, &mut vy);
        assert!(jump.modify(&mut ctx).override_gravity);

        // Снова на земле, но cooldown ещё не истёк
        jump.on_grounded();
        let mut vy = 0.0;
        let now = 1.0 + config.jump_cooldown as f64 * 0.5;
        let mut ctx = AbilityContext::new(1.0 / 60.0, now, &input, &config, true, now, Vec3::ZERO, &mut vy);
        assert!(!jump.modify(&mut ctx).override_gravity);
        assert_eq!(vy, 0.0);
    }

    #[test]
    fn test_coyote_jump_after_leaving_ledge() {
        let input = MovementInput {
            jump: true,
            ..default()
        };
        let config = MotorConfig::default();
        let mut jump = JumpAbility::default();
        let mut double_jump = DoubleJumpAbility::default();

        // Сошли с края 0.05 sec назад, coyote_time = 0.12
        let mut vy = -1.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 10.05, &input, &config, false, 10.0, Vec3::ZERO, &mut vy);
        // Double jump (приоритет выше) не перехватывает coyote window
        assert!(!double_jump.modify(&mut ctx).override_gravity);
        assert!(jump.modify(&mut ctx).override_gravity);
        assert!(vy > 0.0);
    }

    #[test]
    fn test_double_jump_once_per_airtime() {
        let input = MovementInput {
            jump: true,
            ..default()
        };
        let config = MotorConfig::default();
        let mut double_jump = DoubleJumpAbility::default();

        let mut vy = 0.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 5.0, &input, &config, false, 4.0, Vec3::ZERO, &mut vy);
        assert!(double_jump.modify(&mut ctx).override_gravity);

        let mut vy = 0.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 5.5, &input, &config, false, 4.0, Vec3::ZERO, &mut vy);
        assert!(!double_jump.modify(&mut ctx).override_gravity);

        double_jump.on_grounded();
        let mut vy = 0.0;
        let mut ctx = AbilityContext::new(1.0 / 60.0, 7.0, &input, &config, false, 6.0, Vec3::ZERO, &mut vy);
        assert!(double_jump.modify(&mut ctx).override_gravity);
    }
}
