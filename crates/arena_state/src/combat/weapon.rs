//! Weapon — firing/reload state machine (owner-authoritative)
//!
//! Pipeline выстрела:
//! fire request → eligibility (reload, ammo, trigger, cooldown, obstruction)
//! → shot (ammo списывается вместе с выстрелом) → spread растёт
//! → Firing → ReadyToFire/Empty после cosmetic delay.
//!
//! Пустой магазин: попытка выстрела запускает auto reload вместо выстрела.

use bevy::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::net::PeerId;
use crate::replication::{ReplicatedField, ReplicationError, RequestChannel, SetOutcome};

/// Replicated состояние оружия (для анимаций и muzzle effects у observers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Reflect)]
pub enum WeaponState {
    /// Убрано (holstered)
    Idle,
    #[default]
    ReadyToFire,
    Firing,
    Reloading,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Reflect)]
pub enum FiringMechanism {
    /// Один выстрел на нажатие (нужно отпустить trigger)
    #[default]
    SemiAuto,
    /// Стреляет пока trigger зажат (ограничение — cooldown)
    FullAuto,
}

/// Что делает выстрел. Cooldown у каждого behavior свой.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
pub enum ShootingBehavior {
    Hitscan { range: f32, damage: f32, cooldown: f32 },
    Projectile { speed: f32, damage: f32, cooldown: f32, max_range: f32 },
}

impl ShootingBehavior {
    pub fn cooldown(&self) -> f32 {
        match self {
            ShootingBehavior::Hitscan { cooldown, .. } | ShootingBehavior::Projectile { cooldown, .. } => *cooldown,
        }
    }

    pub fn damage(&self) -> f32 {
        match self {
            ShootingBehavior::Hitscan { damage, .. } | ShootingBehavior::Projectile { damage, .. } => *damage,
        }
    }
}

/// Разброс в градусах
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct SpreadConfig {
    /// Прирост за выстрел
    pub increment: f32,
    pub max: f32,
    /// Пауза без выстрелов до начала восстановления (sec)
    pub recovery_delay: f32,
    /// Градусов/sec
    pub recovery_rate: f32,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            increment: 0.6,
            max: 6.0,
            recovery_delay: 0.25,
            recovery_rate: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct WeaponConfig {
    pub clip_size: u32,
    /// Секунды
    pub reload_time: f32,
    pub mechanism: FiringMechanism,
    pub behavior: ShootingBehavior,
    pub spread: SpreadConfig,
    /// Сколько держится Firing state после выстрела (только для анимаций)
    pub fire_state_duration: f32,
    /// Пустой выстрел запускает reload
    pub auto_reload: bool,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            clip_size: 30,
            reload_time: 1.8,
            mechanism: FiringMechanism::FullAuto,
            behavior: ShootingBehavior::Hitscan {
                range: 120.0,
                damage: 20.0,
                cooldown: 0.1,
            },
            spread: SpreadConfig::default(),
            fire_state_duration: 0.08,
            auto_reload: true,
        }
    }
}

/// Чем стреляем (после spread)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotKind {
    Hitscan { range: f32 },
    Projectile { speed: f32, max_range: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub origin: Vec3,
    pub direction: Vec3,
    pub damage: f32,
    pub kind: ShotKind,
}

/// Почему выстрела не было
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRejection {
    Holstered,
    Reloading,
    /// SemiAuto: trigger не отпущен с прошлого выстрела
    TriggerHeld,
    Cooldown,
    /// Стена между грудью и дулом
    Obstructed,
    /// Aim point совпадает с дулом — направление не определено
    NoDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Fired(Shot),
    Rejected(FireRejection),
    /// Магазин пуст → начат auto reload
    ReloadTriggered,
    /// Магазин пуст, auto reload выключен
    OutOfAmmo,
}

/// Что произошло за `tick`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaponTickEvent {
    ReloadCompleted,
}

#[derive(Component, Debug)]
pub struct Weapon {
    pub config: WeaponConfig,
    pub state: ReplicatedField<WeaponState>,
    pub ammo: ReplicatedField<u32>,
    /// Holster/equip от non-owner peers (Idle = holster, ReadyToFire = equip)
    pub state_requests: RequestChannel<WeaponState>,
    cooldown_remaining: f32,
    reload_remaining: f32,
    firing_remaining: f32,
    /// Текущий разброс (градусы)
    spread: f32,
    since_last_shot: f32,
    trigger_held: bool,
}

impl Weapon {
    pub fn new(config: WeaponConfig, owner: PeerId) -> Self {
        let clip = config.clip_size;
        Self {
            config,
            state: ReplicatedField::new(WeaponState::ReadyToFire, owner),
            ammo: ReplicatedField::new(clip, owner),
            state_requests: RequestChannel::default(),
            cooldown_remaining: 0.0,
            reload_remaining: 0.0,
            firing_remaining: 0.0,
            spread: 0.0,
            since_last_shot: f32::MAX,
            trigger_held: false,
        }
    }

    pub fn current_state(&self) -> WeaponState {
        *self.state.get()
    }

    pub fn ammo_count(&self) -> u32 {
        *self.ammo.get()
    }

    pub fn spread(&self) -> f32 {
        self.spread
    }

    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_remaining
    }

    pub fn reload_remaining(&self) -> f32 {
        self.reload_remaining
    }

    pub fn is_reloading(&self) -> bool {
        self.current_state() == WeaponState::Reloading
    }

    fn set_state(&mut self, caller: PeerId, state: WeaponState) -> Result<(), ReplicationError> {
        self.state.set(caller, state).map(|_| ())
    }

    fn check_authority(&self, caller: PeerId) -> Result<(), ReplicationError> {
        if self.state.is_authority(caller) {
            Ok(())
        } else {
            Err(ReplicationError::PermissionDenied {
                caller,
                authority: self.state.authority(),
            })
        }
    }

    /// Попытка выстрела
    ///
    /// `obstructed` — кэш chest→muzzle ray из AimState.
    pub fn fire<R: Rng>(
        &mut self,
        caller: PeerId,
        obstructed: bool,
        muzzle: Vec3,
        aim_point: Vec3,
        rng: &mut R,
    ) -> Result<FireOutcome, ReplicationError> {
        self.check_authority(caller)?;

        match self.current_state() {
            WeaponState::Idle => return Ok(FireOutcome::Rejected(FireRejection::Holstered)),
            WeaponState::Reloading => return Ok(FireOutcome::Rejected(FireRejection::Reloading)),
            _ => {}
        }

        if self.ammo_count() == 0 {
            if self.config.auto_reload {
                self.start_reload(caller)?;
                return Ok(FireOutcome::ReloadTriggered);
            }
            self.set_state(caller, WeaponState::Empty)?;
            return Ok(FireOutcome::OutOfAmmo);
        }

        if self.config.mechanism == FiringMechanism::SemiAuto && self.trigger_held {
            return Ok(FireOutcome::Rejected(FireRejection::TriggerHeld));
        }
        if self.cooldown_remaining > 0.0 {
            return Ok(FireOutcome::Rejected(FireRejection::Cooldown));
        }
        if obstructed {
            return Ok(FireOutcome::Rejected(FireRejection::Obstructed));
        }
        let Some(base_direction) = (aim_point - muzzle).try_normalize() else {
            return Ok(FireOutcome::Rejected(FireRejection::NoDirection));
        };

        // Выстрел и списание патрона — одно действие
        let ammo_left = self.ammo_count() - 1;
        self.ammo.set(caller, ammo_left)?;
        self.set_state(caller, WeaponState::Firing)?;

        let direction = apply_spread(base_direction, self.spread, rng);
        self.spread = (self.spread + self.config.spread.increment).min(self.config.spread.max);
        self.since_last_shot = 0.0;
        self.cooldown_remaining = self.config.behavior.cooldown();
        self.firing_remaining = self.config.fire_state_duration;
        self.trigger_held = true;

        let kind = match self.config.behavior {
            ShootingBehavior::Hitscan { range, .. } => ShotKind::Hitscan { range },
            ShootingBehavior::Projectile { speed, max_range, .. } => ShotKind::Projectile { speed, max_range },
        };

        Ok(FireOutcome::Fired(Shot {
            origin: muzzle,
            direction,
            damage: self.config.behavior.damage(),
            kind,
        }))
    }

    /// Trigger отпущен (SemiAuto снова может стрелять)
    pub fn release_trigger(&mut self) {
        self.trigger_held = false;
    }

    /// Начать reload. Ok(false) — уже перезаряжаемся или магазин полный.
    pub fn start_reload(&mut self, caller: PeerId) -> Result<bool, ReplicationError> {
        self.check_authority(caller)?;
        if matches!(self.current_state(), WeaponState::Reloading | WeaponState::Idle)
            || self.ammo_count() >= self.config.clip_size
        {
            return Ok(false);
        }

        self.set_state(caller, WeaponState::Reloading)?;
        self.reload_remaining = self.config.reload_time.max(0.0);
        self.firing_remaining = 0.0;
        Ok(true)
    }

    /// Таймеры: cooldown, reload, cosmetic Firing, spread recovery
    pub fn tick(&mut self, caller: PeerId, dt: f32) -> Result<Option<WeaponTickEvent>, ReplicationError> {
        self.check_authority(caller)?;
        if !(dt > 0.0) {
            return Ok(None);
        }

        self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);

        self.since_last_shot += dt;
        if self.since_last_shot >= self.config.spread.recovery_delay {
            self.spread = (self.spread - self.config.spread.recovery_rate * dt).max(0.0);
        }

        match self.current_state() {
            WeaponState::Reloading => {
                self.reload_remaining -= dt;
                if self.reload_remaining <= 0.0 {
                    self.reload_remaining = 0.0;
                    self.ammo.set(caller, self.config.clip_size)?;
                    self.set_state(caller, WeaponState::ReadyToFire)?;
                    return Ok(Some(WeaponTickEvent::ReloadCompleted));
                }
            }
            WeaponState::Firing => {
                self.firing_remaining -= dt;
                if self.firing_remaining <= 0.0 {
                    let next = if self.ammo_count() > 0 {
                        WeaponState::ReadyToFire
                    } else {
                        WeaponState::Empty
                    };
                    self.set_state(caller, next)?;
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// Убрать оружие. Прерывает reload и cosmetic Firing.
    pub fn holster(&mut self, caller: PeerId) -> Result<bool, ReplicationError> {
        self.check_authority(caller)?;
        self.reload_remaining = 0.0;
        self.firing_remaining = 0.0;
        self.state.set(caller, WeaponState::Idle)
    }

    /// Достать оружие (no-op, если не убрано)
    pub fn equip(&mut self, caller: PeerId) -> Result<bool, ReplicationError> {
        self.check_authority(caller)?;
        if self.current_state() != WeaponState::Idle {
            return Ok(false);
        }
        let state = if self.ammo_count() > 0 {
            WeaponState::ReadyToFire
        } else {
            WeaponState::Empty
        };
        self.state.set(caller, state)
    }

    /// Holster/equip с любого peer'а: authority применяет, остальные ставят intent в `state_requests`
    pub fn set_holstered(&mut self, caller: PeerId, holstered: bool) -> SetOutcome {
        if self.state.is_authority(caller) {
            let changed = if holstered { self.holster(caller) } else { self.equip(caller) };
            return match changed {
                Ok(true) => SetOutcome::Applied,
                _ => SetOutcome::Unchanged,
            };
        }
        let target = if holstered {
            WeaponState::Idle
        } else {
            WeaponState::ReadyToFire
        };
        self.state.set_or_request(caller, target, &mut self.state_requests)
    }

    /// Authority: выполнить накопленные holster/equip requests по порядку.
    ///
    /// Requests идут через `holster`/`equip`, а не прямым set: equip посреди reload — no-op.
    pub fn apply_state_requests(&mut self, caller: PeerId) -> Result<usize, ReplicationError> {
        self.check_authority(caller)?;
        let requests: Vec<_> = self.state_requests.drain().collect();
        let mut applied = 0;
        for request in requests {
            let changed = match request.value {
                WeaponState::Idle => self.holster(caller)?,
                WeaponState::ReadyToFire => self.equip(caller)?,
                other => {
                    crate::logger::log_warning(&format!(
                        "Weapon state request {:?} from {} ignored: only holster/equip allowed",
                        other, request.requester
                    ));
                    false
                }
            };
            if changed {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Respawn: полный магазин, все таймеры сброшены
    pub fn refill(&mut self, caller: PeerId) -> Result<(), ReplicationError> {
        self.ammo.set(caller, self.config.clip_size)?;
        self.set_state(caller, WeaponState::ReadyToFire)?;
        self.cooldown_remaining = 0.0;
        self.reload_remaining = 0.0;
        self.firing_remaining = 0.0;
        self.spread = 0.0;
        self.since_last_shot = f32::MAX;
        self.trigger_held = false;
        Ok(())
    }
}

/// Случайное отклонение направления в пределах `spread_degrees` (по yaw и pitch)
pub fn apply_spread<R: Rng>(direction: Vec3, spread_degrees: f32, rng: &mut R) -> Vec3 {
    if !(spread_degrees > 0.0) {
        return direction;
    }
    let max = spread_degrees.to_radians();
    let yaw_offset: f32 = rng.gen_range(-max..=max);
    let pitch_offset: f32 = rng.gen_range(-max..=max);

    let right = direction.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
    let up = right.cross(direction);
    (direction + right * yaw_offset.tan() + up * pitch_offset.tan())
        .try_normalize()
        .unwrap_or(direction)
}
