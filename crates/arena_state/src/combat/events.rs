//! Combat events

use bevy::prelude::*;

/// Input: стрелок жмёт trigger в этом тике
///
/// Нет intent'а в тике = trigger отпущен (SemiAuto снова готов).
#[derive(Event, Debug, Clone, Copy)]
pub struct FireIntent {
    pub shooter: Entity,
}

/// Input: явная перезарядка
#[derive(Event, Debug, Clone, Copy)]
pub struct ReloadIntent {
    pub shooter: Entity,
}

/// Input: убрать (`holstered = true`) или достать оружие
#[derive(Event, Debug, Clone, Copy)]
pub struct HolsterIntent {
    pub shooter: Entity,
    pub holstered: bool,
}

/// Выстрел состоялся (muzzle flash, звук, отдача)
#[derive(Event, Debug, Clone)]
pub struct WeaponFired {
    pub shooter: Entity,
    pub origin: Vec3,
    pub direction: Vec3,
    pub ammo_left: u32,
}

/// Пуля/снаряд во что-то попали
///
/// `target` = None — попадание в статичную геометрию (decal, искры).
#[derive(Event, Debug, Clone)]
pub struct ShotHit {
    pub shooter: Entity,
    pub target: Option<Entity>,
    pub point: Vec3,
    pub normal: Vec3,
    pub damage: f32,
}

#[derive(Event, Debug, Clone)]
pub struct ReloadStarted {
    pub shooter: Entity,
    pub duration: f32,
}

#[derive(Event, Debug, Clone)]
pub struct ReloadCompleted {
    pub shooter: Entity,
}
