//! Stat — одна числовая характеристика entity (Health, Stamina, Shield...)
//!
//! Инвариант: min ≤ current ≤ max (всегда, после любого изменения)

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор stat'а
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum StatKey {
    Health,
    Stamina,
    Shield,
    /// Game-specific stats (ammo reserve, energy...)
    Custom(u16),
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKey::Health => write!(f, "Health"),
            StatKey::Stamina => write!(f, "Stamina"),
            StatKey::Shield => write!(f, "Shield"),
            StatKey::Custom(id) => write!(f, "Custom({})", id),
        }
    }
}

/// Описание stat'а (из config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatDef {
    pub key: StatKey,
    pub min: f32,
    pub max: f32,
    /// Стартовое значение (None = max)
    #[serde(default)]
    pub initial: Option<f32>,
    /// units/sec, 0 = без регенерации
    #[serde(default)]
    pub regen_rate: f32,
    /// Секунды простоя после consumption до начала регенерации
    #[serde(default)]
    pub regen_delay: f32,
}

impl StatDef {
    pub fn new(key: StatKey, min: f32, max: f32) -> Self {
        Self {
            key,
            min,
            max,
            initial: None,
            regen_rate: 0.0,
            regen_delay: 0.0,
        }
    }

    pub fn with_regen(mut self, rate: f32, delay: f32) -> Self {
        self.regen_rate = rate;
        self.regen_delay = delay;
        self
    }

    pub fn with_initial(mut self, initial: f32) -> Self {
        self.initial = Some(initial);
        self
    }

    /// Дефолтный набор stat'ов игрока
    pub fn player_defaults() -> Vec<StatDef> {
        vec![
            StatDef::new(StatKey::Health, 0.0, 100.0).with_regen(5.0, 4.0),
            StatDef::new(StatKey::Stamina, 0.0, 100.0).with_regen(25.0, 1.0),
        ]
    }
}

/// Runtime состояние stat'а
#[derive(Debug, Clone, PartialEq, Reflect)]
pub struct Stat {
    pub key: StatKey,
    current: f32,
    pub min: f32,
    pub max: f32,
    pub regen_rate: f32,
    pub regen_delay: f32,
    /// Время последнего consumption (delta < 0), для regen delay
    pub(crate) last_consumption: Option<f64>,
    /// Edge-trigger флаг depletion: true пока current ≤ 0
    pub(crate) depleted: bool,
}

impl Stat {
    pub fn from_def(def: &StatDef) -> Self {
        // Кривой config (min > max) не должен ломать инвариант
        let min = def.min.min(def.max);
        let max = def.max.max(def.min);
        let current = def.initial.unwrap_or(max).clamp(min, max);
        Self {
            key: def.key,
            current,
            min,
            max,
            regen_rate: def.regen_rate.max(0.0),
            regen_delay: def.regen_delay.max(0.0),
            last_consumption: None,
            depleted: current <= 0.0,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn percent(&self) -> f32 {
        if self.max > self.min {
            (self.current - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Clamp + запись. Возвращает (old, new).
    pub(crate) fn apply_delta(&mut self, delta: f32) -> (f32, f32) {
        let old = self.current;
        if delta.is_finite() {
            self.current = (self.current + delta).clamp(self.min, self.max);
        }
        (old, self.current)
    }

    /// Observer side: значение пришло от authority
    pub(crate) fn overwrite(&mut self, value: f32) {
        if value.is_finite() {
            self.current = value.clamp(self.min, self.max);
            self.depleted = self.current <= 0.0;
        }
    }

    pub(crate) fn reset_to_max(&mut self) {
        self.current = self.max;
        self.last_consumption = None;
        self.depleted = self.current <= 0.0;
    }
}
