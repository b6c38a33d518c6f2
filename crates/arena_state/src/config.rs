//! SimulationConfig — все настраиваемые параметры симуляции (RON)
//!
//! Отсутствующие поля берутся из Default, так что config-файл может
//! переопределять только то, что нужно.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::{AimConfig, WeaponConfig};
use crate::movement::MotorConfig;
use crate::stats::StatDef;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// FixedUpdate частота
    pub tick_rate_hz: f64,
    /// Seed DeterministicRng
    pub seed: u64,
    /// Секунды между Eliminated и Respawned
    pub respawn_delay: f32,
    pub motor: MotorConfig,
    pub weapon: WeaponConfig,
    pub aim: AimConfig,
    /// Stat'ы игрока (первый Health — primary)
    pub stats: Vec<StatDef>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60.0,
            seed: 42,
            respawn_delay: 3.0,
            motor: MotorConfig::default(),
            weapon: WeaponConfig::default(),
            aim: AimConfig::default(),
            stats: StatDef::player_defaults(),
        }
    }
}

impl SimulationConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    /// Длительность одного тика (sec)
    pub fn tick_seconds(&self) -> f32 {
        if self.tick_rate_hz > 0.0 {
            (1.0 / self.tick_rate_hz) as f32
        } else {
            1.0 / 60.0
        }
    }
}
