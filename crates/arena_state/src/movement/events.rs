//! Movement events

use bevy::prelude::*;

/// Event: намерение прыгнуть (jump intent)
///
/// Генерируется input layer'ом host'а (или тестом).
/// Обрабатывается: `apply_jump_intents` → `MovementInput::jump` на этот тик.
#[derive(Event, Debug, Clone)]
pub struct JumpIntent {
    pub entity: Entity,
}

/// Event: приземление с заметной скоростью (для landing VFX/SFX/camera shake)
#[derive(Event, Debug, Clone)]
pub struct Landed {
    pub entity: Entity,
    /// Скорость падения в момент касания (m/s, положительная)
    pub impact_speed: f32,
}

/// Event: прыжок выполнен
#[derive(Event, Debug, Clone)]
pub struct Jumped {
    pub entity: Entity,
    pub air_jump: bool,
}
