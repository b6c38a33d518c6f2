//! InteractionEffect — закрытый набор behaviors одного взаимодействия
//!
//! Effect не трогает мир напрямую: `start`/`cancel` возвращают `EffectCommand`,
//! их применяет система (с учётом authority каждой цели).
//! Timed effects (vfx, sfx, timeline, отложенный despawn) живут несколько тиков.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::stats::StatKey;

/// Presentation cue (vfx/sfx/timeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum CueKind {
    Vfx,
    Sfx,
    Timeline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub enum InteractionEffect {
    /// Импульс interactor'у (CharacterMotor::add_force)
    Force { impulse: Vec3 },
    Teleport { destination: Vec3, yaw: Option<f32> },
    ModifyStat { key: StatKey, delta: f32 },
    Vfx { cue: String, duration: f32 },
    Sfx { cue: String, duration: f32 },
    /// Scripted sequence (камера, анимация двери...) — длится `duration`
    Timeline { name: String, duration: f32 },
    /// Despawn самого interactable после `delay`
    Despawn { delay: f32 },
}

/// Side effect, который должна применить система
#[derive(Debug, Clone, PartialEq)]
pub enum EffectCommand {
    ApplyForce { target: Entity, impulse: Vec3 },
    Teleport { target: Entity, destination: Vec3, yaw: Option<f32> },
    ModifyStat { target: Entity, key: StatKey, delta: f32 },
    StartCue { kind: CueKind, name: String, at: Entity },
    StopCue { kind: CueKind, name: String, at: Entity },
    Despawn { entity: Entity },
}

/// Контекст запуска: кто взаимодействует и с чем
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectContext {
    pub source: Entity,
    pub interactor: Entity,
}

impl InteractionEffect {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionEffect::Force { .. } => "force",
            InteractionEffect::Teleport { .. } => "teleport",
            InteractionEffect::ModifyStat { .. } => "modify_stat",
            InteractionEffect::Vfx { .. } => "vfx",
            InteractionEffect::Sfx { .. } => "sfx",
            InteractionEffect::Timeline { .. } => "timeline",
            InteractionEffect::Despawn { .. } => "despawn",
        }
    }

    /// Сколько effect длится (0 = мгновенный)
    pub fn duration(&self) -> f32 {
        match self {
            InteractionEffect::Vfx { duration, .. }
            | InteractionEffect::Sfx { duration, .. }
            | InteractionEffect::Timeline { duration, .. } => duration.max(0.0),
            InteractionEffect::Despawn { delay } => delay.max(0.0),
            _ => 0.0,
        }
    }

    fn cue(&self) -> Option<(CueKind, &str)> {
        match self {
            InteractionEffect::Vfx { cue, .. } => Some((CueKind::Vfx, cue)),
            InteractionEffect::Sfx { cue, .. } => Some((CueKind::Sfx, cue)),
            InteractionEffect::Timeline { name, .. } => Some((CueKind::Timeline, name)),
            _ => None,
        }
    }

    /// Начало effect'а
    pub fn start(&self, ctx: EffectContext) -> Vec<EffectCommand> {
        match self {
            InteractionEffect::Force { impulse } => vec![EffectCommand::ApplyForce {
                target: ctx.interactor,
                impulse: *impulse,
            }],
            InteractionEffect::Teleport { destination, yaw } => vec![EffectCommand::Teleport {
                target: ctx.interactor,
                destination: *destination,
                yaw: *yaw,
            }],
            InteractionEffect::ModifyStat { key, delta } => vec![EffectCommand::ModifyStat {
                target: ctx.interactor,
                key: *key,
                delta: *delta,
            }],
            InteractionEffect::Vfx { .. } | InteractionEffect::Sfx { .. } | InteractionEffect::Timeline { .. } => self
                .cue()
                .map(|(kind, name)| EffectCommand::StartCue {
                    kind,
                    name: name.to_string(),
                    at: ctx.source,
                })
                .into_iter()
                .collect(),
            InteractionEffect::Despawn { .. } => Vec::new(),
        }
    }

    /// Effect отработал полностью
    pub fn finish(&self, ctx: EffectContext) -> Vec<EffectCommand> {
        match self {
            InteractionEffect::Despawn { .. } => vec![EffectCommand::Despawn { entity: ctx.source }],
            _ => Vec::new(),
        }
    }

    /// Прерван посреди выполнения: cue останавливается, despawn не происходит
    pub fn cancel(&self, ctx: EffectContext) -> Vec<EffectCommand> {
        self.cue()
            .map(|(kind, name)| EffectCommand::StopCue {
                kind,
                name: name.to_string(),
                at: ctx.source,
            })
            .into_iter()
            .collect()
    }
}

/// Effect + приоритет (выше — раньше)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub struct PrioritizedEffect {
    pub priority: i32,
    pub effect: InteractionEffect,
}

impl PrioritizedEffect {
    pub fn new(priority: i32, effect: InteractionEffect) -> Self {
        Self { priority, effect }
    }
}
