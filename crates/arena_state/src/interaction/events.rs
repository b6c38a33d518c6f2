//! Interaction events

use bevy::prelude::*;

use super::effect::{CueKind, EffectCommand};
use super::pipeline::InteractionOutcome;
use super::trigger::TriggerEvent;

/// Input: interactor что-то сделал с interactable
///
/// ButtonPress шлёт host (input), Collision — physics host, VolumeEnter — detect_volume_entries.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct InteractionRequest {
    pub interactor: Entity,
    pub target: Entity,
    pub trigger: TriggerEvent,
}

/// Input: прервать активную sequence interactable'а
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelInteraction {
    pub target: Entity,
}

/// Внутренний: команда effect'а, которую надо применить к миру
#[derive(Event, Debug, Clone, PartialEq)]
pub struct InteractionCommand {
    pub source: Entity,
    pub command: EffectCommand,
}

/// Presentation: старт/стоп vfx, sfx или timeline
#[derive(Event, Debug, Clone, PartialEq)]
pub struct EffectCue {
    pub source: Entity,
    pub kind: CueKind,
    pub name: String,
    pub active: bool,
}

#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteractionFinished {
    pub target: Entity,
    pub interactor: Entity,
    pub outcome: InteractionOutcome,
}
