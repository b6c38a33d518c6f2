//! Interactable — entity, с которой можно взаимодействовать
//!
//! Держит trigger gate, набор effects и не больше одной активной sequence.

use std::collections::HashSet;

use bevy::prelude::*;

use super::effect::{EffectCommand, EffectContext, PrioritizedEffect};
use super::pipeline::{CancelToken, EffectSequence, InteractionOutcome, SequenceStatus};
use super::trigger::{InteractionTrigger, InteractorInfo, TriggerEvent, TriggerRejection};

#[derive(Component, Debug)]
pub struct Interactable {
    pub trigger: InteractionTrigger,
    pub effects: Vec<PrioritizedEffect>,
    /// Self-removal через N секунд после успешного завершения sequence
    pub remove_after: Option<f32>,
    active: Option<EffectSequence>,
    removal_at: Option<f64>,
}

impl Interactable {
    pub fn new(trigger: InteractionTrigger, effects: Vec<PrioritizedEffect>) -> Self {
        Self {
            trigger,
            effects,
            remove_after: None,
            active: None,
            removal_at: None,
        }
    }

    pub fn with_removal(mut self, delay: f32) -> Self {
        self.remove_after = Some(delay.max(0.0));
        self
    }

    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_sequence(&self) -> Option<&EffectSequence> {
        self.active.as_ref()
    }

    pub fn removal_at(&self) -> Option<f64> {
        self.removal_at
    }

    /// Trigger → старт sequence. Effects захватываются здесь, один раз.
    pub fn begin(
        &mut self,
        event: TriggerEvent,
        interactor: &InteractorInfo,
        source: Entity,
        now: f64,
    ) -> Result<CancelToken, TriggerRejection> {
        if self.active.is_some() {
            return Err(TriggerRejection::Busy);
        }
        // Уже ждёт удаления — повторно не срабатывает
        if self.removal_at.is_some() {
            return Err(TriggerRejection::AlreadyUsed);
        }
        self.trigger.check(event, interactor, now)?;
        self.trigger.mark_triggered(now);

        let token = CancelToken::new();
        let ctx = EffectContext {
            source,
            interactor: interactor.entity,
        };
        self.active = Some(EffectSequence::new(ctx, &self.effects, token.clone()));
        Ok(token)
    }

    /// Внешняя отмена: сработает на следующем тике sequence
    pub fn cancel(&self) -> bool {
        match &self.active {
            Some(sequence) => {
                sequence.token().cancel();
                true
            }
            None => false,
        }
    }

    /// Тик активной sequence. `Some` — sequence закончилась в этом тике.
    pub fn tick(
        &mut self,
        dt: f32,
        interactor_valid: bool,
        now: f64,
        out: &mut Vec<EffectCommand>,
    ) -> Option<(EffectContext, InteractionOutcome)> {
        let sequence = self.active.as_mut()?;
        let SequenceStatus::Finished(outcome) = sequence.tick(dt, interactor_valid, out) else {
            return None;
        };
        let ctx = sequence.context();
        self.active = None;

        if outcome == InteractionOutcome::Completed {
            self.trigger.latch();
            if let Some(delay) = self.remove_after {
                self.removal_at = Some(now + delay as f64);
            }
        }
        Some((ctx, outcome))
    }
}

/// Axis-aligned trigger volume вокруг Transform interactable'а
#[derive(Component, Debug, Clone, Default)]
pub struct TriggerVolume {
    pub half_extents: Vec3,
    /// Кто был внутри на прошлом тике (VolumeEnter только на входе)
    pub inside: HashSet<Entity>,
}

impl TriggerVolume {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents: half_extents.abs(),
            inside: HashSet::new(),
        }
    }

    pub fn contains(&self, center: Vec3, point: Vec3) -> bool {
        let local = (point - center).abs();
        local.x <= self.half_extents.x && local.y <= self.half_extents.y && local.z <= self.half_extents.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::effect::InteractionEffect;
    use crate::interaction::trigger::TriggerKind;
    use crate::net::PeerId;
    use crate::stats::StatKey;

    fn source() -> Entity {
        Entity::from_raw(10)
    }

    fn who() -> InteractorInfo {
        InteractorInfo {
            entity: Entity::from_raw(1),
            peer: PeerId(1),
            alive: true,
            position: Vec3::ZERO,
        }
    }

    fn heal_pad() -> Interactable {
        Interactable::new(
            InteractionTrigger::new(vec![TriggerKind::ButtonPress]).single_use(),
            vec![
                PrioritizedEffect::new(
                    2,
                    InteractionEffect::Sfx {
                        cue: "chime".to_string(),
                        duration: 0.2,
                    },
                ),
                PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 25.0 }),
            ],
        )
        .with_removal(5.0)
    }

    #[test]
    fn test_busy_while_sequence_runs() {
        let mut pad = heal_pad();
        assert!(pad.begin(TriggerEvent::ButtonPress, &who(), source(), 0.0).is_ok());
        assert!(pad.is_busy());
        assert_eq!(
            pad.begin(TriggerEvent::ButtonPress, &who(), source(), 0.0).err(),
            Some(TriggerRejection::Busy)
        );
    }

    #[test]
    fn test_completion_latches_and_schedules_removal() {
        let mut pad = heal_pad();
        pad.begin(TriggerEvent::ButtonPress, &who(), source(), 1.0).unwrap();
        let mut out = Vec::new();

        assert!(pad.tick(0.1, true, 1.1, &mut out).is_none());
        let finished = pad.tick(0.1, true, 1.2, &mut out);

        assert_eq!(finished.map(|(_, outcome)| outcome), Some(InteractionOutcome::Completed));
        assert!(!pad.is_busy());
        assert!(pad.trigger.is_used());
        assert_eq!(pad.removal_at(), Some(1.2 + 5.0));
        assert!(out.iter().any(|command| matches!(command, EffectCommand::ModifyStat { delta, .. } if *delta == 25.0)));
    }

    #[test]
    fn test_cancel_does_not_latch() {
        let mut pad = heal_pad();
        pad.begin(TriggerEvent::ButtonPress, &who(), source(), 0.0).unwrap();
        assert!(pad.cancel());

        let mut out = Vec::new();
        let finished = pad.tick(0.1, true, 0.1, &mut out);

        assert_eq!(finished.map(|(_, outcome)| outcome), Some(InteractionOutcome::Cancelled));
        assert!(!pad.trigger.is_used());
        assert_eq!(pad.removal_at(), None);
        // Можно снова
        assert!(pad.begin(TriggerEvent::ButtonPress, &who(), source(), 0.2).is_ok());
    }

    #[test]
    fn test_volume_contains() {
        let volume = TriggerVolume::new(Vec3::new(1.0, 2.0, 1.0));
        let center = Vec3::new(5.0, 0.0, 0.0);
        assert!(volume.contains(center, Vec3::new(5.5, 1.5, -0.9)));
        assert!(!volume.contains(center, Vec3::new(6.5, 0.0, 0.0)));
    }
}
