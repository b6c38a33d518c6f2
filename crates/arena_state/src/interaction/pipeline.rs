//! EffectSequence — строго последовательный запуск effects одного взаимодействия
//!
//! - Набор effects захватывается один раз при старте (stable sort, priority desc)
//! - Следующий effect стартует только после завершения текущего
//! - Cancellation кооперативный: `CancelToken` проверяется в начале каждого тика,
//!   текущий effect получает `cancel`, оставшиеся не запускаются
//! - Interactor стал невалидным (despawn / eliminated) → abort, так же как cancel

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::effect::{EffectCommand, EffectContext, PrioritizedEffect};

/// Shared флаг отмены (может держать кто угодно: UI, script, другой effect)
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Чем закончилась sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionOutcome {
    Completed,
    Cancelled,
    /// Interactor пропал / eliminated
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    Running,
    Finished(InteractionOutcome),
}

#[derive(Debug)]
struct RunningEffect {
    entry: PrioritizedEffect,
    elapsed: f32,
}

#[derive(Debug)]
pub struct EffectSequence {
    ctx: EffectContext,
    queue: VecDeque<PrioritizedEffect>,
    current: Option<RunningEffect>,
    token: CancelToken,
    started: Vec<i32>,
    outcome: Option<InteractionOutcome>,
}

impl EffectSequence {
    pub fn new(ctx: EffectContext, effects: &[PrioritizedEffect], token: CancelToken) -> Self {
        let mut queue: Vec<PrioritizedEffect> = effects.to_vec();
        // sort_by — stable: равные приоритеты в порядке объявления
        queue.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self {
            ctx,
            queue: queue.into(),
            current: None,
            token,
            started: Vec::new(),
            outcome: None,
        }
    }

    pub fn context(&self) -> EffectContext {
        self.ctx
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// Приоритеты effects, которые уже стартовали (в порядке запуска)
    pub fn started_priorities(&self) -> &[i32] {
        &self.started
    }

    pub fn current_priority(&self) -> Option<i32> {
        self.current.as_ref().map(|running| running.entry.priority)
    }

    pub fn outcome(&self) -> Option<InteractionOutcome> {
        self.outcome
    }

    /// Один тик. Команды effects дописываются в `out`.
    ///
    /// Мгновенные effects завершаются в том же тике и сразу передают ход следующему.
    /// `dt` получает только первый effect тика: timed effect, стартовавший после
    /// завершения предыдущего, начинает отсчёт со следующего тика.
    pub fn tick(&mut self, dt: f32, interactor_valid: bool, out: &mut Vec<EffectCommand>) -> SequenceStatus {
        if let Some(outcome) = self.outcome {
            return SequenceStatus::Finished(outcome);
        }

        if self.token.is_cancelled() {
            return self.stop(InteractionOutcome::Cancelled, out);
        }
        if !interactor_valid {
            return self.stop(InteractionOutcome::Aborted, out);
        }

        let mut budget = dt.max(0.0);
        loop {
            let mut running = match self.current.take() {
                Some(running) => running,
                None => {
                    let Some(entry) = self.queue.pop_front() else {
                        self.outcome = Some(InteractionOutcome::Completed);
                        return SequenceStatus::Finished(InteractionOutcome::Completed);
                    };
                    out.extend(entry.effect.start(self.ctx));
                    self.started.push(entry.priority);
                    RunningEffect { entry, elapsed: 0.0 }
                }
            };

            running.elapsed += budget;
            budget = 0.0;

            if running.elapsed + 1e-6 < running.entry.effect.duration() {
                self.current = Some(running);
                return SequenceStatus::Running;
            }

            out.extend(running.entry.effect.finish(self.ctx));
        }
    }

    fn stop(&mut self, outcome: InteractionOutcome, out: &mut Vec<EffectCommand>) -> SequenceStatus {
        if let Some(running) = self.current.take() {
            out.extend(running.entry.effect.cancel(self.ctx));
        }
        self.queue.clear();
        self.outcome = Some(outcome);
        SequenceStatus::Finished(outcome)
    }
}

#[cfg(test)]
mod tests {
    use bevy::prelude::*;

    use super::*;
    use crate::interaction::effect::{CueKind, InteractionEffect};
    use crate::stats::StatKey;

    const DT: f32 = 0.1;

    fn ctx() -> EffectContext {
        EffectContext {
            source: Entity::from_raw(1),
            interactor: Entity::from_raw(2),
        }
    }

    fn timeline(priority: i32, name: &str, duration: f32) -> PrioritizedEffect {
        PrioritizedEffect::new(
            priority,
            InteractionEffect::Timeline {
                name: name.to_string(),
                duration,
            },
        )
    }

    #[test]
    fn test_runs_in_descending_priority() {
        let effects = [timeline(5, "a", 0.1), timeline(1, "c", 0.1), timeline(3, "b", 0.1)];
        let mut sequence = EffectSequence::new(ctx(), &effects, CancelToken::new());
        let mut out = Vec::new();

        let mut ticks = 0;
        while sequence.tick(DT, true, &mut out) == SequenceStatus::Running {
            ticks += 1;
            assert!(ticks < 20);
        }

        assert_eq!(sequence.started_priorities(), &[5, 3, 1]);
        assert_eq!(sequence.outcome(), Some(InteractionOutcome::Completed));
        let started: Vec<&str> = out
            .iter()
            .filter_map(|command| match command {
                EffectCommand::StartCue { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(started, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_strictly_sequential() {
        let effects = [timeline(2, "long", 0.5), timeline(1, "next", 0.1)];
        let mut sequence = EffectSequence::new(ctx(), &effects, CancelToken::new());
        let mut out = Vec::new();

        // 0.4 sec из 0.5 — long ещё идёт, next не стартовал
        for _ in 0..4 {
            assert_eq!(sequence.tick(DT, true, &mut out), SequenceStatus::Running);
            assert_eq!(sequence.current_priority(), Some(2));
        }
        assert_eq!(sequence.started_priorities(), &[2]);

        sequence.tick(DT, true, &mut out);
        assert_eq!(sequence.current_priority(), Some(1));
        assert_eq!(sequence.started_priorities(), &[2, 1]);
    }

    #[test]
    fn test_cancel_during_second_skips_third() {
        let effects = [timeline(5, "a", 0.1), timeline(1, "c", 0.1), timeline(3, "b", 1.0)];
        let token = CancelToken::new();
        let mut sequence = EffectSequence::new(ctx(), &effects, token.clone());
        let mut out = Vec::new();

        while sequence.current_priority() != Some(3) {
            assert_eq!(sequence.tick(DT, true, &mut out), SequenceStatus::Running);
        }
        out.clear();

        token.cancel();
        assert_eq!(
            sequence.tick(DT, true, &mut out),
            SequenceStatus::Finished(InteractionOutcome::Cancelled)
        );
        assert_eq!(
            out,
            vec![EffectCommand::StopCue {
                kind: CueKind::Timeline,
                name: "b".to_string(),
                at: Entity::from_raw(1)
            }]
        );
        assert_eq!(sequence.started_priorities(), &[5, 3]);

        // Дальше ничего не происходит
        out.clear();
        sequence.tick(DT, true, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_interactor_aborts() {
        let effects = [
            timeline(2, "intro", 0.3),
            PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 25.0 }),
        ];
        let mut sequence = EffectSequence::new(ctx(), &effects, CancelToken::new());
        let mut out = Vec::new();

        sequence.tick(DT, true, &mut out);
        assert_eq!(
            sequence.tick(DT, false, &mut out),
            SequenceStatus::Finished(InteractionOutcome::Aborted)
        );
        assert!(!out.iter().any(|command| matches!(command, EffectCommand::ModifyStat { .. })));
    }

    #[test]
    fn test_instant_effects_chain_in_one_tick() {
        let effects = [
            PrioritizedEffect::new(2, InteractionEffect::Force { impulse: Vec3::Y }),
            PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 10.0 }),
        ];
        let mut sequence = EffectSequence::new(ctx(), &effects, CancelToken::new());
        let mut out = Vec::new();

        assert_eq!(
            sequence.tick(DT, true, &mut out),
            SequenceStatus::Finished(InteractionOutcome::Completed)
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_equal_priorities_keep_declaration_order() {
        let effects = [timeline(1, "first", 0.0), timeline(1, "second", 0.0)];
        let mut sequence = EffectSequence::new(ctx(), &effects, CancelToken::new());
        let mut out = Vec::new();
        sequence.tick(DT, true, &mut out);

        assert!(matches!(&out[0], EffectCommand::StartCue { name, .. } if name == "first"));
    }
}
