//! Interaction module
//!
//! ECS ответственность:
//! - InteractionTrigger: gate (тип trigger'а, cooldown, single-use, eligibility)
//! - InteractionEffect: закрытый набор effects → EffectCommand
//! - EffectSequence: строго последовательный запуск по priority, cooperative cancel
//! - Interactable: trigger + effects + self-removal
//!
//! Vfx/sfx/timeline здесь только cue events — проигрывает их presentation layer.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod effect;
pub mod events;
pub mod interactable;
pub mod pipeline;
pub mod systems;
pub mod trigger;

pub use effect::{CueKind, EffectCommand, EffectContext, InteractionEffect, PrioritizedEffect};
pub use events::{CancelInteraction, EffectCue, InteractionCommand, InteractionFinished, InteractionRequest};
pub use interactable::{Interactable, TriggerVolume};
pub use pipeline::{CancelToken, EffectSequence, InteractionOutcome, SequenceStatus};
pub use trigger::{EligibilityFn, InteractionTrigger, InteractorInfo, TriggerEvent, TriggerKind, TriggerRejection};

/// Interaction Plugin
///
/// Порядок:
/// 1. detect_volume_entries — VolumeEnter по TriggerVolume
/// 2. handle_interaction_requests — trigger gate, старт sequence (или forward owner'у)
/// 3. run_effect_sequences — cancel + тик sequences
/// 4. apply_interaction_commands — команды effects → мир / AuthorityRequest
/// 5. despawn_expired_interactables — delayed self-removal
pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<InteractionRequest>()
            .add_event::<CancelInteraction>()
            .add_event::<InteractionCommand>()
            .add_event::<EffectCue>()
            .add_event::<InteractionFinished>();

        app.add_systems(
            FixedUpdate,
            (
                systems::detect_volume_entries,
                systems::handle_interaction_requests,
                systems::run_effect_sequences,
                systems::apply_interaction_commands,
                systems::despawn_expired_interactables,
            )
                .chain()
                .in_set(SimulationSet::Interaction),
        );
    }
}
