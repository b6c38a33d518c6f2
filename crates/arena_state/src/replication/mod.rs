//! Replication module
//!
//! - `field`: ReplicatedField<T> — один authoritative value, sequence + dirty flag
//! - `channel`: RequestChannel<T> — non-authority intents к authority
//! - `delta`: явный state diffing в ReplicationFrame (bincode), outbox/inbox для transport'а
//! - `requests`: authority исполняет AuthorityRequest от других peers
//!
//! Сам transport (сокеты, reliability) — снаружи: он только переносит байты
//! из `ReplicationOutbox` одного peer'а в `ReplicationInbox` другого.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod channel;
pub mod delta;
pub mod error;
pub mod field;
pub mod requests;

pub use channel::{RequestChannel, SetRequest};
pub use delta::{
    AuthorityRequest, EntityDelta, ReplicatedParts, ReplicationFrame, ReplicationInbox, ReplicationOutbox,
};
pub use error::ReplicationError;
pub use field::{sequence_newer, FieldUpdate, ReplicatedField, SetOutcome, SubscriptionId};

/// Replication Plugin
///
/// apply_replication → process_authority_requests — первыми в тике (ReplicationApply),
/// collect_replication — последней (ReplicationCollect).
pub struct ReplicationPlugin;

impl Plugin for ReplicationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ReplicationOutbox>()
            .init_resource::<ReplicationInbox>();

        app.add_systems(
            FixedUpdate,
            (delta::apply_replication, requests::process_authority_requests)
                .chain()
                .in_set(SimulationSet::ReplicationApply),
        )
        .add_systems(FixedUpdate, delta::collect_replication.in_set(SimulationSet::ReplicationCollect));
    }
}
