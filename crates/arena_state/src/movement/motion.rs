//! MotionState — replicated результат движения (owner-authoritative)

use bevy::prelude::*;

use crate::net::PeerId;
use crate::replication::{ReplicatedField, ReplicationError};

/// Position/yaw/grounded персонажа для observers
///
/// Owner пишет после каждого тика мотора, observers получают через replication
/// и копируют в Transform (`sync_remote_motion`).
#[derive(Component, Debug)]
pub struct MotionState {
    pub position: ReplicatedField<Vec3>,
    pub yaw: ReplicatedField<f32>,
    pub grounded: ReplicatedField<bool>,
}

impl MotionState {
    pub fn new(owner: PeerId, position: Vec3, yaw: f32) -> Self {
        Self {
            position: ReplicatedField::new(position, owner),
            yaw: ReplicatedField::new(yaw, owner),
            grounded: ReplicatedField::new(false, owner),
        }
    }

    /// Owner side: записать результат тика
    pub fn record(&mut self, caller: PeerId, position: Vec3, yaw: f32, grounded: bool) -> Result<(), ReplicationError> {
        self.position.set(caller, position)?;
        self.yaw.set(caller, yaw)?;
        self.grounded.set(caller, grounded)?;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.position.is_dirty() || self.yaw.is_dirty() || self.grounded.is_dirty()
    }
}
