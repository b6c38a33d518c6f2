//! PlayerLife — цикл InitialSpawn → Eliminated ⇄ Respawned (server-authoritative)

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::net::PeerId;
use crate::replication::ReplicatedField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum LifeState {
    #[default]
    InitialSpawn,
    Eliminated,
    Respawned,
}

impl LifeState {
    pub fn can_transition_to(self, to: LifeState) -> bool {
        matches!(
            (self, to),
            (LifeState::InitialSpawn, LifeState::Eliminated)
                | (LifeState::Eliminated, LifeState::Respawned)
                | (LifeState::Respawned, LifeState::Eliminated)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifeError {
    #[error("{caller} cannot change life state owned by {authority}")]
    PermissionDenied { caller: PeerId, authority: PeerId },

    #[error("invalid life transition {from:?} -> {to:?}")]
    InvalidTransition { from: LifeState, to: LifeState },
}

/// Точка respawn'а игрока
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub yaw: f32,
}

impl SpawnPoint {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }
}

#[derive(Component, Debug)]
pub struct PlayerLife {
    pub state: ReplicatedField<LifeState>,
    /// Время respawn'а (server, пока Eliminated)
    pub respawn_at: Option<f64>,
    /// Последнее состояние, на которое этот peer уже отреагировал
    observed: LifeState,
}

impl PlayerLife {
    pub fn new(authority: PeerId) -> Self {
        Self {
            state: ReplicatedField::new(LifeState::InitialSpawn, authority),
            respawn_at: None,
            observed: LifeState::InitialSpawn,
        }
    }

    pub fn state(&self) -> LifeState {
        *self.state.get()
    }

    pub fn is_eliminated(&self) -> bool {
        self.state() == LifeState::Eliminated
    }

    /// Authority: перевести в `to`. Возвращает предыдущее состояние.
    pub fn transition(&mut self, caller: PeerId, to: LifeState) -> Result<LifeState, LifeError> {
        if !self.state.is_authority(caller) {
            return Err(LifeError::PermissionDenied {
                caller,
                authority: self.state.authority(),
            });
        }

        let from = self.state();
        if !from.can_transition_to(to) {
            return Err(LifeError::InvalidTransition { from, to });
        }

        self.state.set(caller, to).map_err(|_| LifeError::PermissionDenied {
            caller,
            authority: self.state.authority(),
        })?;
        Ok(from)
    }

    /// Непросмотренное изменение (локальное или пришедшее по сети).
    ///
    /// Каждый peer видит каждый переход ровно один раз.
    pub fn take_observed_change(&mut self) -> Option<(LifeState, LifeState)> {
        let current = self.state();
        if current == self.observed {
            return None;
        }
        let from = std::mem::replace(&mut self.observed, current);
        Some((from, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER: PeerId = PeerId::SERVER;

    #[test]
    fn test_valid_cycle() {
        let mut life = PlayerLife::new(SERVER);

        assert_eq!(life.transition(SERVER, LifeState::Eliminated), Ok(LifeState::InitialSpawn));
        assert!(life.is_eliminated());
        assert_eq!(life.transition(SERVER, LifeState::Respawned), Ok(LifeState::Eliminated));
        assert_eq!(life.transition(SERVER, LifeState::Eliminated), Ok(LifeState::Respawned));
        assert_eq!(life.transition(SERVER, LifeState::Respawned), Ok(LifeState::Eliminated));
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut life = PlayerLife::new(SERVER);

        assert_eq!(
            life.transition(SERVER, LifeState::Respawned),
            Err(LifeError::InvalidTransition {
                from: LifeState::InitialSpawn,
                to: LifeState::Respawned
            })
        );

        life.transition(SERVER, LifeState::Eliminated).unwrap();
        // Повторная смерть без respawn'а
        assert!(life.transition(SERVER, LifeState::Eliminated).is_err());
        assert!(life.transition(SERVER, LifeState::InitialSpawn).is_err());
        assert_eq!(life.state(), LifeState::Eliminated);
    }

    #[test]
    fn test_client_cannot_transition() {
        let mut life = PlayerLife::new(SERVER);
        assert_eq!(
            life.transition(PeerId(3), LifeState::Eliminated),
            Err(LifeError::PermissionDenied {
                caller: PeerId(3),
                authority: SERVER
            })
        );
        assert_eq!(life.state(), LifeState::InitialSpawn);
    }

    #[test]
    fn test_observed_change_reported_once() {
        let mut life = PlayerLife::new(SERVER);
        assert_eq!(life.take_observed_change(), None);

        life.transition(SERVER, LifeState::Eliminated).unwrap();
        assert_eq!(
            life.take_observed_change(),
            Some((LifeState::InitialSpawn, LifeState::Eliminated))
        );
        assert_eq!(life.take_observed_change(), None);
    }
}
