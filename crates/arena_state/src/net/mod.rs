//! Network identity и authority
//!
//! Каждая entity имеет ровно одного authority (server или owner-client).
//! Authority — единственный writer её replicated state; остальные peers только observers.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор peer'а (server = 0, клиенты = 1..)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Reflect)]
pub struct PeerId(pub u64);

impl PeerId {
    pub const SERVER: PeerId = PeerId(0);

    pub fn is_server(&self) -> bool {
        *self == Self::SERVER
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_server() {
            write!(f, "server")
        } else {
            write!(f, "peer#{}", self.0)
        }
    }
}

/// Resource: какой peer исполняет этот App
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalPeer(pub PeerId);

impl Default for LocalPeer {
    fn default() -> Self {
        Self(PeerId::SERVER)
    }
}

/// Stable cross-peer ID entity (Entity локален для каждого App)
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Reflect)]
#[reflect(Component)]
pub struct NetId(pub u64);

/// Кто authority для entity
///
/// Инвариант: ровно один authority в каждый момент времени.
/// Игроки — owner-authoritative (движение, прицел, оружие),
/// ledger и life state — server-authoritative.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct Ownership {
    /// Owner entity (клиент, управляющий персонажем)
    pub owner: PeerId,
}

impl Ownership {
    pub fn new(owner: PeerId) -> Self {
        Self { owner }
    }

    /// Owner-authoritative state (movement, aim, weapon)
    pub fn is_owner(&self, local: PeerId) -> bool {
        self.owner == local
    }
}
