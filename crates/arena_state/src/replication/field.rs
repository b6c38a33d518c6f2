//! ReplicatedField — одно authoritative значение с permission policy
//!
//! Контракт:
//! - write = только authority, read = все
//! - каждый успешный `set` увеличивает sequence и помечает поле dirty
//! - observers применяют `FieldUpdate` только со строго более новым sequence
//! - `on change` callbacks срабатывают у ВСЕХ holders, включая самого authority
//!
//! Sequence — wrapping u16 (как packet index в naia), сравнение через half-range.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::channel::{RequestChannel, SetRequest};
use super::error::ReplicationError;
use crate::net::PeerId;

/// Returns whether or not a wrapping sequence is newer than another
/// sequence_newer(2, 1) == true, sequence_newer(0, 65535) == true, sequence_newer(1, 1) == false
pub fn sequence_newer(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= 32768)) || ((s1 < s2) && (s2 - s1 > 32768))
}

/// Изменение поля, отправляемое observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate<T> {
    pub authority: PeerId,
    pub sequence: u16,
    pub value: T,
}

/// Handle подписки на изменения (для unsubscribe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

type ChangeCallback<T> = Box<dyn Fn(&T, &T) + Send + Sync>;

/// Результат `set_or_request`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// Значение изменено локально (caller = authority)
    Applied,
    /// Значение совпало с текущим — no-op
    Unchanged,
    /// Caller не authority — intent поставлен в request channel
    Requested,
}

pub struct ReplicatedField<T> {
    value: T,
    authority: PeerId,
    sequence: u16,
    dirty: bool,
    observers: Vec<(SubscriptionId, ChangeCallback<T>)>,
    next_subscription: u32,
}

impl<T: Clone + PartialEq> ReplicatedField<T> {
    pub fn new(value: T, authority: PeerId) -> Self {
        Self {
            value,
            authority,
            sequence: 0,
            dirty: false,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn authority(&self) -> PeerId {
        self.authority
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_authority(&self, peer: PeerId) -> bool {
        self.authority == peer
    }

    /// Authoritative write.
    ///
    /// Ok(true) — значение изменилось, Ok(false) — совпало с текущим.
    pub fn set(&mut self, caller: PeerId, value: T) -> Result<bool, ReplicationError> {
        if caller != self.authority {
            return Err(ReplicationError::PermissionDenied {
                caller,
                authority: self.authority,
            });
        }

        if self.value == value {
            return Ok(false);
        }

        self.sequence = self.sequence.wrapping_add(1);
        self.dirty = true;
        self.replace_and_notify(value);
        Ok(true)
    }

    /// Write если caller authority, иначе intent уходит в request channel
    pub fn set_or_request(
        &mut self,
        caller: PeerId,
        value: T,
        channel: &mut RequestChannel<T>,
    ) -> SetOutcome {
        match self.set(caller, value.clone()) {
            Ok(true) => SetOutcome::Applied,
            Ok(false) => SetOutcome::Unchanged,
            Err(_) => {
                channel.submit(SetRequest {
                    requester: caller,
                    value,
                });
                SetOutcome::Requested
            }
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription = self.next_subscription.wrapping_add(1);
        self.observers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Забрать накопленное изменение (authority side, раз в тик)
    pub fn take_dirty(&mut self) -> Option<FieldUpdate<T>> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.snapshot())
    }

    /// Полное состояние поля (для initial sync нового observer)
    pub fn snapshot(&self) -> FieldUpdate<T> {
        FieldUpdate {
            authority: self.authority,
            sequence: self.sequence,
            value: self.value.clone(),
        }
    }

    /// Observer side: применить update от authority
    pub fn apply_remote(&mut self, update: FieldUpdate<T>) -> Result<(), ReplicationError> {
        if update.authority != self.authority {
            return Err(ReplicationError::PermissionDenied {
                caller: update.authority,
                authority: self.authority,
            });
        }

        if !sequence_newer(update.sequence, self.sequence) {
            return Err(ReplicationError::StaleUpdate {
                received: update.sequence,
                current: self.sequence,
            });
        }

        self.sequence = update.sequence;
        if self.value != update.value {
            self.replace_and_notify(update.value);
        }
        Ok(())
    }

    fn replace_and_notify(&mut self, value: T) {
        let old = std::mem::replace(&mut self.value, value);
        for (_, callback) in &self.observers {
            callback(&old, &self.value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReplicatedField<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedField")
            .field("value", &self.value)
            .field("authority", &self.authority)
            .field("sequence", &self.sequence)
            .finish()
    }
}
