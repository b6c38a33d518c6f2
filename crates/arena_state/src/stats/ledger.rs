//! StatLedger — упорядоченный набор stat'ов entity
//!
//! - Мутации только через `modify` / `try_consume` / `regenerate` и только authority (server)
//! - Каждое изменение → `LedgerEvent::Changed`
//! - Переход current > 0 → current ≤ 0 → `LedgerEvent::Depleted` ровно один раз (edge-triggered)
//! - `is_alive` = current primary stat'а > 0, пересчитывается при каждом изменении
//!
//! Неизвестный StatKey — не ошибка: warning в лог и no-op.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::stat::{Stat, StatDef, StatKey};
use crate::net::PeerId;
use crate::replication::sequence_newer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("{caller} cannot mutate stats owned by {authority}")]
    PermissionDenied { caller: PeerId, authority: PeerId },
}

/// Откуда пришло изменение
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub enum SourceKind {
    Damage,
    Heal,
    Consumption,
    /// Регенерация НЕ сбрасывает consumption timer
    Regeneration,
    Effect,
    Respawn,
    /// Значение пришло от authority (observer side)
    Replication,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
pub struct StatSource {
    /// NetId источника (стрелок, interactable...), 0 = мир/система
    pub id: u64,
    pub kind: SourceKind,
}

impl StatSource {
    pub fn new(id: u64, kind: SourceKind) -> Self {
        Self { id, kind }
    }

    pub fn system(kind: SourceKind) -> Self {
        Self { id: 0, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Changed {
        key: StatKey,
        old: f32,
        new: f32,
        source: StatSource,
    },
    Depleted {
        key: StatKey,
        source: StatSource,
    },
    AliveChanged {
        alive: bool,
    },
}

/// Replication payload ledger'а (только изменившиеся stat'ы)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsUpdate {
    pub authority: PeerId,
    pub sequence: u16,
    pub values: Vec<(StatKey, f32)>,
}

#[derive(Component, Debug, Clone)]
pub struct StatLedger {
    stats: Vec<Stat>,
    primary: StatKey,
    authority: PeerId,
    alive: bool,
    sequence: u16,
    dirty: Vec<StatKey>,
    events: Vec<LedgerEvent>,
}

impl StatLedger {
    /// Primary stat определяет liveness (обычно Health)
    pub fn new(defs: &[StatDef], primary: StatKey, authority: PeerId) -> Self {
        let stats: Vec<Stat> = defs.iter().map(Stat::from_def).collect();
        let alive = stats
            .iter()
            .find(|stat| stat.key == primary)
            .map_or(false, |stat| stat.current() > 0.0);

        if !stats.iter().any(|stat| stat.key == primary) {
            crate::logger::log_warning(&format!(
                "StatLedger: primary stat {} not in definitions, entity will never be alive",
                primary
            ));
        }

        Self {
            stats,
            primary,
            authority,
            alive,
            sequence: 0,
            dirty: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn authority(&self) -> PeerId {
        self.authority
    }

    pub fn primary(&self) -> StatKey {
        self.primary
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn stat(&self, key: StatKey) -> Option<&Stat> {
        self.stats.iter().find(|stat| stat.key == key)
    }

    /// Текущее значение. Неизвестный key → 0.0 sentinel (+ warning)
    pub fn get(&self, key: StatKey) -> f32 {
        match self.stat(key) {
            Some(stat) => stat.current(),
            None => {
                crate::logger::log_warning(&format!("StatLedger::get: unknown stat {}", key));
                0.0
            }
        }
    }

    fn check_authority(&self, caller: PeerId) -> Result<(), LedgerError> {
        if caller != self.authority {
            return Err(LedgerError::PermissionDenied {
                caller,
                authority: self.authority,
            });
        }
        Ok(())
    }

    /// Изменить stat на `delta` (clamp в [min, max])
    pub fn modify(
        &mut self,
        caller: PeerId,
        key: StatKey,
        delta: f32,
        source: StatSource,
        now: f64,
    ) -> Result<(), LedgerError> {
        self.check_authority(caller)?;

        let Some(index) = self.stats.iter().position(|stat| stat.key == key) else {
            crate::logger::log_warning(&format!(
                "StatLedger::modify: unknown stat {} (delta {}, source {:?})",
                key, delta, source
            ));
            return Ok(());
        };

        let stat = &mut self.stats[index];
        let (old, new) = stat.apply_delta(delta);

        if delta < 0.0 && source.kind != SourceKind::Regeneration {
            stat.last_consumption = Some(now);
        }

        let depleted_now = new <= 0.0 && !stat.depleted;
        if new <= 0.0 {
            stat.depleted = true;
        } else {
            stat.depleted = false;
        }

        if old != new {
            self.events.push(LedgerEvent::Changed { key, old, new, source });
            if !self.dirty.contains(&key) {
                self.dirty.push(key);
            }
        }

        if depleted_now {
            self.events.push(LedgerEvent::Depleted { key, source });
        }

        if key == self.primary {
            self.refresh_alive();
        }

        Ok(())
    }

    /// Списать `amount`, только если хватает (current ≥ amount)
    pub fn try_consume(
        &mut self,
        caller: PeerId,
        key: StatKey,
        amount: f32,
        source_id: u64,
        now: f64,
    ) -> Result<bool, LedgerError> {
        self.check_authority(caller)?;

        if !amount.is_finite() || amount < 0.0 {
            crate::logger::log_warning(&format!(
                "StatLedger::try_consume: invalid amount {} for {}",
                amount, key
            ));
            return Ok(false);
        }

        let Some(stat) = self.stat(key) else {
            crate::logger::log_warning(&format!("StatLedger::try_consume: unknown stat {}", key));
            return Ok(false);
        };

        if stat.current() < amount {
            return Ok(false);
        }

        self.modify(
            caller,
            key,
            -amount,
            StatSource::new(source_id, SourceKind::Consumption),
            now,
        )?;
        Ok(true)
    }

    /// Регенерация за тик. Вызывается authority, только пока entity жива.
    pub fn regenerate(&mut self, caller: PeerId, dt: f32, now: f64) -> Result<(), LedgerError> {
        self.check_authority(caller)?;

        if !self.alive || dt <= 0.0 {
            return Ok(());
        }

        let pending: Vec<(StatKey, f32)> = self
            .stats
            .iter()
            .filter(|stat| stat.regen_rate > 0.0 && stat.current() < stat.max)
            .filter(|stat| {
                stat.last_consumption
                    .map_or(true, |at| now - at >= stat.regen_delay as f64)
            })
            .map(|stat| (stat.key, stat.regen_rate * dt))
            .collect();

        for (key, amount) in pending {
            self.modify(caller, key, amount, StatSource::system(SourceKind::Regeneration), now)?;
        }
        Ok(())
    }

    /// Respawn: все stat'ы в max, depletion флаги сброшены
    pub fn reset_to_max(&mut self, caller: PeerId) -> Result<(), LedgerError> {
        self.check_authority(caller)?;

        let source = StatSource::system(SourceKind::Respawn);
        for stat in &mut self.stats {
            let old = stat.current();
            stat.reset_to_max();
            if old != stat.current() {
                self.events.push(LedgerEvent::Changed {
                    key: stat.key,
                    old,
                    new: stat.current(),
                    source,
                });
                if !self.dirty.contains(&stat.key) {
                    self.dirty.push(stat.key);
                }
            }
        }
        self.refresh_alive();
        Ok(())
    }

    fn refresh_alive(&mut self) {
        let alive = self
            .stat(self.primary)
            .map_or(false, |stat| stat.current() > 0.0);
        if alive != self.alive {
            self.alive = alive;
            self.events.push(LedgerEvent::AliveChanged { alive });
        }
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Authority side: изменившиеся stat'ы с прошлого вызова
    pub fn take_dirty(&mut self) -> Option<StatsUpdate> {
        if self.dirty.is_empty() {
            return None;
        }
        self.sequence = self.sequence.wrapping_add(1);
        let values = self
            .dirty
            .drain(..)
            .filter_map(|key| {
                self.stats
                    .iter()
                    .find(|stat| stat.key == key)
                    .map(|stat| (key, stat.current()))
            })
            .collect();
        Some(StatsUpdate {
            authority: self.authority,
            sequence: self.sequence,
            values,
        })
    }

    /// Observer side: применить значения authority
    ///
    /// Возвращает false для stale / чужого update.
    pub fn apply_remote(&mut self, update: &StatsUpdate) -> bool {
        if update.authority != self.authority || !sequence_newer(update.sequence, self.sequence) {
            return false;
        }
        self.sequence = update.sequence;

        let source = StatSource::system(SourceKind::Replication);
        for (key, value) in &update.values {
            let Some(stat) = self.stats.iter_mut().find(|stat| stat.key == *key) else {
                crate::logger::log_warning(&format!(
                    "StatLedger::apply_remote: unknown stat {} in update",
                    key
                ));
                continue;
            };
            let old = stat.current();
            let was_depleted = stat.depleted;
            stat.overwrite(*value);
            let new = stat.current();
            if old != new {
                self.events.push(LedgerEvent::Changed { key: *key, old, new, source });
            }
            if stat.depleted && !was_depleted {
                self.events.push(LedgerEvent::Depleted { key: *key, source });
            }
        }
        self.refresh_alive();
        true
    }
}
