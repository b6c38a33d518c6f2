//! InteractionTrigger — когда взаимодействие вообще разрешено
//!
//! Gate: принятый тип trigger'а → single-use latch → cooldown → eligibility predicate.

use std::fmt;
use std::sync::Arc;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::net::PeerId;

/// Что произошло (присылает host / volume detection)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
pub enum TriggerEvent {
    ButtonPress,
    VolumeEnter,
    /// Rigidbody collision (impulse от physics backend)
    Collision { impulse: f32 },
}

/// Какие trigger'ы interactable принимает
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
pub enum TriggerKind {
    ButtonPress,
    VolumeEnter,
    Collision { min_impulse: f32 },
}

impl TriggerKind {
    pub fn accepts(&self, event: TriggerEvent) -> bool {
        match (self, event) {
            (TriggerKind::ButtonPress, TriggerEvent::ButtonPress) => true,
            (TriggerKind::VolumeEnter, TriggerEvent::VolumeEnter) => true,
            (TriggerKind::Collision { min_impulse }, TriggerEvent::Collision { impulse }) => impulse >= *min_impulse,
            _ => false,
        }
    }
}

/// Снимок interactor'а для eligibility predicate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractorInfo {
    pub entity: Entity,
    pub peer: PeerId,
    pub alive: bool,
    pub position: Vec3,
}

pub type EligibilityFn = Arc<dyn Fn(&InteractorInfo) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRejection {
    KindNotAccepted,
    AlreadyUsed,
    Cooldown,
    Ineligible,
    /// Предыдущая sequence ещё идёт
    Busy,
}

pub struct InteractionTrigger {
    pub accepts: Vec<TriggerKind>,
    /// Секунды между срабатываниями
    pub cooldown: f32,
    pub single_use: bool,
    eligibility: EligibilityFn,
    last_triggered: Option<f64>,
    used: bool,
}

impl InteractionTrigger {
    /// По умолчанию: только живые interactors
    pub fn new(accepts: Vec<TriggerKind>) -> Self {
        Self {
            accepts,
            cooldown: 0.0,
            single_use: false,
            eligibility: Arc::new(|info: &InteractorInfo| info.alive),
            last_triggered: None,
            used: false,
        }
    }

    pub fn with_cooldown(mut self, cooldown: f32) -> Self {
        self.cooldown = cooldown.max(0.0);
        self
    }

    pub fn single_use(mut self) -> Self {
        self.single_use = true;
        self
    }

    pub fn with_eligibility<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&InteractorInfo) -> bool + Send + Sync + 'static,
    {
        self.eligibility = Arc::new(predicate);
        self
    }

    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Проверка без side effects
    pub fn check(&self, event: TriggerEvent, interactor: &InteractorInfo, now: f64) -> Result<(), TriggerRejection> {
        if !self.accepts.iter().any(|kind| kind.accepts(event)) {
            return Err(TriggerRejection::KindNotAccepted);
        }
        if self.single_use && self.used {
            return Err(TriggerRejection::AlreadyUsed);
        }
        if let Some(last) = self.last_triggered {
            if now - last + 1e-6 < self.cooldown as f64 {
                return Err(TriggerRejection::Cooldown);
            }
        }
        if !(self.eligibility)(interactor) {
            return Err(TriggerRejection::Ineligible);
        }
        Ok(())
    }

    /// Trigger принят — старт cooldown
    pub fn mark_triggered(&mut self, now: f64) {
        self.last_triggered = Some(now);
    }

    /// Sequence полностью отработала — single-use закрывается
    pub fn latch(&mut self) {
        if self.single_use {
            self.used = true;
        }
    }
}

impl fmt::Debug for InteractionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionTrigger")
            .field("accepts", &self.accepts)
            .field("cooldown", &self.cooldown)
            .field("single_use", &self.single_use)
            .field("last_triggered", &self.last_triggered)
            .field("used", &self.used)
            .finish()
    }
}
