//! State diffing: dirty replicated fields → EntityDelta → ReplicationFrame (bincode)
//!
//! Authority в конце тика забирает dirty поля всех своих entities, кладёт frame
//! в `ReplicationOutbox`. Transport (внешний) доставляет байты в `ReplicationInbox`
//! observer'а, тот применяет frames в порядке прихода в начале своего тика.
//!
//! Non-authority intents (урон по чужому ledger'у) едут в том же frame как `AuthorityRequest`.

use std::collections::{HashMap, VecDeque};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ReplicationError;
use super::field::{FieldUpdate, ReplicatedField};
use crate::combat::{AimState, Weapon, WeaponState};
use crate::life::{LifeState, PlayerLife};
use crate::movement::MotionState;
use crate::net::{LocalPeer, NetId, PeerId};
use crate::interaction::TriggerEvent;
use crate::stats::{StatKey, StatLedger, StatsUpdate};

/// Изменения одной entity за тик
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDelta {
    pub net_id: NetId,
    pub position: Option<FieldUpdate<Vec3>>,
    pub yaw: Option<FieldUpdate<f32>>,
    pub grounded: Option<FieldUpdate<bool>>,
    pub life: Option<FieldUpdate<LifeState>>,
    pub weapon_state: Option<FieldUpdate<WeaponState>>,
    pub ammo: Option<FieldUpdate<u32>>,
    pub aim_point: Option<FieldUpdate<Vec3>>,
    pub visual_aim_point: Option<FieldUpdate<Vec3>>,
    pub stats: Option<StatsUpdate>,
}

/// Intent non-authority peer'а, который выполняет authority цели
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthorityRequest {
    /// Урон в primary stat `target` (ledger у server'а)
    Damage { target: NetId, amount: f32, source: u64 },
    ModifyStat { target: NetId, key: StatKey, delta: f32, source: u64 },
    /// Импульс в мотор (мотор у owner'а)
    Impulse { target: NetId, impulse: Vec3 },
    Teleport { target: NetId, position: Vec3, yaw: Option<f32> },
    /// Client взаимодействует с interactable, которым владеет server
    Interact { interactor: NetId, target: NetId, trigger: TriggerEvent },
    /// Прервать effect sequence interactable'а
    Cancel { target: NetId },
    /// Holster (Idle) / equip (ReadyToFire) чужого оружия (оружие у owner'а)
    WeaponState { target: NetId, state: WeaponState },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationFrame {
    pub tick: u64,
    pub sender: PeerId,
    pub deltas: Vec<EntityDelta>,
    pub requests: Vec<AuthorityRequest>,
}

impl ReplicationFrame {
    pub fn encode(&self) -> Result<Vec<u8>, ReplicationError> {
        bincode::serialize(self).map_err(|err| ReplicationError::Encode(err.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ReplicationError> {
        bincode::deserialize(bytes).map_err(|err| ReplicationError::Decode(err.to_string()))
    }
}

/// Replicated части одной entity (любая может отсутствовать)
#[derive(Default)]
pub struct ReplicatedParts<'a> {
    pub motion: Option<&'a mut MotionState>,
    pub life: Option<&'a mut PlayerLife>,
    pub weapon: Option<&'a mut Weapon>,
    pub aim: Option<&'a mut AimState>,
    pub ledger: Option<&'a mut StatLedger>,
}

impl EntityDelta {
    pub fn empty(net_id: NetId) -> Self {
        Self {
            net_id,
            position: None,
            yaw: None,
            grounded: None,
            life: None,
            weapon_state: None,
            ammo: None,
            aim_point: None,
            visual_aim_point: None,
            stats: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.yaw.is_none()
            && self.grounded.is_none()
            && self.life.is_none()
            && self.weapon_state.is_none()
            && self.ammo.is_none()
            && self.aim_point.is_none()
            && self.visual_aim_point.is_none()
            && self.stats.is_none()
    }

    /// Authority side: забрать dirty поля
    ///
    /// Observer-копии никогда не dirty (`apply_remote` не ставит флаг),
    /// так что peer отправляет только то, чем владеет.
    pub fn collect(net_id: NetId, parts: ReplicatedParts) -> Self {
        let mut delta = Self::empty(net_id);
        if let Some(motion) = parts.motion {
            delta.position = motion.position.take_dirty();
            delta.yaw = motion.yaw.take_dirty();
            delta.grounded = motion.grounded.take_dirty();
        }
        if let Some(life) = parts.life {
            delta.life = life.state.take_dirty();
        }
        if let Some(weapon) = parts.weapon {
            delta.weapon_state = weapon.state.take_dirty();
            delta.ammo = weapon.ammo.take_dirty();
        }
        if let Some(aim) = parts.aim {
            delta.aim_point = aim.aim_point.take_dirty();
            delta.visual_aim_point = aim.visual_aim_point.take_dirty();
        }
        if let Some(ledger) = parts.ledger {
            delta.stats = ledger.take_dirty();
        }
        delta
    }

    /// Observer side: применить delta. Возвращает количество применённых updates.
    ///
    /// Stale/чужие updates отбрасываются по одному, остальные поля применяются.
    pub fn apply(self, parts: ReplicatedParts) -> usize {
        let net_id = self.net_id;
        let mut applied = 0;

        if let Some(motion) = parts.motion {
            applied += apply_field(net_id, "position", &mut motion.position, self.position);
            applied += apply_field(net_id, "yaw", &mut motion.yaw, self.yaw);
            applied += apply_field(net_id, "grounded", &mut motion.grounded, self.grounded);
        }
        if let Some(life) = parts.life {
            applied += apply_field(net_id, "life", &mut life.state, self.life);
        }
        if let Some(weapon) = parts.weapon {
            applied += apply_field(net_id, "weapon_state", &mut weapon.state, self.weapon_state);
            applied += apply_field(net_id, "ammo", &mut weapon.ammo, self.ammo);
        }
        if let Some(aim) = parts.aim {
            applied += apply_field(net_id, "aim_point", &mut aim.aim_point, self.aim_point);
            applied += apply_field(net_id, "visual_aim_point", &mut aim.visual_aim_point, self.visual_aim_point);
        }
        if let (Some(ledger), Some(update)) = (parts.ledger, self.stats) {
            if ledger.apply_remote(&update) {
                applied += 1;
            } else {
                crate::logger::log(&format!("{:?}: stats update {} dropped (stale or foreign)", net_id, update.sequence));
            }
        }
        applied
    }
}

fn apply_field<T: Clone + PartialEq>(
    net_id: NetId,
    name: &str,
    field: &mut ReplicatedField<T>,
    update: Option<FieldUpdate<T>>,
) -> usize {
    let Some(update) = update else {
        return 0;
    };
    match field.apply_remote(update) {
        Ok(()) => 1,
        Err(ReplicationError::StaleUpdate { received, current }) => {
            crate::logger::log(&format!(
                "{:?}.{}: stale update {} (current {})",
                net_id, name, received, current
            ));
            0
        }
        Err(err) => {
            crate::logger::log_warning(&format!("{:?}.{}: update rejected: {}", net_id, name, err));
            0
        }
    }
}

/// Authority → transport: закодированные frames + pending requests
#[derive(Resource, Debug, Default)]
pub struct ReplicationOutbox {
    tick: u64,
    frames: VecDeque<Vec<u8>>,
    requests: Vec<AuthorityRequest>,
}

impl ReplicationOutbox {
    /// Поставить intent в следующий frame
    pub fn request(&mut self, request: AuthorityRequest) {
        self.requests.push(request);
    }

    pub fn pending_requests(&self) -> &[AuthorityRequest] {
        &self.requests
    }

    /// Забрать готовые frames (transport)
    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        self.frames.drain(..).collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Transport → observer: frames в порядке прихода
#[derive(Resource, Debug, Default)]
pub struct ReplicationInbox {
    frames: VecDeque<Vec<u8>>,
    /// Декодированные requests, ждущие `process_authority_requests`
    requests: Vec<(PeerId, AuthorityRequest)>,
}

impl ReplicationInbox {
    pub fn push(&mut self, bytes: Vec<u8>) {
        self.frames.push_back(bytes);
    }

    pub fn take_requests(&mut self) -> Vec<(PeerId, AuthorityRequest)> {
        std::mem::take(&mut self.requests)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

type ReplicatedQuery<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static NetId,
        Option<&'static mut MotionState>,
        Option<&'static mut PlayerLife>,
        Option<&'static mut Weapon>,
        Option<&'static mut AimState>,
        Option<&'static mut StatLedger>,
    ),
>;

/// Система (конец тика): dirty поля → frame в outbox
pub fn collect_replication(local: Res<LocalPeer>, mut outbox: ResMut<ReplicationOutbox>, mut query: ReplicatedQuery) {
    outbox.tick += 1;

    let mut deltas: Vec<EntityDelta> = Vec::new();
    for (_, net_id, mut motion, mut life, mut weapon, mut aim, mut ledger) in query.iter_mut() {
        let delta = EntityDelta::collect(
            *net_id,
            ReplicatedParts {
                motion: motion.as_deref_mut(),
                life: life.as_deref_mut(),
                weapon: weapon.as_deref_mut(),
                aim: aim.as_deref_mut(),
                ledger: ledger.as_deref_mut(),
            },
        );
        if !delta.is_empty() {
            deltas.push(delta);
        }
    }
    // Порядок entities в query не гарантирован между peers
    deltas.sort_by_key(|delta| delta.net_id);

    let requests = std::mem::take(&mut outbox.requests);
    if deltas.is_empty() && requests.is_empty() {
        return;
    }

    let frame = ReplicationFrame {
        tick: outbox.tick,
        sender: local.0,
        deltas,
        requests,
    };
    match frame.encode() {
        Ok(bytes) => outbox.frames.push_back(bytes),
        Err(err) => crate::logger::log_error(&format!("Replication frame {} dropped: {}", frame.tick, err)),
    }
}

/// Система (начало тика): применить frames из inbox в порядке прихода
///
/// Requests из frames откладываются для `process_authority_requests`.
pub fn apply_replication(mut inbox: ResMut<ReplicationInbox>, mut query: ReplicatedQuery) {
    if inbox.frames.is_empty() {
        return;
    }
    let index: HashMap<NetId, Entity> = query.iter().map(|(entity, net_id, ..)| (*net_id, entity)).collect();

    while let Some(bytes) = inbox.frames.pop_front() {
        let frame = match ReplicationFrame::decode(&bytes) {
            Ok(frame) => frame,
            Err(err) => {
                crate::logger::log_warning(&format!("Replication frame dropped: {}", err));
                continue;
            }
        };

        for delta in frame.deltas {
            let Some(entity) = index.get(&delta.net_id) else {
                crate::logger::log_warning(&format!(
                    "Delta for unknown {:?} from {} ignored",
                    delta.net_id, frame.sender
                ));
                continue;
            };
            let Ok((_, _, mut motion, mut life, mut weapon, mut aim, mut ledger)) = query.get_mut(*entity) else {
                continue;
            };
            delta.apply(ReplicatedParts {
                motion: motion.as_deref_mut(),
                life: life.as_deref_mut(),
                weapon: weapon.as_deref_mut(),
                aim: aim.as_deref_mut(),
                ledger: ledger.as_deref_mut(),
            });
        }

        let sender = frame.sender;
        inbox
            .requests
            .extend(frame.requests.into_iter().map(|request| (sender, request)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{SourceKind, StatDef, StatSource};

    const OWNER: PeerId = PeerId(1);

    #[test]
    fn test_collect_takes_only_dirty_fields() {
        let mut motion = MotionState::new(OWNER, Vec3::ZERO, 0.0);
        motion.position.set(OWNER, Vec3::X).unwrap();

        let delta = EntityDelta::collect(
            NetId(7),
            ReplicatedParts {
                motion: Some(&mut motion),
                ..default()
            },
        );
        assert_eq!(delta.position.as_ref().map(|update| update.value), Some(Vec3::X));
        assert!(delta.yaw.is_none());
        assert!(!motion.is_dirty());

        let again = EntityDelta::collect(
            NetId(7),
            ReplicatedParts {
                motion: Some(&mut motion),
                ..default()
            },
        );
        assert!(again.is_empty());
    }

    #[test]
    fn test_frame_bincode_and_apply() {
        let defs = vec![StatDef::new(StatKey::Health, 0.0, 100.0)];
        let mut authority_ledger = StatLedger::new(&defs, StatKey::Health, PeerId::SERVER);
        let mut observer_ledger = StatLedger::new(&defs, StatKey::Health, PeerId::SERVER);
        authority_ledger
            .modify(PeerId::SERVER, StatKey::Health, -30.0, StatSource::system(SourceKind::Damage), 0.0)
            .unwrap();

        let frame = ReplicationFrame {
            tick: 1,
            sender: PeerId::SERVER,
            deltas: vec![EntityDelta::collect(
                NetId(1),
                ReplicatedParts {
                    ledger: Some(&mut authority_ledger),
                    ..default()
                },
            )],
            requests: vec![AuthorityRequest::Damage {
                target: NetId(1),
                amount: 5.0,
                source: 2,
            }],
        };

        let bytes = frame.encode().unwrap();
        let decoded = ReplicationFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);

        let applied = decoded.deltas.into_iter().next().unwrap().apply(ReplicatedParts {
            ledger: Some(&mut observer_ledger),
            ..default()
        });
        assert_eq!(applied, 1);
        assert_eq!(observer_ledger.get(StatKey::Health), 70.0);
    }

    #[test]
    fn test_stale_delta_not_applied() {
        let mut authority = MotionState::new(OWNER, Vec3::ZERO, 0.0);
        let mut observer = MotionState::new(OWNER, Vec3::ZERO, 0.0);

        authority.record(OWNER, Vec3::X, 0.0, true).unwrap();
        let first = EntityDelta::collect(NetId(1), ReplicatedParts { motion: Some(&mut authority), ..default() });
        authority.record(OWNER, Vec3::Y, 0.0, true).unwrap();
        let second = EntityDelta::collect(NetId(1), ReplicatedParts { motion: Some(&mut authority), ..default() });

        // Второй пришёл раньше первого: position из первого stale, grounded — нет
        assert_eq!(second.apply(ReplicatedParts { motion: Some(&mut observer), ..default() }), 1);
        assert_eq!(first.apply(ReplicatedParts { motion: Some(&mut observer), ..default() }), 1);
        assert_eq!(*observer.position.get(), Vec3::Y);
        assert!(*observer.grounded.get());
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            ReplicationFrame::decode(&[0xff, 0x01]),
            Err(ReplicationError::Decode(_))
        ));
    }
}
