//! Arena State — authoritative replicated entity state
//!
//! ECS-симуляция на Bevy 0.16 для multiplayer platformer/shooter:
//! stats, движение персонажа, прицел и оружие, life cycle, interaction effects.
//!
//! AUTHORITY MODEL:
//! - Owner-client пишет своё движение, прицел и оружие
//! - Server пишет ledger'ы, life state, платформы и interactables
//! - Observers только применяют replicated updates (ReplicationFrame, bincode)
//!
//! Transport не наш: он переносит байты между `ReplicationOutbox` и `ReplicationInbox`.

use std::fmt::Write as _;

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod combat;
pub mod config;
pub mod factory;
pub mod interaction;
pub mod life;
pub mod logger;
pub mod movement;
pub mod net;
pub mod physics;
pub mod platform;
pub mod replication;
pub mod stats;

// Re-export для удобства
pub use combat::{
    AimConfig, AimInput, AimState, CombatPlugin, FireIntent, HitSphere, HolsterIntent, ReloadIntent, ShotHit, Weapon,
    WeaponConfig, WeaponFired, WeaponState,
};
pub use config::{ConfigError, SimulationConfig};
pub use factory::{spawn_interactable, spawn_platform, spawn_player};
pub use interaction::{
    CancelInteraction, EffectCue, Interactable, InteractionEffect, InteractionFinished, InteractionOutcome,
    InteractionPlugin, InteractionRequest, InteractionTrigger, PrioritizedEffect, TriggerEvent, TriggerKind,
    TriggerVolume,
};
pub use life::{LifePlugin, LifeState, LifeStateChanged, PlayerLife, SpawnPoint};
pub use logger::{init_logger, log, log_error, log_info, log_warning};
pub use movement::{CharacterMotor, JumpIntent, Jumped, Landed, MotionState, MotorConfig, MovementInput, MovementPlugin};
pub use net::{LocalPeer, NetId, Ownership, PeerId};
pub use physics::{PhysicsBackend, SpatialQuery, StaticColliders};
pub use platform::{PathMode, PlatformPlugin, WaypointPath};
pub use replication::{
    AuthorityRequest, ReplicatedField, ReplicationError, ReplicationFrame, ReplicationInbox, ReplicationOutbox,
    ReplicationPlugin,
};
pub use stats::{StatDef, StatKey, StatLedger, StatsPlugin};

/// Порядок фаз внутри FixedUpdate
///
/// Remote state применяется первым, outgoing frame собирается последним,
/// так что frame содержит всё, что authority изменил за тик.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    ReplicationApply,
    Platforms,
    Movement,
    Combat,
    Interaction,
    Life,
    Stats,
    ReplicationCollect,
}

/// Главный plugin симуляции (объединяет все подсистемы)
///
/// Берёт `SimulationConfig` из world (если вставлен заранее) или Default.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<SimulationConfig>()
            .cloned()
            .unwrap_or_default();

        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(config.seed));
        }
        if !app.world().contains_resource::<StaticColliders>() {
            app.insert_resource(StaticColliders::with_ground(0.0));
        }

        app
            // Fixed timestep из config (60Hz по умолчанию)
            .insert_resource(Time::<Fixed>::from_hz(config.tick_rate_hz))
            .insert_resource(config)
            .init_resource::<LocalPeer>()
            .init_resource::<PhysicsBackend>();

        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::ReplicationApply,
                SimulationSet::Platforms,
                SimulationSet::Movement,
                SimulationSet::Combat,
                SimulationSet::Interaction,
                SimulationSet::Life,
                SimulationSet::Stats,
                SimulationSet::ReplicationCollect,
            )
                .chain(),
        );

        app.add_plugins((
            ReplicationPlugin,
            PlatformPlugin,
            MovementPlugin,
            CombatPlugin,
            InteractionPlugin,
            LifePlugin,
            StatsPlugin,
        ));
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции (default config с данным seed)
pub fn create_headless_app(seed: u64) -> App {
    create_headless_app_with_config(SimulationConfig { seed, ..default() })
}

pub fn create_headless_app_with_config(config: SimulationConfig) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(config.seed))
        .insert_resource(Time::<Fixed>::from_hz(config.tick_rate_hz))
        .insert_resource(config);

    app
}

/// Ровно один fixed тик: `Time<Fixed>` += timestep, затем FixedUpdate
///
/// В отличие от `app.update()` не зависит от wall clock — тесты и replay детерминированы.
pub fn step_fixed(app: &mut App) {
    let world = app.world_mut();
    let Some(mut time) = world.get_resource_mut::<Time<Fixed>>() else {
        log_error("step_fixed: Time<Fixed> missing, add MinimalPlugins first");
        return;
    };
    let timestep = time.timestep();
    time.advance_by(timestep);
    world.run_schedule(FixedUpdate);
}

/// In-memory transport: все frames из outbox `from` → inbox `to`
///
/// Возвращает количество перенесённых frames. Server не ретранслирует
/// frames одного client'а другим — это задача реального transport'а.
pub fn relay_frames(from: &mut App, to: &mut App) -> usize {
    let frames = match from.world_mut().get_resource_mut::<ReplicationOutbox>() {
        Some(mut outbox) => outbox.drain_frames(),
        None => return 0,
    };
    let count = frames.len();
    match to.world_mut().get_resource_mut::<ReplicationInbox>() {
        Some(mut inbox) => frames.into_iter().for_each(|bytes| inbox.push(bytes)),
        None => log_warning("relay_frames: receiver has no ReplicationInbox, frames dropped"),
    }
    count
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}

/// Snapshot всего replicated state (по NetId): transform, stats, оружие, life
pub fn simulation_snapshot(world: &mut World) -> Vec<u8> {
    let mut query = world.query::<(
        &NetId,
        &Transform,
        Option<&StatLedger>,
        Option<&Weapon>,
        Option<&PlayerLife>,
    )>();

    let mut rows: Vec<(NetId, String)> = query
        .iter(world)
        .map(|(net_id, transform, ledger, weapon, life)| {
            let mut row = format!("{:?} {:?}", transform.translation, transform.rotation);
            if let Some(ledger) = ledger {
                let _ = write!(row, " {:?}", ledger.stats());
            }
            if let Some(weapon) = weapon {
                let _ = write!(row, " {:?}/{}", weapon.current_state(), weapon.ammo_count());
            }
            if let Some(life) = life {
                let _ = write!(row, " {:?}", life.state());
            }
            (*net_id, row)
        })
        .collect();
    rows.sort_by_key(|(net_id, _)| *net_id);

    let mut snapshot = Vec::new();
    for (net_id, row) in rows {
        snapshot.extend_from_slice(&net_id.0.to_le_bytes());
        snapshot.extend_from_slice(row.as_bytes());
    }
    snapshot
}
