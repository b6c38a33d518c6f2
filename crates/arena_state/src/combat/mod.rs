//! Combat module (ranged)
//!
//! ECS ответственность:
//! - AimState: screen-center ray → precise/visual aim points (owner → observers)
//! - Weapon: fire/reload state machine, ammo, spread (owner-authoritative)
//! - Hit resolution: hitscan + projectiles против StaticColliders и HitSphere
//! - Damage: в primary stat ledger'а жертвы (server-authoritative)
//!
//! Анимации, muzzle flash и звук — presentation layer по WeaponFired/ShotHit.

use bevy::prelude::*;

use crate::SimulationSet;

pub mod aim;
pub mod events;
pub mod hit;
pub mod systems;
pub mod weapon;


pub use aim::{visual_aim_point, AimConfig, AimInput, AimSample, AimState};
pub use events::{FireIntent, HolsterIntent, ReloadCompleted, ReloadIntent, ReloadStarted, ShotHit, WeaponFired};
pub use hit::{resolve_hitscan, HitSphere, HitTarget, Projectile, ProjectileStep, ShotImpact};
pub use weapon::{
    apply_spread, FireOutcome, FireRejection, FiringMechanism, Shot, ShotKind, ShootingBehavior, SpreadConfig, Weapon,
    WeaponConfig, WeaponState, WeaponTickEvent,
};

/// Combat Plugin
///
/// Порядок выполнения:
/// 1. update_aim — aim points + obstruction cache
/// 2. handle_holster_intents — holster/equip (non-owner → request owner'у)
/// 3. handle_reload_intents — явный reload
/// 4. handle_fire_intents — выстрелы (hitscan резолвится сразу, projectile спавнится)
/// 5. tick_weapons — пришедшие holster requests + cooldown/reload/spread таймеры
/// 6. tick_projectiles — полёт снарядов
/// 7. apply_shot_damage — ShotHit → ledger жертвы
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<FireIntent>()
            .add_event::<ReloadIntent>()
            .add_event::<HolsterIntent>()
            .add_event::<WeaponFired>()
            .add_event::<ShotHit>()
            .add_event::<ReloadStarted>()
            .add_event::<ReloadCompleted>();

        app.add_systems(
            FixedUpdate,
            (
                systems::update_aim,
                systems::handle_holster_intents,
                systems::handle_reload_intents,
                systems::handle_fire_intents,
                systems::tick_weapons,
                systems::tick_projectiles,
                systems::apply_shot_damage,
            )
                .chain()
                .in_set(SimulationSet::Combat),
        );
    }
}
