//! Movement integration test (headless physics)
//!
//! Ground stick, прыжок с landing, платформа везёт rider'а.

use arena_state::movement::CharacterMotor;
use arena_state::platform::PlatformRider;
use arena_state::*;
use bevy::prelude::*;

fn create_app() -> App {
    let mut app = create_headless_app(7);
    app.add_plugins(SimulationPlugin);
    app
}

fn drain<E: Event>(app: &mut App) -> Vec<E> {
    app.world_mut().resource_mut::<Events<E>>().drain().collect()
}

fn position(app: &App, entity: Entity) -> Vec3 {
    app.world().get::<Transform>(entity).unwrap().translation
}

#[test]
fn test_grounded_character_sticks_to_floor() {
    let mut app = create_app();
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));

    for _ in 0..30 {
        step_fixed(&mut app);
    }

    let motor = app.world().get::<CharacterMotor>(player).unwrap();
    assert!(motor.is_grounded());
    assert_eq!(motor.vertical_velocity(), -2.0);
    assert!(position(&app, player).y.abs() < 1e-5);
    assert!(drain::<Landed>(&mut app).is_empty(), "спавн на полу — не landing");
}

#[test]
fn test_walk_follows_camera_yaw() {
    let mut app = create_app();
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));
    {
        let mut input = app.world_mut().get_mut::<MovementInput>(player).unwrap();
        input.move_axis = Vec2::new(0.0, 1.0);
        // 90° влево: forward камеры = -X
        input.camera_yaw = std::f32::consts::FRAC_PI_2;
    }

    for _ in 0..60 {
        step_fixed(&mut app);
    }

    let moved = position(&app, player);
    assert!(moved.x < -5.0, "1 sec на walk_speed 6 вдоль -X: {:?}", moved);
    assert!(moved.z.abs() < 1e-3);

    let motion = app.world().get::<MotionState>(player).unwrap();
    assert_eq!(*motion.position.get(), moved);
}

#[test]
fn test_jump_and_landing() {
    let mut app = create_app();
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));

    for _ in 0..5 {
        step_fixed(&mut app);
    }
    app.world_mut().send_event(JumpIntent { entity: player });
    step_fixed(&mut app);

    let jumped = drain::<Jumped>(&mut app);
    assert_eq!(jumped.len(), 1);
    assert!(!jumped[0].air_jump);

    // jump_height 1.25: пик около 1.25 м через ~0.35 sec
    let mut peak: f32 = 0.0;
    for _ in 0..20 {
        step_fixed(&mut app);
        peak = peak.max(position(&app, player).y);
    }
    assert!(peak > 1.0 && peak < 1.5, "peak {}", peak);

    for _ in 0..60 {
        step_fixed(&mut app);
    }

    let landed = drain::<Landed>(&mut app);
    assert_eq!(landed.len(), 1);
    assert!(landed[0].impact_speed >= 6.0);
    assert!(position(&app, player).y.abs() < 1e-5);
    assert!(app.world().get::<CharacterMotor>(player).unwrap().is_grounded());
}

#[test]
fn test_platform_carries_rider() {
    let mut app = create_app();
    let path = WaypointPath::new(vec![Vec3::new(0.0, 1.0, 0.0), Vec3::new(5.0, 1.0, 0.0)], PathMode::PingPong, 2.0);
    let platform = spawn_platform(app.world_mut(), NetId(10), path, Vec3::new(1.5, 0.25, 1.5));
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::new(0.0, 1.0, 0.0), 0.0));

    for _ in 0..60 {
        step_fixed(&mut app);
    }

    let platform_position = position(&app, platform);
    let player_position = position(&app, player);
    assert!((platform_position.x - 2.0).abs() < 0.05, "platform at {:?}", platform_position);
    assert!(
        (player_position.x - platform_position.x).abs() < 0.2,
        "rider {:?} отстал от платформы {:?}",
        player_position,
        platform_position
    );
    assert!((player_position.y - 1.0).abs() < 1e-3, "rider стоит на верхней грани");
    assert_eq!(
        app.world().get::<PlatformRider>(player).map(|rider| rider.platform),
        Some(platform)
    );
}

#[test]
fn test_eliminated_character_does_not_move() {
    let mut app = create_app();
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));
    app.world_mut().get_mut::<MovementInput>(player).unwrap().move_axis = Vec2::new(1.0, 0.0);

    app.world_mut()
        .get_mut::<StatLedger>(player)
        .unwrap()
        .modify(
            PeerId::SERVER,
            StatKey::Health,
            -100.0,
            arena_state::stats::StatSource::system(arena_state::stats::SourceKind::Damage),
            0.0,
        )
        .unwrap();
    // Elimination происходит в Life фазе первого тика, после движения
    step_fixed(&mut app);
    assert_eq!(app.world().get::<PlayerLife>(player).unwrap().state(), LifeState::Eliminated);
    let frozen_at = position(&app, player);

    // respawn_delay 3 sec по умолчанию — успеваем проверить
    for _ in 0..30 {
        step_fixed(&mut app);
    }

    assert_eq!(position(&app, player), frozen_at);
}
