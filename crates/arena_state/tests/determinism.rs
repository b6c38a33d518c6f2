//! Тесты детерминизма
//!
//! Server + client с одинаковым seed и одинаковым input'ом
//! дают байт-в-байт одинаковый replicated state.

use arena_state::*;
use bevy::prelude::*;

const CLIENT: PeerId = PeerId(1);

fn build_peer(seed: u64, local: PeerId) -> App {
    let mut app = create_headless_app(seed);
    app.insert_resource(LocalPeer(local));
    app.add_plugins(SimulationPlugin);
    app
}

fn populate(app: &mut App) -> (Entity, Entity) {
    let world = app.world_mut();
    let player = spawn_player(world, NetId(1), CLIENT, SpawnPoint::new(Vec3::ZERO, 0.0));
    let bot = spawn_player(world, NetId(2), PeerId::SERVER, SpawnPoint::new(Vec3::new(0.0, 0.0, -12.0), 0.0));

    let path = WaypointPath::new(
        vec![Vec3::new(6.0, 1.0, 0.0), Vec3::new(6.0, 1.0, -10.0)],
        PathMode::PingPong,
        2.0,
    )
    .with_dwell(0.25);
    spawn_platform(world, NetId(3), path, Vec3::new(1.5, 0.25, 1.5));

    (player, bot)
}

/// Client бегает по кругу и стреляет очередями (spread использует DeterministicRng)
fn drive(client: &mut App, player: Entity, tick: usize) {
    let world = client.world_mut();
    if let Some(mut input) = world.get_mut::<MovementInput>(player) {
        let phase = tick as f32 * 0.03;
        input.move_axis = Vec2::new(phase.cos(), phase.sin());
    }
    if let Some(mut aim) = world.get_mut::<AimInput>(player) {
        aim.camera_origin = Vec3::Y;
        aim.camera_forward = Vec3::NEG_Z;
    }
    if tick % 90 == 10 {
        world.send_event(JumpIntent { entity: player });
    }
    if tick % 60 < 20 {
        world.send_event(FireIntent { shooter: player });
    }
}

/// Прогон и snapshot обоих peers
fn run_session(seed: u64, tick_count: usize) -> (Vec<u8>, Vec<u8>) {
    let mut server = build_peer(seed, PeerId::SERVER);
    let mut client = build_peer(seed, CLIENT);
    populate(&mut server);
    let (player, _) = populate(&mut client);

    for tick in 0..tick_count {
        drive(&mut client, player, tick);
        step_fixed(&mut client);
        relay_frames(&mut client, &mut server);
        step_fixed(&mut server);
        relay_frames(&mut server, &mut client);
    }

    (
        simulation_snapshot(server.world_mut()),
        simulation_snapshot(client.world_mut()),
    )
}

#[test]
fn test_determinism_same_seed() {
    const SEED: u64 = 12345;
    const TICK_COUNT: usize = 600;

    let first = run_session(SEED, TICK_COUNT);
    let second = run_session(SEED, TICK_COUNT);

    assert_eq!(
        first, second,
        "Симуляция с одинаковым seed ({}) дала разные результаты!",
        SEED
    );
}

#[test]
fn test_determinism_multiple_runs() {
    const SEED: u64 = 42;
    const TICK_COUNT: usize = 300;

    let snapshots: Vec<_> = (0..3).map(|_| run_session(SEED, TICK_COUNT)).collect();

    for (i, snapshot) in snapshots.iter().enumerate().skip(1) {
        assert_eq!(snapshots[0], *snapshot, "Прогон {} дал результат отличный от прогона 0", i);
    }
}

#[test]
fn test_transform_snapshot_is_stable() {
    let run = || {
        let mut app = build_peer(9, CLIENT);
        let (player, _) = populate(&mut app);
        app.world_mut().get_mut::<MovementInput>(player).unwrap().move_axis = Vec2::new(0.5, 1.0);
        for _ in 0..120 {
            step_fixed(&mut app);
        }
        world_snapshot::<Transform>(app.world_mut())
    };

    assert_eq!(run(), run());
}
