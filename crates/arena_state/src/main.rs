//! Headless arena: server + один client, in-memory transport
//!
//! Client (peer#1) управляет игроком и стреляет по боту server'а.
//! Урон уходит server'у через AuthorityRequest, health возвращается replication'ом.
//! Использование: `arena_state [config.ron] [ticks]`

use arena_state::*;
use bevy::prelude::*;

const CLIENT: PeerId = PeerId(1);
const DEFAULT_TICKS: u32 = 1000;

const PLAYER_ID: NetId = NetId(1);
const BOT_ID: NetId = NetId(2);
const PLATFORM_ID: NetId = NetId(3);
const PAD_ID: NetId = NetId(4);

fn main() {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => match SimulationConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        },
        None => SimulationConfig::default(),
    };
    let ticks = args.next().and_then(|value| value.parse().ok()).unwrap_or(DEFAULT_TICKS);

    println!(
        "Starting arena headless simulation (seed: {}, {} Hz, {} ticks)",
        config.seed, config.tick_rate_hz, ticks
    );

    let mut server = build_peer(config.clone(), PeerId::SERVER);
    let mut client = build_peer(config, CLIENT);
    let (server_bot, client_player, client_bot) = {
        let (_, bot) = populate(&mut server);
        let (player, bot_on_client) = populate(&mut client);
        (bot, player, bot_on_client)
    };

    for tick in 0..ticks {
        drive_client(&mut client, client_player, client_bot, tick);

        step_fixed(&mut client);
        relay_frames(&mut client, &mut server);
        step_fixed(&mut server);
        relay_frames(&mut server, &mut client);

        if tick % 100 == 0 {
            print_summary(tick, &server, server_bot, &client, client_player);
        }
    }

    println!("Simulation complete!");
}

fn build_peer(config: SimulationConfig, local: PeerId) -> App {
    let mut app = create_headless_app_with_config(config);
    app.insert_resource(LocalPeer(local));
    app.add_plugins(SimulationPlugin);
    app
}

/// Одинаковый набор entities на каждом peer'е (NetId совпадают)
fn populate(app: &mut App) -> (Entity, Entity) {
    let world = app.world_mut();

    let player = spawn_player(world, PLAYER_ID, CLIENT, SpawnPoint::new(Vec3::ZERO, 0.0));
    let bot = spawn_player(world, BOT_ID, PeerId::SERVER, SpawnPoint::new(Vec3::new(0.0, 0.0, -12.0), 0.0));

    let path = WaypointPath::new(
        vec![Vec3::new(6.0, 1.0, 0.0), Vec3::new(6.0, 1.0, -10.0), Vec3::new(6.0, 3.0, -10.0)],
        PathMode::PingPong,
        2.0,
    )
    .with_dwell(0.5);
    spawn_platform(world, PLATFORM_ID, path, Vec3::new(1.5, 0.25, 1.5));

    let pad = Interactable::new(
        InteractionTrigger::new(vec![TriggerKind::VolumeEnter]).with_cooldown(2.0),
        vec![
            PrioritizedEffect::new(
                10,
                InteractionEffect::Sfx {
                    cue: "pad_charge".to_string(),
                    duration: 0.5,
                },
            ),
            PrioritizedEffect::new(5, InteractionEffect::Force { impulse: Vec3::new(0.0, 12.0, 0.0) }),
            PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 15.0 }),
        ],
    );
    spawn_interactable(
        world,
        PAD_ID,
        Vec3::new(-4.0, 0.0, -4.0),
        pad,
        Some(TriggerVolume::new(Vec3::new(1.0, 1.0, 1.0))),
    );

    (player, bot)
}

/// Client input: бегает кругами, смотрит на бота, стреляет очередями
fn drive_client(client: &mut App, player: Entity, bot: Entity, tick: u32) {
    let world = client.world_mut();
    let Some(bot_position) = world.get::<Transform>(bot).map(|transform| transform.translation) else {
        return;
    };
    let Some(player_position) = world.get::<Transform>(player).map(|transform| transform.translation) else {
        return;
    };

    let chest = player_position + Vec3::Y * 1.4;
    let forward = (bot_position + Vec3::Y - chest).normalize_or(Vec3::NEG_Z);

    if let Some(mut input) = world.get_mut::<MovementInput>(player) {
        let phase = tick as f32 * 0.02;
        input.move_axis = Vec2::new(phase.cos(), phase.sin());
        input.sprint = tick % 400 < 200;
        input.camera_yaw = (-forward.x).atan2(-forward.z);
    }
    if let Some(mut aim) = world.get_mut::<AimInput>(player) {
        aim.camera_origin = chest;
        aim.camera_forward = forward;
    }

    if tick % 240 == 30 {
        world.send_event(JumpIntent { entity: player });
    }
    // Очередь 0.5 sec каждые 2 sec
    if tick % 120 < 30 {
        world.send_event(FireIntent { shooter: player });
    }
}

fn print_summary(tick: u32, server: &App, server_bot: Entity, client: &App, client_player: Entity) {
    let bot_health = server
        .world()
        .get::<StatLedger>(server_bot)
        .map_or(0.0, |ledger| ledger.get(StatKey::Health));
    let bot_life = server.world().get::<PlayerLife>(server_bot).map(|life| life.state());

    let client_world = client.world();
    let player_position = client_world
        .get::<Transform>(client_player)
        .map_or(Vec3::ZERO, |transform| transform.translation);
    let ammo = client_world.get::<Weapon>(client_player).map_or(0, |weapon| weapon.ammo_count());

    println!(
        "Tick {}: server {} entities, client {} entities | player at ({:.1}, {:.1}, {:.1}) ammo {} | bot health {:.0} {:?}",
        tick,
        server.world().entities().len(),
        client_world.entities().len(),
        player_position.x,
        player_position.y,
        player_position.z,
        ammo,
        bot_health,
        bot_life,
    );
}
