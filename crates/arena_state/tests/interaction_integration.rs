//! Interaction integration test
//!
//! Volume pad, cancel посреди timeline, single-use с self-removal,
//! ButtonPress от client'а, который исполняет server, и cancel от client'а.

use arena_state::interaction::CueKind;
use arena_state::stats::{SourceKind, StatSource};
use arena_state::*;
use bevy::prelude::*;

const CLIENT: PeerId = PeerId(1);
const PAD_POSITION: Vec3 = Vec3::new(-4.0, 0.0, -4.0);

fn create_app(local: PeerId) -> App {
    let mut app = create_headless_app_with_config(SimulationConfig::default());
    app.insert_resource(LocalPeer(local));
    app.add_plugins(SimulationPlugin);
    app
}

fn drain<E: Event>(app: &mut App) -> Vec<E> {
    app.world_mut().resource_mut::<Events<E>>().drain().collect()
}

fn damage(app: &mut App, entity: Entity, amount: f32) {
    let mut ledger = app.world_mut().get_mut::<StatLedger>(entity).unwrap();
    ledger
        .modify(PeerId::SERVER, StatKey::Health, -amount, StatSource::system(SourceKind::Damage), 0.0)
        .unwrap();
}

fn health(app: &App, entity: Entity) -> f32 {
    app.world().get::<StatLedger>(entity).unwrap().get(StatKey::Health)
}

fn press(app: &mut App, interactor: Entity, target: Entity) {
    app.world_mut().send_event(InteractionRequest {
        interactor,
        target,
        trigger: TriggerEvent::ButtonPress,
    });
}

#[test]
fn test_volume_pad_runs_effects_in_priority_order() {
    let mut app = create_app(PeerId::SERVER);
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(PAD_POSITION, 0.0));
    let pad = spawn_interactable(
        app.world_mut(),
        NetId(2),
        PAD_POSITION,
        Interactable::new(
            InteractionTrigger::new(vec![TriggerKind::VolumeEnter]).with_cooldown(5.0),
            vec![
                PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 15.0 }),
                PrioritizedEffect::new(
                    10,
                    InteractionEffect::Sfx {
                        cue: "pad_charge".to_string(),
                        duration: 0.5,
                    },
                ),
                PrioritizedEffect::new(5, InteractionEffect::Force { impulse: Vec3::new(8.0, 0.0, 0.0) }),
            ],
        ),
        Some(TriggerVolume::new(Vec3::ONE)),
    );
    damage(&mut app, player, 50.0);

    // Пока играет sfx (0.5 sec) stat не тронут
    for _ in 0..10 {
        step_fixed(&mut app);
    }
    assert_eq!(health(&app, player), 50.0);
    assert!(app.world().get::<Interactable>(pad).unwrap().is_busy());

    for _ in 0..30 {
        step_fixed(&mut app);
    }
    assert_eq!(health(&app, player), 65.0);

    let finished = drain::<InteractionFinished>(&mut app);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].target, pad);
    assert_eq!(finished[0].interactor, player);
    assert_eq!(finished[0].outcome, InteractionOutcome::Completed);

    let cues = drain::<EffectCue>(&mut app);
    assert_eq!(cues.len(), 1);
    assert_eq!(cues[0].kind, CueKind::Sfx);
    assert_eq!(cues[0].name, "pad_charge");
    assert!(cues[0].active);

    // Force effect: игрока сдвинуло по +X
    for _ in 0..10 {
        step_fixed(&mut app);
    }
    let position = app.world().get::<Transform>(player).unwrap().translation;
    assert!(position.x > PAD_POSITION.x + 0.1, "player at {:?}", position);
}

#[test]
fn test_cancel_stops_cue_and_skips_remaining_effects() {
    let mut app = create_app(PeerId::SERVER);
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));
    let door = spawn_interactable(
        app.world_mut(),
        NetId(2),
        Vec3::new(0.0, 0.0, -2.0),
        Interactable::new(
            InteractionTrigger::new(vec![TriggerKind::ButtonPress]),
            vec![
                PrioritizedEffect::new(
                    10,
                    InteractionEffect::Timeline {
                        name: "door_open".to_string(),
                        duration: 1.0,
                    },
                ),
                PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 15.0 }),
            ],
        ),
        None,
    );
    damage(&mut app, player, 50.0);

    press(&mut app, player, door);
    for _ in 0..5 {
        step_fixed(&mut app);
    }
    app.world_mut().send_event(CancelInteraction { target: door });
    step_fixed(&mut app);
    step_fixed(&mut app);

    let finished = drain::<InteractionFinished>(&mut app);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].outcome, InteractionOutcome::Cancelled);
    assert_eq!(health(&app, player), 50.0);

    let cues: Vec<bool> = drain::<EffectCue>(&mut app).iter().map(|cue| cue.active).collect();
    assert_eq!(cues, vec![true, false]);

    // Не single-use: после отмены можно снова
    press(&mut app, player, door);
    step_fixed(&mut app);
    assert!(app.world().get::<Interactable>(door).unwrap().is_busy());
}

#[test]
fn test_single_use_removed_after_delay() {
    let mut app = create_app(PeerId::SERVER);
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));
    let mine = spawn_interactable(
        app.world_mut(),
        NetId(2),
        Vec3::new(2.0, 0.0, 0.0),
        Interactable::new(
            InteractionTrigger::new(vec![TriggerKind::ButtonPress]).single_use(),
            vec![PrioritizedEffect::new(0, InteractionEffect::ModifyStat { key: StatKey::Health, delta: -10.0 })],
        )
        .with_removal(0.5),
        None,
    );

    press(&mut app, player, mine);
    step_fixed(&mut app);
    assert_eq!(health(&app, player), 90.0);

    // Второй раз не срабатывает, хотя entity ещё жива
    press(&mut app, player, mine);
    step_fixed(&mut app);
    assert_eq!(health(&app, player), 90.0);
    assert!(app.world().get::<Interactable>(mine).is_some());

    for _ in 0..40 {
        step_fixed(&mut app);
    }
    assert!(app.world().get::<Interactable>(mine).is_none());
    assert_eq!(drain::<InteractionFinished>(&mut app).len(), 1);
}

#[test]
fn test_eliminated_interactor_aborts_sequence() {
    let mut app = create_app(PeerId::SERVER);
    let player = spawn_player(app.world_mut(), NetId(1), PeerId::SERVER, SpawnPoint::new(Vec3::ZERO, 0.0));
    let terminal = spawn_interactable(
        app.world_mut(),
        NetId(2),
        Vec3::new(0.0, 0.0, -1.0),
        Interactable::new(
            InteractionTrigger::new(vec![TriggerKind::ButtonPress]),
            vec![
                PrioritizedEffect::new(
                    2,
                    InteractionEffect::Vfx {
                        cue: "hack".to_string(),
                        duration: 2.0,
                    },
                ),
                PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: 50.0 }),
            ],
        ),
        None,
    );

    press(&mut app, player, terminal);
    step_fixed(&mut app);
    damage(&mut app, player, 100.0);
    for _ in 0..3 {
        step_fixed(&mut app);
    }

    let finished = drain::<InteractionFinished>(&mut app);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].outcome, InteractionOutcome::Aborted);
    assert!(!app.world().get::<Interactable>(terminal).unwrap().is_busy());
}

#[test]
fn test_client_button_press_runs_on_server() {
    let mut server = create_app(PeerId::SERVER);
    let mut client = create_app(CLIENT);

    let mut populate = |app: &mut App| {
        let world = app.world_mut();
        let player = spawn_player(world, NetId(1), CLIENT, SpawnPoint::new(Vec3::ZERO, 0.0));
        let lever = spawn_interactable(
            world,
            NetId(2),
            Vec3::new(1.0, 0.0, 0.0),
            Interactable::new(
                InteractionTrigger::new(vec![TriggerKind::ButtonPress]),
                vec![
                    PrioritizedEffect::new(5, InteractionEffect::Force { impulse: Vec3::new(8.0, 0.0, 0.0) }),
                    PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: -20.0 }),
                ],
            ),
            None,
        );
        (player, lever)
    };
    let (server_player, server_lever) = populate(&mut server);
    let (client_player, client_lever) = populate(&mut client);

    press(&mut client, client_player, client_lever);

    for _ in 0..10 {
        step_fixed(&mut client);
        relay_frames(&mut client, &mut server);
        step_fixed(&mut server);
        relay_frames(&mut server, &mut client);
    }

    // Sequence исполнял server, client lever не трогался
    assert!(!client.world().get::<Interactable>(client_lever).unwrap().is_busy());
    let finished = drain::<InteractionFinished>(&mut server);
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].target, server_lever);
    assert_eq!(finished[0].interactor, server_player);
    assert!(drain::<InteractionFinished>(&mut client).is_empty());

    // Ledger — server, replicated обратно
    assert_eq!(health(&server, server_player), 80.0);
    assert_eq!(health(&client, client_player), 80.0);

    // Импульс применил owner (client) — и движение вернулось server'у
    let client_position = client.world().get::<Transform>(client_player).unwrap().translation;
    let server_position = server.world().get::<Transform>(server_player).unwrap().translation;
    assert!(client_position.x > 0.1, "client player at {:?}", client_position);
    assert!((client_position - server_position).length() < 1e-5);
}

#[test]
fn test_client_cancel_reaches_server() {
    let mut server = create_app(PeerId::SERVER);
    let mut client = create_app(CLIENT);

    let mut populate = |app: &mut App| {
        let world = app.world_mut();
        let player = spawn_player(world, NetId(1), CLIENT, SpawnPoint::new(Vec3::ZERO, 0.0));
        let lever = spawn_interactable(
            world,
            NetId(2),
            Vec3::new(1.0, 0.0, 0.0),
            Interactable::new(
                InteractionTrigger::new(vec![TriggerKind::ButtonPress]),
                vec![
                    PrioritizedEffect::new(
                        10,
                        InteractionEffect::Timeline {
                            name: "lever_pull".to_string(),
                            duration: 1.0,
                        },
                    ),
                    PrioritizedEffect::new(1, InteractionEffect::ModifyStat { key: StatKey::Health, delta: -20.0 }),
                ],
            ),
            None,
        );
        (player, lever)
    };
    let (server_player, server_lever) = populate(&mut server);
    let (client_player, client_lever) = populate(&mut client);

    press(&mut client, client_player, client_lever);

    for tick in 0..70 {
        if tick == 10 {
            client.world_mut().send_event(CancelInteraction { target: client_lever });
        }
        step_fixed(&mut client);
        relay_frames(&mut client, &mut server);
        step_fixed(&mut server);
        relay_frames(&mut server, &mut client);
    }

    let outcomes: Vec<InteractionOutcome> = drain::<InteractionFinished>(&mut server)
        .iter()
        .map(|finished| finished.outcome)
        .collect();
    assert_eq!(outcomes, vec![InteractionOutcome::Cancelled]);
    assert!(!server.world().get::<Interactable>(server_lever).unwrap().is_busy());

    // ModifyStat после timeline так и не выполнился
    assert_eq!(health(&server, server_player), 100.0);
    assert_eq!(health(&client, client_player), 100.0);

    let cues: Vec<bool> = drain::<EffectCue>(&mut server).iter().map(|cue| cue.active).collect();
    assert_eq!(cues, vec![true, false]);
}
