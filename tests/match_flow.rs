//! End-to-end match flow: intents in, addressed messages out

use glam::{Quat, Vec3};
use tokio::sync::broadcast;
use tokio_test::assert_ok;
use uuid::Uuid;

use fireline_server::config::GameplayTuning;
use fireline_server::game::combat::HitmarkerKind;
use fireline_server::game::fsm::PlayerStateKind;
use fireline_server::game::loadout::{LoadoutSlot, WeaponType};
use fireline_server::game::vehicle::VehicleType;
use fireline_server::game::{Audience, GameMatch, MatchHandle, Outbound, PlayerId, PlayerInput};
use fireline_server::ws::protocol::{ClientMsg, FieldUpdate, SeatRef, ServerMsg};

struct Harness {
    game: GameMatch,
    handle: MatchHandle,
    rx: broadcast::Receiver<Outbound>,
}

impl Harness {
    fn new(max_players: usize) -> Self {
        let (game, handle) = GameMatch::new(Uuid::new_v4(), 7, max_players, GameplayTuning::default());
        let rx = handle.outbound_tx.subscribe();
        Self { game, handle, rx }
    }

    async fn send(&self, player_id: PlayerId, msg: ClientMsg) {
        assert_ok!(
            self.handle
                .input_tx
                .send(PlayerInput {
                    player_id,
                    msg,
                    received_at: 0,
                })
                .await
        );
    }

    /// Stream a transform for a vehicle the player claims to drive
    async fn drive(&self, id: PlayerId, vehicle_id: Uuid, position: Vec3, velocity: Vec3) {
        self.send(
            id,
            ClientMsg::VehicleMovement {
                vehicle_id,
                position,
                velocity,
                yaw: 0.0,
                roll: 0.0,
            },
        )
        .await;
    }

    /// Run one tick and collect everything it broadcast
    fn step(&mut self) -> Vec<Outbound> {
        self.game.step();
        let mut out = Vec::new();
        while let Ok(outbound) = self.rx.try_recv() {
            out.push(outbound);
        }
        out
    }

    fn steps(&mut self, n: usize) -> Vec<Outbound> {
        (0..n).flat_map(|_| self.step()).collect()
    }

    async fn join(&mut self, name: &str) -> (PlayerId, Vec<Outbound>) {
        let id = Uuid::new_v4();
        self.send(id, ClientMsg::Join { name: name.to_string() }).await;
        (id, self.step())
    }

    /// Place a player by streaming its own transform
    async fn place(&mut self, id: PlayerId, position: Vec3, yaw: f32) {
        self.send(
            id,
            ClientMsg::Movement {
                position,
                velocity: Vec3::ZERO,
                yaw,
            },
        )
        .await;
    }

    fn state_of(&self, id: PlayerId) -> Option<PlayerStateKind> {
        self.game.state().players.get(&id).map(|p| p.state())
    }
}

/// Messages a given player's socket would forward
fn received_by(out: &[Outbound], id: PlayerId) -> Vec<ServerMsg> {
    out.iter()
        .filter(|o| o.audience.includes(id))
        .map(|o| o.msg.clone())
        .collect()
}

fn nekomata(joined: &[Outbound]) -> Uuid {
    joined
        .iter()
        .find_map(|o| match &o.msg {
            ServerMsg::MatchJoined { vehicles, .. } => vehicles
                .iter()
                .find(|v| v.kind == VehicleType::Nekomata)
                .map(|v| v.vehicle_id),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn joining_announces_and_catches_up() {
    let mut h = Harness::new(4);

    let (alice, out) = h.join("  alice  ").await;
    let to_alice = received_by(&out, alice);
    match &to_alice[0] {
        ServerMsg::MatchJoined {
            players, vehicles, ..
        } => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].name, "alice");
            assert_eq!(vehicles.len(), 3);
        }
        other => panic!("expected MatchJoined, got {other:?}"),
    }
    assert!(to_alice
        .iter()
        .any(|m| matches!(m, ServerMsg::FieldDelta { player_id, .. } if *player_id == alice)));

    let (bob, out) = h.join("bob").await;
    assert!(received_by(&out, alice)
        .iter()
        .any(|m| matches!(m, ServerMsg::PlayerJoined { player } if player.player_id == bob)));

    // bob learns alice's current fields privately
    assert!(out.iter().any(|o| o.audience == Audience::Only(bob)
        && matches!(&o.msg, ServerMsg::FieldDelta { player_id, .. } if *player_id == alice)));
    assert_eq!(h.handle.player_count(), 2);
}

#[tokio::test]
async fn full_match_rejects_joins() {
    let mut h = Harness::new(1);
    h.join("first").await;

    let (late, out) = h.join("second").await;
    assert!(received_by(&out, late)
        .iter()
        .any(|m| matches!(m, ServerMsg::Error { code, .. } if code == "match_full")));
    assert_eq!(h.game.state().players.len(), 1);
}

#[tokio::test]
async fn state_changes_are_relayed_to_everyone_else() {
    let mut h = Harness::new(4);
    let (alice, _) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;

    h.send(
        alice,
        ClientMsg::SetState {
            state_index: PlayerStateKind::Walking.index(),
        },
    )
    .await;
    let out = h.step();

    let relayed = |m: &ServerMsg| {
        matches!(m, ServerMsg::StateChanged { player_id, state_index }
            if *player_id == alice && *state_index == PlayerStateKind::Walking.index())
    };
    assert!(received_by(&out, bob).iter().any(relayed));
    assert!(!received_by(&out, alice).iter().any(relayed));
    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Walking));

    // server-owned states are never taken from the client
    h.send(
        alice,
        ClientMsg::SetState {
            state_index: PlayerStateKind::Dead.index(),
        },
    )
    .await;
    h.send(alice, ClientMsg::SetState { state_index: 99 }).await;
    h.step();
    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Walking));
}

#[tokio::test]
async fn lethal_fire_kills_and_respawn_waits_for_the_delay() {
    let mut h = Harness::new(4);
    let (alice, _) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;

    h.send(
        alice,
        ClientMsg::SetLoadoutSlot {
            slot: LoadoutSlot::Primary,
            weapon: Some(WeaponType::AssaultRifle),
        },
    )
    .await;
    h.place(alice, Vec3::ZERO, 0.0).await;
    h.place(bob, Vec3::new(0.0, 0.0, 5.0), 0.0).await;
    h.send(
        alice,
        ClientMsg::SetAimTarget {
            local_position: Vec3::new(0.0, 1.5, 10.0),
            local_rotation: Quat::IDENTITY,
        },
    )
    .await;
    h.step();

    let mut out = Vec::new();
    for _ in 0..10 {
        h.send(alice, ClientMsg::Fire).await;
        out.extend(h.steps(3));
        if h.state_of(bob) == Some(PlayerStateKind::Dead) {
            break;
        }
    }

    assert_eq!(h.state_of(bob), Some(PlayerStateKind::Dead));
    let to_bob = received_by(&out, bob);
    let died = to_bob.iter().find_map(|m| match m {
        ServerMsg::Died { damage, .. } => Some(damage.clone()),
        _ => None,
    });
    assert_eq!(died.map(|d| (d.attacker, d.weapon)), Some((Some(alice), "Assault Rifle".to_string())));
    assert!(received_by(&out, alice)
        .contains(&ServerMsg::Hitmarker { kind: HitmarkerKind::Kill }));
    // the death itself is never sent twice
    assert_eq!(to_bob.iter().filter(|m| matches!(m, ServerMsg::Died { .. })).count(), 1);

    let died_at = h.game.state().players[&bob].death_time.unwrap();

    // late movement-state updates from the corpse are vetoed
    h.send(
        bob,
        ClientMsg::SetState {
            state_index: PlayerStateKind::Walking.index(),
        },
    )
    .await;
    h.step();
    assert_eq!(h.state_of(bob), Some(PlayerStateKind::Dead));

    // advance so the next request lands one tick short of the delay
    let delay = GameplayTuning::default().vitals.respawn_delay;
    let respawn_tick = ((died_at + delay) * 30.0).round() as u64;
    while h.game.state().tick + 2 < respawn_tick {
        h.step();
    }
    h.send(bob, ClientMsg::Respawn).await;
    let out = h.step();
    assert!(!received_by(&out, bob)
        .iter()
        .any(|m| matches!(m, ServerMsg::Respawned { .. })));

    h.send(bob, ClientMsg::Respawn).await;
    let out = h.step();
    let to_bob = received_by(&out, bob);
    assert!(to_bob.iter().any(|m| matches!(m, ServerMsg::Respawned { .. })));
    assert!(to_bob.contains(&ServerMsg::InstantReload { player_id: bob }));
    assert_eq!(h.state_of(bob), Some(PlayerStateKind::Idle));

    let vitals = &h.game.state().players[&bob].vitals;
    assert_eq!(vitals.health(), vitals.max_health());
    assert_eq!(vitals.armor(), vitals.max_armor());
}

#[tokio::test]
async fn seats_are_replicated_and_leaving_restores_idle() {
    let mut h = Harness::new(4);
    let (alice, joined) = h.join("alice").await;
    let car = nekomata(&joined);

    h.place(alice, Vec3::new(3.5, 0.0, -10.0), 0.0).await;
    h.send(alice, ClientMsg::EnterVehicle { vehicle_id: car }).await;
    let out = h.step();

    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Driver));
    let seat = FieldUpdate::Seat {
        seat: Some(SeatRef {
            vehicle_id: car,
            index: 0,
        }),
    };
    assert!(out.iter().any(|o| o.audience == Audience::All
        && matches!(&o.msg, ServerMsg::FieldDelta { fields, .. } if fields.contains(&seat))));

    h.send(alice, ClientMsg::LeaveVehicle).await;
    let out = h.step();
    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Idle));
    assert!(out.iter().any(|o| matches!(&o.msg,
        ServerMsg::FieldDelta { fields, .. } if fields.contains(&FieldUpdate::Seat { seat: None }))));
    assert!(h.game.state().vehicles[&car].driver().is_none());
}

#[tokio::test]
async fn vehicles_damage_pedestrians_once_per_contact() {
    let mut h = Harness::new(4);
    let (alice, joined) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;
    let car = nekomata(&joined);

    h.place(alice, Vec3::new(3.5, 0.0, -10.0), 0.0).await;
    h.place(bob, Vec3::new(5.0, 0.0, -6.0), 0.0).await;
    h.send(alice, ClientMsg::EnterVehicle { vehicle_id: car }).await;
    h.step();

    // only the driver may move the car
    h.send(
        bob,
        ClientMsg::VehicleMovement {
            vehicle_id: car,
            position: Vec3::new(50.0, 0.7, 50.0),
            velocity: Vec3::ZERO,
            yaw: 0.0,
            roll: 0.0,
        },
    )
    .await;
    h.send(
        alice,
        ClientMsg::VehicleMovement {
            vehicle_id: car,
            position: Vec3::new(5.0, 0.7, -6.0),
            velocity: Vec3::new(0.0, 0.0, 10.0),
            yaw: 0.0,
            roll: 0.0,
        },
    )
    .await;
    let out = h.step();

    assert_eq!(h.game.state().vehicles[&car].position, Vec3::new(5.0, 0.7, -6.0));
    assert!(received_by(&out, alice)
        .contains(&ServerMsg::Hitmarker { kind: HitmarkerKind::Damage }));
    let armor = h.game.state().players[&bob].vitals.armor();
    assert_eq!(armor, 10.0);

    // still overlapping: no further damage
    h.step();
    assert_eq!(h.game.state().players[&bob].vitals.armor(), armor);
}

#[tokio::test]
async fn leaving_removes_the_player_everywhere() {
    let mut h = Harness::new(4);
    let (alice, _) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;

    h.send(bob, ClientMsg::Leave).await;
    let out = h.step();

    assert!(received_by(&out, alice)
        .iter()
        .any(|m| matches!(m, ServerMsg::PlayerLeft { player_id, .. } if *player_id == bob)));
    assert!(h.state_of(bob).is_none());
    assert_eq!(h.handle.player_count(), 1);
}

#[tokio::test]
async fn parked_vehicles_deal_no_collision_damage() {
    let mut h = Harness::new(4);
    let (alice, joined) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;
    let car = nekomata(&joined);

    h.place(alice, Vec3::new(3.5, 0.0, -10.0), 0.0).await;
    h.place(bob, Vec3::new(40.0, 0.0, 40.0), 0.0).await;
    h.send(alice, ClientMsg::EnterVehicle { vehicle_id: car }).await;
    h.step();

    h.drive(alice, car, Vec3::new(0.0, 0.7, 0.0), Vec3::new(0.0, 0.0, 20.0))
        .await;
    h.step();
    h.send(alice, ClientMsg::LeaveVehicle).await;
    h.steps(30);
    assert_eq!(h.game.state().vehicles[&car].velocity, Vec3::ZERO);

    let (health, armor) = {
        let vitals = &h.game.state().players[&bob].vitals;
        (vitals.health(), vitals.armor())
    };
    h.place(bob, Vec3::new(0.0, 0.0, 0.0), 0.0).await;
    h.steps(2);

    let vitals = &h.game.state().players[&bob].vitals;
    assert_eq!((vitals.health(), vitals.armor()), (health, armor));
}

#[tokio::test]
async fn disconnecting_driver_stops_the_vehicle() {
    let mut h = Harness::new(4);
    let (alice, joined) = h.join("alice").await;
    let car = nekomata(&joined);

    h.place(alice, Vec3::new(3.5, 0.0, -10.0), 0.0).await;
    h.send(alice, ClientMsg::EnterVehicle { vehicle_id: car }).await;
    h.step();
    h.drive(alice, car, Vec3::new(5.0, 0.7, -10.0), Vec3::new(0.0, 0.0, 15.0))
        .await;
    h.step();
    assert_eq!(h.game.state().vehicles[&car].velocity, Vec3::new(0.0, 0.0, 15.0));

    h.send(alice, ClientMsg::Leave).await;
    h.step();
    let vehicle = &h.game.state().vehicles[&car];
    assert_eq!(vehicle.velocity, Vec3::ZERO);
    assert!(vehicle.driver().is_none());
}

#[tokio::test]
async fn seated_players_cannot_walk_out_of_their_seat() {
    let mut h = Harness::new(4);
    let (alice, joined) = h.join("alice").await;
    let (bob, _) = h.join("bob").await;
    let car = nekomata(&joined);

    h.place(alice, Vec3::new(3.5, 0.0, -10.0), 0.0).await;
    h.send(alice, ClientMsg::EnterVehicle { vehicle_id: car }).await;
    h.step();

    h.send(
        alice,
        ClientMsg::SetState {
            state_index: PlayerStateKind::Walking.index(),
        },
    )
    .await;
    let out = h.step();

    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Driver));
    assert_eq!(h.game.state().vehicles[&car].driver(), Some(alice));
    assert!(!received_by(&out, bob)
        .iter()
        .any(|m| matches!(m, ServerMsg::StateChanged { player_id, .. } if *player_id == alice)));

    // the seat is still released the regular way
    h.send(alice, ClientMsg::LeaveVehicle).await;
    h.step();
    assert_eq!(h.state_of(alice), Some(PlayerStateKind::Idle));
    assert!(h.game.state().players[&alice].seat.is_none());
}
