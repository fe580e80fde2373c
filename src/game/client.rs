//! Client-side simulation host
//!
//! Runs the same state machine as the match, but as the input owner of one
//! player and as an observer of everyone else. Server messages are queued
//! by [`ClientSimulation::receive`] and only applied at the start of the
//! next tick.

use glam::{EulerRot, Quat, Vec3};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::config::GameplayTuning;
use crate::ws::protocol::{ClientMsg, FieldUpdate, PlayerInfo, SeatRef, ServerMsg};

use super::animation::CosmeticCue;
use super::fsm::{self, Effect, PlayerStateKind, SimRole, TickContext};
use super::health::DamageEvent;
use super::input::{InputDevice, InputEvent, InputState};
use super::loadout::{LoadoutSlot, WeaponType};
use super::player::Player;
use super::scheduler::CosmeticScheduler;
use super::vehicle::{Vehicle, Vehicles};
use super::world::ArenaWorld;
use super::{PlayerId, VehicleId};

/// Weapons requested for the local player on joining
const STARTING_LOADOUT: [(LoadoutSlot, WeaponType); 2] = [
    (LoadoutSlot::Primary, WeaponType::AssaultRifle),
    (LoadoutSlot::Secondary, WeaponType::CombatPistol),
];

pub struct ClientSimulation {
    local_id: Option<PlayerId>,
    players: HashMap<PlayerId, Player>,
    world: ArenaWorld,
    vehicles: Vehicles,
    scheduler: CosmeticScheduler,
    tuning: GameplayTuning,
    input: InputState,
    inbox: VecDeque<ServerMsg>,
    pending_input: VecDeque<InputEvent>,
    outbox: Vec<ClientMsg>,
    presentation: Vec<Effect>,
    last_death: Option<DamageEvent>,
    now: f64,
    dt: f32,
}

impl ClientSimulation {
    pub fn new(tuning: GameplayTuning, device: InputDevice) -> Self {
        Self {
            local_id: None,
            players: HashMap::new(),
            world: ArenaWorld::standard(),
            vehicles: Vehicles::new(),
            scheduler: CosmeticScheduler::new(),
            tuning,
            input: InputState::new(device),
            inbox: VecDeque::new(),
            pending_input: VecDeque::new(),
            outbox: Vec::new(),
            presentation: Vec::new(),
            last_death: None,
            now: 0.0,
            dt: 0.0,
        }
    }

    pub fn join(&mut self, name: &str) {
        self.outbox.push(ClientMsg::Join {
            name: name.to_string(),
        });
    }

    /// Queue a server message for the next tick
    pub fn receive(&mut self, msg: ServerMsg) {
        self.inbox.push_back(msg);
    }

    /// Queue a local input event for the next tick
    pub fn push_input(&mut self, event: InputEvent) {
        self.pending_input.push_back(event);
    }

    pub fn take_outbox(&mut self) -> Vec<ClientMsg> {
        std::mem::take(&mut self.outbox)
    }

    /// Cues and transition notifications for the presentation layer
    pub fn take_presentation(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.presentation)
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_id.and_then(|id| self.players.get(&id))
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// The damage that killed the local player most recently
    pub fn last_death(&self) -> Option<&DamageEvent> {
        self.last_death.as_ref()
    }

    /// One fixed simulation step
    pub fn tick(&mut self, now: f64, dt: f32) {
        self.now = now;
        self.dt = dt;

        while let Some(msg) = self.inbox.pop_front() {
            self.handle_server_msg(msg);
        }

        while let Some(event) = self.pending_input.pop_front() {
            self.input.apply(&event);
            if let Some(id) = self.local_id {
                self.drive(id, |p, ctx| fsm::dispatch_input(p, ctx, &event));
            }
        }

        let look = self.input.look_delta();
        if let Some(player) = self.local_id.and_then(|id| self.players.get_mut(&id)) {
            player.camera.apply_look(look);
        }

        let ids: Vec<PlayerId> = self.players.keys().copied().collect();
        for id in &ids {
            self.drive(*id, fsm::tick);
        }
        for id in &ids {
            self.drive(*id, fsm::fixed_tick);
        }

        if let Some(player) = self.local_id.and_then(|id| self.players.get_mut(&id)) {
            player.body.integrate(&self.world, dt);
            self.world.sync_player(player.id, player.body.position);
        }

        for id in &ids {
            self.drive(*id, fsm::late_tick);
        }

        for stage in self.scheduler.drain_due(now) {
            self.drive(stage.owner, |p, ctx| fsm::run_stage(p, ctx, &stage));
        }

        self.send_movement();

        for player in self.players.values_mut() {
            player.loadout.collect_retired(now);
        }
        self.input.end_tick();
    }

    /// Stream the local driver's vehicle transform
    pub fn steer_vehicle(&mut self, position: Vec3, velocity: Vec3, yaw: f32, roll: f32) {
        let Some((vehicle_id, _)) = self.local_player().and_then(|p| p.seat) else {
            return;
        };
        let Some(local) = self.local_id else {
            return;
        };
        let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
            return;
        };
        if vehicle.driver() != Some(local) {
            return;
        }

        vehicle.position = position;
        vehicle.velocity = velocity;
        vehicle.rotation = Quat::from_euler(EulerRot::YXZ, yaw, 0.0, roll);
        self.world.sync_vehicle(vehicle_id, vehicle.bounds());

        self.outbox.push(ClientMsg::VehicleMovement {
            vehicle_id,
            position,
            velocity,
            yaw,
            roll,
        });
    }

    /// Run `f` against one player; the local player runs as owner
    fn drive<R>(
        &mut self,
        id: PlayerId,
        f: impl FnOnce(&mut Player, &mut TickContext) -> R,
    ) -> Option<R> {
        let role = if self.local_id == Some(id) {
            SimRole::OWNER
        } else {
            SimRole::OBSERVER
        };

        let player = self.players.get_mut(&id)?;
        let mut ctx = TickContext {
            now: self.now,
            dt: self.dt,
            role,
            tuning: &self.tuning,
            world: &self.world,
            input: &self.input,
            vehicles: &mut self.vehicles,
            scheduler: &mut self.scheduler,
            effects: Vec::new(),
        };
        let result = f(player, &mut ctx);

        for effect in ctx.effects {
            match effect {
                Effect::Send(msg) => self.outbox.push(msg),
                other => self.presentation.push(other),
            }
        }
        Some(result)
    }

    fn cue(&mut self, player: PlayerId, cue: CosmeticCue) {
        self.presentation.push(Effect::Cue { player, cue });
    }

    fn is_local(&self, id: PlayerId) -> bool {
        self.local_id == Some(id)
    }

    fn send_movement(&mut self) {
        let Some(player) = self.local_player() else {
            return;
        };
        if player.seat.is_some() || player.state() == PlayerStateKind::Dead || player.is_dead() {
            return;
        }

        let msg = ClientMsg::Movement {
            position: player.body.position,
            velocity: player.body.velocity,
            yaw: player.body.yaw(),
        };
        self.outbox.push(msg);
    }

    fn spawn_player(&mut self, info: PlayerInfo) {
        if self.players.contains_key(&info.player_id) {
            return;
        }

        let mut player = Player::new(info.player_id, &info.name, info.position, &self.tuning);
        player.teleport(info.position, info.yaw);
        self.world.sync_player(info.player_id, info.position);
        self.players.insert(info.player_id, player);

        match PlayerStateKind::try_from(info.state_index) {
            Ok(PlayerStateKind::Idle) => {}
            // seats follow the replicated seat field
            Ok(state) if state.is_seated() => {}
            Ok(state) => {
                self.drive(info.player_id, |p, ctx| fsm::set_state(p, ctx, state));
            }
            Err(error) => warn!(player_id = %info.player_id, %error, "Joined with unknown state"),
        }
    }

    fn remove_player(&mut self, id: PlayerId) {
        let Some(player) = self.players.remove(&id) else {
            return;
        };
        if let Some((vehicle_id, _)) = player.seat {
            if let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) {
                vehicle.leave(id);
            }
        }
        self.world.remove_player(&id);
        self.scheduler.cancel_owner(id);
    }

    fn handle_server_msg(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Welcome { player_id, .. } => {
                self.local_id = Some(player_id);
            }
            ServerMsg::MatchJoined {
                match_id,
                players,
                vehicles,
                ..
            } => {
                for info in vehicles {
                    let vehicle = Vehicle::new(info.vehicle_id, info.kind, info.position, info.yaw);
                    self.world.sync_vehicle(info.vehicle_id, vehicle.bounds());
                    self.vehicles.insert(info.vehicle_id, vehicle);
                }
                for info in players {
                    self.spawn_player(info);
                }
                for (slot, weapon) in STARTING_LOADOUT {
                    self.outbox.push(ClientMsg::SetLoadoutSlot {
                        slot,
                        weapon: Some(weapon),
                    });
                }
                debug!(match_id = %match_id, "Joined match");
            }
            ServerMsg::PlayerJoined { player } => self.spawn_player(player),
            ServerMsg::PlayerLeft { player_id, .. } => self.remove_player(player_id),
            ServerMsg::StateChanged {
                player_id,
                state_index,
            } => match PlayerStateKind::try_from(state_index) {
                Ok(state) => {
                    self.drive(player_id, |p, ctx| fsm::set_state(p, ctx, state));
                }
                Err(error) => {
                    warn!(player_id = %player_id, %error, "State update ignored");
                }
            },
            ServerMsg::HipFiringChanged {
                player_id,
                hip_firing,
            } => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.aiming.hip_firing = hip_firing;
                }
            }
            ServerMsg::VaultStarted {
                player_id,
                ledge,
                normal,
            } => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.vault.ledge = ledge;
                    player.vault.normal = normal;
                }
                self.drive(player_id, |p, ctx| {
                    fsm::set_state(p, ctx, PlayerStateKind::Vaulting)
                });
            }
            ServerMsg::FireOutcome { shooter_id, point } => {
                self.cue(shooter_id, CosmeticCue::WeaponFired { hit_point: point });
            }
            ServerMsg::Hitmarker { kind } => {
                if let Some(id) = self.local_id {
                    self.cue(id, CosmeticCue::Hitmarker(kind));
                }
            }
            ServerMsg::Died {
                damage,
                respawn_delay,
            } => {
                let now = self.now;
                if let Some(player) = self.local_id.and_then(|id| self.players.get_mut(&id)) {
                    player.death_time = Some(now);
                    player.respawn_available_at = now + respawn_delay;
                }
                self.last_death = Some(damage);
            }
            ServerMsg::Respawned { position, yaw } => {
                let Some(id) = self.local_id else {
                    return;
                };
                if let Some(player) = self.players.get_mut(&id) {
                    player.death_time = None;
                    player.respawn_available_at = f64::INFINITY;
                    player.teleport(position, yaw);
                }
                self.world.sync_player(id, position);
                self.drive(id, |p, ctx| {
                    fsm::set_state(p, ctx, PlayerStateKind::Idle);
                    fsm::transfer_to_appropriate_state(p, ctx);
                });
            }
            ServerMsg::TransferToAppropriateState => {
                if let Some(id) = self.local_id {
                    self.drive(id, fsm::transfer_to_appropriate_state);
                }
            }
            ServerMsg::InstantReload { player_id } => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.loadout.instant_reload_all(false);
                }
            }
            ServerMsg::FieldDelta { player_id, fields } => {
                for field in fields {
                    self.apply_field(player_id, field);
                }
            }
            ServerMsg::Snapshot {
                players, vehicles, ..
            } => {
                for snapshot in players {
                    if self.is_local(snapshot.player_id) {
                        continue;
                    }
                    let Some(player) = self.players.get_mut(&snapshot.player_id) else {
                        continue;
                    };
                    if player.seat.is_some() {
                        continue;
                    }
                    player.body.position = snapshot.position;
                    player.body.velocity = snapshot.velocity;
                    player.body.rotation = Quat::from_rotation_y(snapshot.yaw);
                    self.world.sync_player(snapshot.player_id, snapshot.position);
                }

                let local = self.local_id;
                for snapshot in vehicles {
                    let Some(vehicle) = self.vehicles.get_mut(&snapshot.vehicle_id) else {
                        continue;
                    };
                    // the local driver is ahead of the server
                    if local.is_some() && vehicle.driver() == local {
                        continue;
                    }
                    vehicle.position = snapshot.position;
                    vehicle.rotation = snapshot.rotation;
                    vehicle.velocity = snapshot.velocity;
                    self.world.sync_vehicle(snapshot.vehicle_id, vehicle.bounds());
                }
            }
            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Server error");
            }
            ServerMsg::Pong { t } => {
                debug!(t, "Pong");
            }
        }
    }

    /// Mirror one replicated field
    fn apply_field(&mut self, id: PlayerId, field: FieldUpdate) {
        let local = self.is_local(id);
        let now = self.now;
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };

        match field {
            FieldUpdate::Health { value } => player.vitals.apply_replicated(Some(value), None),
            FieldUpdate::Armor { value } => player.vitals.apply_replicated(None, Some(value)),
            FieldUpdate::Ammo { slot, ammo } => {
                if let Some(weapon) = player.loadout.weapon_mut(slot) {
                    weapon.ammo = ammo;
                }
            }
            FieldUpdate::ActiveSlot { slot } => {
                if let Some(in_hand) = player.loadout.set_active_slot(slot) {
                    self.cue(id, CosmeticCue::EquipWeapon(in_hand));
                }
            }
            FieldUpdate::Weapon { slot, weapon } => {
                let aiming_with_it = local
                    && player.state() == PlayerStateKind::Aiming
                    && player.loadout.active_slot() == slot;
                if aiming_with_it {
                    self.drive(id, fsm::transfer_to_appropriate_state);
                }

                let Some(player) = self.players.get_mut(&id) else {
                    return;
                };
                let in_hand = player.loadout.set_slot(slot, weapon, false, now);
                if player.loadout.active_slot() == slot && player.loadout.weapon_shown() {
                    self.cue(id, CosmeticCue::EquipWeapon(in_hand));
                }
            }
            FieldUpdate::Skin { slot, skin } => {
                if let Some(weapon) = player.loadout.weapon_mut(slot) {
                    weapon.skin = skin;
                }
            }
            FieldUpdate::Attachments { slot, attachments } => {
                if let Some(weapon) = player.loadout.weapon_mut(slot) {
                    weapon.attachments = attachments;
                }
            }
            FieldUpdate::AimTarget {
                local_position,
                local_rotation,
            } => {
                // the owner's own aim is ahead of the echo
                if !local {
                    player.aim.local_position = local_position;
                    player.aim.local_rotation = local_rotation;
                }
            }
            FieldUpdate::Seat { seat } => self.apply_seat(id, seat),
        }
    }

    fn apply_seat(&mut self, id: PlayerId, seat: Option<SeatRef>) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        let current = player.seat.map(|(vehicle_id, index)| SeatRef { vehicle_id, index });
        if current == seat {
            return;
        }
        let state = player.state();

        if let Some(previous) = current {
            if let Some(vehicle) = self.vehicles.get_mut(&previous.vehicle_id) {
                vehicle.leave(id);
            }
        }

        match seat {
            Some(SeatRef { vehicle_id, index }) => {
                let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) else {
                    warn!(player_id = %id, vehicle_id = %vehicle_id, "Seat in unknown vehicle");
                    return;
                };
                if !vehicle.occupy(index, id) {
                    warn!(player_id = %id, seat = index, "Unknown seat index");
                    return;
                }
                let next = if vehicle.seat(index).is_some_and(|s| s.is_driver) {
                    PlayerStateKind::Driver
                } else {
                    PlayerStateKind::Passenger
                };

                // a seat change exits the old seat state before entering the new one
                if state.is_seated() {
                    self.drive(id, |p, ctx| fsm::set_state(p, ctx, PlayerStateKind::Idle));
                }
                if let Some(player) = self.players.get_mut(&id) {
                    player.seat = Some((vehicle_id, index));
                }
                self.drive(id, |p, ctx| fsm::set_state(p, ctx, next));
            }
            None => {
                if let Some(player) = self.players.get_mut(&id) {
                    player.seat = None;
                }
                if !state.is_seated() {
                    return;
                }
                if self.is_local(id) {
                    self.drive(id, fsm::transfer_to_appropriate_state);
                } else {
                    self.drive(id, |p, ctx| fsm::set_state(p, ctx, PlayerStateKind::Idle));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::HitmarkerKind;
    use crate::game::health::DamageCause;
    use crate::game::input::InputAction;
    use crate::game::vehicle::VehicleType;
    use crate::ws::protocol::VehicleInfo;
    use uuid::Uuid;

    const DT: f32 = 1.0 / 30.0;

    fn info(id: PlayerId, position: Vec3) -> PlayerInfo {
        PlayerInfo {
            player_id: id,
            name: "someone".to_string(),
            state_index: 0,
            position,
            yaw: 0.0,
        }
    }

    /// A client that has joined, with one observer and one parked truck
    fn joined() -> (ClientSimulation, PlayerId, PlayerId, VehicleId) {
        let mut client = ClientSimulation::new(GameplayTuning::default(), InputDevice::KeyboardMouse);
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let truck = Uuid::new_v4();

        client.receive(ServerMsg::Welcome {
            player_id: me,
            server_time: 0,
        });
        client.receive(ServerMsg::MatchJoined {
            match_id: Uuid::nil(),
            seed: 1,
            players: vec![info(me, Vec3::ZERO), info(other, Vec3::new(20.0, 0.0, 20.0))],
            vehicles: vec![VehicleInfo {
                vehicle_id: truck,
                kind: VehicleType::Truck,
                position: Vec3::new(-30.0, 1.5, 20.0),
                yaw: 0.0,
            }],
        });
        client.tick(1.0, DT);
        (client, me, other, truck)
    }

    #[test]
    fn joining_requests_the_starting_loadout() {
        let (mut client, me, other, truck) = joined();

        assert_eq!(client.local_id(), Some(me));
        assert!(client.player(&other).is_some());
        assert!(client.vehicle(&truck).is_some());

        let outbox = client.take_outbox();
        assert!(outbox.contains(&ClientMsg::SetLoadoutSlot {
            slot: LoadoutSlot::Primary,
            weapon: Some(WeaponType::AssaultRifle),
        }));
        assert!(outbox.contains(&ClientMsg::SetLoadoutSlot {
            slot: LoadoutSlot::Secondary,
            weapon: Some(WeaponType::CombatPistol),
        }));
    }

    #[test]
    fn unknown_state_index_is_ignored() {
        let (mut client, _, other, _) = joined();

        client.receive(ServerMsg::StateChanged {
            player_id: other,
            state_index: 42,
        });
        client.tick(1.1, DT);
        assert_eq!(client.player(&other).map(|p| p.state()), Some(PlayerStateKind::Idle));

        client.receive(ServerMsg::StateChanged {
            player_id: other,
            state_index: PlayerStateKind::Sprinting.index(),
        });
        client.tick(1.2, DT);
        assert_eq!(
            client.player(&other).map(|p| p.state()),
            Some(PlayerStateKind::Sprinting)
        );
    }

    #[test]
    fn messages_wait_for_the_next_tick() {
        let (mut client, _, other, _) = joined();

        client.receive(ServerMsg::FieldDelta {
            player_id: other,
            fields: vec![FieldUpdate::Health { value: 40.0 }],
        });
        assert_eq!(client.player(&other).map(|p| p.vitals.health()), Some(100.0));

        client.tick(1.1, DT);
        assert_eq!(client.player(&other).map(|p| p.vitals.health()), Some(40.0));
    }

    #[test]
    fn seat_field_seats_observers() {
        let (mut client, _, other, truck) = joined();

        client.receive(ServerMsg::FieldDelta {
            player_id: other,
            fields: vec![FieldUpdate::Seat {
                seat: Some(SeatRef {
                    vehicle_id: truck,
                    index: 0,
                }),
            }],
        });
        client.tick(1.1, DT);

        assert_eq!(client.player(&other).map(|p| p.state()), Some(PlayerStateKind::Driver));
        assert_eq!(client.vehicle(&truck).and_then(|v| v.driver()), Some(other));

        client.receive(ServerMsg::FieldDelta {
            player_id: other,
            fields: vec![FieldUpdate::Seat { seat: None }],
        });
        client.tick(1.2, DT);

        assert_eq!(client.player(&other).map(|p| p.state()), Some(PlayerStateKind::Idle));
        assert_eq!(client.vehicle(&truck).and_then(|v| v.driver()), None);
    }

    #[test]
    fn respawn_is_requested_only_after_the_delay() {
        let (mut client, me, other, _) = joined();
        client.take_outbox();

        client.receive(ServerMsg::FieldDelta {
            player_id: me,
            fields: vec![FieldUpdate::Health { value: 0.0 }],
        });
        client.receive(ServerMsg::StateChanged {
            player_id: me,
            state_index: PlayerStateKind::Dead.index(),
        });
        client.receive(ServerMsg::Died {
            damage: DamageEvent {
                attacker: Some(other),
                victim: me,
                cause: DamageCause::Shot,
                damage: 30.0,
                distance: 12.0,
                weapon: "Assault Rifle".to_string(),
            },
            respawn_delay: 7.0,
        });
        client.tick(2.0, DT);
        assert_eq!(client.local_player().map(|p| p.state()), Some(PlayerStateKind::Dead));
        assert_eq!(client.last_death().map(|d| d.attacker), Some(Some(other)));

        client.push_input(InputEvent::pressed(InputAction::Respawn));
        client.tick(3.0, DT);
        assert!(!client.take_outbox().contains(&ClientMsg::Respawn));

        client.push_input(InputEvent::pressed(InputAction::Respawn));
        client.tick(9.0, DT);
        assert!(client.take_outbox().contains(&ClientMsg::Respawn));
    }

    #[test]
    fn dead_players_stop_streaming_movement() {
        let (mut client, me, _, _) = joined();
        client.take_outbox();

        client.tick(1.1, DT);
        assert!(client
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMsg::Movement { .. })));

        client.receive(ServerMsg::StateChanged {
            player_id: me,
            state_index: PlayerStateKind::Dead.index(),
        });
        client.tick(1.2, DT);
        assert!(!client
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMsg::Movement { .. })));
    }

    #[test]
    fn disabled_input_suppresses_intents() {
        let (mut client, me, _, _) = joined();
        client.receive(ServerMsg::FieldDelta {
            player_id: me,
            fields: vec![FieldUpdate::Weapon {
                slot: LoadoutSlot::Primary,
                weapon: Some(WeaponType::AssaultRifle),
            }],
        });
        client.tick(1.1, DT);
        client.take_outbox();

        client.input_mut().disabled = true;
        client.push_input(InputEvent::pressed(InputAction::Aim));
        client.tick(1.2, DT);
        assert!(!client
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMsg::SetState { .. })));

        client.input_mut().disabled = false;
        client.push_input(InputEvent::pressed(InputAction::Aim));
        client.tick(1.3, DT);
        assert!(client.take_outbox().contains(&ClientMsg::SetState {
            state_index: PlayerStateKind::Aiming.index(),
        }));
    }

    #[test]
    fn only_the_local_driver_steers() {
        let (mut client, me, _, truck) = joined();
        let target = Vec3::new(-25.0, 1.5, 20.0);

        client.steer_vehicle(target, Vec3::X, 0.0, 0.0);
        assert_eq!(client.vehicle(&truck).map(|v| v.position), Some(Vec3::new(-30.0, 1.5, 20.0)));

        client.receive(ServerMsg::FieldDelta {
            player_id: me,
            fields: vec![FieldUpdate::Seat {
                seat: Some(SeatRef {
                    vehicle_id: truck,
                    index: 0,
                }),
            }],
        });
        client.tick(1.1, DT);
        assert_eq!(client.local_player().map(|p| p.state()), Some(PlayerStateKind::Driver));
        client.take_outbox();

        client.steer_vehicle(target, Vec3::X, 0.0, 0.0);
        assert_eq!(client.vehicle(&truck).map(|v| v.position), Some(target));
        assert!(client
            .take_outbox()
            .iter()
            .any(|m| matches!(m, ClientMsg::VehicleMovement { vehicle_id, .. } if *vehicle_id == truck)));
    }

    #[test]
    fn hitmarkers_and_shots_become_cues() {
        let (mut client, me, other, _) = joined();
        client.take_presentation();

        client.receive(ServerMsg::FireOutcome {
            shooter_id: other,
            point: Vec3::ONE,
        });
        client.receive(ServerMsg::Hitmarker {
            kind: HitmarkerKind::Kill,
        });
        client.tick(1.1, DT);

        let presentation = client.take_presentation();
        assert!(presentation.contains(&Effect::Cue {
            player: other,
            cue: CosmeticCue::WeaponFired { hit_point: Vec3::ONE },
        }));
        assert!(presentation.contains(&Effect::Cue {
            player: me,
            cue: CosmeticCue::Hitmarker(HitmarkerKind::Kill),
        }));
    }
}
