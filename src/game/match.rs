//! Match state and authoritative tick loop

use dashmap::DashMap;
use glam::{EulerRot, Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GameplayTuning;
use crate::util::time::{
    tick_delta, tick_time, Timer, SIMULATION_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS,
};
use crate::ws::protocol::{ClientMsg, PlayerInfo, ServerMsg, VehicleInfo};

use super::combat::{resolve_fire, HitmarkerKind};
use super::fsm::{self, Effect, PlayerStateKind, SimRole, TickContext};
use super::health::{DamageCause, DamageEvent};
use super::input::InputState;
use super::loadout::LoadoutSlot;
use super::player::Player;
use super::scheduler::CosmeticScheduler;
use super::snapshot::{ReplicationTracker, SnapshotBuilder};
use super::vehicle::{Vehicle, VehicleType, Vehicles};
use super::world::{player_bounds, ArenaWorld};
use super::{PlayerId, PlayerInput, VehicleId};

/// Tolerance for timestamp gates that should pass "exactly at" their delay
const TIME_EPSILON: f64 = 1e-6;

/// Open ground the arena spawns players on
const SPAWN_POINTS: [Vec3; 6] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(20.0, 0.0, 20.0),
    Vec3::new(-25.0, 0.0, 15.0),
    Vec3::new(25.0, 0.0, -20.0),
    Vec3::new(-5.0, 0.0, -25.0),
    Vec3::new(30.0, 0.0, 5.0),
];

/// Parked vehicles present from the start
const VEHICLE_SPAWNS: [(VehicleType, Vec3, f32); 3] = [
    (VehicleType::Nekomata, Vec3::new(5.0, 0.7, -10.0), 0.0),
    (VehicleType::Truck, Vec3::new(-30.0, 1.5, 20.0), 1.57),
    (VehicleType::Apc, Vec3::new(30.0, 1.5, 25.0), 3.14),
];

/// Who a server message is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Only(PlayerId),
    AllExcept(PlayerId),
}

impl Audience {
    pub fn includes(&self, player: PlayerId) -> bool {
        match self {
            Audience::All => true,
            Audience::Only(id) => *id == player,
            Audience::AllExcept(id) => *id != player,
        }
    }
}

/// An addressed server message on the match broadcast channel
#[derive(Debug, Clone)]
pub struct Outbound {
    pub audience: Audience,
    pub msg: ServerMsg,
}

/// Match state (owned by match task)
pub struct MatchState {
    pub id: Uuid,
    pub seed: u64,
    pub tick: u64,
    pub players: HashMap<PlayerId, Player>,
    pub vehicles: Vehicles,
    pub world: ArenaWorld,
    pub scheduler: CosmeticScheduler,
    pub tuning: GameplayTuning,
    pub max_players: usize,
    rng: ChaCha8Rng,
    /// The server never holds input; handlers that read it see nothing held
    no_input: InputState,
    /// Vehicle/player overlaps seen on the previous tick
    contacts: HashSet<(VehicleId, PlayerId)>,
}

impl MatchState {
    pub fn new(id: Uuid, seed: u64, max_players: usize, tuning: GameplayTuning) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut world = ArenaWorld::standard();
        let mut vehicles = Vehicles::new();

        for (kind, position, yaw) in VEHICLE_SPAWNS {
            let vehicle_id = Uuid::from_u128(rng.gen());
            let vehicle = Vehicle::new(vehicle_id, kind, position, yaw);
            world.sync_vehicle(vehicle_id, vehicle.bounds());
            vehicles.insert(vehicle_id, vehicle);
        }

        Self {
            id,
            seed,
            tick: 0,
            players: HashMap::new(),
            vehicles,
            world,
            scheduler: CosmeticScheduler::new(),
            tuning,
            max_players,
            rng,
            no_input: InputState::disabled(),
            contacts: HashSet::new(),
        }
    }

    /// Network time of the current tick
    pub fn now(&self) -> f64 {
        tick_time(self.tick)
    }

    /// Pick a spawn point and facing for a new or respawning player
    pub fn generate_spawn_position(&mut self) -> (Vec3, f32) {
        let index = self.rng.gen_range(0..SPAWN_POINTS.len());
        let yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
        (SPAWN_POINTS[index], yaw)
    }

    /// Run `f` against one player with a server-role context
    fn drive<R>(
        &mut self,
        id: PlayerId,
        f: impl FnOnce(&mut Player, &mut TickContext) -> R,
    ) -> Option<(R, Vec<Effect>)> {
        let now = self.now();
        let player = self.players.get_mut(&id)?;
        let mut ctx = TickContext {
            now,
            dt: tick_delta(),
            role: SimRole::SERVER,
            tuning: &self.tuning,
            world: &self.world,
            input: &self.no_input,
            vehicles: &mut self.vehicles,
            scheduler: &mut self.scheduler,
            effects: Vec::new(),
        };
        let result = f(player, &mut ctx);
        Some((result, ctx.effects))
    }

    fn player_info(player: &Player) -> PlayerInfo {
        PlayerInfo {
            player_id: player.id,
            name: player.name().to_string(),
            state_index: player.state().index(),
            position: player.body.position,
            yaw: player.body.yaw(),
        }
    }

    fn vehicle_info(vehicle: &Vehicle) -> VehicleInfo {
        let (yaw, _, _) = vehicle.rotation.to_euler(EulerRot::YXZ);
        VehicleInfo {
            vehicle_id: vehicle.id,
            kind: vehicle.kind,
            position: vehicle.position,
            yaw,
        }
    }

    /// Take a player out of its vehicle seat, if any
    fn vacate_seat(&mut self, id: PlayerId) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        let Some((vehicle_id, _)) = player.seat.take() else {
            return false;
        };
        if let Some(vehicle) = self.vehicles.get_mut(&vehicle_id) {
            vehicle.leave(id);
        }
        true
    }
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<PlayerInput>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    pub player_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: DashMap<Uuid, MatchHandle>,
}

impl MatchRegistry {
    pub fn new() -> Self {
        Self {
            matches: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.get(id).map(|m| m.value().clone())
    }

    pub fn insert(&self, handle: MatchHandle) {
        self.matches.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<MatchHandle> {
        self.matches.remove(id).map(|(_, h)| h)
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn total_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().player_count())
            .sum()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game match
pub struct GameMatch {
    state: MatchState,
    input_rx: mpsc::Receiver<PlayerInput>,
    outbound_tx: broadcast::Sender<Outbound>,
    snapshot_builder: SnapshotBuilder,
    replication: ReplicationTracker,
    player_count: Arc<AtomicUsize>,
    /// Every input sender is gone
    closed: bool,
}

impl GameMatch {
    /// Create a new match
    pub fn new(
        id: Uuid,
        seed: u64,
        max_players: usize,
        tuning: GameplayTuning,
    ) -> (Self, MatchHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = MatchHandle {
            id,
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let snapshot_interval = SIMULATION_TPS / SNAPSHOT_TPS;
        let game_match = Self {
            state: MatchState::new(id, seed, max_players, tuning),
            input_rx,
            outbound_tx,
            snapshot_builder: SnapshotBuilder::new(snapshot_interval),
            replication: ReplicationTracker::new(),
            player_count,
            closed: false,
        };

        (game_match, handle)
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Run the authoritative tick loop until every input sender is dropped
    pub async fn run(mut self) {
        info!(match_id = %self.state.id, seed = self.state.seed, "Match started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        while !self.closed {
            tick_interval.tick().await;

            let timer = Timer::new();
            self.step();
            let elapsed = timer.elapsed_micros();
            if elapsed > TICK_DURATION_MICROS {
                warn!(match_id = %self.state.id, elapsed_micros = elapsed, "Slow tick");
            }
        }

        info!(match_id = %self.state.id, "Match stopped");
    }

    /// One authoritative tick: drain intents in arrival order, simulate,
    /// then replicate
    pub fn step(&mut self) {
        self.state.tick += 1;
        self.process_inputs();
        self.run_tick();
        self.replicate();

        if self.snapshot_builder.should_send() {
            let snapshot =
                self.snapshot_builder
                    .build(self.state.tick, &self.state.players, &self.state.vehicles);
            self.send(Audience::All, snapshot);
        }
    }

    fn send(&self, audience: Audience, msg: ServerMsg) {
        let _ = self.outbound_tx.send(Outbound { audience, msg });
    }

    /// Forward what the server-side state callbacks asked for
    fn apply_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if let Effect::RequestTransfer { player } = effect {
                self.send(Audience::Only(player), ServerMsg::TransferToAppropriateState);
            }
        }
    }

    fn set_state(&mut self, id: PlayerId, next: PlayerStateKind) {
        if let Some(((), effects)) = self.state.drive(id, |p, ctx| fsm::set_state(p, ctx, next)) {
            self.apply_effects(effects);
        }
    }

    /// Process all pending intents
    fn process_inputs(&mut self) {
        loop {
            let input = match self.input_rx.try_recv() {
                Ok(input) => input,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            };

            let id = input.player_id;
            match input.msg {
                ClientMsg::Join { name } => self.handle_join(id, &name),
                ClientMsg::SetState { state_index } => self.handle_set_state(id, state_index),
                ClientMsg::Movement {
                    position,
                    velocity,
                    yaw,
                } => self.handle_movement(id, position, velocity, yaw),
                ClientMsg::SetAimTarget {
                    local_position,
                    local_rotation,
                } => self.handle_aim_target(id, local_position, local_rotation),
                ClientMsg::SetHipFiring { hip_firing } => self.handle_hip_firing(id, hip_firing),
                ClientMsg::Fire => self.handle_fire(id),
                ClientMsg::Vault { ledge, normal } => self.handle_vault(id, ledge, normal),
                ClientMsg::Respawn => self.handle_respawn(id),
                ClientMsg::SetLoadoutSlot { slot, weapon } => {
                    let now = self.state.now();
                    if let Some(player) = self.state.players.get_mut(&id) {
                        player.loadout.set_slot(slot, weapon, true, now);
                    }
                }
                ClientMsg::SetActiveSlot { slot } => self.handle_active_slot(id, slot),
                ClientMsg::SetAttachment {
                    slot,
                    category,
                    attachment,
                } => {
                    if let Some(player) = self.state.players.get_mut(&id) {
                        if let Err(error) = player.loadout.set_attachment(slot, category, attachment)
                        {
                            debug!(player_id = %id, %error, "Attachment change rejected");
                        }
                    }
                }
                ClientMsg::SetSkin { slot, skin } => {
                    if let Some(player) = self.state.players.get_mut(&id) {
                        if let Err(error) = player.loadout.set_skin(slot, skin) {
                            debug!(player_id = %id, %error, "Skin change rejected");
                        }
                    }
                }
                ClientMsg::EnterVehicle { vehicle_id } => self.handle_enter_vehicle(id, vehicle_id),
                ClientMsg::LeaveVehicle => self.handle_leave_vehicle(id),
                ClientMsg::VehicleMovement {
                    vehicle_id,
                    position,
                    velocity,
                    yaw,
                    roll,
                } => self.handle_vehicle_movement(id, vehicle_id, position, velocity, yaw, roll),
                ClientMsg::Ping { t } => {
                    self.send(Audience::Only(id), ServerMsg::Pong { t });
                }
                ClientMsg::Leave => self.handle_leave(id),
            }
        }
    }

    /// Handle player join request
    fn handle_join(&mut self, id: PlayerId, name: &str) {
        if self.state.players.contains_key(&id) {
            warn!(player_id = %id, "Player already in match");
            return;
        }

        if self.state.players.len() >= self.state.max_players {
            self.send(
                Audience::Only(id),
                ServerMsg::Error {
                    code: "match_full".to_string(),
                    message: "Match is full".to_string(),
                },
            );
            return;
        }

        let (position, yaw) = self.state.generate_spawn_position();
        let mut player = Player::new(id, name, position, &self.state.tuning);
        player.teleport(position, yaw);
        self.state.world.sync_player(id, position);

        let info = MatchState::player_info(&player);
        let name = player.name().to_string();

        // existing players' fields, before the newcomer is tracked
        let known: Vec<(PlayerId, Vec<_>)> = self
            .state
            .players
            .values()
            .map(|p| (p.id, ReplicationTracker::full_fields(p)))
            .collect();

        self.state.players.insert(id, player);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        let players = self
            .state
            .players
            .values()
            .map(MatchState::player_info)
            .collect();
        let vehicles = self
            .state
            .vehicles
            .values()
            .map(MatchState::vehicle_info)
            .collect();

        self.send(
            Audience::Only(id),
            ServerMsg::MatchJoined {
                match_id: self.state.id,
                seed: self.state.seed,
                players,
                vehicles,
            },
        );
        for (player_id, fields) in known {
            self.send(Audience::Only(id), ServerMsg::FieldDelta { player_id, fields });
        }
        self.send(Audience::AllExcept(id), ServerMsg::PlayerJoined { player: info });
        self.snapshot_builder.force_next();

        info!(
            match_id = %self.state.id,
            player_id = %id,
            name = %name,
            player_count = self.state.players.len(),
            "Player joined match"
        );
    }

    /// Relay a predicted state unless the authority vetoes it
    fn handle_set_state(&mut self, id: PlayerId, state_index: u8) {
        let next = match PlayerStateKind::try_from(state_index) {
            Ok(next) => next,
            Err(error) => {
                warn!(player_id = %id, %error, "State update ignored");
                return;
            }
        };

        let Some(player) = self.state.players.get(&id) else {
            return;
        };

        if player.state() == PlayerStateKind::Dead || player.is_dead() {
            debug!(player_id = %id, state = ?next, "State update vetoed after death");
            return;
        }
        // seats are left only through LeaveVehicle
        if player.seat.is_some() {
            debug!(player_id = %id, state = ?next, "State update vetoed while seated");
            return;
        }
        // death, seats and vaults are decided here, never by the owner
        if matches!(
            next,
            PlayerStateKind::Dead
                | PlayerStateKind::Driver
                | PlayerStateKind::Passenger
                | PlayerStateKind::Vaulting
        ) {
            debug!(player_id = %id, state = ?next, "Server-owned state requested");
            return;
        }

        self.set_state(id, next);
        self.send(
            Audience::AllExcept(id),
            ServerMsg::StateChanged {
                player_id: id,
                state_index: next.index(),
            },
        );
    }

    fn handle_movement(&mut self, id: PlayerId, position: Vec3, velocity: Vec3, yaw: f32) {
        let Some(player) = self.state.players.get_mut(&id) else {
            return;
        };
        if !position.is_finite() || !velocity.is_finite() || !yaw.is_finite() {
            debug!(player_id = %id, "Malformed movement dropped");
            return;
        }
        // seats and the dead body are positioned by the server
        if player.seat.is_some() || player.state() == PlayerStateKind::Dead {
            return;
        }

        player.body.position = position;
        player.body.velocity = velocity;
        player.body.rotation = Quat::from_rotation_y(yaw);
        self.state.world.sync_player(id, position);
    }

    fn handle_aim_target(&mut self, id: PlayerId, local_position: Vec3, local_rotation: Quat) {
        let Some(player) = self.state.players.get_mut(&id) else {
            return;
        };
        if !local_position.is_finite() || !local_rotation.is_finite() {
            debug!(player_id = %id, "Malformed aim target dropped");
            return;
        }
        player.aim.local_position = local_position;
        player.aim.local_rotation = local_rotation.normalize();
    }

    fn handle_hip_firing(&mut self, id: PlayerId, hip_firing: bool) {
        let Some(player) = self.state.players.get_mut(&id) else {
            return;
        };
        player.aiming.hip_firing = hip_firing;
        self.send(
            Audience::AllExcept(id),
            ServerMsg::HipFiringChanged {
                player_id: id,
                hip_firing,
            },
        );
    }

    fn handle_fire(&mut self, id: PlayerId) {
        let now = self.state.now();
        let resolution = resolve_fire(
            id,
            &mut self.state.players,
            &mut self.state.world,
            &self.state.tuning.combat,
            now,
        );

        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(rejection) => {
                debug!(player_id = %id, %rejection, "Fire rejected");
                return;
            }
        };

        self.send(
            Audience::All,
            ServerMsg::FireOutcome {
                shooter_id: id,
                point: resolution.end_point,
            },
        );

        if let Some(hit) = resolution.hit {
            let kind = if hit.outcome.killed {
                HitmarkerKind::Kill
            } else {
                HitmarkerKind::Damage
            };
            self.send(Audience::Only(id), ServerMsg::Hitmarker { kind });

            if hit.outcome.killed {
                self.kill(hit.victim, hit.event);
            }
        }
    }

    /// Forced terminal transition after a lethal hit
    fn kill(&mut self, victim: PlayerId, event: DamageEvent) {
        let now = self.state.now();

        self.set_state(victim, PlayerStateKind::Dead);
        self.state.vacate_seat(victim);
        if let Some(player) = self.state.players.get_mut(&victim) {
            player.death_time = Some(now);
        }

        self.send(
            Audience::All,
            ServerMsg::StateChanged {
                player_id: victim,
                state_index: PlayerStateKind::Dead.index(),
            },
        );
        self.send(
            Audience::Only(victim),
            ServerMsg::Died {
                damage: event.clone(),
                respawn_delay: self.state.tuning.vitals.respawn_delay,
            },
        );

        info!(
            match_id = %self.state.id,
            player_id = %victim,
            attacker = ?event.attacker,
            weapon = %event.weapon,
            distance = event.distance,
            "Player killed"
        );
    }

    fn handle_respawn(&mut self, id: PlayerId) {
        let now = self.state.now();
        let delay = self.state.tuning.vitals.respawn_delay;

        let Some(player) = self.state.players.get(&id) else {
            return;
        };
        if player.state() != PlayerStateKind::Dead || !player.is_dead() {
            debug!(player_id = %id, "Respawn rejected: not dead");
            return;
        }
        let ready = player
            .death_time
            .is_some_and(|died| now - died + TIME_EPSILON >= delay);
        if !ready {
            debug!(player_id = %id, "Respawn rejected: too early");
            return;
        }

        let (position, yaw) = self.state.generate_spawn_position();
        if let Some(player) = self.state.players.get_mut(&id) {
            player.vitals.restore_full();
            player.loadout.instant_reload_all(true);
            player.death_time = None;
        }
        self.set_state(id, PlayerStateKind::Idle);
        if let Some(player) = self.state.players.get_mut(&id) {
            player.teleport(position, yaw);
        }
        self.state.world.sync_player(id, position);

        self.send(Audience::All, ServerMsg::InstantReload { player_id: id });
        self.send(
            Audience::AllExcept(id),
            ServerMsg::StateChanged {
                player_id: id,
                state_index: PlayerStateKind::Idle.index(),
            },
        );
        self.send(Audience::Only(id), ServerMsg::Respawned { position, yaw });

        info!(match_id = %self.state.id, player_id = %id, "Player respawned");
    }

    fn handle_vault(&mut self, id: PlayerId, ledge: Vec3, normal: Vec3) {
        let movement = &self.state.tuning.movement;
        let max_height = movement.max_ledge_height + 0.5;
        let max_reach = movement.ledge_probe_length + 1.0;

        let Some(player) = self.state.players.get_mut(&id) else {
            return;
        };

        let state = player.state();
        if player.is_dead()
            || player.seat.is_some()
            || matches!(state, PlayerStateKind::Vaulting | PlayerStateKind::Dead)
        {
            debug!(player_id = %id, state = ?state, "Vault ignored");
            return;
        }

        let offset = ledge - player.body.position;
        let reach = Vec3::new(offset.x, 0.0, offset.z).length();
        if !ledge.is_finite() || !normal.is_finite() || offset.y > max_height || reach > max_reach
        {
            debug!(player_id = %id, "Implausible ledge rejected");
            return;
        }

        player.vault.ledge = ledge;
        player.vault.normal = normal;
        self.set_state(id, PlayerStateKind::Vaulting);

        self.send(
            Audience::All,
            ServerMsg::VaultStarted {
                player_id: id,
                ledge,
                normal,
            },
        );
    }

    fn handle_active_slot(&mut self, id: PlayerId, slot: LoadoutSlot) {
        let Some(player) = self.state.players.get_mut(&id) else {
            return;
        };
        player.loadout.set_active_slot(slot);
    }

    fn handle_enter_vehicle(&mut self, id: PlayerId, vehicle_id: VehicleId) {
        let radius = self.state.tuning.movement.vehicle_enter_radius;

        let Some(player) = self.state.players.get(&id) else {
            return;
        };
        let state = player.state();
        if player.is_dead() || matches!(state, PlayerStateKind::Dead | PlayerStateKind::Vaulting) {
            debug!(player_id = %id, state = ?state, "Vehicle entry ignored");
            return;
        }
        let position = player.body.position;
        let current = player.seat;

        let Some(vehicle) = self.state.vehicles.get(&vehicle_id) else {
            debug!(player_id = %id, vehicle_id = %vehicle_id, "Unknown vehicle");
            return;
        };
        let in_reach = current.is_some_and(|(v, _)| v == vehicle_id)
            || (0..vehicle.seats().len())
                .filter_map(|i| vehicle.seat_transform(i))
                .any(|(seat, _)| seat.distance(position) <= radius);
        if !in_reach {
            debug!(player_id = %id, vehicle_id = %vehicle_id, "Vehicle out of reach");
            return;
        }

        // switching vehicles: leave the old seat first
        if let Some((old, _)) = current.filter(|(v, _)| *v != vehicle_id) {
            if let Some(vehicle) = self.state.vehicles.get_mut(&old) {
                vehicle.leave(id);
            }
        }

        let Some(vehicle) = self.state.vehicles.get_mut(&vehicle_id) else {
            return;
        };
        let Some(index) = vehicle.enter(id) else {
            debug!(player_id = %id, vehicle_id = %vehicle_id, "Vehicle full");
            return;
        };
        let is_driver = vehicle.seat(index).is_some_and(|s| s.is_driver);

        // leave the previous seat's state so the new seat runs its enter
        if state.is_seated() {
            self.set_state(id, PlayerStateKind::Idle);
        }
        if let Some(player) = self.state.players.get_mut(&id) {
            player.seat = Some((vehicle_id, index));
        }
        let next = if is_driver {
            PlayerStateKind::Driver
        } else {
            PlayerStateKind::Passenger
        };
        self.set_state(id, next);

        debug!(player_id = %id, vehicle_id = %vehicle_id, seat = index, "Entered vehicle");
    }

    fn handle_leave_vehicle(&mut self, id: PlayerId) {
        let seated = self
            .state
            .players
            .get(&id)
            .is_some_and(|p| p.state().is_seated());

        if !self.state.vacate_seat(id) {
            return;
        }

        // the owner normally reports its new state first
        if seated {
            self.set_state(id, PlayerStateKind::Idle);
            self.send(
                Audience::All,
                ServerMsg::StateChanged {
                    player_id: id,
                    state_index: PlayerStateKind::Idle.index(),
                },
            );
        }
    }

    fn handle_vehicle_movement(
        &mut self,
        id: PlayerId,
        vehicle_id: VehicleId,
        position: Vec3,
        velocity: Vec3,
        yaw: f32,
        roll: f32,
    ) {
        let Some(vehicle) = self.state.vehicles.get_mut(&vehicle_id) else {
            return;
        };
        if vehicle.driver() != Some(id) {
            debug!(player_id = %id, vehicle_id = %vehicle_id, "Vehicle movement from non-driver");
            return;
        }
        if !position.is_finite() || !velocity.is_finite() || !yaw.is_finite() || !roll.is_finite()
        {
            return;
        }

        vehicle.position = position;
        vehicle.velocity = velocity;
        vehicle.rotation = Quat::from_euler(EulerRot::YXZ, yaw, 0.0, roll);
        let bounds = vehicle.bounds();
        self.state.world.sync_vehicle(vehicle_id, bounds);
    }

    /// Handle player leave
    fn handle_leave(&mut self, id: PlayerId) {
        self.state.vacate_seat(id);
        let Some(player) = self.state.players.remove(&id) else {
            return;
        };

        self.state.world.remove_player(&id);
        self.state.scheduler.cancel_owner(id);
        self.state.contacts.retain(|(_, p)| *p != id);
        self.replication.forget(&id);
        self.player_count
            .store(self.state.players.len(), Ordering::Relaxed);

        self.send(
            Audience::All,
            ServerMsg::PlayerLeft {
                player_id: id,
                reason: "left".to_string(),
            },
        );

        info!(
            match_id = %self.state.id,
            player_id = %id,
            name = %player.name(),
            "Player left match"
        );
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        let now = self.state.now();
        let dt = tick_delta();

        let ids: Vec<PlayerId> = self.state.players.keys().copied().collect();
        for id in &ids {
            if let Some(((), effects)) = self.state.drive(*id, |p, ctx| {
                fsm::tick(p, ctx);
                fsm::fixed_tick(p, ctx);
                fsm::late_tick(p, ctx);
            }) {
                self.apply_effects(effects);
            }
        }

        let vitals = self.state.tuning.vitals.clone();
        for player in self.state.players.values_mut() {
            player.vitals.regenerate(now, dt, &vitals);
        }

        self.apply_collisions(now);

        for stage in self.state.scheduler.drain_due(now) {
            if let Some(((), effects)) = self
                .state
                .drive(stage.owner, |p, ctx| fsm::run_stage(p, ctx, &stage))
            {
                self.apply_effects(effects);
            }
        }

        for player in self.state.players.values_mut() {
            let destroyed = player.loadout.collect_retired(now);
            if !destroyed.is_empty() {
                debug!(player_id = %player.id, count = destroyed.len(), "Retired weapons destroyed");
            }
        }

        // seated bodies follow their seats
        for player in self.state.players.values() {
            self.state.world.sync_player(player.id, player.body.position);
        }
    }

    /// Vehicles hitting players on foot; damage only on a new contact
    fn apply_collisions(&mut self, now: f64) {
        let min_speed = self.state.tuning.combat.collision_min_speed;
        let mut contacts = HashSet::new();
        let mut hits = Vec::new();

        for vehicle in self.state.vehicles.values() {
            // parked vehicles are inert
            if vehicle.driver().is_none() || vehicle.speed() < min_speed {
                continue;
            }
            let bounds = vehicle.bounds();

            for player in self.state.players.values() {
                if player.is_dead() || player.seat.is_some() {
                    continue;
                }
                if !bounds.intersects(&player_bounds(player.body.position)) {
                    continue;
                }

                let key = (vehicle.id, player.id);
                contacts.insert(key);
                if self.state.contacts.contains(&key) {
                    continue;
                }

                hits.push(DamageEvent {
                    attacker: vehicle.driver(),
                    victim: player.id,
                    cause: DamageCause::Collision,
                    damage: (vehicle.velocity - player.body.velocity).length(),
                    distance: 0.0,
                    weapon: vehicle.kind.label().to_string(),
                });
            }
        }
        self.state.contacts = contacts;

        for event in hits {
            let Some(victim) = self.state.players.get_mut(&event.victim) else {
                continue;
            };
            let outcome = victim.vitals.apply_damage(&event, now);

            if let Some(driver) = event.attacker {
                self.send(
                    Audience::Only(driver),
                    ServerMsg::Hitmarker {
                        kind: HitmarkerKind::Damage,
                    },
                );
            }
            if outcome.killed {
                self.kill(event.victim, event);
            }
        }
    }

    /// Broadcast replicated-field deltas, after all of this tick's mutations
    fn replicate(&mut self) {
        let mut deltas = Vec::new();
        for player in self.state.players.values() {
            let fields = self.replication.diff(player);
            if !fields.is_empty() {
                deltas.push((player.id, fields));
            }
        }

        for (player_id, fields) in deltas {
            self.send(Audience::All, ServerMsg::FieldDelta { player_id, fields });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audiences_address_the_right_players() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(Audience::All.includes(a));
        assert!(Audience::Only(a).includes(a));
        assert!(!Audience::Only(a).includes(b));
        assert!(!Audience::AllExcept(a).includes(a));
        assert!(Audience::AllExcept(a).includes(b));
    }

    #[test]
    fn spawns_are_deterministic_per_seed() {
        let tuning = GameplayTuning::default();
        let mut first = MatchState::new(Uuid::nil(), 42, 16, tuning.clone());
        let mut second = MatchState::new(Uuid::nil(), 42, 16, tuning);

        for _ in 0..5 {
            assert_eq!(first.generate_spawn_position(), second.generate_spawn_position());
        }
        let mut first_ids: Vec<_> = first.vehicles.keys().copied().collect();
        let mut second_ids: Vec<_> = second.vehicles.keys().copied().collect();
        first_ids.sort();
        second_ids.sort();
        assert_eq!(first_ids, second_ids);
    }
}
