//! Player entity: body, aim transform, camera rig and per-state scratch data

use glam::{EulerRot, Quat, Vec2, Vec3};

use crate::config::{GameplayTuning, MovementTuning};

use super::animation::{AnimParams, CameraFollow};
use super::fsm::{ActionMachine, PlayerStateKind};
use super::health::Vitals;
use super::loadout::{Loadout, LoadoutSlot};
use super::scheduler::SessionId;
use super::world::{LayerMask, PhysicsWorld, Ray, PLAYER_HALF_WIDTH};
use super::{PlayerId, VehicleId};

/// Longest accepted display name
pub const MAX_NAME_LEN: usize = 20;

pub const GRAVITY: f32 = 9.81;

/// Highest step the body climbs without vaulting
const STEP_HEIGHT: f32 = 0.3;

/// Truncate to [`MAX_NAME_LEN`] characters, then trim
pub fn sanitize_name(raw: &str) -> String {
    let truncated: String = raw.chars().take(MAX_NAME_LEN).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "Player".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Yaw of a horizontal direction, `None` for a zero vector
pub fn yaw_of(direction: Vec3) -> Option<f32> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= f32::EPSILON {
        None
    } else {
        Some(flat.x.atan2(flat.z))
    }
}

/// Rigid body of a player, feet-anchored
#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub drag: f32,
    pub use_gravity: bool,
    pub kinematic: bool,
    /// Layers this body does not collide with
    pub excluded_layers: LayerMask,
}

impl Body {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            rotation: Quat::from_rotation_y(yaw),
            drag: 1.0,
            use_gravity: true,
            kinematic: false,
            excluded_layers: LayerMask::NONE,
        }
    }

    pub fn yaw(&self) -> f32 {
        let (yaw, _, _) = self.rotation.to_euler(EulerRot::YXZ);
        yaw
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    pub fn add_impulse(&mut self, impulse: Vec3) {
        if !self.kinematic {
            self.velocity += impulse;
        }
    }

    fn collision_mask(&self) -> LayerMask {
        LayerMask::DEFAULT_RAYCAST
            .without(LayerMask::PLAYER)
            .without(self.excluded_layers)
    }

    /// One physics step: gravity, drag, blocking and ground snap
    pub fn integrate(&mut self, world: &dyn PhysicsWorld, dt: f32) {
        if self.kinematic {
            return;
        }

        if self.use_gravity {
            self.velocity.y -= GRAVITY * dt;
        }
        self.velocity *= (1.0 - self.drag * dt).max(0.0);

        let mask = self.collision_mask();

        // horizontal blocking at knee height
        let horizontal = Vec3::new(self.velocity.x, 0.0, self.velocity.z) * dt;
        if horizontal.length_squared() > 0.0 {
            let probe = Ray::new(self.position + Vec3::Y * (STEP_HEIGHT + 0.05), horizontal);
            if world
                .raycast(&probe, horizontal.length() + PLAYER_HALF_WIDTH, mask)
                .is_some()
            {
                self.velocity.x = 0.0;
                self.velocity.z = 0.0;
            }
        }

        let mut next = self.position + self.velocity * dt;

        if self.velocity.y <= 0.0 {
            let top = self.position.y.max(next.y) + STEP_HEIGHT;
            let probe = Ray::new(Vec3::new(next.x, top, next.z), Vec3::NEG_Y);
            let reach = top - next.y;
            if let Some(hit) = world.raycast(&probe, reach, mask) {
                next.y = hit.point.y;
                self.velocity.y = 0.0;
            }
        }

        self.position = next;
    }
}

/// Where the player is looking, relative to the body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AimTarget {
    pub local_position: Vec3,
    pub local_rotation: Quat,
}

impl Default for AimTarget {
    fn default() -> Self {
        Self {
            local_position: Vec3::new(0.0, 1.5, 10.0),
            local_rotation: Quat::IDENTITY,
        }
    }
}

/// Eye height of the camera pivot above the feet
pub const CAMERA_PIVOT_HEIGHT: f32 = 1.6;
/// Distance of the orbit camera behind the pivot
pub const CAMERA_ORBIT_DISTANCE: f32 = 4.0;
/// Rig damping outside of aiming
pub const DEFAULT_CAMERA_DAMPING: f32 = 0.1;
/// Over-the-shoulder offset while aiming (camera space)
pub const AIM_RIGHT_OFFSET: f32 = 0.4;
pub const AIM_FORWARD_OFFSET: f32 = 2.5;

/// Orbit camera bookkeeping on the owning client
#[derive(Debug, Clone)]
pub struct CameraRig {
    pub yaw: f32,
    pub pitch: f32,
    pub base_sensitivity: f32,
    sensitivity_multiplier: f32,
    /// Camera-space offset
    pub offset: Vec3,
    pub damping: f32,
    pub follow: CameraFollow,
    pub crosshair: bool,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            base_sensitivity: 1.0,
            sensitivity_multiplier: 1.0,
            offset: Vec3::ZERO,
            damping: DEFAULT_CAMERA_DAMPING,
            follow: CameraFollow::Player,
            crosshair: false,
        }
    }
}

impl CameraRig {
    pub fn rotation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0)
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::Z
    }

    pub fn sensitivity(&self) -> f32 {
        self.base_sensitivity * self.sensitivity_multiplier
    }

    pub fn sensitivity_multiplier(&self) -> f32 {
        self.sensitivity_multiplier
    }

    pub fn set_sensitivity_multiplier(&mut self, multiplier: f32) {
        self.sensitivity_multiplier = multiplier;
    }

    /// Apply a look delta (radians at unit sensitivity)
    pub fn apply_look(&mut self, delta: Vec2) {
        let limit = 80.0_f32.to_radians();
        self.yaw += delta.x * self.sensitivity();
        self.pitch = (self.pitch - delta.y * self.sensitivity()).clamp(-limit, limit);
    }

    pub fn position(&self, anchor: Vec3) -> Vec3 {
        anchor
            + Vec3::Y * CAMERA_PIVOT_HEIGHT
            + self.rotation() * (self.offset - Vec3::Z * CAMERA_ORBIT_DISTANCE)
    }

    /// Point under the crosshair at `distance` from the camera
    pub fn look_point(&self, anchor: Vec3, distance: f32) -> Vec3 {
        self.position(anchor) + self.forward() * distance
    }
}

#[derive(Debug, Clone)]
pub struct AimingData {
    pub hip_firing: bool,
    pub entered_at: f64,
    pub forward_offset: f32,
}

impl Default for AimingData {
    fn default() -> Self {
        Self {
            hip_firing: false,
            entered_at: f64::NEG_INFINITY,
            forward_offset: AIM_FORWARD_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VaultData {
    pub ledge: Vec3,
    pub normal: Vec3,
    pub start: Vec3,
    pub started_at: f64,
    pub duration: f32,
    pub session: Option<SessionId>,
}

#[derive(Debug, Clone, Default)]
pub struct FallingData {
    pub original_drag: f32,
}

#[derive(Debug, Clone)]
pub struct ReloadData {
    pub session: Option<SessionId>,
    pub continuing: bool,
    pub slot: LoadoutSlot,
    pub reload_time: f32,
}

impl Default for ReloadData {
    fn default() -> Self {
        Self {
            session: None,
            continuing: false,
            slot: LoadoutSlot::Primary,
            reload_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CarData {
    pub vehicle: Option<VehicleId>,
    pub seat: usize,
    pub flip_began: Option<f64>,
}

/// One simulated participant
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    name: String,
    pub machine: ActionMachine,
    pub movement_modifier: f32,
    /// Movement input read on the last tick (owner only)
    pub move_input: Vec3,
    pub body: Body,
    pub aim: AimTarget,
    pub vitals: Vitals,
    pub loadout: Loadout,
    pub anim: AnimParams,
    pub camera: CameraRig,
    pub last_rb_pos: Vec3,
    pub last_grounded_at: f64,
    pub last_jump_at: f64,
    /// Occupied vehicle seat
    pub seat: Option<(VehicleId, usize)>,
    pub death_time: Option<f64>,
    /// Owner-side respawn countdown end
    pub respawn_available_at: f64,
    pub aiming: AimingData,
    pub vault: VaultData,
    pub falling: FallingData,
    pub reload: ReloadData,
    pub car: CarData,
}

impl Player {
    pub fn new(id: PlayerId, name: &str, position: Vec3, tuning: &GameplayTuning) -> Self {
        Self {
            id,
            name: sanitize_name(name),
            machine: ActionMachine::new(),
            movement_modifier: 1.0,
            move_input: Vec3::ZERO,
            body: Body::new(position, 0.0),
            aim: AimTarget::default(),
            vitals: Vitals::new(&tuning.vitals),
            loadout: Loadout::new(),
            anim: AnimParams::default(),
            camera: CameraRig::default(),
            last_rb_pos: position,
            last_grounded_at: 0.0,
            last_jump_at: f64::NEG_INFINITY,
            seat: None,
            death_time: None,
            respawn_available_at: f64::INFINITY,
            aiming: AimingData::default(),
            vault: VaultData::default(),
            falling: FallingData::default(),
            reload: ReloadData::default(),
            car: CarData::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> PlayerStateKind {
        self.machine.current()
    }

    pub fn is_dead(&self) -> bool {
        self.vitals.is_dead()
    }

    /// World-space aim point
    pub fn aim_position(&self) -> Vec3 {
        self.body.position + self.body.rotation * self.aim.local_position
    }

    pub fn aim_forward(&self) -> Vec3 {
        (self.body.rotation * self.aim.local_rotation) * Vec3::Z
    }

    pub fn is_grounded(&self, world: &dyn PhysicsWorld, tuning: &MovementTuning) -> bool {
        world.check_sphere(
            self.body.position,
            tuning.probe_radius,
            LayerMask::ALL.without(LayerMask::PLAYER),
        )
    }

    pub fn is_submerged(&self, world: &dyn PhysicsWorld, tuning: &MovementTuning) -> bool {
        world.check_sphere(self.body.position, tuning.probe_radius, LayerMask::WATER)
    }

    /// Place the body, e.g. on respawn or from a snapshot
    pub fn teleport(&mut self, position: Vec3, yaw: f32) {
        self.body.position = position;
        self.body.rotation = Quat::from_rotation_y(yaw);
        self.body.velocity = Vec3::ZERO;
        self.last_rb_pos = position;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::{Aabb, ArenaWorld};

    #[test]
    fn names_are_truncated_then_trimmed() {
        assert_eq!(sanitize_name("  ace  "), "ace");
        assert_eq!(sanitize_name("abcdefghijklmnopqrs  xyz"), "abcdefghijklmnopqrs");
        assert_eq!(sanitize_name("    "), "Player");
    }

    #[test]
    fn aim_transform_follows_body_rotation() {
        let tuning = GameplayTuning::default();
        let mut player = Player::new(uuid::Uuid::new_v4(), "p", Vec3::ZERO, &tuning);
        player.teleport(Vec3::new(1.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);

        let aim = player.aim_position();
        assert!((aim - Vec3::new(11.0, 1.5, 1.0)).length() < 1e-4);
        assert!((player.aim_forward() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn body_lands_on_ground_and_stops_at_walls() {
        let mut world = ArenaWorld::new();
        world.add_geometry(Aabb::new(Vec3::new(-50.0, -1.0, -50.0), Vec3::new(50.0, 0.0, 50.0)));
        world.add_geometry(Aabb::new(Vec3::new(-5.0, 0.0, 2.0), Vec3::new(5.0, 2.0, 3.0)));

        let mut body = Body::new(Vec3::new(0.0, 1.0, 0.0), 0.0);
        for _ in 0..60 {
            body.integrate(&world, 1.0 / 30.0);
        }
        assert!(body.position.y.abs() < 1e-4);

        for _ in 0..60 {
            body.velocity.z = 3.0;
            body.integrate(&world, 1.0 / 30.0);
        }
        assert!(body.position.z < 2.0);
    }

    #[test]
    fn camera_sensitivity_never_drifts() {
        let mut rig = CameraRig::default();
        rig.base_sensitivity = 0.8;
        for _ in 0..1000 {
            rig.set_sensitivity_multiplier(0.6);
            rig.set_sensitivity_multiplier(1.0);
        }
        assert_eq!(rig.sensitivity(), 0.8);
    }
}
