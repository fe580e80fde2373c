//! Gameplay tuning constants

use serde::{Deserialize, Serialize};

/// How damage falloff behaves outside the `[falloff_begin, falloff_end]` band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FalloffMode {
    /// Plain linear interpolation: closer than the band deals more than base
    /// damage, farther than the band deals less than the falloff floor
    Extrapolate,
    /// Interpolation factor clamped to `[0, 1]`
    Clamp,
}

/// Combat resolver tuning
#[derive(Debug, Clone)]
pub struct CombatTuning {
    /// Tolerated early arrival of a fire request (seconds)
    pub fire_rate_leeway: f64,
    /// Maximum hit-ray length (meters)
    pub max_range: f32,
    /// The hit ray starts this far behind the aim transform
    pub ray_back_offset: f32,
    pub falloff_mode: FalloffMode,
    /// Vehicles slower than this never deal collision damage (m/s)
    pub collision_min_speed: f32,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            fire_rate_leeway: 0.025,
            max_range: 1000.0,
            ray_back_offset: 10.0,
            falloff_mode: FalloffMode::Extrapolate,
            collision_min_speed: 5.0,
        }
    }
}

/// Health/armor regeneration and respawn tuning
#[derive(Debug, Clone)]
pub struct VitalsTuning {
    pub max_health: f32,
    pub max_armor: f32,
    /// Seconds without damage before armor regenerates
    pub armor_regen_delay: f64,
    /// Armor per second
    pub armor_regen_rate: f32,
    /// Seconds without damage before health regenerates
    pub health_regen_delay: f64,
    /// Health per second
    pub health_regen_rate: f32,
    /// Health only regenerates up to this fraction of max
    pub health_regen_cap: f32,
    pub respawn_delay: f64,
}

impl Default for VitalsTuning {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            max_armor: 20.0,
            armor_regen_delay: 8.0,
            armor_regen_rate: 3.0,
            health_regen_delay: 10.0,
            health_regen_rate: 2.0,
            health_regen_cap: 0.2,
            respawn_delay: 7.0,
        }
    }
}

/// Locomotion, aiming and traversal tuning
#[derive(Debug, Clone)]
pub struct MovementTuning {
    pub base_speed: f32,
    pub sprint_modifier: f32,
    pub aiming_modifier: f32,
    pub camera_aim_sensitivity: f32,
    /// Aim-state entry delay before firing is allowed
    pub aim_grace: f64,
    /// Same delay when hip-firing
    pub hip_fire_grace: f64,
    /// Airborne time before the falling state kicks in
    pub fall_grace: f64,
    /// Time after a jump before landing is detected
    pub landing_grace: f64,
    pub jump_cooldown: f64,
    pub jump_force: f32,
    /// Radius of the grounded / submerged proximity probes
    pub probe_radius: f32,
    pub max_ledge_height: f32,
    pub ledge_probe_step: f32,
    pub ledge_probe_length: f32,
    /// Vault duration per meter of climb
    pub vault_secs_per_meter: f32,
    pub vault_exit_impulse: f32,
    /// Exponential smoothing rate of the locomotion blend axes
    pub anim_smoothing: f32,
    /// Aiming locomotion blend values are scaled by this factor
    pub aim_anim_scale: f32,
    pub vehicle_enter_radius: f32,
    /// Seconds a vehicle may stay upside down before it is righted
    pub flip_recovery_delay: f64,
}

impl Default for MovementTuning {
    fn default() -> Self {
        Self {
            base_speed: 3.6,
            sprint_modifier: 2.2,
            aiming_modifier: 0.7,
            camera_aim_sensitivity: 0.6,
            aim_grace: 0.25,
            hip_fire_grace: 0.1,
            fall_grace: 0.1,
            landing_grace: 0.2,
            jump_cooldown: 1.0,
            jump_force: 2.0,
            probe_radius: 0.25,
            max_ledge_height: 4.0,
            ledge_probe_step: 0.5,
            ledge_probe_length: 1.0,
            vault_secs_per_meter: 0.2,
            vault_exit_impulse: 3.0,
            anim_smoothing: 6.0,
            aim_anim_scale: 1.8,
            vehicle_enter_radius: 5.0,
            flip_recovery_delay: 5.0,
        }
    }
}

/// All gameplay tuning, shared by the authoritative match and client hosts
#[derive(Debug, Clone, Default)]
pub struct GameplayTuning {
    pub combat: CombatTuning,
    pub vitals: VitalsTuning,
    pub movement: MovementTuning,
}
