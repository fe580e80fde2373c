//! Animation parameters and cosmetic cues handed to the presentation layer
//!
//! The core never drives a skeleton. It publishes a small, statically
//! declared parameter set every tick and emits fire-and-forget cues for rig
//! rebuilds, weapon poses, camera moves and magazine visuals.

use glam::{Quat, Vec2, Vec3};
use serde::Serialize;

use crate::config::MovementTuning;

use super::combat::HitmarkerKind;
use super::loadout::WeaponType;
use super::VehicleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnimParamKind {
    Float,
    Bool,
    Trigger,
}

/// Animator parameters exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnimParam {
    MoveForwards,
    MoveSideways,
    Sprinting,
    Falling,
    Aiming,
    Death,
    Swimming,
    Sitting,
}

/// Every parameter with its animator name and type
pub const ANIM_PARAMS: [(AnimParam, &str, AnimParamKind); 8] = [
    (AnimParam::MoveForwards, "MoveForwards", AnimParamKind::Float),
    (AnimParam::MoveSideways, "MoveSideways", AnimParamKind::Float),
    (AnimParam::Sprinting, "Sprinting", AnimParamKind::Bool),
    (AnimParam::Falling, "Falling", AnimParamKind::Bool),
    (AnimParam::Aiming, "Aiming", AnimParamKind::Bool),
    (AnimParam::Death, "Death", AnimParamKind::Trigger),
    (AnimParam::Swimming, "Swimming", AnimParamKind::Bool),
    (AnimParam::Sitting, "Sitting", AnimParamKind::Bool),
];

impl AnimParam {
    pub fn name(self) -> &'static str {
        ANIM_PARAMS
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("")
    }

    pub fn kind(self) -> AnimParamKind {
        ANIM_PARAMS
            .iter()
            .find(|(p, _, _)| *p == self)
            .map(|(_, _, kind)| *kind)
            .unwrap_or(AnimParamKind::Bool)
    }
}

/// Per-player animator parameter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnimParams {
    pub move_forwards: f32,
    pub move_sideways: f32,
    pub sprinting: bool,
    pub falling: bool,
    pub aiming: bool,
    pub swimming: bool,
    pub sitting: bool,
    /// Death trigger, consumed by the animator
    pub death: bool,
}

impl AnimParams {
    pub fn set_bool(&mut self, param: AnimParam, value: bool) {
        match param {
            AnimParam::Sprinting => self.sprinting = value,
            AnimParam::Falling => self.falling = value,
            AnimParam::Aiming => self.aiming = value,
            AnimParam::Swimming => self.swimming = value,
            AnimParam::Sitting => self.sitting = value,
            AnimParam::Death => self.death = value,
            AnimParam::MoveForwards | AnimParam::MoveSideways => {}
        }
    }

    pub fn get_bool(&self, param: AnimParam) -> bool {
        match param {
            AnimParam::Sprinting => self.sprinting,
            AnimParam::Falling => self.falling,
            AnimParam::Aiming => self.aiming,
            AnimParam::Swimming => self.swimming,
            AnimParam::Sitting => self.sitting,
            AnimParam::Death => self.death,
            AnimParam::MoveForwards | AnimParam::MoveSideways => false,
        }
    }

    /// Current locomotion blend as (sideways, forwards)
    pub fn locomotion(&self) -> Vec2 {
        Vec2::new(self.move_sideways, self.move_forwards)
    }

    pub fn set_locomotion(&mut self, value: Vec2) {
        self.move_sideways = value.x;
        self.move_forwards = value.y;
    }
}

/// One step of the locomotion blend smoothing.
///
/// `displacement` is how far the body moved since the previous fixed tick.
/// The target is that velocity in body space as a ratio of the current max
/// speed; both axes are eased toward it and the result clamped to unit length.
/// Aiming blend trees run on a wider range, so the value is unscaled before
/// easing and rescaled after.
pub fn smooth_locomotion(
    current: Vec2,
    displacement: Vec3,
    body_rotation: Quat,
    movement_modifier: f32,
    aiming: bool,
    dt: f32,
    tuning: &MovementTuning,
) -> Vec2 {
    let mut current = Vec3::new(current.x, 0.0, current.y);
    if aiming {
        current /= tuning.aim_anim_scale;
    }

    let max_speed = (tuning.base_speed * movement_modifier).max(f32::EPSILON);
    let velocity = if dt > 0.0 { displacement / dt } else { Vec3::ZERO };
    let local = body_rotation.inverse() * (velocity / max_speed);

    let mut lerped = current.lerp(local, (dt * tuning.anim_smoothing).min(1.0));
    if aiming {
        lerped *= tuning.aim_anim_scale;
    }
    let lerped = lerped.clamp_length_max(1.0);

    Vec2::new(lerped.x, lerped.z)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RigLayer {
    BodyTracking,
    GunPointing,
    VehiclePedals,
}

/// Where the hand IK targets point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HandPose {
    WeaponDown,
    WeaponAim,
    Ledge,
    MagazineFollow,
    SteeringWheel,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WeaponPose {
    Down,
    Aim,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CameraFollow {
    Player,
    Vehicle(VehicleId),
}

/// Fire-and-forget presentation requests
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CosmeticCue {
    SetBool { param: AnimParam, value: bool },
    Trigger(AnimParam),
    ResetTrigger(AnimParam),
    RebuildRig,
    RigLayer { layer: RigLayer, active: bool },
    FootIk { enabled: bool },
    HandTargets(HandPose),
    WeaponPose { pose: WeaponPose, duration: f32 },
    /// Show a weapon in hand, or empty hands
    EquipWeapon(Option<WeaponType>),
    Crosshair { visible: bool },
    CameraOffset { target: Vec3, duration: f32 },
    CameraFollow(CameraFollow),
    Recoil { kick: Vec2 },
    MagazineSpawned,
    MagazineDropped,
    MagazineShown,
    MagazineSeated,
    MagazineHidden,
    VaultTween { from: Vec3, to: Vec3, duration: f32 },
    WeaponFired { hit_point: Vec3 },
    Hitmarker(HitmarkerKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_table_is_complete_and_named() {
        assert_eq!(AnimParam::MoveForwards.name(), "MoveForwards");
        assert_eq!(AnimParam::Death.kind(), AnimParamKind::Trigger);
        assert_eq!(AnimParam::Sitting.kind(), AnimParamKind::Bool);

        let mut names: Vec<_> = ANIM_PARAMS.iter().map(|(_, n, _)| *n).collect();
        names.dedup();
        assert_eq!(names.len(), 8);
    }

    #[test]
    fn smoothing_eases_toward_forward_run_and_clamps() {
        let tuning = MovementTuning::default();
        let dt = 1.0 / 30.0;
        // running forward at full walking speed
        let displacement = Vec3::Z * tuning.base_speed * dt;

        let mut blend = Vec2::ZERO;
        for _ in 0..200 {
            blend = smooth_locomotion(blend, displacement, Quat::IDENTITY, 1.0, false, dt, &tuning);
        }
        assert!((blend.y - 1.0).abs() < 1e-3);
        assert!(blend.x.abs() < 1e-5);

        let one_step =
            smooth_locomotion(Vec2::ZERO, displacement, Quat::IDENTITY, 1.0, false, dt, &tuning);
        assert!((one_step.y - dt * tuning.anim_smoothing).abs() < 1e-5);
    }

    #[test]
    fn bool_params_round_through_their_fields() {
        let mut params = AnimParams::default();
        params.set_bool(AnimParam::Sitting, true);
        params.set_bool(AnimParam::MoveForwards, true);

        assert!(params.sitting);
        assert!(params.get_bool(AnimParam::Sitting));
        assert!(!params.get_bool(AnimParam::MoveForwards));
    }

    #[test]
    fn aiming_blend_is_rescaled_but_still_clamped() {
        let tuning = MovementTuning::default();
        let dt = 1.0 / 30.0;
        let displacement = Vec3::Z * tuning.base_speed * tuning.aiming_modifier * dt;

        let blend = smooth_locomotion(
            Vec2::new(0.0, 0.9),
            displacement,
            Quat::IDENTITY,
            tuning.aiming_modifier,
            true,
            dt,
            &tuning,
        );
        assert!(blend.length() <= 1.0 + 1e-6);
    }
}
