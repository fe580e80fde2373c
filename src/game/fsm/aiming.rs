//! Aiming down sights and hip-firing

use glam::{Vec2, Vec3};
use rand::Rng;

use crate::ws::protocol::ClientMsg;

use super::super::animation::{AnimParam, CosmeticCue, HandPose, RigLayer, WeaponPose};
use super::super::input::{InputAction, InputEvent};
use super::super::player::{
    Player, AIM_FORWARD_OFFSET, AIM_RIGHT_OFFSET, DEFAULT_CAMERA_DAMPING,
};
use super::shared::{
    base_fixed_tick, base_tick, face_yaw, process_movement, set_aim_target, set_anim,
    set_hip_firing, transfer_to_appropriate_state,
};
use super::{update_state, PlayerStateKind, StateBehavior, TickContext};

/// Duration of the camera move into and out of the shoulder view
const CAMERA_MOVE_SECS: f32 = 0.25;
const WEAPON_MOVE_SECS: f32 = 0.5;

fn shoulder_offset(forward: f32) -> Vec3 {
    Vec3::X * AIM_RIGHT_OFFSET + Vec3::Z * forward
}

/// Pull the camera in when looking up, between level and 45 degrees up
fn update_forward_offset(player: &mut Player, ctx: &TickContext) {
    if player.aiming.hip_firing || ctx.now - player.aiming.entered_at < CAMERA_MOVE_SECS as f64 {
        return;
    }

    let pitch = player.camera.pitch;
    let limit = -std::f32::consts::FRAC_PI_4;
    if pitch > 0.0 || pitch < limit {
        return;
    }

    let t = pitch / limit;
    player.aiming.forward_offset = AIM_FORWARD_OFFSET * (1.0 - t);
    let target = shoulder_offset(player.aiming.forward_offset);
    player.camera.offset = player
        .camera
        .offset
        .lerp(target, (ctx.dt * 10.0).min(1.0));
}

pub struct Aiming;

impl StateBehavior for Aiming {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Aiming
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        let id = player.id;

        if ctx.role.owner {
            update_forward_offset(player, ctx);
            set_aim_target(player, ctx);
            player.aiming.entered_at = ctx.now;

            if !player.aiming.hip_firing {
                let target = shoulder_offset(player.aiming.forward_offset);
                player.camera.offset = target;
                ctx.cue(
                    id,
                    CosmeticCue::CameraOffset {
                        target,
                        duration: CAMERA_MOVE_SECS,
                    },
                );

                player.movement_modifier = ctx.tuning.movement.aiming_modifier;

                player.camera.crosshair = true;
                ctx.cue(id, CosmeticCue::Crosshair { visible: true });

                player
                    .camera
                    .set_sensitivity_multiplier(ctx.tuning.movement.camera_aim_sensitivity);
                player.camera.damping = 0.0;
            } else {
                player.movement_modifier = 1.0;
            }
        }

        ctx.cue(
            id,
            CosmeticCue::RigLayer {
                layer: RigLayer::BodyTracking,
                active: true,
            },
        );
        ctx.cue(
            id,
            CosmeticCue::RigLayer {
                layer: RigLayer::GunPointing,
                active: true,
            },
        );
        ctx.cue(
            id,
            CosmeticCue::WeaponPose {
                pose: WeaponPose::Aim,
                duration: WEAPON_MOVE_SECS,
            },
        );
        ctx.cue(id, CosmeticCue::HandTargets(HandPose::WeaponAim));
        ctx.cue(id, CosmeticCue::RebuildRig);

        set_anim(player, ctx, AnimParam::Aiming, true);
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        let id = player.id;

        if ctx.role.owner {
            if !player.aiming.hip_firing {
                player.camera.offset = Vec3::ZERO;
                ctx.cue(
                    id,
                    CosmeticCue::CameraOffset {
                        target: Vec3::ZERO,
                        duration: CAMERA_MOVE_SECS,
                    },
                );

                player.camera.crosshair = false;
                ctx.cue(id, CosmeticCue::Crosshair { visible: false });

                player.camera.set_sensitivity_multiplier(1.0);
                player.camera.damping = DEFAULT_CAMERA_DAMPING;
            } else {
                set_hip_firing(player, ctx, false);
            }
        }

        ctx.cue(
            id,
            CosmeticCue::RigLayer {
                layer: RigLayer::BodyTracking,
                active: false,
            },
        );
        ctx.cue(
            id,
            CosmeticCue::RigLayer {
                layer: RigLayer::GunPointing,
                active: false,
            },
        );
        ctx.cue(
            id,
            CosmeticCue::WeaponPose {
                pose: WeaponPose::Down,
                duration: WEAPON_MOVE_SECS,
            },
        );
        ctx.cue(id, CosmeticCue::HandTargets(HandPose::WeaponDown));
        ctx.cue(id, CosmeticCue::RebuildRig);

        set_anim(player, ctx, AnimParam::Aiming, false);
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        base_tick(player, ctx);

        if !ctx.role.owner {
            return;
        }
        if ctx.input.disabled {
            transfer_to_appropriate_state(player, ctx);
            return;
        }

        set_aim_target(player, ctx);
        update_forward_offset(player, ctx);

        let movement = &ctx.tuning.movement;
        let grace = if player.aiming.hip_firing {
            movement.hip_fire_grace
        } else {
            movement.aim_grace
        };
        let raised = ctx.now - player.aiming.entered_at > grace;

        let Some(weapon) = player.loadout.current() else {
            return;
        };
        let ready = ctx.now - weapon.last_fired_at > weapon.time_between_shots();

        if !(ctx.input.is_held(InputAction::Fire) && ready && raised) {
            return;
        }

        if weapon.ammo > 0 && !weapon.reload.mid_reload {
            let recoil = weapon.modified_recoil();
            fire(player, ctx, recoil);
        } else {
            update_state(player, ctx, PlayerStateKind::Reloading);
        }
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        if ctx.role.owner {
            process_movement(player, ctx);
            // face where the camera looks
            let yaw = player.camera.yaw;
            face_yaw(player, yaw, 1.0);
        }

        base_fixed_tick(player, ctx);
    }

    fn on_aim(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        if !ctx.role.owner || player.aiming.hip_firing {
            return;
        }
        if event.was_released() {
            transfer_to_appropriate_state(player, ctx);
        }
    }

    fn on_fire(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        if !ctx.role.owner || !player.aiming.hip_firing {
            return;
        }
        if event.was_released() {
            transfer_to_appropriate_state(player, ctx);
        }
    }
}

/// Request a shot and predict the local fire timestamp and camera kick
fn fire(player: &mut Player, ctx: &mut TickContext, recoil: Vec2) {
    ctx.send(ClientMsg::Fire);

    if let Some(weapon) = player.loadout.current_mut() {
        weapon.last_fired_at = ctx.now;
    }

    let mut rng = rand::thread_rng();
    let kick = -recoil * Vec2::new(rng.gen_range(-1.0..=1.0), rng.gen_range(0.5..=1.0));
    ctx.cue(player.id, CosmeticCue::Recoil { kick });
}

