//! Behaviour shared by most states: base ticks, movement, state derivation
//! and the default input handlers

use glam::{Quat, Vec3};

use crate::ws::protocol::ClientMsg;

use super::super::animation::{smooth_locomotion, AnimParam, CameraFollow, CosmeticCue};
use super::super::input::{InputAction, InputEvent};
use super::super::loadout::LoadoutSlot;
use super::super::player::{yaw_of, Player};
use super::super::world::{LayerMask, PhysicsWorld, Ray};
use super::{update_state, PlayerStateKind, TickContext};
use crate::config::MovementTuning;

/// Input-driven handlers only run for the owner with input enabled
pub(super) fn accepts_input(ctx: &TickContext) -> bool {
    ctx.role.owner && !ctx.input.disabled
}

fn held(ctx: &TickContext, action: InputAction) -> bool {
    !ctx.input.disabled && ctx.input.is_held(action)
}

pub(super) fn set_anim(player: &mut Player, ctx: &mut TickContext, param: AnimParam, value: bool) {
    player.anim.set_bool(param, value);
    ctx.cue(player.id, CosmeticCue::SetBool { param, value });
}

/// Hide or show the weapon, cueing whatever ends up in hand
pub(super) fn show_weapon(player: &mut Player, ctx: &mut TickContext, shown: bool) {
    let in_hand = player.loadout.set_weapon_shown(shown);
    ctx.cue(player.id, CosmeticCue::EquipWeapon(in_hand));
}

pub(super) fn camera_follow(player: &mut Player, ctx: &mut TickContext, target: CameraFollow) {
    player.camera.follow = target;
    ctx.cue(player.id, CosmeticCue::CameraFollow(target));
}

pub(super) fn base_tick(player: &mut Player, ctx: &mut TickContext) {
    if ctx.role.owner {
        player.move_input = ctx.input.move_dir();
    }
}

/// Ground, fall and water checks on the owner, then the locomotion blend
pub(super) fn base_fixed_tick(player: &mut Player, ctx: &mut TickContext) {
    if ctx.role.owner {
        let tuning = ctx.tuning;
        let movement = &tuning.movement;

        if player.is_grounded(ctx.world, movement) {
            player.last_grounded_at = ctx.now;

            if player.anim.falling
                && player.body.velocity.y >= 0.0
                && ctx.now - player.last_jump_at > movement.landing_grace
            {
                set_anim(player, ctx, AnimParam::Falling, false);
            }
        } else if ctx.now - player.last_grounded_at > movement.fall_grace
            && player.body.velocity.y < 0.0
        {
            update_state(player, ctx, PlayerStateKind::Falling);
        }

        if player.is_submerged(ctx.world, movement)
            && player.state() != PlayerStateKind::Swimming
        {
            update_state(player, ctx, PlayerStateKind::Swimming);
        }
    }

    smooth_animation(player, ctx);
}

/// Ease the locomotion blend toward the body's measured velocity
pub(super) fn smooth_animation(player: &mut Player, ctx: &TickContext) {
    if ctx.role.authority {
        return;
    }

    let displacement = player.body.position - player.last_rb_pos;
    let blend = smooth_locomotion(
        player.anim.locomotion(),
        displacement,
        player.body.rotation,
        player.movement_modifier,
        player.state() == PlayerStateKind::Aiming,
        ctx.dt,
        &ctx.tuning.movement,
    );
    player.anim.set_locomotion(blend);
    player.last_rb_pos = player.body.position;
}

/// Camera-relative move direction on the horizontal plane
pub(super) fn camera_move_dir(player: &Player) -> Vec3 {
    let flat = Quat::from_rotation_y(player.camera.yaw) * player.move_input;
    Vec3::new(flat.x, 0.0, flat.z).normalize_or_zero()
}

/// Drive horizontal velocity from movement input, keeping vertical velocity
pub(super) fn process_movement(player: &mut Player, ctx: &TickContext) {
    if !ctx.role.owner || player.body.kinematic {
        return;
    }

    let speed = ctx.tuning.movement.base_speed * player.movement_modifier;
    let direction = camera_move_dir(player) * speed;
    player.body.velocity = Vec3::new(direction.x, player.body.velocity.y, direction.z);
}

/// Rotate the body toward `yaw` by interpolation factor `t`
pub(super) fn face_yaw(player: &mut Player, yaw: f32, t: f32) {
    let target = Quat::from_rotation_y(yaw);
    player.body.rotation = player.body.rotation.slerp(target, t.clamp(0.0, 1.0));
}

/// Fixed tick of walking, reused by sprinting, reloading and swimming
pub(super) fn walking_fixed_tick(player: &mut Player, ctx: &mut TickContext) {
    if ctx.role.owner {
        process_movement(player, ctx);

        if player.move_input != Vec3::ZERO {
            if let Some(yaw) = yaw_of(camera_move_dir(player)) {
                face_yaw(player, yaw, ctx.dt * 5.0);
            }
        }
    }

    base_fixed_tick(player, ctx);
}

/// Replicate the owner's hip-fire choice
pub(super) fn set_hip_firing(player: &mut Player, ctx: &mut TickContext, hip_firing: bool) {
    player.aiming.hip_firing = hip_firing;
    ctx.send(ClientMsg::SetHipFiring { hip_firing });
}

/// Re-derive the locomotion state from the current input
pub fn transfer_to_appropriate_state(player: &mut Player, ctx: &mut TickContext) {
    if !player.loadout.is_unarmed() && player.state() != PlayerStateKind::Aiming {
        if held(ctx, InputAction::Aim) {
            set_hip_firing(player, ctx, false);
            update_state(player, ctx, PlayerStateKind::Aiming);
            return;
        }

        if held(ctx, InputAction::Fire) {
            set_hip_firing(player, ctx, true);
            update_state(player, ctx, PlayerStateKind::Aiming);
            return;
        }
    }

    let next = if held(ctx, InputAction::Sprint) {
        PlayerStateKind::Sprinting
    } else if ctx.input.move_dir() != Vec3::ZERO {
        PlayerStateKind::Walking
    } else {
        PlayerStateKind::Idle
    };
    update_state(player, ctx, next);
}

/// Point the aim transform at what the camera centre looks at, 10 m out
pub(super) fn set_aim_target(player: &mut Player, ctx: &mut TickContext) {
    let point = player.camera.look_point(player.body.position, 10.0);
    let inverse = player.body.rotation.inverse();
    let local_position = inverse * (point - player.body.position);
    let local_rotation = inverse * player.camera.rotation();

    let changed = player.aim.local_position.distance_squared(local_position) > 1e-6
        || player.aim.local_rotation.dot(local_rotation).abs() < 1.0 - 1e-6;

    player.aim.local_position = local_position;
    player.aim.local_rotation = local_rotation;

    if changed {
        ctx.send(ClientMsg::SetAimTarget {
            local_position,
            local_rotation,
        });
    }
}

/// A vaultable ledge lip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ledge {
    pub point: Vec3,
    /// Sum of the surface normals of every ray that hit
    pub normal: Vec3,
}

/// March forward rays up the body until one misses after at least one hit.
///
/// Each hit moves the target to just above the hit point; the first miss
/// above a hit marks the lip.
pub fn find_ledge(
    position: Vec3,
    forward: Vec3,
    world: &dyn PhysicsWorld,
    tuning: &MovementTuning,
) -> Option<Ledge> {
    let mask = LayerMask::ALL
        .without(LayerMask::PLAYER)
        .without(LayerMask::VEHICLE);

    let mut target: Option<Vec3> = None;
    let mut normal = Vec3::ZERO;
    let mut iteration = 1;

    loop {
        let origin = position + Vec3::Y * (tuning.ledge_probe_step * iteration as f32);
        iteration += 1;
        if origin.y > position.y + tuning.max_ledge_height {
            return None;
        }

        let ray = Ray::new(origin, forward);
        match world.raycast(&ray, tuning.ledge_probe_length, mask) {
            Some(hit) => {
                target = Some(hit.point + Vec3::Y * 0.25);
                normal += hit.normal;
            }
            None => {
                if let Some(point) = target {
                    return Some(Ledge { point, normal });
                }
            }
        }
    }
}

pub(super) fn base_on_aim(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || player.loadout.is_unarmed() || !event.was_pressed() {
        return;
    }
    set_hip_firing(player, ctx, false);
    update_state(player, ctx, PlayerStateKind::Aiming);
}

pub(super) fn base_on_fire(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || player.loadout.is_unarmed() || !event.was_pressed() {
        return;
    }
    set_hip_firing(player, ctx, true);
    update_state(player, ctx, PlayerStateKind::Aiming);
}

/// Vault onto a ledge if one is ahead, otherwise try a jump
pub(super) fn base_on_vault(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || !event.was_pressed() {
        return;
    }

    let tuning = ctx.tuning;
    let movement = &tuning.movement;
    if let Some(ledge) = find_ledge(
        player.body.position,
        player.body.forward(),
        ctx.world,
        movement,
    ) {
        ctx.send(ClientMsg::Vault {
            ledge: ledge.point,
            normal: ledge.normal,
        });
        return;
    }

    if ctx.now - player.last_jump_at > movement.jump_cooldown
        && player.is_grounded(ctx.world, movement)
        && player.state() != PlayerStateKind::Swimming
    {
        let impulse = (Vec3::Y + player.body.forward() * 0.7) * movement.jump_force;
        player.body.add_impulse(impulse);
        player.last_jump_at = ctx.now;

        set_anim(player, ctx, AnimParam::Falling, true);
        update_state(player, ctx, PlayerStateKind::Falling);
    }
}

pub(super) fn base_on_reload(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || !event.is_tap() {
        return;
    }

    let needs_reload = player
        .loadout
        .current()
        .is_some_and(|w| w.ammo < w.max_ammo());
    if needs_reload {
        update_state(player, ctx, PlayerStateKind::Reloading);
    }
}

/// Request the closest seat within reach
pub(super) fn base_on_enter_vehicle(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || !event.was_performed() {
        return;
    }

    let radius = ctx.tuning.movement.vehicle_enter_radius;
    let position = player.body.position;

    let closest = ctx
        .vehicles
        .values()
        .flat_map(|v| {
            (0..v.seats().len())
                .filter_map(move |i| v.seat_transform(i).map(|(p, _)| (v.id, p.distance(position))))
        })
        .filter(|(_, distance)| *distance <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1));

    if let Some((vehicle_id, _)) = closest {
        ctx.send(ClientMsg::EnterVehicle { vehicle_id });
    }
}

/// Weapon-slot keys; a running reload is abandoned first
pub(super) fn handle_equip_input(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if !accepts_input(ctx) || !(event.was_pressed() || event.was_performed()) {
        return;
    }
    if player.state() == PlayerStateKind::Dead {
        return;
    }

    if player.state() == PlayerStateKind::Reloading {
        transfer_to_appropriate_state(player, ctx);
    }

    let slot = match event.action {
        InputAction::EquipPrimary => LoadoutSlot::Primary,
        InputAction::EquipSecondary => LoadoutSlot::Secondary,
        _ => player.loadout.active_slot().other(),
    };
    ctx.send(ClientMsg::SetActiveSlot { slot });
}
