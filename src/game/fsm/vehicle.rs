//! Seated states: driver and passenger

use glam::{Quat, Vec3};

use crate::ws::protocol::ClientMsg;

use super::super::animation::{AnimParam, CameraFollow, CosmeticCue, HandPose, RigLayer};
use super::super::input::InputEvent;
use super::super::player::{AimTarget, Player, DEFAULT_CAMERA_DAMPING};
use super::super::world::LayerMask;
use super::shared::{
    accepts_input, camera_follow, set_anim, show_weapon, transfer_to_appropriate_state,
};
use super::{update_state, PlayerStateKind, StateBehavior, TickContext};

/// Layers a seated body ignores so it cannot push its own vehicle
const SEATED_PASSTHROUGH: LayerMask = LayerMask::VEHICLE.with(LayerMask::IGNORE_RAYCAST);

fn rig_layer(layer: RigLayer, active: bool) -> CosmeticCue {
    CosmeticCue::RigLayer { layer, active }
}

/// Snap the body onto the seat transform
fn move_to_seat(player: &mut Player, ctx: &TickContext) {
    let Some(vehicle_id) = player.car.vehicle else {
        return;
    };
    if let Some((position, rotation)) = ctx
        .vehicles
        .get(&vehicle_id)
        .and_then(|v| v.seat_transform(player.car.seat))
    {
        player.body.position = position;
        player.body.rotation = rotation;
    }
}

fn enter_seat(player: &mut Player, ctx: &mut TickContext) {
    let Some((vehicle_id, seat)) = player.seat else {
        return;
    };
    player.car.vehicle = Some(vehicle_id);
    player.car.seat = seat;
    player.car.flip_began = None;

    let id = player.id;
    set_anim(player, ctx, AnimParam::Sitting, true);
    ctx.cue(id, rig_layer(RigLayer::BodyTracking, true));
    ctx.cue(id, CosmeticCue::FootIk { enabled: false });

    player.body.excluded_layers = player.body.excluded_layers.with(SEATED_PASSTHROUGH);
    if ctx.role.owner {
        player.body.kinematic = true;
        player.body.velocity = Vec3::ZERO;
    }

    show_weapon(player, ctx, false);
    move_to_seat(player, ctx);

    if ctx.role.owner {
        camera_follow(player, ctx, CameraFollow::Vehicle(vehicle_id));
        player.camera.damping = 0.0;

        // face forward
        player.aim = AimTarget {
            local_position: Vec3::new(0.0, 0.0, 3.0),
            local_rotation: Quat::IDENTITY,
        };
        ctx.send(ClientMsg::SetAimTarget {
            local_position: player.aim.local_position,
            local_rotation: player.aim.local_rotation,
        });
    }
}

fn leave_seat(player: &mut Player, ctx: &mut TickContext) {
    let id = player.id;
    set_anim(player, ctx, AnimParam::Sitting, false);
    ctx.cue(id, rig_layer(RigLayer::BodyTracking, false));
    ctx.cue(id, CosmeticCue::FootIk { enabled: true });

    let exit = player
        .car
        .vehicle
        .and_then(|v| ctx.vehicles.get(&v))
        .and_then(|v| v.exit_position(player.car.seat));
    if let Some(exit) = exit {
        player.body.position = Vec3::new(exit.x, player.body.position.y, exit.z);
    }

    if ctx.role.owner {
        player.body.rotation = Quat::from_rotation_y(player.body.yaw());
        player.body.kinematic = false;
        camera_follow(player, ctx, CameraFollow::Player);
        player.camera.damping = DEFAULT_CAMERA_DAMPING;
    }

    player.body.excluded_layers = player.body.excluded_layers.without(SEATED_PASSTHROUGH);
    show_weapon(player, ctx, true);
    player.car = Default::default();
}

fn seated_tick(player: &mut Player, ctx: &mut TickContext) {
    move_to_seat(player, ctx);
}

/// Water bails the player out; a driver rights a vehicle left on its roof
fn seated_fixed_tick(player: &mut Player, ctx: &mut TickContext) {
    if !ctx.role.owner {
        return;
    }

    if player.is_submerged(ctx.world, &ctx.tuning.movement) {
        update_state(player, ctx, PlayerStateKind::Swimming);
        ctx.send(ClientMsg::LeaveVehicle);
        return;
    }

    let Some(vehicle_id) = player.car.vehicle else {
        return;
    };
    let delay = ctx.tuning.movement.flip_recovery_delay;
    let Some(vehicle) = ctx.vehicles.get_mut(&vehicle_id) else {
        return;
    };
    if vehicle.driver() != Some(player.id) {
        return;
    }

    if !vehicle.is_flipped() {
        player.car.flip_began = None;
        return;
    }

    match player.car.flip_began {
        None => player.car.flip_began = Some(ctx.now),
        Some(began) if ctx.now - began >= delay => {
            vehicle.right_upright();
            let (yaw, _, roll) = vehicle.rotation.to_euler(glam::EulerRot::YXZ);
            let msg = ClientMsg::VehicleMovement {
                vehicle_id,
                position: vehicle.position,
                velocity: vehicle.velocity,
                yaw,
                roll,
            };
            player.car.flip_began = None;
            ctx.send(msg);
        }
        Some(_) => {}
    }
}

fn seated_enter_vehicle(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    if accepts_input(ctx) && event.was_performed() {
        transfer_to_appropriate_state(player, ctx);
        ctx.send(ClientMsg::LeaveVehicle);
    }
}

pub struct Driver;

impl StateBehavior for Driver {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Driver
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        enter_seat(player, ctx);

        let id = player.id;
        ctx.cue(id, CosmeticCue::HandTargets(HandPose::SteeringWheel));
        ctx.cue(id, rig_layer(RigLayer::VehiclePedals, true));
        ctx.cue(id, CosmeticCue::RebuildRig);
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        leave_seat(player, ctx);

        let id = player.id;
        ctx.cue(id, rig_layer(RigLayer::VehiclePedals, false));
        ctx.cue(id, CosmeticCue::HandTargets(HandPose::WeaponDown));
        ctx.cue(id, CosmeticCue::RebuildRig);
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        seated_tick(player, ctx);
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        seated_fixed_tick(player, ctx);
    }

    fn on_enter_vehicle(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        seated_enter_vehicle(player, ctx, event);
    }

    fn on_vault(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}

pub struct Passenger;

impl StateBehavior for Passenger {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Passenger
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        enter_seat(player, ctx);
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        leave_seat(player, ctx);
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        seated_tick(player, ctx);
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        seated_fixed_tick(player, ctx);
    }

    fn on_enter_vehicle(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        seated_enter_vehicle(player, ctx, event);
    }

    fn on_vault(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}
