//! Ground and water movement states

use glam::{Quat, Vec3};

use super::super::animation::{AnimParam, CosmeticCue};
use super::super::input::{InputAction, InputDevice, InputEvent};
use super::super::player::Player;
use super::shared::{
    accepts_input, base_fixed_tick, base_tick, process_movement, set_anim, show_weapon,
    transfer_to_appropriate_state, walking_fixed_tick,
};
use super::{update_state, PlayerStateKind, StateBehavior, TickContext};

pub struct Idle;

impl StateBehavior for Idle {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Idle
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        base_tick(player, ctx);

        if ctx.role.owner && player.move_input != Vec3::ZERO {
            update_state(player, ctx, PlayerStateKind::Walking);
        }
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        process_movement(player, ctx);
        base_fixed_tick(player, ctx);
    }
}

pub struct Walking;

impl StateBehavior for Walking {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Walking
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        if !ctx.role.owner {
            return;
        }

        player.movement_modifier = 1.0;

        // a held gamepad button is the toggle that just ended sprinting
        if ctx.input.device == InputDevice::KeyboardMouse
            && !ctx.input.disabled
            && ctx.input.is_held(InputAction::Sprint)
        {
            update_state(player, ctx, PlayerStateKind::Sprinting);
        }
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        base_tick(player, ctx);

        if ctx.role.owner && player.move_input == Vec3::ZERO {
            update_state(player, ctx, PlayerStateKind::Idle);
        }
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        walking_fixed_tick(player, ctx);
    }

    fn on_sprint(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        if accepts_input(ctx) && event.was_pressed() {
            update_state(player, ctx, PlayerStateKind::Sprinting);
        }
    }
}

pub struct Sprinting;

impl StateBehavior for Sprinting {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Sprinting
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        if !ctx.role.owner {
            return;
        }

        player.movement_modifier = ctx.tuning.movement.sprint_modifier;
        set_anim(player, ctx, AnimParam::Sprinting, true);
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        if ctx.role.owner {
            set_anim(player, ctx, AnimParam::Sprinting, false);
        }
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        base_tick(player, ctx);

        if ctx.role.owner && player.move_input == Vec3::ZERO {
            update_state(player, ctx, PlayerStateKind::Idle);
        }
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        walking_fixed_tick(player, ctx);
    }

    // held on keyboard+mouse, toggled on gamepad
    fn on_sprint(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        if !ctx.role.owner {
            return;
        }

        let stop = match ctx.input.device {
            InputDevice::KeyboardMouse => event.was_released(),
            InputDevice::Gamepad => event.was_pressed(),
        };
        if stop {
            update_state(player, ctx, PlayerStateKind::Walking);
        }
    }
}

pub struct Falling;

impl StateBehavior for Falling {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Falling
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        if !ctx.role.owner {
            return;
        }

        player.falling.original_drag = player.body.drag;
        set_anim(player, ctx, AnimParam::Falling, true);
        player.body.drag = player.falling.original_drag / 10.0;
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        if !ctx.role.owner {
            return;
        }

        set_anim(player, ctx, AnimParam::Falling, false);
        player.body.drag = player.falling.original_drag;
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        if !ctx.role.owner {
            return;
        }

        let movement = &ctx.tuning.movement;
        if player.is_grounded(ctx.world, movement)
            && ctx.now - player.last_jump_at > movement.landing_grace
        {
            transfer_to_appropriate_state(player, ctx);
        }
    }

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}

pub struct Swimming;

impl StateBehavior for Swimming {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Swimming
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        set_anim(player, ctx, AnimParam::Swimming, true);
        show_weapon(player, ctx, false);
        ctx.cue(player.id, CosmeticCue::FootIk { enabled: false });

        if ctx.role.owner {
            player.body.use_gravity = false;
            player.movement_modifier = 1.0;
            player.body.rotation = Quat::from_rotation_y(player.body.yaw());
        }
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        set_anim(player, ctx, AnimParam::Swimming, false);
        show_weapon(player, ctx, true);
        ctx.cue(player.id, CosmeticCue::FootIk { enabled: true });

        if ctx.role.owner {
            player.body.use_gravity = true;
        }
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        if ctx.role.owner && !player.is_submerged(ctx.world, &ctx.tuning.movement) {
            transfer_to_appropriate_state(player, ctx);
            return;
        }

        walking_fixed_tick(player, ctx);
    }

    fn on_vault(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}
