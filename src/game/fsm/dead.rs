//! Dead: everything is blocked until the authority accepts a respawn

use crate::ws::protocol::ClientMsg;

use super::super::animation::{AnimParam, CosmeticCue};
use super::super::input::{InputAction, InputEvent};
use super::super::player::Player;
use super::shared::{accepts_input, show_weapon};
use super::{PlayerStateKind, StateBehavior, TickContext};

pub struct Dead;

impl StateBehavior for Dead {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Dead
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        if ctx.role.owner {
            player.anim.death = true;
            ctx.cue(player.id, CosmeticCue::Trigger(AnimParam::Death));
        }
        show_weapon(player, ctx, false);
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        if ctx.role.owner {
            player.anim.death = false;
            ctx.cue(player.id, CosmeticCue::ResetTrigger(AnimParam::Death));
        }
        show_weapon(player, ctx, true);
    }

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        if !accepts_input(ctx) {
            return;
        }

        if ctx.input.was_pressed_this_tick(InputAction::Respawn)
            && ctx.now >= player.respawn_available_at
        {
            ctx.send(ClientMsg::Respawn);
        }
    }

    fn on_fixed_tick(&self, _player: &mut Player, _ctx: &mut TickContext) {}

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_vault(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_enter_vehicle(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}
