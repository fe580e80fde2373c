//! Ledge vaulting

use glam::{Quat, Vec3};

use super::super::animation::{AnimParam, CosmeticCue, HandPose};
use super::super::input::InputEvent;
use super::super::player::{yaw_of, Player};
use super::super::scheduler::{SessionId, TimedStage};
use super::super::world::LayerMask;
use super::shared::{set_anim, show_weapon, smooth_animation, transfer_to_appropriate_state};
use super::{PlayerStateKind, StateBehavior, TickContext};

/// Layers the body passes through while climbing
const VAULT_PASSTHROUGH: LayerMask = LayerMask::VEHICLE.with(LayerMask::IGNORE_RAYCAST);

fn sine_out(t: f32) -> f32 {
    (t.clamp(0.0, 1.0) * std::f32::consts::FRAC_PI_2).sin()
}

fn release_body(player: &mut Player) {
    player.body.kinematic = false;
    player.body.excluded_layers = player.body.excluded_layers.without(VAULT_PASSTHROUGH);
}

fn restore_hands(player: &mut Player, ctx: &mut TickContext) {
    show_weapon(player, ctx, true);
    ctx.cue(player.id, CosmeticCue::HandTargets(HandPose::WeaponDown));
    ctx.cue(player.id, CosmeticCue::RebuildRig);
}

/// Tween onto the ledge set by the authority; uninterruptible until done
pub struct Vaulting;

impl StateBehavior for Vaulting {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Vaulting
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        let ledge = player.vault.ledge;

        if ctx.role.owner {
            if let Some(yaw) = yaw_of(-player.vault.normal) {
                player.body.rotation = Quat::from_rotation_y(yaw);
            }
            player.body.kinematic = true;
            player.body.velocity = Vec3::ZERO;
            set_anim(player, ctx, AnimParam::Falling, true);
            player.body.excluded_layers = player.body.excluded_layers.with(VAULT_PASSTHROUGH);
        }

        show_weapon(player, ctx, false);
        ctx.cue(player.id, CosmeticCue::HandTargets(HandPose::Ledge));
        ctx.cue(player.id, CosmeticCue::RebuildRig);

        let start = player.body.position;
        let duration = ((ledge.y - start.y) * ctx.tuning.movement.vault_secs_per_meter).max(0.0);
        ctx.cue(
            player.id,
            CosmeticCue::VaultTween {
                from: start,
                to: ledge,
                duration,
            },
        );

        let session = ctx.scheduler.begin_session(player.id);
        ctx.scheduler.schedule(
            player.id,
            session,
            ctx.now + duration as f64,
            TimedStage::VaultFinish,
        );

        player.vault.start = start;
        player.vault.started_at = ctx.now;
        player.vault.duration = duration;
        player.vault.session = Some(session);
    }

    /// Only reached when the tween was cut short, e.g. by death
    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        let Some(session) = player.vault.session.take() else {
            return;
        };
        ctx.scheduler.cancel(player.id, session);

        if ctx.role.owner {
            release_body(player);
            set_anim(player, ctx, AnimParam::Falling, false);
        }
        restore_hands(player, ctx);
    }

    fn on_tick(&self, _player: &mut Player, _ctx: &mut TickContext) {}

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        if ctx.role.owner {
            let vault = &player.vault;
            let progress = if vault.duration > 0.0 {
                ((ctx.now - vault.started_at) / vault.duration as f64) as f32
            } else {
                1.0
            };
            player.body.position = vault.start.lerp(vault.ledge, sine_out(progress));
        }

        smooth_animation(player, ctx);
    }

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_vault(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_enter_vehicle(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}

/// End of the tween: land on the ledge, push forward and re-derive the state
pub(super) fn finish(player: &mut Player, ctx: &mut TickContext, session: SessionId) {
    if player.vault.session != Some(session) {
        return;
    }
    player.vault.session = None;
    ctx.scheduler.cancel(player.id, session);

    if ctx.role.owner {
        player.body.position = player.vault.ledge;
        release_body(player);
        let push = player.body.forward() * ctx.tuning.movement.vault_exit_impulse;
        player.body.add_impulse(push);
    }

    restore_hands(player, ctx);

    if ctx.role.owner {
        set_anim(player, ctx, AnimParam::Falling, false);
        transfer_to_appropriate_state(player, ctx);
    }
}
