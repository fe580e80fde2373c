//! Reloading and its magazine chain

use crate::ws::protocol::ClientMsg;

use super::super::animation::{CosmeticCue, HandPose, RigLayer, WeaponPose};
use super::super::input::InputEvent;
use super::super::loadout::LoadoutSlot;
use super::super::player::Player;
use super::super::scheduler::{ReloadStage, SessionId, TimedStage};
use super::shared::walking_fixed_tick;
use super::{Effect, PlayerStateKind, StateBehavior, TickContext};

/// Weapon lowered again after the reload or its interruption
const WEAPON_DOWN_SECS: f32 = 0.5;

fn gun_pointing(active: bool) -> CosmeticCue {
    CosmeticCue::RigLayer {
        layer: RigLayer::GunPointing,
        active,
    }
}

/// Runs the magazine chain; entered again mid-reload it picks up the staged
/// magazine instead of dropping another one
pub struct Reloading;

impl StateBehavior for Reloading {
    fn kind(&self) -> PlayerStateKind {
        PlayerStateKind::Reloading
    }

    fn on_enter(&self, player: &mut Player, ctx: &mut TickContext, _previous: PlayerStateKind) {
        let id = player.id;
        ctx.cue(id, gun_pointing(true));

        let slot = player.loadout.active_slot();
        let Some(weapon) = player.loadout.current_mut() else {
            return;
        };

        let continuing = weapon.reload.mid_reload;
        weapon.reload.mid_reload = true;
        if weapon.reload.begun_at.is_none() {
            weapon.reload.begun_at = Some(ctx.now);
        }
        let reload_time = weapon.modified_reload_time();

        if ctx.role.owner {
            // point the weapon flat while the hands are busy
            player.aim.local_position.y = 2.0;
            ctx.send(ClientMsg::SetAimTarget {
                local_position: player.aim.local_position,
                local_rotation: player.aim.local_rotation,
            });
            player.movement_modifier = 1.0;
        }

        let first = ReloadStage::FetchMagazine;
        ctx.cue(
            id,
            CosmeticCue::WeaponPose {
                pose: WeaponPose::Aim,
                duration: reload_time * first.lead_fraction(),
            },
        );

        let session = ctx.scheduler.begin_session(id);
        ctx.scheduler.schedule(
            id,
            session,
            ctx.now + (reload_time * first.lead_fraction()) as f64,
            TimedStage::Reload { slot, stage: first },
        );

        player.reload.session = Some(session);
        player.reload.continuing = continuing;
        player.reload.slot = slot;
        player.reload.reload_time = reload_time;
    }

    fn on_exit(&self, player: &mut Player, ctx: &mut TickContext) {
        let id = player.id;
        ctx.cue(id, gun_pointing(false));

        if let Some(session) = player.reload.session.take() {
            ctx.scheduler.cancel(id, session);
        }

        ctx.cue(id, CosmeticCue::HandTargets(HandPose::WeaponDown));
        ctx.cue(id, CosmeticCue::RebuildRig);

        let staged = player
            .loadout
            .weapon(player.reload.slot)
            .is_some_and(|w| w.reload.staged_magazine);
        if staged {
            ctx.cue(id, CosmeticCue::MagazineHidden);
        }

        ctx.cue(
            id,
            CosmeticCue::WeaponPose {
                pose: WeaponPose::Down,
                duration: WEAPON_DOWN_SECS,
            },
        );
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        walking_fixed_tick(player, ctx);
    }

    fn on_aim(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_fire(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_reload(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}
}

/// One link of the magazine chain. The next link is scheduled relative to
/// this one's due time.
pub(super) fn run_stage(
    player: &mut Player,
    ctx: &mut TickContext,
    slot: LoadoutSlot,
    stage: ReloadStage,
    session: SessionId,
    due: f64,
) {
    let id = player.id;
    let continuing = player.reload.continuing;
    let reload_time = player.reload.reload_time;

    let Some(weapon) = player.loadout.weapon_mut(slot) else {
        ctx.scheduler.cancel(id, session);
        return;
    };

    match stage {
        ReloadStage::FetchMagazine => {
            if !weapon.reload.staged_magazine {
                weapon.reload.staged_magazine = true;
                weapon.reload.magazines_spawned += 1;
                ctx.cue(id, CosmeticCue::MagazineSpawned);
            }
            if !continuing {
                weapon.reload.magazines_dropped += 1;
                ctx.cue(id, CosmeticCue::MagazineDropped);
            }
            ctx.cue(id, CosmeticCue::HandTargets(HandPose::MagazineFollow));
            ctx.cue(id, CosmeticCue::RebuildRig);
        }
        ReloadStage::InsertMagazine => ctx.cue(id, CosmeticCue::MagazineShown),
        ReloadStage::SeatMagazine => ctx.cue(id, CosmeticCue::MagazineSeated),
        ReloadStage::Complete => {
            weapon.reload.staged_magazine = false;
            weapon.reload.mid_reload = false;
            weapon.reload.begun_at = None;

            if ctx.role.authority {
                weapon.ammo = weapon.max_ammo();
            }

            ctx.cue(id, CosmeticCue::HandTargets(HandPose::WeaponDown));
            ctx.cue(id, CosmeticCue::RebuildRig);

            player.reload.session = None;
            ctx.scheduler.cancel(id, session);

            if ctx.role.authority {
                ctx.effects.push(Effect::RequestTransfer { player: id });
            }
            return;
        }
    }

    if let Some(next) = stage.next() {
        ctx.scheduler.schedule(
            id,
            session,
            due + (reload_time * next.lead_fraction()) as f64,
            TimedStage::Reload { slot, stage: next },
        );
    }
}
