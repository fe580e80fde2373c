//! Player action state machine
//!
//! Every player holds exactly one active [`PlayerStateKind`]. Behaviour per
//! state lives in a static table of [`StateBehavior`] implementations; the
//! trait's default methods carry the shared base behaviour, so a state only
//! overrides what it changes.
//!
//! Transitions requested while another transition is running are queued and
//! executed after it completes, never nested.

mod aiming;
mod dead;
mod locomotion;
mod reloading;
mod shared;
mod vaulting;
mod vehicle;


use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::GameplayTuning;
use crate::ws::protocol::ClientMsg;

use super::animation::CosmeticCue;
use super::input::{InputAction, InputEvent, InputState};
use super::player::Player;
use super::scheduler::{CosmeticScheduler, ScheduledStage, TimedStage};
use super::vehicle::Vehicles;
use super::world::PhysicsWorld;
use super::PlayerId;

pub use shared::{find_ledge, transfer_to_appropriate_state, Ledge};

/// Closed set of behaviour states; the discriminant is the wire index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PlayerStateKind {
    #[default]
    Idle = 0,
    Walking = 1,
    Sprinting = 2,
    Aiming = 3,
    Vaulting = 4,
    Falling = 5,
    Reloading = 6,
    Swimming = 7,
    Driver = 8,
    Passenger = 9,
    Dead = 10,
}

impl PlayerStateKind {
    pub const ALL: [PlayerStateKind; 11] = [
        PlayerStateKind::Idle,
        PlayerStateKind::Walking,
        PlayerStateKind::Sprinting,
        PlayerStateKind::Aiming,
        PlayerStateKind::Vaulting,
        PlayerStateKind::Falling,
        PlayerStateKind::Reloading,
        PlayerStateKind::Swimming,
        PlayerStateKind::Driver,
        PlayerStateKind::Passenger,
        PlayerStateKind::Dead,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn is_seated(self) -> bool {
        matches!(self, PlayerStateKind::Driver | PlayerStateKind::Passenger)
    }
}

/// A state index outside the known set; indicates a protocol version mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown state index {0}")]
pub struct UnknownStateIndex(pub u8);

impl TryFrom<u8> for PlayerStateKind {
    type Error = UnknownStateIndex;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        PlayerStateKind::ALL
            .get(value as usize)
            .copied()
            .ok_or(UnknownStateIndex(value))
    }
}

/// Which side is running the callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimRole {
    /// Ground truth for health, ammo and hits
    pub authority: bool,
    /// Holds the input of this player
    pub owner: bool,
}

impl SimRole {
    pub const SERVER: SimRole = SimRole {
        authority: true,
        owner: false,
    };
    pub const OWNER: SimRole = SimRole {
        authority: false,
        owner: true,
    };
    pub const OBSERVER: SimRole = SimRole {
        authority: false,
        owner: false,
    };
}

/// Output of state callbacks, drained by the host after each call
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StateExited {
        player: PlayerId,
        state: PlayerStateKind,
    },
    StateEntered {
        player: PlayerId,
        state: PlayerStateKind,
        previous: PlayerStateKind,
    },
    /// Intent for the authoritative side
    Send(ClientMsg),
    Cue {
        player: PlayerId,
        cue: CosmeticCue,
    },
    /// Authoritative reload completion; the owner must re-derive its state
    RequestTransfer { player: PlayerId },
}

/// Everything a state callback may read or touch besides the player itself
pub struct TickContext<'a> {
    pub now: f64,
    pub dt: f32,
    pub role: SimRole,
    pub tuning: &'a GameplayTuning,
    pub world: &'a dyn PhysicsWorld,
    pub input: &'a InputState,
    pub vehicles: &'a mut Vehicles,
    pub scheduler: &'a mut CosmeticScheduler,
    pub effects: Vec<Effect>,
}

impl TickContext<'_> {
    pub fn cue(&mut self, player: PlayerId, cue: CosmeticCue) {
        self.effects.push(Effect::Cue { player, cue });
    }

    pub fn send(&mut self, msg: ClientMsg) {
        if self.role.owner {
            self.effects.push(Effect::Send(msg));
        }
    }
}

/// Per-player state machine bookkeeping
#[derive(Debug, Clone, Default)]
pub struct ActionMachine {
    current: PlayerStateKind,
    in_transition: bool,
    pending: VecDeque<PlayerStateKind>,
}

impl ActionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PlayerStateKind {
        self.current
    }

    pub fn in_transition(&self) -> bool {
        self.in_transition
    }
}

/// Switch the active state: exit the old one, swap, enter the new one.
///
/// No-op when `next` is already active. Requests made from inside an
/// `on_exit`/`on_enter` are run after the current swap completes.
pub fn set_state(player: &mut Player, ctx: &mut TickContext, next: PlayerStateKind) {
    player.machine.pending.push_back(next);
    if player.machine.in_transition {
        return;
    }

    player.machine.in_transition = true;
    while let Some(next) = player.machine.pending.pop_front() {
        let previous = player.machine.current;
        if next == previous {
            continue;
        }

        debug!(player_id = %player.id, from = ?previous, to = ?next, "state transition");

        ctx.effects.push(Effect::StateExited {
            player: player.id,
            state: previous,
        });
        behavior(previous).on_exit(player, ctx);

        player.machine.current = next;

        ctx.effects.push(Effect::StateEntered {
            player: player.id,
            state: next,
            previous,
        });
        behavior(next).on_enter(player, ctx, previous);
    }
    player.machine.in_transition = false;
}

/// Owner-side transition: report the new state to the authority, then switch
/// locally
pub fn update_state(player: &mut Player, ctx: &mut TickContext, next: PlayerStateKind) {
    if next != player.machine.current || player.machine.in_transition {
        ctx.send(ClientMsg::SetState {
            state_index: next.index(),
        });
    }
    set_state(player, ctx, next);
}

/// Callbacks of one behaviour state.
///
/// Unimplemented callbacks are no-ops, except the tick callbacks and the
/// aim/fire/vault/reload/enter-vehicle handlers, which default to the shared
/// base behaviour.
pub trait StateBehavior: Sync {
    fn kind(&self) -> PlayerStateKind;

    fn on_enter(&self, _player: &mut Player, _ctx: &mut TickContext, _previous: PlayerStateKind) {}

    fn on_exit(&self, _player: &mut Player, _ctx: &mut TickContext) {}

    fn on_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        shared::base_tick(player, ctx);
    }

    fn on_fixed_tick(&self, player: &mut Player, ctx: &mut TickContext) {
        shared::base_fixed_tick(player, ctx);
    }

    fn on_late_tick(&self, _player: &mut Player, _ctx: &mut TickContext) {}

    fn on_move(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_look(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_aim(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        shared::base_on_aim(player, ctx, event);
    }

    fn on_fire(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        shared::base_on_fire(player, ctx, event);
    }

    fn on_sprint(&self, _player: &mut Player, _ctx: &mut TickContext, _event: &InputEvent) {}

    fn on_vault(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        shared::base_on_vault(player, ctx, event);
    }

    fn on_reload(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        shared::base_on_reload(player, ctx, event);
    }

    fn on_enter_vehicle(&self, player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
        shared::base_on_enter_vehicle(player, ctx, event);
    }
}

static STATE_TABLE: [&dyn StateBehavior; 11] = [
    &locomotion::Idle,
    &locomotion::Walking,
    &locomotion::Sprinting,
    &aiming::Aiming,
    &vaulting::Vaulting,
    &locomotion::Falling,
    &reloading::Reloading,
    &locomotion::Swimming,
    &vehicle::Driver,
    &vehicle::Passenger,
    &dead::Dead,
];

pub fn behavior(kind: PlayerStateKind) -> &'static dyn StateBehavior {
    STATE_TABLE[kind as usize]
}

/// Route one input event to the active state's handler
pub fn dispatch_input(player: &mut Player, ctx: &mut TickContext, event: &InputEvent) {
    let state = behavior(player.state());
    match event.action {
        InputAction::Movement => state.on_move(player, ctx, event),
        InputAction::Look => state.on_look(player, ctx, event),
        InputAction::Aim => state.on_aim(player, ctx, event),
        InputAction::Fire => state.on_fire(player, ctx, event),
        InputAction::Sprint => state.on_sprint(player, ctx, event),
        InputAction::Vault => state.on_vault(player, ctx, event),
        InputAction::Reload => state.on_reload(player, ctx, event),
        InputAction::EnterVehicle => state.on_enter_vehicle(player, ctx, event),
        InputAction::EquipPrimary | InputAction::EquipSecondary | InputAction::ToggleEquip => {
            shared::handle_equip_input(player, ctx, event)
        }
        // polled by the dead state
        InputAction::Respawn => {}
    }
}

pub fn tick(player: &mut Player, ctx: &mut TickContext) {
    behavior(player.state()).on_tick(player, ctx);
}

pub fn fixed_tick(player: &mut Player, ctx: &mut TickContext) {
    behavior(player.state()).on_fixed_tick(player, ctx);
}

pub fn late_tick(player: &mut Player, ctx: &mut TickContext) {
    behavior(player.state()).on_late_tick(player, ctx);
}

/// Run one due stage of a timed chain, unless its session was cancelled
pub fn run_stage(player: &mut Player, ctx: &mut TickContext, stage: &ScheduledStage) {
    if !ctx.scheduler.is_live(stage.owner, stage.session) {
        return;
    }
    match stage.stage {
        TimedStage::Reload { slot, stage: step } => {
            reloading::run_stage(player, ctx, slot, step, stage.session, stage.due)
        }
        TimedStage::VaultFinish => vaulting::finish(player, ctx, stage.session),
    }
}
