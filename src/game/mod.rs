//! Game simulation modules

pub mod animation;
pub mod client;
pub mod combat;
pub mod fsm;
pub mod health;
pub mod input;
pub mod loadout;
pub mod r#match;
pub mod player;
pub mod scheduler;
pub mod snapshot;
pub mod vehicle;
pub mod world;

pub use client::ClientSimulation;
pub use r#match::{Audience, GameMatch, MatchHandle, MatchRegistry, MatchState, Outbound};

use crate::ws::protocol::ClientMsg;
use uuid::Uuid;

pub type PlayerId = Uuid;
pub type VehicleId = Uuid;

/// Player intent received from WebSocket
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: PlayerId,
    pub msg: ClientMsg,
    pub received_at: u64,
}
