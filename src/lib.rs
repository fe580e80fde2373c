//! Fireline gameplay server
//!
//! Authoritative match loop and client prediction host for a multiplayer
//! third-person shooter: player action state machine, combat resolution,
//! health/armor, loadouts and seat-based vehicles.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
