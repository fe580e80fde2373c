//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::HitmarkerKind;
use crate::game::health::DamageEvent;
use crate::game::loadout::{LoadoutSlot, WeaponType};
use crate::game::vehicle::VehicleType;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the default match; the name is fixed from here on
    Join { name: String },

    /// Predicted state change of the sender's own player
    SetState {
        /// Index into the closed state set
        state_index: u8,
    },

    /// Owner-integrated body transform
    Movement {
        position: Vec3,
        velocity: Vec3,
        yaw: f32,
    },

    /// Aim transform, local to the player body
    SetAimTarget {
        local_position: Vec3,
        local_rotation: Quat,
    },

    SetHipFiring { hip_firing: bool },

    /// Fire the active weapon once
    Fire,

    /// Vault onto a detected ledge
    Vault { ledge: Vec3, normal: Vec3 },

    Respawn,

    SetLoadoutSlot {
        slot: LoadoutSlot,
        weapon: Option<WeaponType>,
    },

    SetActiveSlot { slot: LoadoutSlot },

    SetAttachment {
        slot: LoadoutSlot,
        category: usize,
        /// -1 for none
        attachment: i32,
    },

    SetSkin { slot: LoadoutSlot, skin: i32 },

    EnterVehicle { vehicle_id: Uuid },

    LeaveVehicle,

    /// Transform streamed by the driver
    VehicleMovement {
        vehicle_id: Uuid,
        position: Vec3,
        velocity: Vec3,
        yaw: f32,
        /// Roll in radians
        roll: f32,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave current match
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: Uuid,
        server_time: u64,
    },

    /// Confirmation of match join
    MatchJoined {
        match_id: Uuid,
        /// Seed for deterministic random generation
        seed: u64,
        /// All players in the match at join time, including the joiner
        players: Vec<PlayerInfo>,
        vehicles: Vec<VehicleInfo>,
    },

    /// Player joined the match
    PlayerJoined { player: PlayerInfo },

    /// Player left the match
    PlayerLeft { player_id: Uuid, reason: String },

    /// Authoritative state index of a player
    StateChanged { player_id: Uuid, state_index: u8 },

    HipFiringChanged { player_id: Uuid, hip_firing: bool },

    VaultStarted {
        player_id: Uuid,
        ledge: Vec3,
        normal: Vec3,
    },

    /// Where a shot landed; cosmetic only
    FireOutcome { shooter_id: Uuid, point: Vec3 },

    /// Sent to the attacker only
    Hitmarker { kind: HitmarkerKind },

    /// Sent to the victim only
    Died {
        damage: DamageEvent,
        /// Seconds until a respawn request is accepted
        respawn_delay: f64,
    },

    /// Sent to the respawned player only
    Respawned { position: Vec3, yaw: f32 },

    /// Re-derive the locomotion state (owner only)
    TransferToAppropriateState,

    /// Abandon staged magazines of a respawned player
    InstantReload { player_id: Uuid },

    /// Replicated-field deltas
    FieldDelta {
        player_id: Uuid,
        fields: Vec<FieldUpdate>,
    },

    /// Transform snapshot (sent at regular intervals)
    Snapshot {
        /// Server tick number
        tick: u64,
        players: Vec<PlayerSnapshot>,
        vehicles: Vec<VehicleSnapshot>,
    },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player info for join announcements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub player_id: Uuid,
    pub name: String,
    pub state_index: u8,
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInfo {
    pub vehicle_id: Uuid,
    pub kind: VehicleType,
    pub position: Vec3,
    pub yaw: f32,
}

/// Player transform in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub player_id: Uuid,
    pub position: Vec3,
    pub velocity: Vec3,
    pub yaw: f32,
    pub state_index: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: Uuid,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
}

/// Seat reference carried by seat replication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatRef {
    pub vehicle_id: Uuid,
    pub index: usize,
}

/// One replicated field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldUpdate {
    Health { value: f32 },
    Armor { value: f32 },
    Ammo { slot: LoadoutSlot, ammo: u32 },
    ActiveSlot { slot: LoadoutSlot },
    Weapon {
        slot: LoadoutSlot,
        weapon: Option<WeaponType>,
    },
    Skin { slot: LoadoutSlot, skin: usize },
    Attachments { slot: LoadoutSlot, attachments: Vec<i32> },
    AimTarget {
        local_position: Vec3,
        local_rotation: Quat,
    },
    Seat { seat: Option<SeatRef> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_type_tagged() {
        let json = serde_json::to_value(ClientMsg::SetState { state_index: 3 }).unwrap();
        assert_eq!(json["type"], "set_state");
        assert_eq!(json["state_index"], 3);

        let parsed: ClientMsg = serde_json::from_str(r#"{"type":"fire"}"#).unwrap();
        assert_eq!(parsed, ClientMsg::Fire);
    }

    #[test]
    fn field_deltas_carry_a_field_tag() {
        let msg = ServerMsg::FieldDelta {
            player_id: Uuid::nil(),
            fields: vec![FieldUpdate::Ammo {
                slot: LoadoutSlot::Secondary,
                ammo: 12,
            }],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "field_delta");
        assert_eq!(json["fields"][0]["field"], "ammo");
        assert_eq!(json["fields"][0]["slot"], "secondary");
    }

    #[test]
    fn unknown_message_types_fail_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
    }
}
