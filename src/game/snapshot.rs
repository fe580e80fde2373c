//! Snapshot building and replicated-field deltas

use glam::{Quat, Vec3};
use std::collections::HashMap;

use crate::ws::protocol::{FieldUpdate, PlayerSnapshot, SeatRef, ServerMsg, VehicleSnapshot};

use super::loadout::{LoadoutSlot, WeaponType};
use super::player::Player;
use super::vehicle::Vehicles;
use super::PlayerId;

/// Builds transform snapshots for network transmission
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used after joins)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message
    pub fn build(
        &self,
        tick: u64,
        players: &HashMap<PlayerId, Player>,
        vehicles: &Vehicles,
    ) -> ServerMsg {
        let players = players
            .values()
            .map(|p| PlayerSnapshot {
                player_id: p.id,
                position: p.body.position,
                velocity: p.body.velocity,
                yaw: p.body.yaw(),
                state_index: p.state().index(),
            })
            .collect();

        let vehicles = vehicles
            .values()
            .map(|v| VehicleSnapshot {
                vehicle_id: v.id,
                position: v.position,
                rotation: v.rotation,
                velocity: v.velocity,
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            players,
            vehicles,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct WeaponFields {
    kind: WeaponType,
    ammo: u32,
    skin: usize,
    attachments: Vec<i32>,
}

/// Last values sent for one player
#[derive(Debug, Clone, PartialEq)]
struct ReplicatedFields {
    health: f32,
    armor: f32,
    active_slot: LoadoutSlot,
    weapons: [Option<WeaponFields>; 2],
    aim: (Vec3, Quat),
    seat: Option<SeatRef>,
}

impl ReplicatedFields {
    fn capture(player: &Player) -> Self {
        let weapon = |slot: LoadoutSlot| {
            player.loadout.weapon(slot).map(|w| WeaponFields {
                kind: w.kind,
                ammo: w.ammo,
                skin: w.skin,
                attachments: w.attachments.clone(),
            })
        };

        Self {
            health: player.vitals.health(),
            armor: player.vitals.armor(),
            active_slot: player.loadout.active_slot(),
            weapons: [weapon(LoadoutSlot::Primary), weapon(LoadoutSlot::Secondary)],
            aim: (player.aim.local_position, player.aim.local_rotation),
            seat: player.seat.map(|(vehicle_id, index)| SeatRef { vehicle_id, index }),
        }
    }
}

fn weapon_details(slot: LoadoutSlot, weapon: &WeaponFields, out: &mut Vec<FieldUpdate>) {
    out.push(FieldUpdate::Ammo {
        slot,
        ammo: weapon.ammo,
    });
    out.push(FieldUpdate::Skin {
        slot,
        skin: weapon.skin,
    });
    out.push(FieldUpdate::Attachments {
        slot,
        attachments: weapon.attachments.clone(),
    });
}

/// Diff the current values against the last sent ones; `None` sends all
fn diff_fields(previous: Option<&ReplicatedFields>, current: &ReplicatedFields) -> Vec<FieldUpdate> {
    let mut out = Vec::new();

    if previous.map_or(true, |p| p.health != current.health) {
        out.push(FieldUpdate::Health {
            value: current.health,
        });
    }
    if previous.map_or(true, |p| p.armor != current.armor) {
        out.push(FieldUpdate::Armor {
            value: current.armor,
        });
    }

    for slot in LoadoutSlot::ALL {
        let now = current.weapons[slot.index()].as_ref();
        let before = previous.and_then(|p| p.weapons[slot.index()].as_ref());

        let replaced = previous.is_none() || before.map(|w| w.kind) != now.map(|w| w.kind);
        if replaced {
            out.push(FieldUpdate::Weapon {
                slot,
                weapon: now.map(|w| w.kind),
            });
            if let Some(weapon) = now {
                weapon_details(slot, weapon, &mut out);
            }
            continue;
        }

        if let (Some(before), Some(now)) = (before, now) {
            if before.ammo != now.ammo {
                out.push(FieldUpdate::Ammo {
                    slot,
                    ammo: now.ammo,
                });
            }
            if before.skin != now.skin {
                out.push(FieldUpdate::Skin {
                    slot,
                    skin: now.skin,
                });
            }
            if before.attachments != now.attachments {
                out.push(FieldUpdate::Attachments {
                    slot,
                    attachments: now.attachments.clone(),
                });
            }
        }
    }

    // after the weapons so the slot change lands on the new occupant
    if previous.map_or(true, |p| p.active_slot != current.active_slot) {
        out.push(FieldUpdate::ActiveSlot {
            slot: current.active_slot,
        });
    }
    if previous.map_or(true, |p| p.aim != current.aim) {
        out.push(FieldUpdate::AimTarget {
            local_position: current.aim.0,
            local_rotation: current.aim.1,
        });
    }
    if previous.map_or(true, |p| p.seat != current.seat) {
        out.push(FieldUpdate::Seat { seat: current.seat });
    }

    out
}

/// Tracks what each observer last heard about every player so only changed
/// fields go on the wire. Diffs are taken after the tick's authoritative
/// mutations have all completed.
#[derive(Debug, Default)]
pub struct ReplicationTracker {
    last: HashMap<PlayerId, ReplicatedFields>,
}

impl ReplicationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every replicated field of a player, for late joiners
    pub fn full_fields(player: &Player) -> Vec<FieldUpdate> {
        diff_fields(None, &ReplicatedFields::capture(player))
    }

    /// Fields changed since the last call; everything on first sight
    pub fn diff(&mut self, player: &Player) -> Vec<FieldUpdate> {
        let current = ReplicatedFields::capture(player);
        let fields = diff_fields(self.last.get(&player.id), &current);
        self.last.insert(player.id, current);
        fields
    }

    pub fn forget(&mut self, id: &PlayerId) {
        self.last.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameplayTuning;
    use uuid::Uuid;

    fn player() -> Player {
        Player::new(Uuid::new_v4(), "replica", Vec3::ZERO, &GameplayTuning::default())
    }

    #[test]
    fn first_diff_is_complete_then_quiet() {
        let mut tracker = ReplicationTracker::new();
        let p = player();

        let first = tracker.diff(&p);
        assert!(first.contains(&FieldUpdate::Health { value: 100.0 }));
        assert!(first.contains(&FieldUpdate::Seat { seat: None }));
        assert!(first.contains(&FieldUpdate::Weapon {
            slot: LoadoutSlot::Secondary,
            weapon: None,
        }));

        assert!(tracker.diff(&p).is_empty());
    }

    #[test]
    fn only_changed_fields_are_sent() {
        let mut tracker = ReplicationTracker::new();
        let mut p = player();
        p.loadout
            .set_slot(LoadoutSlot::Primary, Some(WeaponType::AssaultRifle), true, 0.0);
        tracker.diff(&p);

        if let Some(w) = p.loadout.current_mut() {
            w.ammo -= 1;
        }
        p.vitals.set_armor(5.0);

        let fields = tracker.diff(&p);
        assert_eq!(
            fields,
            vec![
                FieldUpdate::Armor { value: 5.0 },
                FieldUpdate::Ammo {
                    slot: LoadoutSlot::Primary,
                    ammo: 29,
                },
            ]
        );
    }

    #[test]
    fn replaced_weapon_carries_its_details() {
        let mut tracker = ReplicationTracker::new();
        let mut p = player();
        tracker.diff(&p);

        p.loadout
            .set_slot(LoadoutSlot::Secondary, Some(WeaponType::CombatPistol), true, 0.0);
        let fields = tracker.diff(&p);
        assert_eq!(
            fields[0],
            FieldUpdate::Weapon {
                slot: LoadoutSlot::Secondary,
                weapon: Some(WeaponType::CombatPistol),
            }
        );
        assert!(fields.contains(&FieldUpdate::Ammo {
            slot: LoadoutSlot::Secondary,
            ammo: 12,
        }));
    }

    #[test]
    fn snapshot_interval_counts_ticks() {
        let mut builder = SnapshotBuilder::new(2);
        assert!(!builder.should_send());
        assert!(builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }
}
