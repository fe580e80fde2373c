//! Vehicles: seat occupancy and transforms
//!
//! Drivetrain physics stays with the driving client; the server only keeps
//! the streamed transform, the seat table and the bounds used for collision
//! damage.

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::world::Aabb;
use super::{PlayerId, VehicleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Nekomata,
    Truck,
    Apc,
}

impl VehicleType {
    /// Display name, also used as the damage label for collisions
    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Nekomata => "Nekomata",
            VehicleType::Truck => "Truck",
            VehicleType::Apc => "APC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatSide {
    Left,
    Right,
}

impl SeatSide {
    /// Lateral sign used when placing a leaving occupant
    pub fn sign(self) -> f32 {
        match self {
            SeatSide::Left => -1.0,
            SeatSide::Right => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SeatLayout {
    pub is_driver: bool,
    pub side: SeatSide,
    /// Seat position in vehicle space
    pub offset: Vec3,
}

/// Vehicle stats by type
#[derive(Debug, Clone, Copy)]
pub struct VehicleStats {
    pub half_extents: Vec3,
    pub seats: &'static [SeatLayout],
}

const fn seat(is_driver: bool, side: SeatSide, x: f32, y: f32, z: f32) -> SeatLayout {
    SeatLayout {
        is_driver,
        side,
        offset: Vec3::new(x, y, z),
    }
}

const NEKOMATA_SEATS: [SeatLayout; 2] = [
    seat(true, SeatSide::Left, -0.4, 0.3, 0.0),
    seat(false, SeatSide::Right, 0.4, 0.3, 0.0),
];

const TRUCK_SEATS: [SeatLayout; 4] = [
    seat(true, SeatSide::Left, -0.5, 0.9, 1.8),
    seat(false, SeatSide::Right, 0.5, 0.9, 1.8),
    seat(false, SeatSide::Left, -0.6, 0.9, -1.5),
    seat(false, SeatSide::Right, 0.6, 0.9, -1.5),
];

const APC_SEATS: [SeatLayout; 4] = [
    seat(true, SeatSide::Left, -0.6, 0.8, 2.0),
    seat(false, SeatSide::Right, 0.6, 0.8, 2.0),
    seat(false, SeatSide::Left, -0.7, 0.8, -1.0),
    seat(false, SeatSide::Right, 0.7, 0.8, -1.0),
];

impl VehicleStats {
    pub fn for_type(kind: VehicleType) -> Self {
        match kind {
            VehicleType::Nekomata => Self {
                half_extents: Vec3::new(1.0, 0.7, 2.0),
                seats: &NEKOMATA_SEATS,
            },
            VehicleType::Truck => Self {
                half_extents: Vec3::new(1.3, 1.5, 3.5),
                seats: &TRUCK_SEATS,
            },
            VehicleType::Apc => Self {
                half_extents: Vec3::new(1.5, 1.5, 3.5),
                seats: &APC_SEATS,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Seat {
    pub is_driver: bool,
    pub side: SeatSide,
    pub offset: Vec3,
    pub taken_by: Option<PlayerId>,
}

/// Rollover beyond this roll angle counts as flipped (degrees)
pub const FLIP_ANGLE: f32 = 90.0;

/// Lateral distance of the exit point from the seat
pub const EXIT_DISTANCE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct Vehicle {
    pub id: VehicleId,
    pub kind: VehicleType,
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    seats: Vec<Seat>,
}

impl Vehicle {
    pub fn new(id: VehicleId, kind: VehicleType, position: Vec3, yaw: f32) -> Self {
        let seats = VehicleStats::for_type(kind)
            .seats
            .iter()
            .map(|l| Seat {
                is_driver: l.is_driver,
                side: l.side,
                offset: l.offset,
                taken_by: None,
            })
            .collect();

        Self {
            id,
            kind,
            position,
            rotation: Quat::from_rotation_y(yaw),
            velocity: Vec3::ZERO,
            seats,
        }
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat(&self, index: usize) -> Option<&Seat> {
        self.seats.get(index)
    }

    /// World position and rotation of a seat
    pub fn seat_transform(&self, index: usize) -> Option<(Vec3, Quat)> {
        self.seats
            .get(index)
            .map(|s| (self.position + self.rotation * s.offset, self.rotation))
    }

    pub fn seat_of(&self, player: PlayerId) -> Option<usize> {
        self.seats.iter().position(|s| s.taken_by == Some(player))
    }

    /// Take the first free seat, vacating the player's current one first.
    /// Returns the seat index, or `None` when the vehicle is full.
    pub fn enter(&mut self, player: PlayerId) -> Option<usize> {
        self.leave(player);
        let index = self.seats.iter().position(|s| s.taken_by.is_none())?;
        self.seats[index].taken_by = Some(player);
        Some(index)
    }

    /// Put a player into a specific seat, as replicated from the server
    pub fn occupy(&mut self, index: usize, player: PlayerId) -> bool {
        if index >= self.seats.len() {
            return false;
        }
        self.leave(player);
        self.seats[index].taken_by = Some(player);
        true
    }

    /// Free the player's seat. A vehicle that loses its driver stops.
    pub fn leave(&mut self, player: PlayerId) -> Option<usize> {
        let index = self.seat_of(player)?;
        self.seats[index].taken_by = None;
        if self.seats[index].is_driver {
            self.velocity = Vec3::ZERO;
        }
        Some(index)
    }

    pub fn driver(&self) -> Option<PlayerId> {
        self.seats
            .iter()
            .find(|s| s.is_driver)
            .and_then(|s| s.taken_by)
    }

    pub fn occupants(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats.iter().filter_map(|s| s.taken_by)
    }

    /// Signed roll in degrees, `(-180, 180]`
    pub fn roll_degrees(&self) -> f32 {
        let (_, _, roll) = self.rotation.to_euler(EulerRot::YXZ);
        roll.to_degrees()
    }

    pub fn is_flipped(&self) -> bool {
        self.roll_degrees().abs() > FLIP_ANGLE
    }

    /// Keep heading, reset pitch and roll
    pub fn right_upright(&mut self) {
        let (yaw, _, _) = self.rotation.to_euler(EulerRot::YXZ);
        self.rotation = Quat::from_rotation_y(yaw);
    }

    /// Where an occupant of `index` is placed on leaving: beside the seat
    /// on its side, at seat height
    pub fn exit_position(&self, index: usize) -> Option<Vec3> {
        let (position, rotation) = self.seat_transform(index)?;
        let side = self.seats[index].side.sign();
        let mut exit = position + rotation * Vec3::X * side * EXIT_DISTANCE;
        exit.y = position.y;
        Some(exit)
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    pub fn bounds(&self) -> Aabb {
        let half = VehicleStats::for_type(self.kind).half_extents;
        // axis-aligned hull of the rotated box
        let m = glam::Mat3::from_quat(self.rotation);
        let extent = Vec3::new(
            m.x_axis.x.abs() * half.x + m.y_axis.x.abs() * half.y + m.z_axis.x.abs() * half.z,
            m.x_axis.y.abs() * half.x + m.y_axis.y.abs() * half.y + m.z_axis.y.abs() * half.z,
            m.x_axis.z.abs() * half.x + m.y_axis.z.abs() * half.y + m.z_axis.z.abs() * half.z,
        );
        let center = self.position + Vec3::Y * half.y;
        Aabb::from_center(center, extent)
    }
}

pub type Vehicles = HashMap<VehicleId, Vehicle>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn enter_takes_first_free_seat_and_reentry_vacates() {
        let mut truck = Vehicle::new(Uuid::new_v4(), VehicleType::Truck, Vec3::ZERO, 0.0);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(truck.enter(a), Some(0));
        assert_eq!(truck.driver(), Some(a));
        assert_eq!(truck.enter(b), Some(1));

        // a re-enters: seat 0 is vacated first, then taken again
        assert_eq!(truck.enter(a), Some(0));
        assert_eq!(truck.occupants().count(), 2);

        assert_eq!(truck.leave(a), Some(0));
        assert_eq!(truck.driver(), None);
        assert_eq!(truck.leave(a), None);
    }

    #[test]
    fn every_type_has_a_single_leading_driver_seat() {
        for kind in [VehicleType::Nekomata, VehicleType::Truck, VehicleType::Apc] {
            let seats = VehicleStats::for_type(kind).seats;
            assert!(seats[0].is_driver, "{kind:?}");
            assert_eq!(seats.iter().filter(|s| s.is_driver).count(), 1);
        }
    }

    #[test]
    fn losing_the_driver_stops_the_vehicle() {
        let mut truck = Vehicle::new(Uuid::new_v4(), VehicleType::Truck, Vec3::ZERO, 0.0);
        let driver = Uuid::new_v4();
        let passenger = Uuid::new_v4();
        truck.enter(driver);
        truck.enter(passenger);
        truck.velocity = Vec3::new(0.0, 0.0, 20.0);

        truck.leave(passenger);
        assert_eq!(truck.velocity, Vec3::new(0.0, 0.0, 20.0));

        truck.leave(driver);
        assert_eq!(truck.velocity, Vec3::ZERO);
    }

    #[test]
    fn full_vehicle_rejects_entry() {
        let mut car = Vehicle::new(Uuid::new_v4(), VehicleType::Nekomata, Vec3::ZERO, 0.0);
        car.enter(Uuid::new_v4());
        car.enter(Uuid::new_v4());
        assert_eq!(car.enter(Uuid::new_v4()), None);
    }

    #[test]
    fn roll_is_signed_and_righting_keeps_heading() {
        let mut car = Vehicle::new(Uuid::new_v4(), VehicleType::Nekomata, Vec3::ZERO, 0.0);
        let yaw = 0.7;
        car.rotation = Quat::from_euler(EulerRot::YXZ, yaw, 0.0, (-120.0_f32).to_radians());

        assert!((car.roll_degrees() + 120.0).abs() < 1e-3);
        assert!(car.is_flipped());

        car.right_upright();
        assert!(!car.is_flipped());
        let (new_yaw, _, _) = car.rotation.to_euler(EulerRot::YXZ);
        assert!((new_yaw - yaw).abs() < 1e-4);
    }

    #[test]
    fn exit_position_is_beside_the_seat() {
        let mut car = Vehicle::new(Uuid::new_v4(), VehicleType::Nekomata, Vec3::new(5.0, 0.0, 5.0), 0.0);
        let p = Uuid::new_v4();
        let index = car.enter(p).unwrap();

        let (seat_pos, _) = car.seat_transform(index).unwrap();
        let exit = car.exit_position(index).unwrap();
        assert!((exit.x - (seat_pos.x - EXIT_DISTANCE)).abs() < 1e-5);
        assert_eq!(exit.y, seat_pos.y);
    }
}
