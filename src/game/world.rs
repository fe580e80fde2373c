//! Physics/world service: proximity probes and layer-filtered ray casts
//!
//! Gameplay code only talks to [`PhysicsWorld`]. The arena implementation is a
//! handful of axis-aligned boxes (ground, obstacles, water volumes) plus one
//! box per player and vehicle, which is all the server needs to resolve hits.

use glam::Vec3;
use std::collections::HashMap;

use super::{PlayerId, VehicleId};

/// Collision layer bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const DEFAULT: Self = Self(1 << 0);
    pub const IGNORE_RAYCAST: Self = Self(1 << 2);
    pub const WATER: Self = Self(1 << 4);
    pub const PLAYER: Self = Self(1 << 6);
    pub const VEHICLE: Self = Self(1 << 7);
    pub const ALL: Self = Self(u32::MAX);

    /// Layers hit by an unfiltered ray cast
    pub const DEFAULT_RAYCAST: Self = Self(u32::MAX & !(1 << 2));

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

/// What a ray or probe touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColliderKind {
    Geometry,
    Water,
    Player(PlayerId),
    Vehicle(VehicleId),
}

/// Half-line with a normalized direction
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub collider: ColliderKind,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Slab test. Returns entry distance and surface normal; rays starting
    /// inside the box do not hit it.
    pub fn ray_intersect(&self, ray: &Ray, max_distance: f32) -> Option<(f32, Vec3)> {
        let mut t_min = 0.0_f32;
        let mut t_max = max_distance;
        let mut normal = Vec3::ZERO;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            let mut face = -1.0;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
                face = 1.0;
            }

            if t0 > t_min {
                t_min = t0;
                normal = Vec3::ZERO;
                normal[axis] = face;
            }
            t_max = t_max.min(t1);

            if t_min > t_max {
                return None;
            }
        }

        if normal == Vec3::ZERO {
            // origin inside the box
            return None;
        }

        Some((t_min, normal))
    }
}

/// Physics queries consumed by the state machine and the combat resolver
pub trait PhysicsWorld: Send + Sync {
    /// True if any collider on `mask` overlaps the sphere
    fn check_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool;

    /// Closest hit along the ray within `max_distance`, water volumes excluded
    fn raycast(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RayHit>;

    /// Move a player's collider to another layer, returning the previous one
    fn set_player_layer(&mut self, player: PlayerId, layer: LayerMask) -> Option<LayerMask>;
}

/// Player collider dimensions (feet-anchored)
pub const PLAYER_HALF_WIDTH: f32 = 0.35;
pub const PLAYER_HEIGHT: f32 = 1.8;

/// Player hitbox for a feet position
pub fn player_bounds(position: Vec3) -> Aabb {
    Aabb::new(
        position - Vec3::new(PLAYER_HALF_WIDTH, 0.0, PLAYER_HALF_WIDTH),
        position + Vec3::new(PLAYER_HALF_WIDTH, PLAYER_HEIGHT, PLAYER_HALF_WIDTH),
    )
}

#[derive(Debug, Clone)]
struct StaticCollider {
    bounds: Aabb,
    kind: ColliderKind,
    layer: LayerMask,
}

#[derive(Debug, Clone)]
struct BodyCollider {
    bounds: Aabb,
    layer: LayerMask,
}

/// Box-based arena world shared by the server and client simulations
#[derive(Debug, Clone, Default)]
pub struct ArenaWorld {
    statics: Vec<StaticCollider>,
    players: HashMap<PlayerId, BodyCollider>,
    vehicles: HashMap<VehicleId, Aabb>,
}

impl ArenaWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard arena: a flat ground plane, cover boxes of various
    /// heights and a shallow pond
    pub fn standard() -> Self {
        let mut world = Self::new();
        world.add_geometry(Aabb::new(
            Vec3::new(-200.0, -1.0, -200.0),
            Vec3::new(200.0, 0.0, 200.0),
        ));

        // low wall, crate stack and a tall container
        world.add_geometry(Aabb::new(Vec3::new(-6.0, 0.0, 10.0), Vec3::new(6.0, 1.2, 11.0)));
        world.add_geometry(Aabb::new(Vec3::new(12.0, 0.0, -4.0), Vec3::new(14.0, 2.5, -2.0)));
        world.add_geometry(Aabb::new(Vec3::new(-20.0, 0.0, -20.0), Vec3::new(-14.0, 6.0, -8.0)));

        world.add_water(Aabb::new(Vec3::new(40.0, -0.5, 40.0), Vec3::new(80.0, 1.2, 80.0)));
        world
    }

    pub fn add_geometry(&mut self, bounds: Aabb) {
        self.statics.push(StaticCollider {
            bounds,
            kind: ColliderKind::Geometry,
            layer: LayerMask::DEFAULT,
        });
    }

    pub fn add_water(&mut self, bounds: Aabb) {
        self.statics.push(StaticCollider {
            bounds,
            kind: ColliderKind::Water,
            layer: LayerMask::WATER,
        });
    }

    /// Insert or move a player collider, keeping its current layer
    pub fn sync_player(&mut self, id: PlayerId, position: Vec3) {
        let bounds = player_bounds(position);
        self.players
            .entry(id)
            .and_modify(|c| c.bounds = bounds)
            .or_insert(BodyCollider {
                bounds,
                layer: LayerMask::PLAYER,
            });
    }

    pub fn remove_player(&mut self, id: &PlayerId) {
        self.players.remove(id);
    }

    pub fn sync_vehicle(&mut self, id: VehicleId, bounds: Aabb) {
        self.vehicles.insert(id, bounds);
    }

    pub fn player_bounds(&self, id: &PlayerId) -> Option<Aabb> {
        self.players.get(id).map(|c| c.bounds)
    }
}

impl PhysicsWorld for ArenaWorld {
    fn check_sphere(&self, center: Vec3, radius: f32, mask: LayerMask) -> bool {
        let statics = self
            .statics
            .iter()
            .filter(|c| mask.intersects(c.layer))
            .any(|c| c.bounds.intersects_sphere(center, radius));

        statics
            || (mask.intersects(LayerMask::PLAYER)
                && self
                    .players
                    .values()
                    .filter(|c| mask.intersects(c.layer))
                    .any(|c| c.bounds.intersects_sphere(center, radius)))
            || (mask.intersects(LayerMask::VEHICLE)
                && self
                    .vehicles
                    .values()
                    .any(|b| b.intersects_sphere(center, radius)))
    }

    fn raycast(&self, ray: &Ray, max_distance: f32, mask: LayerMask) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let mut consider = |bounds: &Aabb, collider: ColliderKind| {
            if let Some((distance, normal)) = bounds.ray_intersect(ray, max_distance) {
                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(RayHit {
                        point: ray.point_at(distance),
                        normal,
                        distance,
                        collider,
                    });
                }
            }
        };

        for c in &self.statics {
            if c.kind != ColliderKind::Water && mask.intersects(c.layer) {
                consider(&c.bounds, c.kind);
            }
        }
        for (id, c) in &self.players {
            if mask.intersects(c.layer) {
                consider(&c.bounds, ColliderKind::Player(*id));
            }
        }
        if mask.intersects(LayerMask::VEHICLE) {
            for (id, bounds) in &self.vehicles {
                consider(bounds, ColliderKind::Vehicle(*id));
            }
        }

        best
    }

    fn set_player_layer(&mut self, player: PlayerId, layer: LayerMask) -> Option<LayerMask> {
        self.players
            .get_mut(&player)
            .map(|c| std::mem::replace(&mut c.layer, layer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn ray_hits_nearest_face_with_normal() {
        let mut world = ArenaWorld::new();
        world.add_geometry(Aabb::new(Vec3::new(-1.0, 0.0, 5.0), Vec3::new(1.0, 2.0, 6.0)));
        world.add_geometry(Aabb::new(Vec3::new(-1.0, 0.0, 9.0), Vec3::new(1.0, 2.0, 10.0)));

        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z);
        let hit = world.raycast(&ray, 100.0, LayerMask::DEFAULT_RAYCAST).unwrap();

        assert!((hit.distance - 5.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(hit.collider, ColliderKind::Geometry);
    }

    #[test]
    fn ignore_raycast_layer_is_skipped_by_default_mask() {
        let mut world = ArenaWorld::new();
        let id = Uuid::new_v4();
        world.sync_player(id, Vec3::new(0.0, 0.0, 5.0));

        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z);
        assert!(matches!(
            world.raycast(&ray, 50.0, LayerMask::DEFAULT_RAYCAST).map(|h| h.collider),
            Some(ColliderKind::Player(p)) if p == id
        ));

        let previous = world.set_player_layer(id, LayerMask::IGNORE_RAYCAST);
        assert_eq!(previous, Some(LayerMask::PLAYER));
        assert!(world.raycast(&ray, 50.0, LayerMask::DEFAULT_RAYCAST).is_none());
    }

    #[test]
    fn water_is_probed_but_never_blocks_rays() {
        let world = ArenaWorld::standard();
        let in_pond = Vec3::new(60.0, 0.0, 60.0);

        assert!(world.check_sphere(in_pond, 0.25, LayerMask::WATER));
        assert!(!world.check_sphere(Vec3::ZERO, 0.25, LayerMask::WATER));

        let ray = Ray::new(Vec3::new(30.0, 0.8, 60.0), Vec3::X);
        assert!(world.raycast(&ray, 100.0, LayerMask::ALL).is_none());
    }

    #[test]
    fn ray_starting_inside_box_does_not_hit_it() {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(bounds.ray_intersect(&ray, 10.0).is_none());
    }
}
