//! Combat resolver: fire validation, hit rays, damage falloff

use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::{CombatTuning, FalloffMode};

use super::fsm::PlayerStateKind;
use super::health::{DamageCause, DamageEvent, DamageOutcome};
use super::player::Player;
use super::world::{ColliderKind, LayerMask, PhysicsWorld, Ray};
use super::PlayerId;

/// Hit-marker flavour sent privately to the attacker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitmarkerKind {
    Damage,
    Kill,
}

/// Damage at `distance`, interpolated between full damage at `begin` and
/// `damage * percent / 100` at `end`
pub fn falloff_damage(
    damage: f32,
    begin: f32,
    end: f32,
    percent: f32,
    distance: f32,
    mode: FalloffMode,
) -> f32 {
    let span = end - begin;
    let t = if span.abs() <= f32::EPSILON {
        if distance >= end {
            1.0
        } else {
            0.0
        }
    } else {
        (distance - begin) / span
    };

    let t = match mode {
        FalloffMode::Extrapolate => t,
        FalloffMode::Clamp => t.clamp(0.0, 1.0),
    };

    let floor = damage * percent / 100.0;
    damage + (floor - damage) * t
}

/// Why a fire intent was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FireRejection {
    #[error("shooter is not in the match")]
    UnknownShooter,

    #[error("shooter is dead")]
    ShooterDead,

    #[error("no weapon equipped")]
    Unarmed,

    #[error("magazine is empty")]
    OutOfAmmo,

    #[error("weapon is being reloaded")]
    Reloading,

    #[error("fired faster than the weapon allows")]
    RateLimited,
}

/// A hit that dealt damage
#[derive(Debug, Clone)]
pub struct FireHit {
    pub victim: PlayerId,
    pub event: DamageEvent,
    pub outcome: DamageOutcome,
}

#[derive(Debug, Clone)]
pub struct FireResolution {
    pub shooter: PlayerId,
    /// Where the shot landed, or the max-range point on a miss
    pub end_point: Vec3,
    pub hit: Option<FireHit>,
}

/// Validate and execute one fire intent on the authoritative side.
///
/// The shooter's collider sits on the ignore-raycast layer for the duration
/// of the cast only. Damage is applied to the victim before returning; state
/// changes and notifications are left to the caller.
pub fn resolve_fire(
    shooter_id: PlayerId,
    players: &mut HashMap<PlayerId, Player>,
    world: &mut dyn PhysicsWorld,
    tuning: &CombatTuning,
    now: f64,
) -> Result<FireResolution, FireRejection> {
    let shooter = players
        .get_mut(&shooter_id)
        .ok_or(FireRejection::UnknownShooter)?;

    if shooter.is_dead() {
        return Err(FireRejection::ShooterDead);
    }
    if shooter.state() == PlayerStateKind::Reloading {
        return Err(FireRejection::Reloading);
    }

    let origin = shooter.aim_position();
    let forward = shooter.aim_forward();
    let shooter_position = shooter.body.position;

    let weapon = shooter
        .loadout
        .current_mut()
        .ok_or(FireRejection::Unarmed)?;

    if now - weapon.last_fired_at < weapon.time_between_shots() - tuning.fire_rate_leeway {
        return Err(FireRejection::RateLimited);
    }
    if !weapon.consume_round() {
        return Err(FireRejection::OutOfAmmo);
    }
    weapon.last_fired_at = now;

    let template = weapon.template();
    let label = weapon.kind.label();
    let damage = weapon.modified_damage();
    let falloff_begin = weapon.modified_falloff_begin();
    let falloff_end = weapon.modified_falloff_end();

    let previous_layer = world.set_player_layer(shooter_id, LayerMask::IGNORE_RAYCAST);
    let ray = Ray::new(origin - forward * tuning.ray_back_offset, forward);
    let hit = world.raycast(&ray, tuning.max_range, LayerMask::DEFAULT_RAYCAST);
    if let Some(layer) = previous_layer {
        world.set_player_layer(shooter_id, layer);
    }

    let end_point = hit
        .map(|h| h.point)
        .unwrap_or_else(|| ray.point_at(tuning.max_range));

    let victim_id = match hit.map(|h| h.collider) {
        Some(ColliderKind::Player(id)) if id != shooter_id => id,
        _ => {
            return Ok(FireResolution {
                shooter: shooter_id,
                end_point,
                hit: None,
            })
        }
    };

    let hit = players
        .get_mut(&victim_id)
        .filter(|victim| !victim.is_dead())
        .map(|victim| {
            let distance = shooter_position.distance(victim.body.position);
            let event = DamageEvent {
                attacker: Some(shooter_id),
                victim: victim_id,
                cause: DamageCause::Shot,
                damage: falloff_damage(
                    damage,
                    falloff_begin,
                    falloff_end,
                    template.falloff_percent,
                    distance,
                    tuning.falloff_mode,
                ),
                distance,
                weapon: label.to_string(),
            };
            let outcome = victim.vitals.apply_damage(&event, now);
            FireHit {
                victim: victim_id,
                event,
                outcome,
            }
        });

    Ok(FireResolution {
        shooter: shooter_id,
        end_point,
        hit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameplayTuning;
    use crate::game::loadout::{LoadoutSlot, WeaponType};
    use crate::game::world::ArenaWorld;
    use uuid::Uuid;

    struct Range {
        players: HashMap<PlayerId, Player>,
        world: ArenaWorld,
        shooter: PlayerId,
        target: PlayerId,
        tuning: GameplayTuning,
    }

    fn range(target_distance: f32) -> Range {
        let tuning = GameplayTuning::default();
        let mut world = ArenaWorld::new();
        let shooter = Uuid::new_v4();
        let target = Uuid::new_v4();

        let mut a = Player::new(shooter, "shooter", Vec3::ZERO, &tuning);
        a.loadout
            .set_slot(LoadoutSlot::Primary, Some(WeaponType::AssaultRifle), true, 0.0);
        let b = Player::new(target, "target", Vec3::new(0.0, 0.0, target_distance), &tuning);

        world.sync_player(shooter, a.body.position);
        world.sync_player(target, b.body.position);

        let mut players = HashMap::new();
        players.insert(shooter, a);
        players.insert(target, b);

        Range {
            players,
            world,
            shooter,
            target,
            tuning,
        }
    }

    impl Range {
        fn fire(&mut self, now: f64) -> Result<FireResolution, FireRejection> {
            resolve_fire(
                self.shooter,
                &mut self.players,
                &mut self.world,
                &self.tuning.combat,
                now,
            )
        }
    }

    #[test]
    fn falloff_interpolates_linearly() {
        let d = falloff_damage(100.0, 10.0, 50.0, 20.0, 30.0, FalloffMode::Extrapolate);
        assert!((d - 60.0).abs() < 1e-4);
    }

    #[test]
    fn falloff_extrapolates_outside_band_unless_clamped() {
        let near = falloff_damage(100.0, 10.0, 50.0, 20.0, 0.0, FalloffMode::Extrapolate);
        assert!((near - 120.0).abs() < 1e-4);
        let far = falloff_damage(100.0, 10.0, 50.0, 20.0, 90.0, FalloffMode::Extrapolate);
        assert!((far - (-60.0)).abs() < 1e-4);

        let near = falloff_damage(100.0, 10.0, 50.0, 20.0, 0.0, FalloffMode::Clamp);
        assert_eq!(near, 100.0);
        let far = falloff_damage(100.0, 10.0, 50.0, 20.0, 90.0, FalloffMode::Clamp);
        assert!((far - 20.0).abs() < 1e-4);
    }

    #[test]
    fn fire_rate_leeway_is_honoured() {
        let mut r = range(20.0);
        // assault rifle: 600 rpm, 0.1 s between shots, 25 ms leeway
        assert!(r.fire(10.0).is_ok());
        assert_eq!(r.fire(10.0 + 0.1 - 0.025 - 0.001).unwrap_err(), FireRejection::RateLimited);
        assert!(r.fire(10.0 + 0.1).is_ok());
        assert!(r.fire(10.0 + 0.2).is_ok());

        let ammo = r.players[&r.shooter].loadout.current_ammo();
        assert_eq!(ammo, Some(27));
    }

    #[test]
    fn hit_applies_extrapolated_falloff_through_armor() {
        let mut r = range(20.0);
        let resolution = r.fire(1.0).unwrap();
        let hit = resolution.hit.expect("target in line of fire");

        assert_eq!(hit.victim, r.target);
        assert_eq!(hit.event.weapon, "Assault Rifle");
        assert!((hit.event.distance - 20.0).abs() < 1e-4);
        // closer than falloff begin: 24 + 14.4 * 0.2
        assert!((hit.event.damage - 26.88).abs() < 1e-3);

        let victim = &r.players[&r.target];
        assert_eq!(victim.vitals.armor(), 0.0);
        assert!((victim.vitals.health() - (100.0 - 6.88)).abs() < 1e-3);
        assert!((resolution.end_point.z - (20.0 - crate::game::world::PLAYER_HALF_WIDTH)).abs() < 1e-4);
    }

    #[test]
    fn clamped_falloff_caps_close_range_damage() {
        let mut r = range(20.0);
        r.tuning.combat.falloff_mode = FalloffMode::Clamp;
        let hit = r.fire(1.0).unwrap().hit.unwrap();
        assert_eq!(hit.event.damage, 24.0);
    }

    #[test]
    fn shooter_layer_is_restored_after_the_cast() {
        let mut r = range(20.0);
        r.fire(1.0).unwrap();
        let previous = r.world.set_player_layer(r.shooter, LayerMask::PLAYER);
        assert_eq!(previous, Some(LayerMask::PLAYER));
    }

    #[test]
    fn misses_report_max_range_point() {
        let mut r = range(20.0);
        r.world.remove_player(&r.target);
        let resolution = r.fire(1.0).unwrap();
        assert!(resolution.hit.is_none());
        assert!(resolution.end_point.z > 900.0);
    }

    #[test]
    fn empty_magazine_and_unarmed_are_rejected() {
        let mut r = range(20.0);
        r.players
            .get_mut(&r.shooter)
            .unwrap()
            .loadout
            .current_mut()
            .unwrap()
            .ammo = 0;
        assert_eq!(r.fire(1.0).unwrap_err(), FireRejection::OutOfAmmo);

        r.players
            .get_mut(&r.shooter)
            .unwrap()
            .loadout
            .set_slot(LoadoutSlot::Primary, None, true, 1.0);
        assert_eq!(r.fire(2.0).unwrap_err(), FireRejection::Unarmed);
    }

    #[test]
    fn dead_targets_take_no_damage() {
        let mut r = range(20.0);
        r.players.get_mut(&r.target).unwrap().vitals.set_health(0.0);
        let resolution = r.fire(1.0).unwrap();
        assert!(resolution.hit.is_none());
    }
}
