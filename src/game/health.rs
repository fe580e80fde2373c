//! Health/armor model
//!
//! Armor absorbs damage before health. Every mutation goes through
//! [`Vitals::set_health`] / [`Vitals::set_armor`], which clamp into
//! `[0, max]`; only the authoritative side calls them.

use serde::{Deserialize, Serialize};

use crate::config::VitalsTuning;

use super::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageCause {
    Shot,
    /// Struck by a vehicle
    Collision,
}

/// One hit, created by the combat resolver and discarded after dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageEvent {
    pub attacker: Option<PlayerId>,
    pub victim: PlayerId,
    pub cause: DamageCause,
    pub damage: f32,
    pub distance: f32,
    /// Weapon or vehicle name shown on the death screen
    pub weapon: String,
}

/// Result of applying one damage event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DamageOutcome {
    pub armor_damage: f32,
    pub health_damage: f32,
    /// True only on the hit that brought health to zero
    pub killed: bool,
}

#[derive(Debug, Clone)]
pub struct Vitals {
    health: f32,
    armor: f32,
    max_health: f32,
    max_armor: f32,
    last_damage_at: f64,
}

impl Vitals {
    pub fn new(tuning: &VitalsTuning) -> Self {
        Self {
            health: tuning.max_health,
            armor: tuning.max_armor,
            max_health: tuning.max_health,
            max_armor: tuning.max_armor,
            last_damage_at: f64::NEG_INFINITY,
        }
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn armor(&self) -> f32 {
        self.armor
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn max_armor(&self) -> f32 {
        self.max_armor
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0.0
    }

    pub fn set_health(&mut self, health: f32) {
        self.health = health.clamp(0.0, self.max_health);
    }

    pub fn set_armor(&mut self, armor: f32) {
        self.armor = armor.clamp(0.0, self.max_armor);
    }

    /// Split damage across armor then health. The death flag is raised
    /// only on the transition to zero, so hits on a corpse never re-fire it.
    pub fn apply_damage(&mut self, event: &DamageEvent, now: f64) -> DamageOutcome {
        let was_dead = self.is_dead();
        self.last_damage_at = now;

        let damage = event.damage.max(0.0);
        let armor_damage = damage.min(self.armor);
        let health_damage = (damage - armor_damage).min(self.health);

        if armor_damage > 0.0 {
            self.set_armor(self.armor - armor_damage);
        }
        if health_damage > 0.0 {
            self.set_health(self.health - health_damage);
        }

        DamageOutcome {
            armor_damage,
            health_damage,
            killed: !was_dead && self.is_dead(),
        }
    }

    /// Passive regeneration, run once per authoritative tick
    pub fn regenerate(&mut self, now: f64, dt: f32, tuning: &VitalsTuning) {
        if self.is_dead() {
            return;
        }

        let quiet_for = now - self.last_damage_at;

        if quiet_for > tuning.armor_regen_delay && self.armor < self.max_armor {
            self.set_armor(self.armor + dt * tuning.armor_regen_rate);
        }

        let health_cap = self.max_health * tuning.health_regen_cap;
        if quiet_for > tuning.health_regen_delay
            && self.health < health_cap
            && self.armor == self.max_armor
        {
            self.set_health((self.health + dt * tuning.health_regen_rate).min(health_cap));
        }
    }

    /// Respawn: both resources back to max
    pub fn restore_full(&mut self) {
        self.set_health(self.max_health);
        self.set_armor(self.max_armor);
    }

    /// Mirror values received from the authoritative side
    pub fn apply_replicated(&mut self, health: Option<f32>, armor: Option<f32>) {
        if let Some(h) = health {
            self.set_health(h);
        }
        if let Some(a) = armor {
            self.set_armor(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn hit(damage: f32) -> DamageEvent {
        DamageEvent {
            attacker: Some(Uuid::new_v4()),
            victim: Uuid::new_v4(),
            cause: DamageCause::Shot,
            damage,
            distance: 12.0,
            weapon: "Assault Rifle".to_string(),
        }
    }

    fn vitals(health: f32, armor: f32) -> Vitals {
        let mut v = Vitals::new(&VitalsTuning::default());
        v.set_health(health);
        v.set_armor(armor);
        v
    }

    #[test]
    fn armor_absorbs_first() {
        let mut v = vitals(50.0, 10.0);
        let outcome = v.apply_damage(&hit(15.0), 0.0);

        assert_eq!(v.armor(), 0.0);
        assert_eq!(v.health(), 45.0);
        assert_eq!(outcome.armor_damage, 10.0);
        assert_eq!(outcome.health_damage, 5.0);
        assert!(!outcome.killed);
    }

    #[test]
    fn damage_never_leaves_bounds() {
        let mut v = vitals(30.0, 5.0);
        v.apply_damage(&hit(500.0), 0.0);
        assert_eq!(v.health(), 0.0);
        assert_eq!(v.armor(), 0.0);

        v.set_health(1_000.0);
        v.set_armor(-3.0);
        assert_eq!(v.health(), v.max_health());
        assert_eq!(v.armor(), 0.0);
    }

    #[test]
    fn death_fires_exactly_once() {
        let mut v = vitals(10.0, 0.0);
        assert!(v.apply_damage(&hit(25.0), 1.0).killed);

        for damage in [0.0, 5.0, 40.0] {
            let outcome = v.apply_damage(&hit(damage), 2.0);
            assert!(!outcome.killed);
            assert_eq!(v.health(), 0.0);
        }
    }

    #[test]
    fn armor_regenerates_after_grace() {
        let tuning = VitalsTuning::default();
        let mut v = vitals(100.0, 20.0);
        v.apply_damage(&hit(10.0), 0.0);
        assert_eq!(v.armor(), 10.0);

        v.regenerate(7.9, 1.0, &tuning);
        assert_eq!(v.armor(), 10.0);

        v.regenerate(8.5, 1.0, &tuning);
        assert_eq!(v.armor(), 13.0);
    }

    #[test]
    fn health_regen_waits_for_full_armor_and_stops_at_cap() {
        let tuning = VitalsTuning::default();
        let mut v = vitals(100.0, 20.0);
        v.apply_damage(&hit(110.0), 0.0);
        assert_eq!(v.health(), 10.0);
        assert_eq!(v.armor(), 0.0);

        // armor still empty: health holds
        v.regenerate(11.0, 1.0, &tuning);
        assert_eq!(v.health(), 10.0);

        for step in 0..40 {
            v.regenerate(11.0 + step as f64, 1.0, &tuning);
        }
        assert_eq!(v.armor(), 20.0);
        assert_eq!(v.health(), 20.0);
    }

    #[test]
    fn dead_players_do_not_regenerate() {
        let tuning = VitalsTuning::default();
        let mut v = vitals(5.0, 0.0);
        v.apply_damage(&hit(5.0), 0.0);
        v.regenerate(100.0, 1.0, &tuning);
        assert!(v.is_dead());
        assert_eq!(v.armor(), 0.0);
    }
}
