//! Loadout manager: two weapon slots, per-slot ammunition, attachments and skins

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadoutSlot {
    Primary,
    Secondary,
}

impl LoadoutSlot {
    pub const ALL: [LoadoutSlot; 2] = [LoadoutSlot::Primary, LoadoutSlot::Secondary];

    pub fn index(self) -> usize {
        match self {
            LoadoutSlot::Primary => 0,
            LoadoutSlot::Secondary => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            LoadoutSlot::Primary => LoadoutSlot::Secondary,
            LoadoutSlot::Secondary => LoadoutSlot::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    AssaultRifle,
    CombatPistol,
}

impl WeaponType {
    /// Display name, also used as the damage label
    pub fn label(self) -> &'static str {
        match self {
            WeaponType::AssaultRifle => "Assault Rifle",
            WeaponType::CombatPistol => "Combat Pistol",
        }
    }
}

/// Stat modifiers contributed by one attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponMod {
    pub name: &'static str,
    pub damage: f32,
    pub falloff_range: f32,
    pub fire_rate: f32,
    pub reload_speed: f32,
    pub recoil: Vec2,
}

impl WeaponMod {
    const fn neutral(name: &'static str) -> Self {
        Self {
            name,
            damage: 1.0,
            falloff_range: 1.0,
            fire_rate: 1.0,
            reload_speed: 1.0,
            recoil: Vec2::ONE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AttachmentCategory {
    pub name: &'static str,
    pub attachments: &'static [WeaponMod],
}

const OPTICS: AttachmentCategory = AttachmentCategory {
    name: "Optic",
    attachments: &[
        WeaponMod::neutral("Red Dot"),
        WeaponMod {
            fire_rate: 0.9,
            recoil: Vec2::new(0.85, 0.85),
            ..WeaponMod::neutral("Scope")
        },
    ],
};

const MUZZLES: AttachmentCategory = AttachmentCategory {
    name: "Muzzle",
    attachments: &[
        WeaponMod {
            damage: 0.9,
            falloff_range: 1.2,
            ..WeaponMod::neutral("Suppressor")
        },
        WeaponMod {
            recoil: Vec2::new(0.7, 0.8),
            ..WeaponMod::neutral("Compensator")
        },
    ],
};

const MAGAZINES: AttachmentCategory = AttachmentCategory {
    name: "Magazine",
    attachments: &[
        WeaponMod {
            reload_speed: 1.15,
            ..WeaponMod::neutral("Extended Mag")
        },
        WeaponMod {
            reload_speed: 0.8,
            fire_rate: 1.05,
            ..WeaponMod::neutral("Fast Mag")
        },
    ],
};

/// Weapon skins, by index
pub const WEAPON_SKINS: &[&str] = &[
    "Arctic", "Carbon", "Desert", "Ember", "Forest", "Gold", "Midnight", "Olive", "Rust", "Tiger",
    "Urban", "Violet",
];

/// Immutable per-type weapon data
#[derive(Debug, Clone, Copy)]
pub struct WeaponTemplate {
    pub kind: WeaponType,
    pub rounds_per_minute: u32,
    /// Seconds from reload start until the weapon can fire again
    pub reload_time: f32,
    pub damage: f32,
    pub falloff_begin: f32,
    pub falloff_end: f32,
    /// Percent of base damage dealt at `falloff_end`
    pub falloff_percent: f32,
    pub recoil: Vec2,
    pub max_ammo: u32,
    pub categories: &'static [AttachmentCategory],
}

const ASSAULT_RIFLE: WeaponTemplate = WeaponTemplate {
    kind: WeaponType::AssaultRifle,
    rounds_per_minute: 600,
    reload_time: 2.0,
    damage: 24.0,
    falloff_begin: 30.0,
    falloff_end: 80.0,
    falloff_percent: 40.0,
    recoil: Vec2::new(0.6, 1.2),
    max_ammo: 30,
    categories: &[OPTICS, MUZZLES, MAGAZINES],
};

const COMBAT_PISTOL: WeaponTemplate = WeaponTemplate {
    kind: WeaponType::CombatPistol,
    rounds_per_minute: 300,
    reload_time: 1.4,
    damage: 30.0,
    falloff_begin: 15.0,
    falloff_end: 50.0,
    falloff_percent: 50.0,
    recoil: Vec2::new(0.4, 1.6),
    max_ammo: 12,
    categories: &[OPTICS, MUZZLES],
};

impl WeaponTemplate {
    pub fn for_type(kind: WeaponType) -> &'static Self {
        match kind {
            WeaponType::AssaultRifle => &ASSAULT_RIFLE,
            WeaponType::CombatPistol => &COMBAT_PISTOL,
        }
    }
}

/// Per-weapon reload bookkeeping; at most one session per weapon
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReloadSession {
    pub mid_reload: bool,
    /// A fresh magazine exists but has not reached the weapon yet
    pub staged_magazine: bool,
    /// Network time the current (possibly continued) reload began
    pub begun_at: Option<f64>,
    pub magazines_spawned: u32,
    pub magazines_dropped: u32,
}

/// Runtime weapon in a loadout slot
#[derive(Debug, Clone)]
pub struct WeaponInstance {
    pub kind: WeaponType,
    pub ammo: u32,
    pub skin: usize,
    /// Selected attachment per category, -1 for none
    pub attachments: Vec<i32>,
    pub last_fired_at: f64,
    pub reload: ReloadSession,
}

impl WeaponInstance {
    pub fn new(kind: WeaponType) -> Self {
        Self {
            kind,
            ammo: 0,
            skin: 0,
            attachments: Vec::new(),
            last_fired_at: f64::NEG_INFINITY,
            reload: ReloadSession::default(),
        }
    }

    /// Remove one round, false when the magazine is empty
    pub fn consume_round(&mut self) -> bool {
        if self.ammo == 0 {
            return false;
        }
        self.ammo -= 1;
        true
    }

    pub fn template(&self) -> &'static WeaponTemplate {
        WeaponTemplate::for_type(self.kind)
    }

    pub fn max_ammo(&self) -> u32 {
        self.template().max_ammo
    }

    /// Attachments currently selected, skipping empty categories
    pub fn active_mods(&self) -> impl Iterator<Item = &'static WeaponMod> + '_ {
        self.template()
            .categories
            .iter()
            .enumerate()
            .filter_map(move |(i, category)| {
                let selected = self.attachments.get(i).copied().unwrap_or(-1);
                usize::try_from(selected)
                    .ok()
                    .and_then(|idx| category.attachments.get(idx))
            })
    }

    pub fn modified_damage(&self) -> f32 {
        self.active_mods()
            .fold(self.template().damage, |acc, m| acc * m.damage)
    }

    pub fn modified_falloff_begin(&self) -> f32 {
        self.active_mods()
            .fold(self.template().falloff_begin, |acc, m| acc * m.falloff_range)
    }

    pub fn modified_falloff_end(&self) -> f32 {
        self.active_mods()
            .fold(self.template().falloff_end, |acc, m| acc * m.falloff_range)
    }

    /// Rounded after every multiplication
    pub fn modified_rounds_per_minute(&self) -> u32 {
        self.active_mods()
            .fold(self.template().rounds_per_minute, |acc, m| {
                (acc as f32 * m.fire_rate).round() as u32
            })
    }

    pub fn modified_reload_time(&self) -> f32 {
        self.active_mods()
            .fold(self.template().reload_time, |acc, m| acc * m.reload_speed)
    }

    pub fn modified_recoil(&self) -> Vec2 {
        self.active_mods()
            .fold(self.template().recoil, |acc, m| acc * m.recoil)
    }

    pub fn time_between_shots(&self) -> f64 {
        60.0 / self.modified_rounds_per_minute().max(1) as f64
    }
}

/// Why a loadout edit was dropped
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadoutError {
    #[error("slot {0:?} holds no weapon")]
    EmptySlot(LoadoutSlot),

    #[error("weapon has no attachment category {0}")]
    UnknownCategory(usize),

    #[error("attachment index {attachment} out of range for category {category}")]
    AttachmentOutOfRange { category: usize, attachment: i32 },

    #[error("skin index {0} out of range")]
    SkinOutOfRange(i32),
}

/// A replaced weapon still bound to the rig, destroyed once `destroy_at` passes
#[derive(Debug, Clone)]
pub struct RetiredWeapon {
    pub kind: WeaponType,
    pub destroy_at: f64,
}

/// Delay before a replaced, visible weapon is destroyed
pub const RETIRE_DELAY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Loadout {
    weapons: [Option<WeaponInstance>; 2],
    active: LoadoutSlot,
    weapon_shown: bool,
    retired: Vec<RetiredWeapon>,
}

impl Default for Loadout {
    fn default() -> Self {
        Self {
            weapons: [None, None],
            active: LoadoutSlot::Primary,
            weapon_shown: true,
            retired: Vec::new(),
        }
    }
}

impl Loadout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_slot(&self) -> LoadoutSlot {
        self.active
    }

    pub fn weapon(&self, slot: LoadoutSlot) -> Option<&WeaponInstance> {
        self.weapons[slot.index()].as_ref()
    }

    pub fn weapon_mut(&mut self, slot: LoadoutSlot) -> Option<&mut WeaponInstance> {
        self.weapons[slot.index()].as_mut()
    }

    pub fn current(&self) -> Option<&WeaponInstance> {
        self.weapon(self.active)
    }

    pub fn current_mut(&mut self) -> Option<&mut WeaponInstance> {
        self.weapon_mut(self.active)
    }

    pub fn is_unarmed(&self) -> bool {
        self.current().is_none()
    }

    pub fn current_ammo(&self) -> Option<u32> {
        self.current().map(|w| w.ammo)
    }

    pub fn weapon_shown(&self) -> bool {
        self.weapon_shown
    }

    /// The weapon currently in the player's hands, if any
    pub fn displayed(&self) -> Option<WeaponType> {
        if self.weapon_shown {
            self.current().map(|w| w.kind)
        } else {
            None
        }
    }

    /// Hide or show the weapon for gameplay reasons (vaulting, seats,
    /// swimming, death). Returns what should now be in hand.
    pub fn set_weapon_shown(&mut self, shown: bool) -> Option<WeaponType> {
        self.weapon_shown = shown;
        self.displayed()
    }

    /// Replace the weapon in `slot`.
    ///
    /// A displaced weapon that was in hand is retired instead of destroyed so
    /// in-flight rig bindings can finish. Ammunition starts at capacity only
    /// on the authoritative side; elsewhere it waits for replication.
    /// Returns the weapon that should now be in hand.
    pub fn set_slot(
        &mut self,
        slot: LoadoutSlot,
        kind: Option<WeaponType>,
        authority: bool,
        now: f64,
    ) -> Option<WeaponType> {
        if let Some(previous) = self.weapons[slot.index()].take() {
            if slot == self.active {
                self.retired.push(RetiredWeapon {
                    kind: previous.kind,
                    destroy_at: now + RETIRE_DELAY,
                });
            }
        }

        self.weapons[slot.index()] = kind.map(|kind| {
            let mut weapon = WeaponInstance::new(kind);
            if authority {
                weapon.ammo = weapon.max_ammo();
            }
            weapon
        });

        self.displayed()
    }

    /// Switch the usable weapon. Returns the weapon to put in hand, or
    /// `None` when the weapon is hidden and must stay hidden.
    pub fn set_active_slot(&mut self, slot: LoadoutSlot) -> Option<Option<WeaponType>> {
        self.active = slot;
        if self.weapon_shown {
            Some(self.current().map(|w| w.kind))
        } else {
            None
        }
    }

    pub fn set_attachment(
        &mut self,
        slot: LoadoutSlot,
        category: usize,
        attachment: i32,
    ) -> Result<(), LoadoutError> {
        let weapon = self
            .weapon_mut(slot)
            .ok_or(LoadoutError::EmptySlot(slot))?;

        let categories = weapon.template().categories;
        let options = categories
            .get(category)
            .ok_or(LoadoutError::UnknownCategory(category))?
            .attachments
            .len();

        if attachment < -1 || attachment >= options as i32 {
            return Err(LoadoutError::AttachmentOutOfRange {
                category,
                attachment,
            });
        }

        if weapon.attachments.len() <= category {
            weapon.attachments.resize(category + 1, -1);
        }
        weapon.attachments[category] = attachment;
        Ok(())
    }

    pub fn set_skin(&mut self, slot: LoadoutSlot, skin: i32) -> Result<(), LoadoutError> {
        let index = usize::try_from(skin)
            .ok()
            .filter(|i| *i < WEAPON_SKINS.len())
            .ok_or(LoadoutError::SkinOutOfRange(skin))?;

        let weapon = self
            .weapon_mut(slot)
            .ok_or(LoadoutError::EmptySlot(slot))?;
        weapon.skin = index;
        Ok(())
    }

    /// Respawn: abandon any staged magazine and, on the authoritative side,
    /// refill every weapon
    pub fn instant_reload_all(&mut self, authority: bool) {
        for weapon in self.weapons.iter_mut().flatten() {
            weapon.reload.staged_magazine = false;
            weapon.reload.mid_reload = false;
            weapon.reload.begun_at = None;

            if authority {
                weapon.ammo = weapon.max_ammo();
            }
        }
    }

    /// Drop retired weapons whose destruction delay has passed
    pub fn collect_retired(&mut self, now: f64) -> Vec<WeaponType> {
        let (due, pending): (Vec<_>, Vec<_>) =
            self.retired.drain(..).partition(|r| r.destroy_at <= now);
        self.retired = pending;
        due.into_iter().map(|r| r.kind).collect()
    }

    pub fn retired(&self) -> &[RetiredWeapon] {
        &self.retired
    }
}
