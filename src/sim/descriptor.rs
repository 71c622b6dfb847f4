//! Attack descriptors
//!
//! Immutable per-(archetype, attack) lookup data, resolved once at load time.
//! Combatants only ever hold a shared reference to the descriptor they are
//! executing plus transient charge/timing values.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::Rect;
use crate::consts::DEFAULT_KNOCKBACK_EXPONENT;
use crate::error::{DescriptorError, SimResult};

/// Character archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Heavy hitter; heavy attack needs ground contact
    Brawler,
    /// All-rounder
    Striker,
    /// Teleporting ultimate
    Blinker,
}

/// Attack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    Light,
    Dash,
    Launcher,
    Heavy,
    Slam,
    Projectile,
    Grab,
    Ultimate,
}

impl AttackKind {
    pub const ALL: [AttackKind; 8] = [
        AttackKind::Light,
        AttackKind::Dash,
        AttackKind::Launcher,
        AttackKind::Heavy,
        AttackKind::Slam,
        AttackKind::Projectile,
        AttackKind::Grab,
        AttackKind::Ultimate,
    ];

    /// Animation state name
    pub fn name(self) -> &'static str {
        match self {
            AttackKind::Light => "light",
            AttackKind::Dash => "dash_attack",
            AttackKind::Launcher => "launcher",
            AttackKind::Heavy => "heavy",
            AttackKind::Slam => "slam",
            AttackKind::Projectile => "projectile",
            AttackKind::Grab => "grab",
            AttackKind::Ultimate => "ultimate",
        }
    }
}

/// How knockback direction is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnockbackKind {
    /// Fixed angle mirrored by attacker facing
    Standard,
    /// Shallow angle; attacker keeps forward momentum
    Dash,
    /// Near vertical with a little random horizontal jitter
    Launcher,
    /// Radial from the attacker's center
    Explosion,
    /// Damage and stun only
    None,
}

/// Coarse priority class, compared before numeric priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriorityTier {
    Basic,
    Heavy,
    Ultimate,
}

/// How charge time maps onto knockback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChargeScaling {
    None,
    Linear,
    /// Charge ratio snaps down to `stages` equal steps
    Staged { stages: u8 },
}

/// Phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub startup: f32,
    pub active: f32,
    pub recovery: f32,
}

/// Projectile launch parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSpec {
    pub speed: f32,
    pub size: Vec2,
    pub max_distance: f32,
    /// Stun at zero travel
    pub stun_min: f32,
    /// Stun at `max_distance`
    pub stun_max: f32,
}

/// Read-only attack parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDescriptor {
    pub base_damage: f32,
    pub base_knockback: f32,
    pub knockback: KnockbackKind,
    /// Launch angle in degrees above horizontal (Standard / Dash / Launcher)
    pub angle: f32,
    #[serde(default = "default_exponent")]
    pub knockback_exponent: f32,
    /// Stun seconds applied to the target
    pub stun: f32,
    pub tier: PriorityTier,
    pub priority: i32,
    pub charge_rank: u8,
    pub clankable: bool,
    pub charge: ChargeScaling,
    /// Charge time that counts as full charge
    pub max_charge_seconds: f32,
    /// Knockback multiplier at full charge
    pub charge_knockback_multiplier: f32,
    /// Cap applied after charge scaling
    pub max_knockback: Option<f32>,
    /// Scales with the rhythm combo multiplier
    pub finisher: bool,
    pub cooldown: f32,
    pub requires_ground: bool,
    pub timing: Timing,
    /// Hitbox relative to the body's top-left corner when facing right
    pub hitbox: Rect,
    pub projectile: Option<ProjectileSpec>,
    /// Slow motion on a fully charged finisher hit
    pub slow_motion_seconds: Option<f32>,
    /// Visual/audio effect requested on hit
    pub effect: String,
}

fn default_exponent() -> f32 {
    DEFAULT_KNOCKBACK_EXPONENT
}

impl AttackDescriptor {
    /// Minimal descriptor used when data is missing
    pub fn fallback() -> Self {
        Self {
            base_damage: 1.0,
            base_knockback: 10.0,
            knockback: KnockbackKind::Standard,
            angle: 30.0,
            knockback_exponent: DEFAULT_KNOCKBACK_EXPONENT,
            stun: 0.1,
            tier: PriorityTier::Basic,
            priority: 0,
            charge_rank: 0,
            clankable: true,
            charge: ChargeScaling::None,
            max_charge_seconds: 0.0,
            charge_knockback_multiplier: 1.0,
            max_knockback: None,
            finisher: false,
            cooldown: 0.2,
            requires_ground: false,
            timing: Timing {
                startup: 0.05,
                active: 0.1,
                recovery: 0.1,
            },
            hitbox: Rect::new(40.0, 20.0, 30.0, 30.0),
            projectile: None,
            slow_motion_seconds: None,
            effect: "hit_basic".to_string(),
        }
    }

    /// (tier, numeric priority) for winner selection
    pub fn priority_key(&self) -> (PriorityTier, i32) {
        (self.tier, self.priority)
    }
}

/// Shared handle to a table descriptor; attacks and hits hold one of these
pub type DescriptorRef = Arc<AttackDescriptor>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DescriptorEntry {
    archetype: Archetype,
    attack: AttackKind,
    descriptor: AttackDescriptor,
}

/// Descriptor lookup keyed by (archetype, attack)
#[derive(Debug, Clone, Default)]
pub struct DescriptorTable {
    entries: HashMap<(Archetype, AttackKind), DescriptorRef>,
}

impl DescriptorTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archetype: Archetype, attack: AttackKind, descriptor: AttackDescriptor) {
        self.entries.insert((archetype, attack), Arc::new(descriptor));
    }

    pub fn remove(&mut self, archetype: Archetype, attack: AttackKind) -> Option<DescriptorRef> {
        self.entries.remove(&(archetype, attack))
    }

    pub fn get(&self, archetype: Archetype, attack: AttackKind) -> Result<&DescriptorRef, DescriptorError> {
        self.entries
            .get(&(archetype, attack))
            .ok_or(DescriptorError::NotFound { archetype, attack })
    }

    /// Descriptor for an attack about to start, falling back to a minimal one
    pub fn resolve(&self, archetype: Archetype, attack: AttackKind) -> DescriptorRef {
        match self.get(archetype, attack) {
            Ok(desc) => Arc::clone(desc),
            Err(err) => {
                log::warn!("{err}; using fallback descriptor");
                Arc::new(AttackDescriptor::fallback())
            }
        }
    }

    /// Default cooldown per attack, used on spawn and respawn
    pub fn default_cooldowns(&self, archetype: Archetype) -> HashMap<AttackKind, f32> {
        AttackKind::ALL
            .iter()
            .map(|&kind| {
                let cooldown = self.get(archetype, kind).map_or(0.0, |d| d.cooldown);
                (kind, cooldown)
            })
            .collect()
    }

    /// Load from a JSON list of `{archetype, attack, descriptor}` entries
    pub fn from_json(json: &str) -> SimResult<Self> {
        let list: Vec<DescriptorEntry> = serde_json::from_str(json)?;
        let mut table = Self::new();
        for entry in list {
            table.insert(entry.archetype, entry.attack, entry.descriptor);
        }
        log::info!("Loaded {} attack descriptors", table.entries.len());
        Ok(table)
    }

    pub fn to_json(&self) -> SimResult<String> {
        let mut list: Vec<DescriptorEntry> = self
            .entries
            .iter()
            .map(|(&(archetype, attack), descriptor)| DescriptorEntry {
                archetype,
                attack,
                descriptor: AttackDescriptor::clone(descriptor),
            })
            .collect();
        list.sort_by_key(|e| (e.archetype as u8, e.attack as u8));
        Ok(serde_json::to_string_pretty(&list)?)
    }

    /// Built-in roster
    pub fn standard() -> Self {
        let mut table = Self::new();
        for archetype in [Archetype::Brawler, Archetype::Striker, Archetype::Blinker] {
            for kind in AttackKind::ALL {
                table.insert(archetype, kind, standard_descriptor(archetype, kind));
            }
        }
        table
    }
}

fn standard_descriptor(archetype: Archetype, kind: AttackKind) -> AttackDescriptor {
    let base = AttackDescriptor::fallback();
    let mut desc = match kind {
        AttackKind::Light => AttackDescriptor {
            base_damage: 5.0,
            base_knockback: 30.0,
            angle: 30.0,
            stun: 0.25,
            priority: 1,
            cooldown: 0.25,
            timing: Timing {
                startup: 0.05,
                active: 0.1,
                recovery: 0.15,
            },
            effect: "hit_light".to_string(),
            ..base
        },
        AttackKind::Dash => AttackDescriptor {
            base_damage: 8.0,
            base_knockback: 45.0,
            knockback: KnockbackKind::Dash,
            angle: 15.0,
            stun: 0.35,
            priority: 2,
            cooldown: 0.6,
            timing: Timing {
                startup: 0.08,
                active: 0.15,
                recovery: 0.25,
            },
            hitbox: Rect::new(30.0, 25.0, 45.0, 40.0),
            effect: "hit_dash".to_string(),
            ..base
        },
        AttackKind::Launcher => AttackDescriptor {
            base_damage: 7.0,
            base_knockback: 55.0,
            knockback: KnockbackKind::Launcher,
            angle: 85.0,
            stun: 0.4,
            priority: 2,
            cooldown: 0.5,
            timing: Timing {
                startup: 0.08,
                active: 0.12,
                recovery: 0.2,
            },
            hitbox: Rect::new(-5.0, -40.0, 50.0, 60.0),
            effect: "hit_launch".to_string(),
            ..base
        },
        AttackKind::Heavy => AttackDescriptor {
            base_damage: 14.0,
            base_knockback: 70.0,
            angle: 40.0,
            stun: 0.6,
            tier: PriorityTier::Heavy,
            priority: 3,
            charge_rank: 2,
            clankable: false,
            charge: ChargeScaling::Linear,
            max_charge_seconds: 1.0,
            charge_knockback_multiplier: 1.8,
            max_knockback: Some(140.0),
            finisher: true,
            cooldown: 1.2,
            timing: Timing {
                startup: 0.15,
                active: 0.12,
                recovery: 0.3,
            },
            hitbox: Rect::new(35.0, 15.0, 50.0, 45.0),
            slow_motion_seconds: Some(0.6),
            effect: "hit_heavy".to_string(),
            ..base
        },
        AttackKind::Slam => AttackDescriptor {
            base_damage: 12.0,
            base_knockback: 60.0,
            knockback: KnockbackKind::Explosion,
            stun: 0.5,
            tier: PriorityTier::Heavy,
            priority: 2,
            charge_rank: 1,
            cooldown: 1.5,
            timing: Timing {
                startup: 0.3,
                active: 0.15,
                recovery: 0.3,
            },
            hitbox: Rect::new(-40.0, 40.0, 120.0, 60.0),
            effect: "slam_shockwave".to_string(),
            ..base
        },
        AttackKind::Projectile => AttackDescriptor {
            base_damage: 4.0,
            base_knockback: 0.0,
            knockback: KnockbackKind::None,
            stun: 0.2,
            priority: 0,
            cooldown: 0.8,
            timing: Timing {
                startup: 0.1,
                active: 0.05,
                recovery: 0.2,
            },
            projectile: Some(ProjectileSpec {
                speed: 700.0,
                size: Vec2::new(16.0, 16.0),
                max_distance: 600.0,
                stun_min: 0.2,
                stun_max: 0.8,
            }),
            effect: "hit_projectile".to_string(),
            ..base
        },
        AttackKind::Grab => AttackDescriptor {
            base_damage: 3.0,
            base_knockback: 50.0,
            angle: 35.0,
            stun: 0.5,
            priority: 5,
            clankable: false,
            cooldown: 1.0,
            timing: Timing {
                startup: 0.08,
                active: 0.1,
                recovery: 0.3,
            },
            hitbox: Rect::new(35.0, 20.0, 30.0, 40.0),
            effect: "grab".to_string(),
            ..base
        },
        AttackKind::Ultimate => AttackDescriptor {
            base_damage: 6.0,
            base_knockback: 40.0,
            knockback: KnockbackKind::Explosion,
            stun: 0.5,
            tier: PriorityTier::Ultimate,
            priority: 10,
            clankable: false,
            cooldown: 0.0,
            timing: Timing {
                startup: 0.5,
                active: 1.2,
                recovery: 0.4,
            },
            hitbox: Rect::new(-120.0, -100.0, 280.0, 260.0),
            effect: "ultimate_pulse".to_string(),
            ..base
        },
    };

    match (archetype, kind) {
        (Archetype::Brawler, AttackKind::Heavy) => {
            desc.requires_ground = true;
            desc.charge = ChargeScaling::Staged { stages: 3 };
            desc.base_damage *= 1.15;
        }
        (Archetype::Brawler, _) => desc.base_damage *= 1.15,
        (Archetype::Blinker, AttackKind::Ultimate) => {
            desc.base_damage = 25.0;
            desc.base_knockback = 90.0;
            desc.knockback = KnockbackKind::Launcher;
            desc.angle = 80.0;
            desc.timing = Timing {
                startup: 0.3,
                active: 0.3,
                recovery: 0.3,
            };
            desc.hitbox = Rect::new(-20.0, -20.0, 80.0, 120.0);
            desc.effect = "blink_strike".to_string();
        }
        (Archetype::Blinker, AttackKind::Light) => desc.timing.startup = 0.04,
        _ => {}
    }
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_is_complete() {
        let table = DescriptorTable::standard();
        for archetype in [Archetype::Brawler, Archetype::Striker, Archetype::Blinker] {
            for kind in AttackKind::ALL {
                assert!(table.get(archetype, kind).is_ok(), "{archetype:?}/{kind:?}");
            }
        }
        assert!(table.get(Archetype::Brawler, AttackKind::Heavy).unwrap().requires_ground);
        assert!(!table.get(Archetype::Striker, AttackKind::Heavy).unwrap().requires_ground);
    }

    #[test]
    fn test_missing_descriptor_is_typed_and_falls_back() {
        let mut table = DescriptorTable::standard();
        table.remove(Archetype::Striker, AttackKind::Slam);
        assert_eq!(
            table.get(Archetype::Striker, AttackKind::Slam),
            Err(DescriptorError::NotFound {
                archetype: Archetype::Striker,
                attack: AttackKind::Slam
            })
        );
        let fallback = table.resolve(Archetype::Striker, AttackKind::Slam);
        assert_eq!(fallback.priority, 0);
        assert_eq!(fallback.tier, PriorityTier::Basic);
        assert!(fallback.clankable);
    }

    #[test]
    fn test_resolve_shares_table_entry() {
        let table = DescriptorTable::standard();
        let a = table.resolve(Archetype::Striker, AttackKind::Light);
        let b = table.resolve(Archetype::Striker, AttackKind::Light);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.priority_key(), (a.tier, a.priority));
    }

    #[test]
    fn test_json_round_trip() {
        let table = DescriptorTable::standard();
        let json = table.to_json().unwrap();
        let loaded = DescriptorTable::from_json(&json).unwrap();
        assert_eq!(
            loaded.get(Archetype::Blinker, AttackKind::Ultimate).unwrap(),
            table.get(Archetype::Blinker, AttackKind::Ultimate).unwrap()
        );
    }

    #[test]
    fn test_default_cooldowns_are_descriptor_cooldowns() {
        let table = DescriptorTable::standard();
        let cooldowns = table.default_cooldowns(Archetype::Striker);
        assert_eq!(cooldowns[&AttackKind::Heavy], 1.2);
        assert_eq!(cooldowns.len(), AttackKind::ALL.len());
    }

    #[test]
    fn test_priority_tiers_order() {
        assert!(PriorityTier::Ultimate > PriorityTier::Heavy);
        assert!((PriorityTier::Heavy, 0) > (PriorityTier::Basic, 99));
    }
}
