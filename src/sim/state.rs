//! Combatant state and core simulation types
//!
//! Everything the frame driver mutates per combatant lives here. Attack state
//! is a tagged union per attack family so phase-specific payload only exists
//! while that family is running.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::descriptor::{Archetype, AttackKind, DescriptorRef, DescriptorTable};
use super::geom::{Facing, Rect};
use super::rhythm::RhythmCombo;
use crate::consts::*;

/// Default body size (world pixels)
pub const BODY_SIZE: Vec2 = Vec2::new(40.0, 80.0);

/// Attack sub-phase. Which phases are legal depends on the attack family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Start,
    Charge,
    Loop,
    Active,
    Release,
    Hover,
    Impact,
    Teleport,
    Finish,
    End,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Charge => "charge",
            Phase::Loop => "loop",
            Phase::Active => "active",
            Phase::Release => "release",
            Phase::Hover => "hover",
            Phase::Impact => "impact",
            Phase::Teleport => "teleport",
            Phase::Finish => "finish",
            Phase::End => "end",
        }
    }
}

/// Light / Dash / Launcher / Projectile: start -> active -> end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeAttack {
    pub phase: Phase,
    pub timer: f32,
    pub projectile_spawned: bool,
}

/// Heavy: start -> charge -> release -> end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeAttack {
    pub phase: Phase,
    pub timer: f32,
    /// Seconds spent charging
    pub charge: f32,
}

/// Slam: start -> hover -> impact -> end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlamAttack {
    pub phase: Phase,
    pub timer: f32,
}

/// Grab: start -> active (reach) -> loop (hold) -> release (throw) -> end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabAttack {
    pub phase: Phase,
    pub timer: f32,
    pub target: Option<u32>,
}

/// Ultimate variant, selected by archetype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UltimateKind {
    /// start -> active (radial pulses) -> end
    Barrage,
    /// start -> teleport -> finish -> end
    Blink,
}

impl UltimateKind {
    pub fn for_archetype(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Blinker => UltimateKind::Blink,
            Archetype::Brawler | Archetype::Striker => UltimateKind::Barrage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltimateAttack {
    pub kind: UltimateKind,
    pub phase: Phase,
    pub timer: f32,
    /// Countdown to the next damage pulse (Barrage)
    pub pulse_timer: f32,
    /// Teleport destination target (Blink)
    pub target: Option<u32>,
}

/// Family-specific attack state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttackFamily {
    Strike(StrikeAttack),
    Charge(ChargeAttack),
    Slam(SlamAttack),
    Grab(GrabAttack),
    Ultimate(UltimateAttack),
}

impl AttackFamily {
    pub fn phase(&self) -> Phase {
        match self {
            AttackFamily::Strike(a) => a.phase,
            AttackFamily::Charge(a) => a.phase,
            AttackFamily::Slam(a) => a.phase,
            AttackFamily::Grab(a) => a.phase,
            AttackFamily::Ultimate(a) => a.phase,
        }
    }

    /// Seconds spent in the current phase
    pub fn timer(&self) -> f32 {
        match self {
            AttackFamily::Strike(a) => a.timer,
            AttackFamily::Charge(a) => a.timer,
            AttackFamily::Slam(a) => a.timer,
            AttackFamily::Grab(a) => a.timer,
            AttackFamily::Ultimate(a) => a.timer,
        }
    }

    pub fn advance_timer(&mut self, dt: f32) {
        match self {
            AttackFamily::Strike(a) => a.timer += dt,
            AttackFamily::Charge(a) => a.timer += dt,
            AttackFamily::Slam(a) => a.timer += dt,
            AttackFamily::Grab(a) => a.timer += dt,
            AttackFamily::Ultimate(a) => a.timer += dt,
        }
    }

    /// Enter a phase and restart its timer
    pub fn set_phase(&mut self, phase: Phase) {
        let (p, t) = match self {
            AttackFamily::Strike(a) => (&mut a.phase, &mut a.timer),
            AttackFamily::Charge(a) => (&mut a.phase, &mut a.timer),
            AttackFamily::Slam(a) => (&mut a.phase, &mut a.timer),
            AttackFamily::Grab(a) => (&mut a.phase, &mut a.timer),
            AttackFamily::Ultimate(a) => (&mut a.phase, &mut a.timer),
        };
        *p = phase;
        *t = 0.0;
    }
}

/// The single attack a combatant may be executing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAttack {
    pub kind: AttackKind,
    pub descriptor: DescriptorRef,
    /// Input landed inside the beat window
    pub on_beat: bool,
    /// Targets already struck by this swing
    pub hit_log: Vec<u32>,
    pub family: AttackFamily,
}

impl ActiveAttack {
    pub fn new(kind: AttackKind, descriptor: DescriptorRef, on_beat: bool, archetype: Archetype) -> Self {
        let family = match kind {
            AttackKind::Light | AttackKind::Dash | AttackKind::Launcher | AttackKind::Projectile => {
                AttackFamily::Strike(StrikeAttack {
                    phase: Phase::Start,
                    timer: 0.0,
                    projectile_spawned: false,
                })
            }
            AttackKind::Heavy => AttackFamily::Charge(ChargeAttack {
                phase: Phase::Start,
                timer: 0.0,
                charge: 0.0,
            }),
            AttackKind::Slam => AttackFamily::Slam(SlamAttack {
                phase: Phase::Start,
                timer: 0.0,
            }),
            AttackKind::Grab => AttackFamily::Grab(GrabAttack {
                phase: Phase::Start,
                timer: 0.0,
                target: None,
            }),
            AttackKind::Ultimate => AttackFamily::Ultimate(UltimateAttack {
                kind: UltimateKind::for_archetype(archetype),
                phase: Phase::Start,
                timer: 0.0,
                pulse_timer: 0.0,
                target: None,
            }),
        };
        Self {
            kind,
            descriptor,
            on_beat,
            hit_log: Vec::new(),
            family,
        }
    }

    pub fn phase(&self) -> Phase {
        self.family.phase()
    }

    /// Charge ratio for charge-family attacks (0 otherwise)
    pub fn charge_seconds(&self) -> f32 {
        match &self.family {
            AttackFamily::Charge(c) => c.charge,
            _ => 0.0,
        }
    }

    /// Phases that have committed the attacker (cannot be grabbed out of)
    pub fn is_committed(&self) -> bool {
        matches!(
            (&self.family, self.phase()),
            (AttackFamily::Charge(_), Phase::Release) | (AttackFamily::Slam(_), Phase::Impact)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollKind {
    Ground,
    AirDodge,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roll {
    pub kind: RollKind,
    pub timer: f32,
    pub duration: f32,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum WallState {
    #[default]
    None,
    /// Clinging to a wall on `side`
    Cling { side: Facing, timer: f32 },
    /// Pushed off a wall; horizontal input ignored until the timer ends
    Launch { timer: f32 },
}

/// Link from a grabbed combatant to its grabber
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrabLink {
    pub by: u32,
    pub elapsed: f32,
}

/// Why a combatant is invincible. Later variants outrank earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvincibilitySource {
    Hazard,
    Respawn,
    Roll,
    Ultimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Invincibility {
    pub timer: f32,
    pub source: InvincibilitySource,
    /// Pending grace granted after a respawn freeze
    pub paused: bool,
}

/// Lateral soft kill tracking
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct KillZoneState {
    pub outside: bool,
    pub timer: f32,
}

/// Ultimate meter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UltimateMeter {
    pub current: f32,
    pub max: f32,
}

impl Default for UltimateMeter {
    fn default() -> Self {
        Self {
            current: 0.0,
            max: ULTIMATE_METER_MAX,
        }
    }
}

impl UltimateMeter {
    pub fn gain(&mut self, amount: f32) {
        self.current = (self.current + amount).clamp(0.0, self.max);
    }

    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }
}

/// A fighter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: u32,
    pub archetype: Archetype,
    /// Controller slot
    pub slot: u8,

    // Kinematics (pos is the body's top-left corner)
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub facing: Facing,
    pub grounded: bool,
    pub air_jumps: u8,

    // Health
    pub percent: f32,
    pub stocks: u8,
    pub eliminated: bool,

    // Combat
    pub attack: Option<ActiveAttack>,
    pub stun: f32,
    pub invincibility: Option<Invincibility>,
    pub roll: Option<Roll>,
    pub roll_cooldown: f32,
    pub wall: WallState,
    pub grabbed: Option<GrabLink>,

    // Resources
    pub cooldowns: HashMap<AttackKind, f32>,
    pub meter: UltimateMeter,
    pub rhythm: RhythmCombo,

    // Environment
    pub kill_zone: KillZoneState,
    /// Movement freeze after respawn
    pub respawn_freeze: f32,
    /// Semisolid platforms ignored while positive
    pub drop_through: f32,
    /// Inside a special-zone pixel this frame
    pub in_special_zone: bool,
    pub spawn: Vec2,
}

impl Combatant {
    pub fn new(
        id: u32,
        slot: u8,
        archetype: Archetype,
        spawn: Vec2,
        stocks: u8,
        descriptors: &DescriptorTable,
    ) -> Self {
        Self {
            id,
            archetype,
            slot,
            pos: spawn,
            vel: Vec2::ZERO,
            size: BODY_SIZE,
            facing: if slot % 2 == 0 { Facing::Right } else { Facing::Left },
            grounded: false,
            air_jumps: AIR_JUMPS,
            percent: 0.0,
            stocks,
            eliminated: false,
            attack: None,
            stun: 0.0,
            invincibility: None,
            roll: None,
            roll_cooldown: 0.0,
            wall: WallState::None,
            grabbed: None,
            cooldowns: descriptors.default_cooldowns(archetype),
            meter: UltimateMeter::default(),
            rhythm: RhythmCombo::default(),
            kill_zone: KillZoneState::default(),
            respawn_freeze: 0.0,
            drop_through: 0.0,
            in_special_zone: false,
            spawn,
        }
    }

    pub fn body_rect(&self) -> Rect {
        Rect::from_pos_size(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + self.size * 0.5
    }

    pub fn is_invincible(&self) -> bool {
        self.invincibility.is_some()
    }

    pub fn is_stunned(&self) -> bool {
        self.stun > 0.0
    }

    pub fn is_frozen(&self) -> bool {
        self.respawn_freeze > 0.0
    }

    pub fn is_grabbed(&self) -> bool {
        self.grabbed.is_some()
    }

    pub fn cooldown(&self, kind: AttackKind) -> f32 {
        self.cooldowns.get(&kind).copied().unwrap_or(0.0)
    }

    /// Id of the combatant held by this one's grab, if any
    pub fn holding(&self) -> Option<u32> {
        match self.attack.as_ref().map(|a| &a.family) {
            Some(AttackFamily::Grab(g)) if matches!(g.phase, Phase::Loop | Phase::Release) => g.target,
            _ => None,
        }
    }

    /// Air dodges, slam hovers and ultimates suspend gravity
    pub fn ignores_gravity(&self) -> bool {
        if self.roll.is_some_and(|r| r.kind == RollKind::AirDodge) {
            return true;
        }
        match self.attack.as_ref().map(|a| (&a.family, a.phase())) {
            Some((AttackFamily::Slam(_), Phase::Start | Phase::Hover)) => true,
            Some((AttackFamily::Ultimate(_), phase)) => phase != Phase::End,
            _ => false,
        }
    }

    /// Grant invincibility unless a higher-priority source already holds it
    pub fn grant_invincibility(&mut self, seconds: f32, source: InvincibilitySource) {
        match self.invincibility {
            Some(current) if current.source > source => {}
            Some(current) if current.source == source => {
                self.invincibility = Some(Invincibility {
                    timer: current.timer.max(seconds),
                    ..current
                });
            }
            _ => {
                self.invincibility = Some(Invincibility {
                    timer: seconds,
                    source,
                    paused: false,
                });
            }
        }
    }

    /// Drop invincibility from one source
    pub fn clear_invincibility(&mut self, source: InvincibilitySource) {
        if self.invincibility.is_some_and(|i| i.source == source) {
            self.invincibility = None;
        }
    }

    /// Tick invincibility; paused timers wait for the respawn freeze to end
    pub fn tick_invincibility(&mut self, dt: f32) {
        if let Some(inv) = &mut self.invincibility {
            if inv.paused {
                if self.respawn_freeze <= 0.0 {
                    inv.paused = false;
                }
                return;
            }
            inv.timer -= dt;
            if inv.timer <= 0.0 {
                self.invincibility = None;
            }
        }
    }

    /// Put back at spawn after a kill-zone death
    pub fn respawn(&mut self, freeze: f32, grace: f32, descriptors: &DescriptorTable) {
        self.pos = self.spawn;
        self.vel = Vec2::ZERO;
        self.percent = 0.0;
        self.grounded = false;
        self.air_jumps = AIR_JUMPS;
        self.attack = None;
        self.stun = 0.0;
        self.roll = None;
        self.wall = WallState::None;
        self.grabbed = None;
        self.kill_zone = KillZoneState::default();
        self.drop_through = 0.0;
        self.respawn_freeze = freeze;
        self.cooldowns = descriptors.default_cooldowns(self.archetype);
        self.rhythm = RhythmCombo::default();
        // Freeze counts down first, then the grace window
        self.invincibility = Some(Invincibility {
            timer: grace,
            source: InvincibilitySource::Respawn,
            paused: freeze > 0.0,
        });
    }

    /// Full reset for a match restart
    pub fn reset(&mut self, stocks: u8, descriptors: &DescriptorTable) {
        self.respawn(0.0, 0.0, descriptors);
        self.invincibility = None;
        self.stocks = stocks;
        self.eliminated = false;
        self.meter = UltimateMeter::default();
        self.roll_cooldown = 0.0;
        self.facing = if self.slot % 2 == 0 { Facing::Right } else { Facing::Left };
    }

    /// Animation state name and attack phase for the animation collaborator
    pub fn animation_state(&self) -> (&'static str, Option<Phase>) {
        if self.eliminated {
            return ("eliminated", None);
        }
        if self.is_frozen() {
            return ("respawning", None);
        }
        if self.is_grabbed() {
            return ("grabbed", None);
        }
        if self.is_stunned() {
            return ("stunned", None);
        }
        if let Some(attack) = &self.attack {
            return (attack.kind.name(), Some(attack.phase()));
        }
        if let Some(roll) = &self.roll {
            return match roll.kind {
                RollKind::Ground => ("roll", None),
                RollKind::AirDodge => ("air_dodge", None),
            };
        }
        match self.wall {
            WallState::Cling { .. } => return ("wall_cling", None),
            WallState::Launch { .. } => return ("wall_launch", None),
            WallState::None => {}
        }
        let name = match (self.grounded, self.vel.x.abs() > 1.0, self.vel.y < 0.0) {
            (true, false, _) => "idle",
            (true, true, _) => "run",
            (false, _, true) => "rise",
            (false, _, false) => "fall",
        };
        (name, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combatant() -> Combatant {
        Combatant::new(
            1,
            0,
            Archetype::Striker,
            Vec2::new(100.0, 100.0),
            3,
            &DescriptorTable::standard(),
        )
    }

    #[test]
    fn test_invincibility_priority() {
        let mut c = combatant();
        c.grant_invincibility(1.0, InvincibilitySource::Ultimate);
        c.grant_invincibility(5.0, InvincibilitySource::Roll);
        let inv = c.invincibility.unwrap();
        assert_eq!(inv.source, InvincibilitySource::Ultimate);
        assert_eq!(inv.timer, 1.0);

        // Same source extends
        c.grant_invincibility(2.0, InvincibilitySource::Ultimate);
        assert_eq!(c.invincibility.unwrap().timer, 2.0);

        // Clearing another source is a no-op
        c.clear_invincibility(InvincibilitySource::Roll);
        assert!(c.is_invincible());
        c.clear_invincibility(InvincibilitySource::Ultimate);
        assert!(!c.is_invincible());
    }

    #[test]
    fn test_respawn_grace_waits_for_freeze() {
        let descriptors = DescriptorTable::standard();
        let mut c = combatant();
        c.percent = 120.0;
        c.vel = Vec2::new(300.0, -200.0);
        c.respawn(1.0, 2.0, &descriptors);

        assert_eq!(c.percent, 0.0);
        assert_eq!(c.vel, Vec2::ZERO);
        assert!(c.is_invincible());
        assert!(c.cooldown(AttackKind::Heavy) > 0.0);

        // Freeze still running: grace does not tick
        c.respawn_freeze = 0.5;
        c.tick_invincibility(0.5);
        assert_eq!(c.invincibility.unwrap().timer, 2.0);

        c.respawn_freeze = 0.0;
        c.tick_invincibility(0.0); // unpause
        c.tick_invincibility(1.0);
        assert!(c.is_invincible());
        c.tick_invincibility(1.1);
        assert!(!c.is_invincible());
    }

    #[test]
    fn test_animation_state_names() {
        let mut c = combatant();
        c.grounded = true;
        assert_eq!(c.animation_state().0, "idle");
        c.vel.x = 200.0;
        assert_eq!(c.animation_state().0, "run");
        c.grounded = false;
        c.vel.y = -10.0;
        assert_eq!(c.animation_state().0, "rise");

        let desc = DescriptorTable::standard().resolve(Archetype::Striker, AttackKind::Heavy);
        c.attack = Some(ActiveAttack::new(AttackKind::Heavy, desc, false, Archetype::Striker));
        assert_eq!(c.animation_state(), ("heavy", Some(Phase::Start)));

        c.stun = 0.3;
        assert_eq!(c.animation_state().0, "stunned");
    }

    #[test]
    fn test_committed_phases() {
        let desc = DescriptorTable::standard().resolve(Archetype::Striker, AttackKind::Slam);
        let mut attack = ActiveAttack::new(AttackKind::Slam, desc, false, Archetype::Striker);
        assert!(!attack.is_committed());
        attack.family.set_phase(Phase::Impact);
        assert!(attack.is_committed());
    }

    #[test]
    fn test_ultimate_kind_by_archetype() {
        assert_eq!(UltimateKind::for_archetype(Archetype::Blinker), UltimateKind::Blink);
        assert_eq!(UltimateKind::for_archetype(Archetype::Brawler), UltimateKind::Barrage);
    }
}
