//! Contracts with the collaborators around the core
//!
//! Inputs come from the host (hurtbox geometry, music time); outputs are plain
//! data the renderer, animation and audio layers consume after each frame.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::geom::{Facing, Rect};
use super::state::{Combatant, Phase};

/// Hurtbox geometry supplied by the animation collaborator
pub trait HurtboxProvider {
    /// World-space hurtbox; defaults to the collision body
    fn hurtbox(&self, combatant: &Combatant) -> Rect {
        combatant.body_rect()
    }
}

/// Current music position
pub trait MusicClock {
    /// Milliseconds into the track, or 0 when nothing is playing
    fn music_time_ms(&self) -> f64 {
        0.0
    }
}

/// Host without animation data or music: body hurtboxes, wall-clock beats
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl HurtboxProvider for Headless {}
impl MusicClock for Headless {}

/// Host that reports a fixed music time
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMusic(pub f64);

impl HurtboxProvider for FixedMusic {}

impl MusicClock for FixedMusic {
    fn music_time_ms(&self) -> f64 {
        self.0
    }
}

/// A named visual/audio effect for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRequest {
    pub name: String,
    pub pos: Vec2,
    pub facing: Option<Facing>,
    pub scale: f32,
}

impl EffectRequest {
    pub fn at(name: impl Into<String>, pos: Vec2) -> Self {
        Self {
            name: name.into(),
            pos,
            facing: None,
            scale: 1.0,
        }
    }

    pub fn facing(mut self, facing: Facing) -> Self {
        self.facing = Some(facing);
        self
    }

    pub fn scaled(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// How a combatant left the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KillCause {
    /// Lateral countdown expired
    SoftKill,
    /// Crossed the vertical margin
    HardKill,
    /// Touched a kill-colored pixel
    KillPixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillEvent {
    pub id: u32,
    pub cause: KillCause,
    pub stocks_left: u8,
}

/// Per-combatant frame output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatantView {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub facing: Facing,
    pub grounded: bool,
    pub animation: &'static str,
    pub phase: Option<Phase>,
    pub percent: f32,
    pub stocks: u8,
    pub stunned: bool,
    pub invincible: bool,
    pub eliminated: bool,
    pub in_special_zone: bool,
    /// Ultimate meter fill in [0, 1]
    pub meter: f32,
}

impl CombatantView {
    pub fn of(c: &Combatant) -> Self {
        let (animation, phase) = c.animation_state();
        Self {
            id: c.id,
            pos: c.pos,
            vel: c.vel,
            facing: c.facing,
            grounded: c.grounded,
            animation,
            phase,
            percent: c.percent,
            stocks: c.stocks,
            stunned: c.is_stunned(),
            invincible: c.is_invincible(),
            eliminated: c.eliminated,
            in_special_zone: c.in_special_zone,
            meter: if c.meter.max > 0.0 {
                c.meter.current / c.meter.max
            } else {
                0.0
            },
        }
    }
}

/// Everything the core exposes after one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    /// Clamped frame delta
    pub dt: f32,
    /// Delta after slow motion scaling
    pub sim_dt: f32,
    pub combatants: Vec<CombatantView>,
    pub effects: Vec<EffectRequest>,
    pub kills: Vec<KillEvent>,
    pub clanks: u32,
    /// Set once at most one combatant remains
    pub winner: Option<u32>,
    pub match_over: bool,
}
