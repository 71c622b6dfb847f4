//! Beat Clash - rhythm platform fighter simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (terrain masks, movement, combat, rhythm)
//! - `settings`: Data-driven simulation tuning
//! - `error`: Typed errors for mask decoding, descriptor lookup and config
//!
//! Rendering, audio, input polling and persistence live outside this crate
//! and talk to it through the traits in [`sim::host`].

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{DescriptorError, MaskError, SimError};
pub use settings::Settings;

use glam::Vec2;

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, one tick per rendered frame)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Largest delta ever fed to the integrator
    pub const MAX_DT: f32 = 1.0 / 20.0;
    /// Frames after (re)start during which dt is clamped to `SIM_DT`
    pub const STARTUP_CLAMP_FRAMES: u32 = 10;

    /// Largest distance a body may move in one substep (world pixels)
    pub const MAX_STEP_PIXELS: f32 = 4.0;
    /// Hard cap on substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 64;

    /// Gravity (pixels/s², y points down)
    pub const GRAVITY: f32 = 1800.0;
    /// Terminal fall speed
    pub const MAX_FALL_SPEED: f32 = 1100.0;
    /// Horizontal drag while airborne (pixels/s²)
    pub const AIR_DRAG: f32 = 400.0;
    /// Ground friction when no movement input (pixels/s²)
    pub const GROUND_FRICTION: f32 = 2600.0;
    /// Ground acceleration toward target run speed
    pub const RUN_ACCEL: f32 = 3000.0;
    /// Air acceleration toward target drift speed
    pub const AIR_ACCEL: f32 = 1600.0;
    /// Top run speed
    pub const RUN_SPEED: f32 = 320.0;
    /// Top air drift speed
    pub const AIR_SPEED: f32 = 280.0;
    /// Jump launch speed
    pub const JUMP_SPEED: f32 = 720.0;
    /// Air jumps restored on landing
    pub const AIR_JUMPS: u8 = 1;

    /// Wall slide fall speed cap while clinging
    pub const WALL_SLIDE_SPEED: f32 = 120.0;
    /// Maximum time a combatant can cling before sliding off
    pub const WALL_CLING_SECONDS: f32 = 1.5;
    /// Wall launch velocity (away from wall, up)
    pub const WALL_LAUNCH_SPEED: (f32, f32) = (420.0, 680.0);
    /// Time horizontal input is ignored after a wall launch
    pub const WALL_LAUNCH_SECONDS: f32 = 0.2;

    /// Ground roll duration / speed
    pub const ROLL_SECONDS: f32 = 0.35;
    pub const ROLL_SPEED: f32 = 460.0;
    /// Air dodge duration / speed
    pub const AIR_DODGE_SECONDS: f32 = 0.3;
    pub const AIR_DODGE_SPEED: f32 = 520.0;
    /// Fraction of a roll/dodge that is invincible (from its start)
    pub const ROLL_INVINCIBLE_FRACTION: f32 = 0.7;
    /// Cooldown before another roll
    pub const ROLL_COOLDOWN: f32 = 0.5;
    /// Drop-through window for semisolid platforms
    pub const DROP_THROUGH_SECONDS: f32 = 0.25;

    /// Ceiling bonk velocity retention while airborne
    pub const CEILING_RETENTION: f32 = 0.3;
    /// Bounce surface velocity retention
    pub const BOUNCE_RETENTION: f32 = 0.85;
    /// Minimum rebound speed off a bounce surface
    pub const BOUNCE_MIN_SPEED: f32 = 600.0;
    /// Tumbling combatants rebound off ground faster than this
    pub const TUMBLE_BOUNCE_SPEED: f32 = 700.0;
    /// Horizontal displacement multiplier inside speed zones
    pub const SPEED_ZONE_MULTIPLIER: f32 = 1.6;
    /// Hazard contact damage (percent) and pop-up speed
    pub const HAZARD_DAMAGE: f32 = 8.0;
    pub const HAZARD_POP_SPEED: f32 = 650.0;
    /// Invincibility after touching a hazard
    pub const HAZARD_GRACE_SECONDS: f32 = 0.6;

    /// Lateral soft kill margin beyond stage bounds (world pixels)
    pub const SOFT_KILL_MARGIN: f32 = 160.0;
    /// Grace period before a soft kill
    pub const SOFT_KILL_SECONDS: f32 = 2.0;
    /// Vertical hard kill margin beyond stage top/bottom
    pub const HARD_KILL_MARGIN: f32 = 240.0;

    /// Movement freeze after respawn
    pub const RESPAWN_FREEZE_SECONDS: f32 = 1.0;
    /// Invincibility after the freeze ends
    pub const RESPAWN_GRACE_SECONDS: f32 = 2.0;
    /// Starting stocks
    pub const STARTING_STOCKS: u8 = 3;

    /// Grabbed failsafe auto-release
    pub const GRAB_TIMEOUT_SECONDS: f32 = 5.0;
    /// Hold duration before an automatic throw
    pub const GRAB_HOLD_SECONDS: f32 = 0.8;

    /// Fixed global knockback boost
    pub const KNOCKBACK_BOOST: f32 = 1.25;
    /// Knockback bonus for on-beat inputs
    pub const BEAT_KNOCKBACK_BONUS: f32 = 1.10;
    /// Per-stack weight of the logarithmic rhythm charge bonus
    pub const RHYTHM_STACK_WEIGHT: f32 = 0.25;
    /// Default percent scaling exponent
    pub const DEFAULT_KNOCKBACK_EXPONENT: f32 = 0.75;
    /// Knockback units to velocity (pixels/s per unit)
    pub const KNOCKBACK_TO_VELOCITY: f32 = 8.0;
    /// Launcher horizontal jitter (degrees, symmetric)
    pub const LAUNCHER_JITTER_DEGREES: f32 = 6.0;
    /// Dash attacker follow-through speed
    pub const DASH_FOLLOW_SPEED: f32 = 240.0;
    /// Ground speed at which light becomes a dash attack
    pub const DASH_ATTACK_SPEED: f32 = 256.0;

    /// Seconds between barrage ultimate pulses
    pub const ULTIMATE_PULSE_SECONDS: f32 = 0.3;
    /// Gap left behind the target by a blink ultimate
    pub const BLINK_GAP: f32 = 8.0;

    /// Fraction of the beat interval counted as "perfect" either side of a beat
    pub const BEAT_PERFECT_FRACTION: f64 = 0.24;
    /// Wider symmetric window for the boolean on-beat check
    pub const BEAT_WINDOW_FRACTION: f64 = 0.25;
    /// Perfect inputs per rhythm bar
    pub const BEATS_PER_BAR: u32 = 4;
    /// Maximum rhythm charge stacks
    pub const MAX_RHYTHM_STACKS: u32 = 3;

    /// Ultimate meter capacity
    pub const ULTIMATE_METER_MAX: f32 = 100.0;
    /// Meter gain per damage dealt / taken
    pub const METER_GAIN_DEALT: f32 = 1.0;
    pub const METER_GAIN_TAKEN: f32 = 0.5;

    /// Slow motion time scale
    pub const SLOW_MOTION_SCALE: f32 = 0.35;

    /// Mask color match tolerance per channel
    pub const COLOR_TOLERANCE: u8 = 2;
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Move `current` toward `target` by at most `max_delta`
#[inline]
pub fn approach(current: f32, target: f32, max_delta: f32) -> f32 {
    if current < target {
        (current + max_delta).min(target)
    } else {
        (current - max_delta).max(target)
    }
}

/// Unit vector for an angle in degrees measured up from the +x axis
/// (y points down in world space)
#[inline]
pub fn launch_direction(angle_degrees: f32) -> Vec2 {
    let rad = angle_degrees.to_radians();
    Vec2::new(rad.cos(), -rad.sin())
}
