//! Simulation settings
//!
//! Tunables the host may override per match. Defaults mirror [`crate::consts`].

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::SimResult;

/// Simulation tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // === Physics ===
    /// Gravity (pixels/s²)
    pub gravity: f32,
    /// Terminal fall speed
    pub max_fall_speed: f32,
    /// Largest per-substep displacement
    pub max_step_pixels: f32,

    // === Kill zones ===
    /// Lateral soft kill margin beyond stage bounds
    pub soft_kill_margin: f32,
    /// Countdown before a soft kill
    pub soft_kill_seconds: f32,
    /// Vertical hard kill margin beyond stage top/bottom
    pub hard_kill_margin: f32,

    // === Lifecycle ===
    /// Starting stocks per combatant
    pub stocks: u8,
    /// Movement freeze after respawn
    pub respawn_freeze_seconds: f32,
    /// Invincibility following the freeze
    pub respawn_grace_seconds: f32,
    /// Grabbed failsafe release
    pub grab_timeout_seconds: f32,

    // === Rhythm ===
    /// Perfect window as a fraction of the beat interval
    pub beat_perfect_fraction: f64,
    /// On-beat window as a fraction of the beat interval
    pub beat_window_fraction: f64,

    // === Frame driver ===
    /// Frames after start during which dt is clamped
    pub startup_clamp_frames: u32,
    /// Slow motion time scale
    pub slow_motion_scale: f32,
    /// Seed for launcher jitter
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            max_fall_speed: MAX_FALL_SPEED,
            max_step_pixels: MAX_STEP_PIXELS,

            soft_kill_margin: SOFT_KILL_MARGIN,
            soft_kill_seconds: SOFT_KILL_SECONDS,
            hard_kill_margin: HARD_KILL_MARGIN,

            stocks: STARTING_STOCKS,
            respawn_freeze_seconds: RESPAWN_FREEZE_SECONDS,
            respawn_grace_seconds: RESPAWN_GRACE_SECONDS,
            grab_timeout_seconds: GRAB_TIMEOUT_SECONDS,

            beat_perfect_fraction: BEAT_PERFECT_FRACTION,
            beat_window_fraction: BEAT_WINDOW_FRACTION,

            startup_clamp_frames: STARTUP_CLAMP_FRAMES,
            slow_motion_scale: SLOW_MOTION_SCALE,
            seed: 0x5eed,
        }
    }
}

impl Settings {
    /// Parse settings from JSON (missing fields take defaults)
    pub fn from_json(json: &str) -> SimResult<Self> {
        let settings = serde_json::from_str(json)?;
        log::info!("Loaded simulation settings");
        Ok(settings)
    }

    /// Serialize settings to JSON
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Effective dt for a frame, clamped during startup
    pub fn clamp_dt(&self, dt: f32, frames_since_start: u32) -> f32 {
        let dt = dt.clamp(0.0, MAX_DT);
        if frames_since_start < self.startup_clamp_frames {
            dt.min(SIM_DT)
        } else {
            dt
        }
    }
}
