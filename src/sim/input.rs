//! Per-frame input intents (deterministic)
//!
//! Device polling and key mapping happen in the host; the core only sees
//! these already-mapped intents.

use serde::{Deserialize, Serialize};

/// Edge and level state of one button for this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub pressed: bool,
    pub held: bool,
    pub released: bool,
}

impl Button {
    /// Pressed this frame (and held)
    pub const fn tap() -> Self {
        Self {
            pressed: true,
            held: true,
            released: false,
        }
    }

    /// Held down from an earlier frame
    pub const fn hold() -> Self {
        Self {
            pressed: false,
            held: true,
            released: false,
        }
    }

    /// Let go this frame
    pub const fn release() -> Self {
        Self {
            pressed: false,
            held: false,
            released: true,
        }
    }

    /// Derive edges from the previous and current level
    pub fn from_levels(was_down: bool, is_down: bool) -> Self {
        Self {
            pressed: is_down && !was_down,
            held: is_down,
            released: was_down && !is_down,
        }
    }
}

/// Input commands for one combatant for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlIntent {
    /// Horizontal axis (-1 left .. 1 right)
    pub move_x: f32,
    /// Vertical axis (-1 up .. 1 down)
    pub move_y: f32,
    pub jump: Button,
    pub roll: Button,
    pub light: Button,
    pub heavy: Button,
    pub special: Button,
    pub grab: Button,
    pub ultimate: Button,
}

impl ControlIntent {
    /// Axis value treated as "holding down"
    pub fn holding_down(&self) -> bool {
        self.move_y > 0.5
    }

    pub fn holding_up(&self) -> bool {
        self.move_y < -0.5
    }
}
