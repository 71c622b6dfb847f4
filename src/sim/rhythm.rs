//! Rhythm clock and beat classification
//!
//! Beat phase comes from the music time when the audio collaborator provides
//! one, otherwise from wall-clock time since the stage started.

use serde::{Deserialize, Serialize};

use crate::consts::{
    BEAT_PERFECT_FRACTION, BEAT_WINDOW_FRACTION, BEATS_PER_BAR, MAX_RHYTHM_STACKS,
};

/// Scoring quality of an input's timing. There is deliberately no middle tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeatQuality {
    Perfect,
    Miss,
}

/// Milliseconds between beats
#[inline]
pub fn beat_interval_ms(bpm: f64) -> f64 {
    60_000.0 / bpm
}

/// Distance (ms) from `time_ms` to the nearest beat
fn distance_to_beat(time_ms: f64, bpm: f64, offset_ms: f64) -> Option<f64> {
    if bpm.is_nan() || bpm <= 0.0 || !time_ms.is_finite() {
        return None;
    }
    let interval = beat_interval_ms(bpm);
    let since_last = (time_ms + offset_ms).rem_euclid(interval);
    Some(since_last.min(interval - since_last))
}

/// Classify an instant with an explicit perfect fraction
pub fn classify_beat_with(time_ms: f64, bpm: f64, offset_ms: f64, fraction: f64) -> BeatQuality {
    match distance_to_beat(time_ms, bpm, offset_ms) {
        Some(d) if d <= fraction * beat_interval_ms(bpm) => BeatQuality::Perfect,
        _ => BeatQuality::Miss,
    }
}

/// Classify an instant using the default perfect window
pub fn classify_beat(time_ms: f64, bpm: f64, offset_ms: f64) -> BeatQuality {
    classify_beat_with(time_ms, bpm, offset_ms, BEAT_PERFECT_FRACTION)
}

/// Wider boolean on-beat check used by gameplay bonuses
pub fn is_in_beat_window(time_ms: f64, bpm: f64, offset_ms: f64) -> bool {
    distance_to_beat(time_ms, bpm, offset_ms)
        .is_some_and(|d| d <= BEAT_WINDOW_FRACTION * beat_interval_ms(bpm))
}

/// Per-stage tempo plus the wall-clock fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhythmClock {
    pub bpm: f64,
    pub offset_ms: f64,
    pub perfect_fraction: f64,
    pub window_fraction: f64,
    /// Wall-clock time since stage start (ms)
    pub stage_elapsed_ms: f64,
}

impl RhythmClock {
    pub fn new(bpm: f64, offset_ms: f64) -> Self {
        Self {
            bpm,
            offset_ms,
            perfect_fraction: BEAT_PERFECT_FRACTION,
            window_fraction: BEAT_WINDOW_FRACTION,
            stage_elapsed_ms: 0.0,
        }
    }

    /// Advance the fallback clock
    pub fn advance(&mut self, dt: f32) {
        self.stage_elapsed_ms += dt as f64 * 1000.0;
    }

    pub fn reset(&mut self) {
        self.stage_elapsed_ms = 0.0;
    }

    /// Music time if available, else wall-clock since stage start
    pub fn effective_time(&self, music_time_ms: f64) -> f64 {
        if music_time_ms > 0.0 && music_time_ms.is_finite() {
            music_time_ms
        } else {
            self.stage_elapsed_ms
        }
    }

    pub fn classify(&self, music_time_ms: f64) -> BeatQuality {
        classify_beat_with(
            self.effective_time(music_time_ms),
            self.bpm,
            self.offset_ms,
            self.perfect_fraction,
        )
    }

    pub fn in_window(&self, music_time_ms: f64) -> bool {
        distance_to_beat(self.effective_time(music_time_ms), self.bpm, self.offset_ms)
            .is_some_and(|d| d <= self.window_fraction * beat_interval_ms(self.bpm))
    }
}

/// Per-combatant rhythm combo accumulator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhythmCombo {
    /// Consecutive perfect inputs
    pub streak: u32,
    /// Perfect inputs counted toward the current bar
    pub bar_progress: u32,
    /// Banked rhythm charge stacks, consumed on hit
    pub charge_stacks: u32,
}

impl RhythmCombo {
    /// Record one attack input's timing
    pub fn record(&mut self, quality: BeatQuality) {
        match quality {
            BeatQuality::Perfect => {
                self.streak += 1;
                self.bar_progress += 1;
                if self.bar_progress >= BEATS_PER_BAR {
                    self.bar_progress = 0;
                    self.charge_stacks = (self.charge_stacks + 1).min(MAX_RHYTHM_STACKS);
                }
            }
            BeatQuality::Miss => {
                self.streak = 0;
                self.bar_progress = 0;
            }
        }
    }

    /// Finisher damage / knockback multiplier
    pub fn multiplier(&self) -> f32 {
        1.0 + self.streak.min(10) as f32 * 0.1
    }

    /// Take all banked stacks
    pub fn consume_stacks(&mut self) -> u32 {
        std::mem::take(&mut self.charge_stacks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_beat_and_half_beat() {
        assert_eq!(classify_beat(0.0, 120.0, 0.0), BeatQuality::Perfect);
        assert_eq!(classify_beat(250.0, 120.0, 0.0), BeatQuality::Miss);
    }

    #[test]
    fn test_perfect_window_edges() {
        // 24% of 500ms = 120ms either side
        assert_eq!(classify_beat(119.0, 120.0, 0.0), BeatQuality::Perfect);
        assert_eq!(classify_beat(381.0, 120.0, 0.0), BeatQuality::Perfect);
        assert_eq!(classify_beat(121.0, 120.0, 0.0), BeatQuality::Miss);
    }

    #[test]
    fn test_window_is_wider_than_perfect() {
        // 123ms: outside perfect (120) but inside the 125ms window
        assert_eq!(classify_beat(123.0, 120.0, 0.0), BeatQuality::Miss);
        assert!(is_in_beat_window(123.0, 120.0, 0.0));
        assert!(!is_in_beat_window(126.0, 120.0, 0.0));
    }

    #[test]
    fn test_offset_shifts_beats() {
        assert_eq!(classify_beat(250.0, 120.0, 250.0), BeatQuality::Perfect);
        assert_eq!(classify_beat(0.0, 120.0, 250.0), BeatQuality::Miss);
    }

    #[test]
    fn test_invalid_tempo_is_miss() {
        assert_eq!(classify_beat(0.0, 0.0, 0.0), BeatQuality::Miss);
        assert!(!is_in_beat_window(0.0, -10.0, 0.0));
    }

    #[test]
    fn test_zero_music_time_falls_back_to_wall_clock() {
        let mut clock = RhythmClock::new(120.0, 0.0);
        clock.advance(0.25);
        // Music unavailable: stage clock says half-beat
        assert_eq!(clock.classify(0.0), BeatQuality::Miss);
        // Music available: trust it
        assert_eq!(clock.classify(1000.0), BeatQuality::Perfect);
        clock.advance(0.25);
        assert_eq!(clock.classify(0.0), BeatQuality::Perfect);
    }

    #[test]
    fn test_combo_bar_grants_stack() {
        let mut combo = RhythmCombo::default();
        for _ in 0..BEATS_PER_BAR {
            combo.record(BeatQuality::Perfect);
        }
        assert_eq!(combo.charge_stacks, 1);
        assert_eq!(combo.bar_progress, 0);
        assert!((combo.multiplier() - 1.4).abs() < 1e-6);

        combo.record(BeatQuality::Miss);
        assert_eq!(combo.streak, 0);
        assert_eq!(combo.charge_stacks, 1);
        assert_eq!(combo.consume_stacks(), 1);
        assert_eq!(combo.charge_stacks, 0);
    }
}
