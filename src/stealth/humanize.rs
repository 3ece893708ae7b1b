//! Human behavior simulation for anti-detection
//!
//! This module adds realistic variance to automated actions to avoid
//! bot detection heuristics used by games.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::ScreenControl;

/// Human reaction time range in milliseconds
const MIN_REACTION_TIME_MS: u64 = 180;
const MAX_REACTION_TIME_MS: u64 = 350;

/// Visual processing time range
const MIN_PROCESSING_TIME_MS: u64 = 100;
const MAX_PROCESSING_TIME_MS: u64 = 300;

/// Humanizer for generating realistic timing and positions
pub struct Humanizer {
    rng: StdRng,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    /// Create a new humanizer
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self::seeded(seed)
    }

    /// Create a humanizer with a fixed seed, for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick a delay from an inclusive (min, max) millisecond range
    pub fn between(&mut self, range: (u64, u64)) -> u64 {
        let (min, max) = range;
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Get a humanized delay for an action
    ///
    /// Combines reaction time + visual processing time + occasional hesitation
    pub fn get_action_delay(&mut self) -> u64 {
        let reaction_time = self
            .rng
            .random_range(MIN_REACTION_TIME_MS..=MAX_REACTION_TIME_MS);
        let processing_time = self
            .rng
            .random_range(MIN_PROCESSING_TIME_MS..=MAX_PROCESSING_TIME_MS);

        // 5% chance of hesitation (200-800ms)
        let hesitation = if self.rng.random::<f32>() < 0.05 {
            self.rng.random_range(200..=800)
        } else {
            0
        };

        reaction_time + processing_time + hesitation
    }

    /// Get delay between consecutive quick actions
    pub fn get_consecutive_delay(&mut self) -> u64 {
        self.rng.random_range(80..=250)
    }

    /// Humanize a delay with variance
    pub fn humanize_delay(&mut self, base_delay_ms: u64, variance_percent: u32) -> u64 {
        if variance_percent == 0 {
            return base_delay_ms;
        }

        let variance = (base_delay_ms as f64 * variance_percent as f64 / 100.0) as i64;
        let offset = self.rng.random_range(-variance..=variance);

        (base_delay_ms as i64 + offset).max(50) as u64
    }

    /// Humanize tap position with slight offset
    /// Returns (offset_x, offset_y) to add to the target position
    pub fn humanize_position(&mut self, max_offset: i32) -> (i32, i32) {
        if max_offset == 0 {
            return (0, 0);
        }

        // Use gaussian-like distribution for more realistic spread
        let offset_x = self.gaussian_offset(max_offset);
        let offset_y = self.gaussian_offset(max_offset);

        (offset_x, offset_y)
    }

    /// Generate gaussian-distributed offset
    fn gaussian_offset(&mut self, max_offset: i32) -> i32 {
        // Simple approximation using sum of uniform randoms
        let sum: f32 = (0..3).map(|_| self.rng.random::<f32>() - 0.5).sum();

        (sum * max_offset as f32 * 0.67) as i32
    }

    /// Check if a micro-pause should occur
    pub fn should_micro_pause(&mut self, probability: f32) -> bool {
        self.rng.random::<f32>() < probability
    }

    /// Get micro-pause duration
    pub fn get_micro_pause_duration(&mut self) -> u64 {
        self.rng.random_range(500..=2000)
    }

    /// Get confirmation button delay (humans pause before important clicks)
    pub fn get_confirmation_delay(&mut self) -> u64 {
        self.rng.random_range(150..=400)
    }

    /// Check if a break should be taken after attacks
    pub fn should_take_break(&mut self, attacks_completed: u32) -> bool {
        if attacks_completed > 0 && attacks_completed.is_multiple_of(5) {
            self.rng.random::<f32>() < 0.15
        } else {
            false
        }
    }

    /// Get break duration
    pub fn get_break_duration(&mut self) -> u64 {
        self.rng.random_range(3000..=10000)
    }
}

/// A tap with humanized position and pre-delay
#[derive(Debug, Clone, Copy)]
pub struct HumanizedTap {
    /// X coordinate (possibly offset)
    pub x: i32,
    /// Y coordinate (possibly offset)
    pub y: i32,
    /// Pre-tap delay in ms
    pub pre_delay_ms: u64,
}

impl HumanizedTap {
    /// Build a tap near the target with a delay from the given range
    pub fn at(
        humanizer: &mut Humanizer,
        x: i32,
        y: i32,
        max_offset: i32,
        delay_range: (u64, u64),
    ) -> Self {
        let (offset_x, offset_y) = humanizer.humanize_position(max_offset);
        Self {
            x: x + offset_x,
            y: y + offset_y,
            pre_delay_ms: humanizer.between(delay_range),
        }
    }

    /// Sleep the pre-delay, then send the tap
    pub fn send<S: ScreenControl + ?Sized>(&self, screen: &mut S) -> bool {
        if self.pre_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.pre_delay_ms));
        }
        screen.tap(self.x, self.y)
    }
}
