//! Attack decision policy
//!
//! A base is judged purely on its loot panel reading. Each resource has
//! a threshold; the attack rule says which combination of met
//! thresholds is worth an army.

use serde::{Deserialize, Serialize};

use crate::vision::ResourceReading;

/// Loot minimums a base must clear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub gold: u32,
    pub elixir: u32,
    pub dark_elixir: u32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            gold: 1_000_000,
            elixir: 1_000_000,
            dark_elixir: 0,
        }
    }
}

impl ThresholdConfig {
    /// How many of the three thresholds the reading meets
    ///
    /// A criterion is met at exactly the threshold; a threshold of 0
    /// is always met.
    pub fn criteria_met(&self, reading: &ResourceReading) -> u8 {
        u8::from(reading.gold >= self.gold)
            + u8::from(reading.elixir >= self.elixir)
            + u8::from(reading.dark_elixir >= self.dark_elixir)
    }
}

/// Which combination of met thresholds authorizes an attack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackRule {
    /// Any two of the three thresholds
    #[default]
    TwoOfThree,
    /// At least one of gold/elixir, and dark elixir
    LootAndDark,
}

impl AttackRule {
    /// Whether the reading is worth attacking under this rule
    pub fn authorizes(&self, thresholds: &ThresholdConfig, reading: &ResourceReading) -> bool {
        match self {
            AttackRule::TwoOfThree => thresholds.criteria_met(reading) >= 2,
            AttackRule::LootAndDark => {
                (reading.gold >= thresholds.gold || reading.elixir >= thresholds.elixir)
                    && reading.dark_elixir >= thresholds.dark_elixir
            }
        }
    }
}
