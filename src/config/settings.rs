//! Bot settings
//!
//! Defines all configurable options for a farming run. Defaults encode
//! the 1600x900 calibration; everything can be overridden from a JSON
//! settings file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::deploy::targets;
use crate::search::policy::{AttackRule, ThresholdConfig};
use crate::vision::resources::CeilingRule;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Device serial; the first attached device is used when unset
    pub device: Option<String>,
    /// Directory holding the template library
    pub template_dir: String,
    /// Path of the append-only session log
    pub session_log: String,
    /// Loot minimums a base must clear
    pub thresholds: ThresholdConfig,
    /// Which combination of met thresholds authorizes an attack
    pub attack_rule: AttackRule,
    /// OCR plausibility handling
    pub ocr: OcrSettings,
    /// Base search behavior
    pub search: SearchSettings,
    /// Deployment catalogue and target pools
    pub deploy: DeploySettings,
    /// General automation settings
    pub automation: AutomationSettings,
    /// Screen timing settings
    pub timings: TimingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            template_dir: "templates".to_string(),
            session_log: "bot_session_log.txt".to_string(),
            thresholds: ThresholdConfig::default(),
            attack_rule: AttackRule::default(),
            ocr: OcrSettings::default(),
            search: SearchSettings::default(),
            deploy: DeploySettings::default(),
            automation: AutomationSettings::default(),
            timings: TimingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write the settings as pretty JSON, e.g. to seed a file to edit
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Create settings optimized for gold/elixir farming
    pub fn loot_preset() -> Self {
        Self {
            thresholds: ThresholdConfig {
                gold: 1_000_000,
                elixir: 1_000_000,
                dark_elixir: 0,
            },
            attack_rule: AttackRule::TwoOfThree,
            ..Default::default()
        }
    }

    /// Create settings for dark elixir hunting
    pub fn dark_elixir_preset() -> Self {
        Self {
            thresholds: ThresholdConfig {
                gold: 600_000,
                elixir: 600_000,
                dark_elixir: 5_000,
            },
            attack_rule: AttackRule::LootAndDark,
            ..Default::default()
        }
    }
}

/// OCR plausibility handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// How values above the plausible ceiling are repaired
    pub ceiling_rule: CeilingRule,
    /// Whether to read the trophy counter as well
    pub read_trophies: bool,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            ceiling_rule: CeilingRule::ZeroOut,
            read_trophies: false,
        }
    }
}

/// Base search behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Bases evaluated before the search gives up the cycle
    pub max_attempts: u32,
    /// Seconds without a successful skip before the search counts as stuck
    pub stall_timeout_secs: u64,
    /// Seconds to wait for the attack menu / matchmaking buttons
    pub menu_timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            stall_timeout_secs: 120,
            menu_timeout_secs: 30,
        }
    }
}

/// Deployment catalogue and target pools
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Template key of the troop card
    pub troop: String,
    /// How many troops to drop
    pub troop_count: u32,
    /// Spell cards, each cast over every spell target
    pub spells: Vec<String>,
    /// Hero cards expected on the deployment bar
    pub heroes: Vec<String>,
    /// Fewest detected heroes worth attacking with
    pub min_heroes: usize,
    /// Confidence floor for deployment-bar card detection
    pub confidence_floor: f32,
    /// Tap jitter radius for troop drops
    pub troop_offset: i32,
    /// Tap jitter radius for hero drops
    pub hero_offset: i32,
    /// Tap jitter radius for spell casts (placement tolerates more slack)
    pub spell_offset: i32,
    /// Chance of an attention-drift pause between troop drops
    pub micro_pause_chance: f32,
    /// Troop drop points
    pub troop_targets: Vec<(i32, i32)>,
    /// Hero drop points
    pub hero_targets: Vec<(i32, i32)>,
    /// Spell cast points
    pub spell_targets: Vec<(i32, i32)>,
    /// Advisory only: desired destruction before leaving
    pub target_destruction_pct: u32,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            troop: "cards/sneaky_goblin".to_string(),
            troop_count: 24,
            spells: vec!["cards/haste".to_string()],
            heroes: vec![
                "cards/barbarian_king".to_string(),
                "cards/archer_queen".to_string(),
                "cards/grand_warden".to_string(),
                "cards/royal_champion".to_string(),
                "cards/minion_prince".to_string(),
            ],
            min_heroes: 4,
            confidence_floor: 0.65,
            troop_offset: 3,
            hero_offset: 3,
            spell_offset: 25,
            micro_pause_chance: 0.02,
            troop_targets: targets::TROOP_POOL.to_vec(),
            hero_targets: targets::HERO_POOL.to_vec(),
            spell_targets: targets::SPELL_POOL.to_vec(),
            target_destruction_pct: 50,
        }
    }
}

/// General automation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    /// Maximum cycle count (0 = unlimited)
    pub max_cycles: u32,
    /// Emit a summary block every N cycles (0 = never)
    pub summary_every: u32,
    /// Tap resource collectors at the start of each cycle
    pub collect_resources: bool,
    /// Run the base search
    pub search_enabled: bool,
    /// Deploy on found bases (off = scouting dry run)
    pub attack_enabled: bool,
    /// Fill clan donation requests between cycles
    pub donations: bool,
    /// Spend spare loot on wall segments every few attacks
    pub wall_upgrades: bool,
    /// Recovery attempts before the run is declared unrecoverable
    pub recovery_attempts: u32,
}

impl Default for AutomationSettings {
    fn default() -> Self {
        Self {
            max_cycles: 0,
            summary_every: 5,
            collect_resources: true,
            search_enabled: true,
            attack_enabled: true,
            donations: false,
            wall_upgrades: true,
            recovery_attempts: 5,
        }
    }
}

/// Timing settings for screen interactions
///
/// Ranges are (min, max) milliseconds; a uniform pick in the range is
/// slept before the matching action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Poll interval while waiting for a menu button (ms)
    pub menu_poll: u64,
    /// Settle time on each candidate base before reading its loot
    pub next_base_delay: (u64, u64),
    /// Wait for the battle screen after matchmaking
    pub battle_start_wait: (u64, u64),
    /// Pause before tapping a selector card
    pub card_tap_delay: (u64, u64),
    /// Delay between selector-card tap retries
    pub card_retry_delay: (u64, u64),
    /// Delay between troop drop taps
    pub troop_tap_delay: (u64, u64),
    /// Delay between hero select and drop
    pub hero_tap_delay: (u64, u64),
    /// Delay between spell casts
    pub spell_tap_delay: (u64, u64),
    /// Settle time before hero abilities are triggered
    pub ability_settle: (u64, u64),
    /// Poll interval while waiting for the battle to end (ms)
    pub battle_poll: u64,
    /// Wall-clock budget for the battle to end (seconds)
    pub battle_timeout_secs: u64,
    /// Settle time after opening an in-game menu
    pub menu_delay: (u64, u64),
    /// Delay between recovery attempts
    pub recovery_delay: (u64, u64),
    /// Idle time between cycles
    pub cycle_delay: (u64, u64),
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            menu_poll: 2_000,
            next_base_delay: (4_500, 5_500),
            battle_start_wait: (4_000, 6_000),
            card_tap_delay: (200, 400),
            card_retry_delay: (200, 500),
            troop_tap_delay: (100, 300),
            hero_tap_delay: (500, 1_500),
            spell_tap_delay: (300, 500),
            ability_settle: (5_000, 8_000),
            battle_poll: 2_000,
            battle_timeout_secs: 210,
            menu_delay: (800, 1_500),
            recovery_delay: (1_500, 2_500),
            cycle_delay: (3_000, 6_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.thresholds.gold, 1_000_000);
        assert_eq!(settings.attack_rule, AttackRule::TwoOfThree);
        assert!(settings.automation.search_enabled);
        assert_eq!(settings.automation.summary_every, 5);
        assert_eq!(settings.deploy.min_heroes, 4);
    }

    #[test]
    fn test_loot_preset() {
        let settings = Settings::loot_preset();
        assert_eq!(settings.thresholds.dark_elixir, 0);
        assert_eq!(settings.attack_rule, AttackRule::TwoOfThree);
    }

    #[test]
    fn test_dark_elixir_preset() {
        let settings = Settings::dark_elixir_preset();
        assert_eq!(settings.thresholds.dark_elixir, 5_000);
        assert_eq!(settings.attack_rule, AttackRule::LootAndDark);
    }

    #[test]
    fn test_json_round_trip() {
        let settings = Settings::dark_elixir_preset();
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.thresholds.dark_elixir, 5_000);
        assert_eq!(back.deploy.heroes.len(), 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"thresholds": {"gold": 2000000}, "automation": {"max_cycles": 10}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.thresholds.gold, 2_000_000);
        // unspecified fields fall back to defaults
        assert_eq!(settings.thresholds.elixir, 1_000_000);
        assert_eq!(settings.automation.max_cycles, 10);
        assert!(settings.automation.collect_resources);
    }

    #[test]
    fn test_load_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings::loot_preset().save(&path).unwrap();
        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.thresholds.gold, 1_000_000);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("does-not-exist.json"));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }
}
