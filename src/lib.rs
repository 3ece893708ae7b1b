//! Clash Goblin - loot-farming automation for Clash of Clans over ADB
//!
//! This library drives an attached Android device through a repeating
//! collect -> search -> attack -> return cycle: screenshots come in over
//! the debug bridge, UI elements are located by template matching,
//! resource counters are read with digit OCR, and attacks are carried
//! out with randomized humanlike taps.
//!
//! ## Anti-Detection
//!
//! The `stealth` module adds realistic variance to timing and positions
//! so the input stream does not look mechanically identical.

pub mod bot;
pub mod config;
pub mod deploy;
pub mod device;
pub mod notify;
pub mod retry;
pub mod search;
pub mod session;
pub mod stealth;
pub mod vision;

pub use bot::{BotHandle, Goblin, StopFlag};
pub use config::Settings;

/// Top-level error for a bot run.
///
/// Transient device and vision hiccups are retried inside the engines;
/// only conditions that end the run surface here.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("session log error: {0}")]
    SessionLog(#[from] std::io::Error),
    #[error("recovery failed: home screen not reached after {attempts} attempts")]
    RecoveryFailed { attempts: u32 },
    #[error("bot worker panicked")]
    WorkerPanic,
}
