//! Attack notifications
//!
//! Hook for surfacing bot progress somewhere other than the session
//! log, e.g. a desktop notification or a chat webhook. The bot only
//! knows the trait; the default binding just mirrors into the
//! application log.

use std::time::Duration;

use log::info;

use crate::vision::ResourceReading;

/// What one finished attack looked like
#[derive(Debug, Clone)]
pub struct AttackReport {
    pub attack_number: u32,
    pub gold: u32,
    pub elixir: u32,
    pub dark_elixir: u32,
    pub trophies: Option<u32>,
    /// Wall-clock time from deploy to return home
    pub duration: Option<Duration>,
}

impl AttackReport {
    pub fn from_reading(
        attack_number: u32,
        reading: &ResourceReading,
        duration: Option<Duration>,
    ) -> Self {
        Self {
            attack_number,
            gold: reading.gold,
            elixir: reading.elixir,
            dark_elixir: reading.dark_elixir,
            trophies: reading.trophies,
            duration,
        }
    }
}

/// Receives session lifecycle events
pub trait Notifier {
    fn session_started(&self);
    fn attack_finished(&self, report: &AttackReport);
}

/// Mirrors events into the application log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn session_started(&self) {
        info!("session started");
    }

    fn attack_finished(&self, report: &AttackReport) {
        info!(
            "attack {} finished: gold {}, elixir {}, dark {}",
            report.attack_number, report.gold, report.elixir, report.dark_elixir
        );
    }
}

/// Drops every event
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn session_started(&self) {}
    fn attack_finished(&self, _report: &AttackReport) {}
}
