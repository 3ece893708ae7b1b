//! Session accounting
//!
//! Running loot totals for the current bot run, plus the append-only
//! session log file. The log survives restarts; each run opens with a
//! banner so sessions stay readable side by side.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use crate::vision::ResourceReading;

/// Running totals for one bot run
#[derive(Debug)]
pub struct AttackSession {
    /// Cycles started
    pub loop_count: u32,
    /// Successful attacks
    pub attacks: u32,
    pub total_gold: u64,
    pub total_elixir: u64,
    pub total_dark: u64,
    /// Heroes that made it onto the field this attack, by card key
    pub deployed_heroes: HashMap<String, (i32, i32)>,
    started: Instant,
}

impl AttackSession {
    pub fn new() -> Self {
        Self {
            loop_count: 0,
            attacks: 0,
            total_gold: 0,
            total_elixir: 0,
            total_dark: 0,
            deployed_heroes: HashMap::new(),
            started: Instant::now(),
        }
    }

    /// Count an attack and fold its available loot into the totals
    pub fn record_attack(&mut self, reading: &ResourceReading) {
        self.attacks += 1;
        self.total_gold += u64::from(reading.gold);
        self.total_elixir += u64::from(reading.elixir);
        self.total_dark += u64::from(reading.dark_elixir);
    }

    /// (gold, elixir, dark) per successful attack
    pub fn averages(&self) -> (u64, u64, u64) {
        if self.attacks == 0 {
            return (0, 0, 0);
        }
        let n = u64::from(self.attacks);
        (
            self.total_gold / n,
            self.total_elixir / n,
            self.total_dark / n,
        )
    }

    /// Minutes since the session started
    pub fn elapsed_minutes(&self) -> f64 {
        self.started.elapsed().as_secs_f64() / 60.0
    }
}

impl Default for AttackSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Append-only session log file
pub struct SessionLog {
    file: File,
}

impl SessionLog {
    /// Open the log, creating it on first run
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Start-of-session banner
    pub fn banner(&mut self) -> std::io::Result<()> {
        writeln!(self.file, "\n\n===== NEW BOT SESSION STARTED =====")?;
        writeln!(
            self.file,
            "Start Time: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )
    }

    /// One line per successful attack
    pub fn attack(&mut self, number: u32, reading: &ResourceReading) -> std::io::Result<()> {
        writeln!(
            self.file,
            "Attack {number}: Gold={}, Elixir={}, Dark={}",
            group_thousands(u64::from(reading.gold)),
            group_thousands(u64::from(reading.elixir)),
            group_thousands(u64::from(reading.dark_elixir)),
        )
    }

    /// Summary block with totals, averages and runtime
    pub fn summary(&mut self, session: &AttackSession) -> std::io::Result<()> {
        let (avg_gold, avg_elixir, avg_dark) = session.averages();
        writeln!(self.file, "\n===== SESSION SUMMARY =====")?;
        writeln!(self.file, "Attacks: {}", session.attacks)?;
        writeln!(self.file, "Total Gold: {}", group_thousands(session.total_gold))?;
        writeln!(
            self.file,
            "Total Elixir: {}",
            group_thousands(session.total_elixir)
        )?;
        writeln!(self.file, "Total Dark: {}", group_thousands(session.total_dark))?;
        writeln!(self.file, "Average Gold: {}", group_thousands(avg_gold))?;
        writeln!(self.file, "Average Elixir: {}", group_thousands(avg_elixir))?;
        writeln!(self.file, "Average Dark: {}", group_thousands(avg_dark))?;
        writeln!(self.file, "Runtime: {:.1} mins", session.elapsed_minutes())?;
        writeln!(self.file, "============================")
    }
}

/// Group digits in threes: 1234567 becomes "1,234,567"
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        let remaining = digits.len() - i;
        if i != 0 && remaining % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
