//! Base search
//!
//! Opens matchmaking from the home screen, then walks candidate bases
//! with the next button. Each base gets its loot panel read and judged;
//! the walk ends on the first base worth attacking, when the attempt
//! budget runs out, or when the next button stops making progress.

pub mod policy;

use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::Settings;
use crate::config::TimingSettings;
use crate::device::{find_and_tap, ScreenControl};
use crate::stealth::Humanizer;
use crate::vision::elements;
use crate::vision::matcher::DEFAULT_THRESHOLD;
use crate::vision::{ResourceReader, ResourceReading};

pub use policy::{AttackRule, ThresholdConfig};

/// Where the search currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    Initial,
    Searching,
    Found,
    TimedOut,
    Exhausted,
}

/// Why a base was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Too few thresholds met; carries how many were
    BelowThreshold(u8),
    /// Same loot as the previous base, the panel likely never refreshed
    Duplicate,
    /// Every field read zero, the panel was likely mid-animation
    Blank,
}

/// Decision for one candidate base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Attack; carries how many thresholds were met
    Attack(u8),
    Skip(SkipReason),
}

/// How a search run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A base worth attacking is on screen right now
    Found {
        reading: ResourceReading,
        attempts: u32,
    },
    /// Matchmaking never opened or the next button stopped responding
    TimedOut,
    /// Attempt budget spent without a worthwhile base
    Exhausted,
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

/// Walks matchmaking until a base is worth attacking
pub struct SearchEngine {
    rule: AttackRule,
    thresholds: ThresholdConfig,
    max_attempts: u32,
    stall_timeout: Duration,
    menu_timeout: Duration,
    timings: TimingSettings,
    humanizer: Humanizer,
    last_reading: Option<ResourceReading>,
    state: SearchState,
}

impl SearchEngine {
    pub fn new(settings: &Settings) -> Self {
        Self {
            rule: settings.attack_rule,
            thresholds: settings.thresholds,
            max_attempts: settings.search.max_attempts,
            stall_timeout: Duration::from_secs(settings.search.stall_timeout_secs),
            menu_timeout: Duration::from_secs(settings.search.menu_timeout_secs),
            timings: settings.timings.clone(),
            humanizer: Humanizer::new(),
            last_reading: None,
            state: SearchState::Initial,
        }
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Judge one loot reading
    ///
    /// A reading with the same loot as the previous base is never
    /// attacked: the panel probably failed to refresh and the numbers
    /// belong to a base that was already skipped.
    pub fn judge(&mut self, reading: &ResourceReading) -> Verdict {
        let duplicate = self
            .last_reading
            .is_some_and(|prev| prev.same_loot(reading));
        self.last_reading = Some(*reading);

        if duplicate {
            return Verdict::Skip(SkipReason::Duplicate);
        }
        if reading.is_blank() {
            return Verdict::Skip(SkipReason::Blank);
        }
        let met = self.thresholds.criteria_met(reading);
        if self.rule.authorizes(&self.thresholds, reading) {
            Verdict::Attack(met)
        } else {
            Verdict::Skip(SkipReason::BelowThreshold(met))
        }
    }

    /// Walk bases until one is worth attacking
    ///
    /// On [`SearchOutcome::Found`] the matched base is still on screen,
    /// ready for deployment.
    pub fn search_for_base<S, R>(&mut self, screen: &mut S, loot: &R) -> SearchOutcome
    where
        S: ScreenControl + ?Sized,
        R: ResourceReader + ?Sized,
    {
        self.state = SearchState::Initial;
        self.last_reading = None;

        if !self.open_matchmaking(screen) {
            warn!("could not reach matchmaking");
            self.state = SearchState::TimedOut;
            return SearchOutcome::TimedOut;
        }
        self.state = SearchState::Searching;
        info!(
            "searching for a base, up to {} candidates",
            self.max_attempts
        );

        let mut attempts = 0u32;
        let mut last_progress = Instant::now();

        loop {
            if last_progress.elapsed() >= self.stall_timeout {
                warn!("search stalled after {attempts} bases");
                self.state = SearchState::TimedOut;
                return SearchOutcome::TimedOut;
            }

            let settle = self.humanizer.between(self.timings.next_base_delay);
            thread::sleep(Duration::from_millis(settle));

            if let Err(e) = screen.capture() {
                warn!("screenshot failed mid-search: {e}");
            }
            let reading = screen.frame().map(|f| loot.read(f)).unwrap_or_default();
            attempts += 1;

            match self.judge(&reading) {
                Verdict::Attack(met) => {
                    info!("base {attempts}: {reading}, {met} criteria met, attacking");
                    self.state = SearchState::Found;
                    return SearchOutcome::Found { reading, attempts };
                }
                Verdict::Skip(reason) => {
                    debug!("base {attempts}: {reading}, skipped ({reason:?})");
                }
            }

            if attempts >= self.max_attempts {
                info!("no worthwhile base in {attempts} candidates");
                self.state = SearchState::Exhausted;
                return SearchOutcome::Exhausted;
            }

            // the stall clock only resets when the next button actually
            // took the tap
            if find_and_tap(screen, elements::NEXT_BUTTON, DEFAULT_THRESHOLD) {
                last_progress = Instant::now();
            } else {
                warn!("next button missed");
            }
        }
    }

    fn open_matchmaking<S: ScreenControl + ?Sized>(&mut self, screen: &mut S) -> bool {
        if !self.wait_and_tap(screen, elements::ATTACK_BUTTON) {
            return false;
        }
        if self.wait_and_tap(screen, elements::FIND_MATCH) {
            return true;
        }
        // a leftover popup can cover the menu; clear it once and retry
        let _ = find_and_tap(screen, elements::OKAY_BUTTON, DEFAULT_THRESHOLD);
        self.wait_and_tap(screen, elements::FIND_MATCH)
    }

    /// Poll for an element until the menu timeout, then tap it
    fn wait_and_tap<S: ScreenControl + ?Sized>(&mut self, screen: &mut S, element: &str) -> bool {
        let deadline = Instant::now() + self.menu_timeout;
        loop {
            if screen.capture().is_ok() {
                if let Some(found) = screen.locate(element, DEFAULT_THRESHOLD) {
                    return screen.tap(found.x, found.y);
                }
            }
            if Instant::now() >= deadline {
                return false;
            }
            let poll = self.humanizer.humanize_delay(self.timings.menu_poll, 20);
            thread::sleep(Duration::from_millis(poll));
        }
    }
}
