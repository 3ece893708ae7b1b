//! Bot orchestration
//!
//! One cycle is: make sure the home screen is up, collect anything
//! that is ready, run the optional donation and wall passes, search
//! for a base worth hitting, fight it, and come back home. [`Goblin`]
//! strings the engines together and [`BotHandle`] runs the whole loop
//! on a worker thread with a [`StopFlag`] for clean shutdown.

pub mod donate;
pub mod walls;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::Settings;
use crate::deploy::DeploymentEngine;
use crate::device::{find_and_tap, ScreenControl};
use crate::notify::{AttackReport, Notifier};
use crate::retry::Retry;
use crate::search::{SearchEngine, SearchOutcome};
use crate::session::{AttackSession, SessionLog};
use crate::stealth::Humanizer;
use crate::vision::elements;
use crate::vision::matcher::DEFAULT_THRESHOLD;
use crate::vision::ResourceReader;
use crate::BotError;

use donate::DonationSequence;
use walls::WallUpgrader;

/// Cross-thread stop signal
///
/// Setting the flag never interrupts an action in flight; the bot
/// checks it at cycle boundaries and before committing to an attack.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Ask the bot to stop at the next safe point
    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The farming bot
///
/// Generic over the screen and the loot reader so the whole loop runs
/// against scripted fakes in tests.
pub struct Goblin<S, R> {
    screen: S,
    loot: R,
    search: SearchEngine,
    deploy: DeploymentEngine,
    walls: WallUpgrader,
    donate: DonationSequence,
    log: SessionLog,
    notifier: Box<dyn Notifier + Send>,
    humanizer: Humanizer,
    session: AttackSession,
    settings: Settings,
}

impl<S: ScreenControl, R: ResourceReader> Goblin<S, R> {
    pub fn new(
        screen: S,
        loot: R,
        log: SessionLog,
        notifier: Box<dyn Notifier + Send>,
        settings: Settings,
    ) -> Self {
        Self {
            screen,
            loot,
            search: SearchEngine::new(&settings),
            deploy: DeploymentEngine::new(&settings),
            walls: WallUpgrader::new(&settings),
            donate: DonationSequence::new(&settings),
            log,
            notifier,
            humanizer: Humanizer::new(),
            session: AttackSession::new(),
            settings,
        }
    }

    pub fn session(&self) -> &AttackSession {
        &self.session
    }

    /// Run cycles until stopped or the cycle budget is spent
    ///
    /// A failed cycle is recovered and the loop keeps going; only an
    /// unrecoverable screen state or a dead session log ends the run.
    pub fn run(&mut self, stop: &StopFlag) -> Result<(), BotError> {
        self.log.banner()?;
        self.notifier.session_started();

        loop {
            if stop.is_set() {
                info!("stop requested, ending session");
                break;
            }
            let max = self.settings.automation.max_cycles;
            if max > 0 && self.session.loop_count >= max {
                info!("cycle budget of {max} spent");
                break;
            }
            self.session.loop_count += 1;
            debug!("cycle {} starting", self.session.loop_count);

            if let Err(err) = self.run_cycle(stop) {
                error!("cycle {} failed: {err}", self.session.loop_count);
                self.recover()?;
            }

            let every = self.settings.automation.summary_every;
            if every > 0 && self.session.loop_count.is_multiple_of(every) {
                self.emit_summary()?;
            }
            self.idle();
        }

        self.emit_summary()
    }

    fn run_cycle(&mut self, stop: &StopFlag) -> Result<(), BotError> {
        self.ensure_home()?;

        if self.settings.automation.collect_resources {
            self.collect_resources();
        }
        if self.settings.automation.donations {
            self.donate.run(&mut self.screen, &mut self.humanizer);
        }
        if self.settings.automation.wall_upgrades {
            self.walls
                .maybe_upgrade(&mut self.screen, self.session.loop_count, &mut self.humanizer);
        }

        if stop.is_set() || !self.settings.automation.search_enabled {
            return Ok(());
        }

        match self.search.search_for_base(&mut self.screen, &self.loot) {
            SearchOutcome::TimedOut => {
                warn!("search timed out this cycle");
                self.ensure_home()
            }
            SearchOutcome::Exhausted => {
                info!("search spent its attempt budget, trying again next cycle");
                self.ensure_home()
            }
            SearchOutcome::Found { reading, attempts } => {
                debug!("base found after {attempts} candidates");
                if stop.is_set() {
                    info!("stop requested, leaving the found base unfought");
                    return self.ensure_home();
                }
                self.session.record_attack(&reading);
                self.log.attack(self.session.attacks, &reading)?;

                if self.settings.automation.attack_enabled {
                    let begun = Instant::now();
                    let exited = self.deploy.execute_attack(&mut self.screen, &mut self.session);
                    let report = AttackReport::from_reading(
                        self.session.attacks,
                        &reading,
                        Some(begun.elapsed()),
                    );
                    self.notifier.attack_finished(&report);
                    if !exited {
                        return self.recover();
                    }
                    Ok(())
                } else {
                    info!("attacks disabled, scouting only");
                    self.ensure_home()
                }
            }
        }
    }

    /// Tap any resource collectors that are ready
    fn collect_resources(&mut self) {
        thread::sleep(Duration::from_millis(self.humanizer.get_action_delay()));
        if self.screen.capture().is_err() {
            return;
        }
        for element in [
            elements::GOLD_COLLECT,
            elements::ELIXIR_COLLECT,
            elements::DARK_COLLECT,
        ] {
            if find_and_tap(&mut self.screen, element, DEFAULT_THRESHOLD) {
                debug!("collected {element}");
                let pause = self.humanizer.get_consecutive_delay();
                thread::sleep(Duration::from_millis(pause));
            }
        }
    }

    /// Get back to an actionable home screen
    fn ensure_home(&mut self) -> Result<(), BotError> {
        let attempts = self.settings.automation.recovery_attempts;
        let retry = Retry::new(attempts, self.settings.timings.recovery_delay);
        let screen = &mut self.screen;
        if retry.run(|| Self::home_visible_or_clear(screen)) {
            Ok(())
        } else {
            Err(BotError::RecoveryFailed { attempts })
        }
    }

    /// One recovery step: done when home is visible, otherwise tap one
    /// obstruction out of the way
    fn home_visible_or_clear(screen: &mut S) -> bool {
        if screen.capture().is_err() {
            return false;
        }
        if screen
            .locate(elements::HOME_ANCHOR, DEFAULT_THRESHOLD)
            .is_some()
        {
            return true;
        }
        for element in [
            elements::OKAY_BUTTON,
            elements::CLOSE,
            elements::RETURN_HOME,
            elements::END_BATTLE,
        ] {
            if find_and_tap(screen, element, DEFAULT_THRESHOLD) {
                debug!("cleared {element} while heading home");
                break;
            }
        }
        false
    }

    fn recover(&mut self) -> Result<(), BotError> {
        warn!("recovering to the home screen");
        self.ensure_home()
    }

    /// Pause between cycles, with the occasional longer break
    fn idle(&mut self) {
        if self.humanizer.should_take_break(self.session.attacks) {
            let pause = self.humanizer.get_break_duration();
            info!("taking a {pause} ms break");
            thread::sleep(Duration::from_millis(pause));
        }
        let pause = self.humanizer.between(self.settings.timings.cycle_delay);
        thread::sleep(Duration::from_millis(pause));
    }

    fn emit_summary(&mut self) -> Result<(), BotError> {
        self.log.summary(&self.session)?;
        let (gold, elixir, dark) = self.session.averages();
        info!(
            "{} attacks so far, averaging gold {gold} / elixir {elixir} / dark {dark}",
            self.session.attacks
        );
        Ok(())
    }
}

impl<S, R> Goblin<S, R>
where
    S: ScreenControl + Send + 'static,
    R: ResourceReader + Send + 'static,
{
    /// Run the bot on its own thread
    pub fn spawn(mut self) -> BotHandle {
        let stop = StopFlag::new();
        let flag = stop.clone();
        let thread = thread::spawn(move || self.run(&flag));
        BotHandle { stop, thread }
    }
}

/// Handle to a bot running on a worker thread
pub struct BotHandle {
    stop: StopFlag,
    thread: JoinHandle<Result<(), BotError>>,
}

impl BotHandle {
    /// Ask the worker to stop at the next safe point
    pub fn stop(&self) {
        self.stop.set();
    }

    /// A clone of the worker's stop flag, e.g. for a signal handler
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker to end and surface its result
    pub fn join(self) -> Result<(), BotError> {
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => Err(BotError::WorkerPanic),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use tempfile::tempdir;

    use super::*;
    use crate::config::TimingSettings;
    use crate::device::fake::ScriptedScreen;
    use crate::notify::NullNotifier;
    use crate::vision::resources::fake::ScriptedLoot;
    use crate::vision::ResourceReading;

    /// Notifier that records every event it sees
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Notifier for Recorder {
        fn session_started(&self) {
            self.0.lock().unwrap().push("started".into());
        }

        fn attack_finished(&self, report: &AttackReport) {
            self.0
                .lock()
                .unwrap()
                .push(format!("attack {}", report.attack_number));
        }
    }

    fn fast_settings() -> Settings {
        let mut settings = Settings::default();
        settings.deploy.micro_pause_chance = 0.0;
        settings.automation.max_cycles = 1;
        settings.timings = TimingSettings {
            menu_poll: 0,
            next_base_delay: (0, 0),
            battle_start_wait: (0, 0),
            card_tap_delay: (0, 0),
            card_retry_delay: (0, 0),
            troop_tap_delay: (0, 0),
            hero_tap_delay: (0, 0),
            spell_tap_delay: (0, 0),
            ability_settle: (0, 0),
            battle_poll: 0,
            battle_timeout_secs: 0,
            menu_delay: (0, 0),
            recovery_delay: (0, 0),
            cycle_delay: (0, 0),
        };
        settings
    }

    /// Everything one full cycle touches, visible at once
    fn full_screen(settings: &Settings) -> ScriptedScreen {
        let mut screen = ScriptedScreen::new()
            .with(elements::HOME_ANCHOR, 80, 80)
            .with(elements::GOLD_COLLECT, 300, 200)
            .with(elements::ATTACK_BUTTON, 90, 800)
            .with(elements::FIND_MATCH, 1200, 600)
            .with(&settings.deploy.troop, 700, 850)
            .with(elements::RETURN_HOME, 790, 700);
        for (i, hero) in settings.deploy.heroes.iter().enumerate() {
            screen = screen.with(hero, 900 + 60 * i as i32, 850);
        }
        for (i, spell) in settings.deploy.spells.iter().enumerate() {
            screen = screen.with(spell, 1300 + 60 * i as i32, 850);
        }
        screen
    }

    fn bot_with(
        screen: ScriptedScreen,
        loot: ScriptedLoot,
        settings: Settings,
        log_path: &std::path::Path,
        events: Arc<Mutex<Vec<String>>>,
    ) -> Goblin<ScriptedScreen, ScriptedLoot> {
        let log = SessionLog::open(log_path).unwrap();
        Goblin::new(screen, loot, log, Box::new(Recorder(events)), settings)
    }

    #[test]
    fn test_full_cycle_attacks_and_logs() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.txt");
        let settings = fast_settings();
        let screen = full_screen(&settings);
        let loot = ScriptedLoot::new([ResourceReading::new(2_000_000, 1_500_000, 12_000)]);
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut bot = bot_with(screen, loot, settings, &log_path, Arc::clone(&events));
        bot.run(&StopFlag::new()).unwrap();

        assert_eq!(bot.session().attacks, 1);
        assert_eq!(bot.session().total_gold, 2_000_000);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["started".to_string(), "attack 1".to_string()]
        );

        let written = fs::read_to_string(&log_path).unwrap();
        assert!(written.contains("NEW BOT SESSION STARTED"));
        assert!(written.contains("Attack 1: Gold=2,000,000, Elixir=1,500,000, Dark=12,000"));
        assert!(written.contains("SESSION SUMMARY"));
    }

    #[test]
    fn test_dry_run_scouts_without_deploying() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.txt");
        let mut settings = fast_settings();
        settings.automation.attack_enabled = false;
        let screen = full_screen(&settings);
        let loot = ScriptedLoot::new([ResourceReading::new(2_000_000, 1_500_000, 12_000)]);
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut bot = bot_with(screen, loot, settings, &log_path, Arc::clone(&events));
        bot.run(&StopFlag::new()).unwrap();

        // the base is recorded but never fought
        assert_eq!(bot.session().attacks, 1);
        assert_eq!(*events.lock().unwrap(), vec!["started".to_string()]);
    }

    #[test]
    fn test_preset_stop_runs_no_cycles() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.txt");
        let settings = fast_settings();
        let events = Arc::new(Mutex::new(Vec::new()));

        let stop = StopFlag::new();
        stop.set();
        let mut bot = bot_with(
            ScriptedScreen::new(),
            ScriptedLoot::new([]),
            settings,
            &log_path,
            events,
        );
        bot.run(&stop).unwrap();

        assert_eq!(bot.session().loop_count, 0);
        let written = fs::read_to_string(&log_path).unwrap();
        assert!(written.contains("SESSION SUMMARY"));
    }

    #[test]
    fn test_unrecoverable_screen_surfaces_an_error() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.txt");
        let mut settings = fast_settings();
        settings.automation.recovery_attempts = 2;

        // no home anchor and nothing recognizable to tap away
        let log = SessionLog::open(&log_path).unwrap();
        let mut bot = Goblin::new(
            ScriptedScreen::new(),
            ScriptedLoot::new([]),
            log,
            Box::new(NullNotifier),
            settings,
        );
        let err = bot.run(&StopFlag::new()).unwrap_err();

        assert!(matches!(err, BotError::RecoveryFailed { attempts: 2 }));
    }

    #[test]
    fn test_spawn_stop_join() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("session.txt");
        let mut settings = fast_settings();
        settings.automation.max_cycles = 0;
        settings.automation.collect_resources = false;
        settings.automation.search_enabled = false;
        settings.automation.wall_upgrades = false;
        settings.timings.cycle_delay = (1, 2);
        let screen = ScriptedScreen::new().with(elements::HOME_ANCHOR, 80, 80);

        let log = SessionLog::open(&log_path).unwrap();
        let bot = Goblin::new(
            screen,
            ScriptedLoot::new([]),
            log,
            Box::new(NullNotifier),
            settings,
        );
        let handle = bot.spawn();

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        assert!(!handle.stop_flag().is_set());
        handle.stop();
        assert!(handle.stop_flag().is_set());
        assert!(handle.join().is_ok());
    }
}
