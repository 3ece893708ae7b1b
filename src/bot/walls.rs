//! Wall upgrade pass
//!
//! Spare loot goes into wall segments every few attacks, the same way a
//! player sinks overflow between raids. The pass is opportunistic: open
//! the builder menu, scroll until a wall row shows, upgrade one segment
//! with loot, and back out of anything that asks for gems.

use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{Settings, TimingSettings};
use crate::device::{find_and_tap, ScreenControl};
use crate::stealth::Humanizer;
use crate::vision::elements;
use crate::vision::matcher::DEFAULT_THRESHOLD;

/// Scroll attempts while hunting for a wall row
const WALL_SCROLL_LIMIT: u32 = 10;

/// Schedules and runs wall upgrade passes
pub struct WallUpgrader {
    timings: TimingSettings,
    rng: StdRng,
    /// Cycle number of the next pass; 0 means not yet scheduled
    next_at: u32,
}

impl WallUpgrader {
    pub fn new(settings: &Settings) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self {
            timings: settings.timings.clone(),
            rng: StdRng::seed_from_u64(seed),
            next_at: 0,
        }
    }

    /// Run a pass when one is due
    ///
    /// Passes land every 2 to 3 cycles rather than on a fixed beat.
    /// Returns whether a wall segment was actually upgraded.
    pub fn maybe_upgrade<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        loop_count: u32,
        humanizer: &mut Humanizer,
    ) -> bool {
        if self.next_at == 0 {
            self.next_at = loop_count + self.rng.random_range(2..=3);
            debug!("first wall pass scheduled for cycle {}", self.next_at);
            return false;
        }
        if loop_count < self.next_at {
            return false;
        }
        self.next_at = loop_count + self.rng.random_range(2..=3);
        info!("wall upgrade pass, next at cycle {}", self.next_at);
        self.upgrade_one(screen, humanizer)
    }

    /// Upgrade a single wall segment with loot
    fn upgrade_one<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        humanizer: &mut Humanizer,
    ) -> bool {
        if screen.capture().is_err() {
            return false;
        }
        if !find_and_tap(screen, elements::BUILDER_MENU, DEFAULT_THRESHOLD) {
            debug!("builder menu not on screen");
            return false;
        }
        self.menu_pause(humanizer);

        // scroll the build list until a wall row shows
        let mut row = None;
        for _ in 0..WALL_SCROLL_LIMIT {
            if screen.capture().is_err() {
                break;
            }
            if let Some(found) = screen.locate(elements::WALL_ROW, DEFAULT_THRESHOLD) {
                row = Some(found);
                break;
            }
            screen.swipe((800, 600), (800, 300), 300);
            self.menu_pause(humanizer);
        }
        let Some(row) = row else {
            debug!("no wall row in the builder menu");
            let _ = find_and_tap(screen, elements::CLOSE, DEFAULT_THRESHOLD);
            return false;
        };

        screen.tap(row.x, row.y);
        self.menu_pause(humanizer);

        if screen.capture().is_err()
            || !find_and_tap(screen, elements::UPGRADE_BUTTON, DEFAULT_THRESHOLD)
        {
            debug!("selected wall had no upgrade button");
            let _ = find_and_tap(screen, elements::CLOSE, DEFAULT_THRESHOLD);
            return false;
        }
        self.menu_pause(humanizer);

        let _ = screen.capture();
        if screen
            .locate(elements::GEM_DIALOG, DEFAULT_THRESHOLD)
            .is_some()
        {
            info!("upgrade wants gems, backing out");
            let _ = find_and_tap(screen, elements::CLOSE, DEFAULT_THRESHOLD);
            return false;
        }

        thread::sleep(Duration::from_millis(humanizer.get_confirmation_delay()));
        let confirmed = find_and_tap(screen, elements::UPGRADE_CONFIRM, DEFAULT_THRESHOLD);
        if confirmed {
            info!("wall segment upgraded");
        }
        let _ = find_and_tap(screen, elements::CLOSE, DEFAULT_THRESHOLD);
        confirmed
    }

    fn menu_pause(&self, humanizer: &mut Humanizer) {
        let ms = humanizer.between(self.timings.menu_delay);
        thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::fake::ScriptedScreen;

    fn fast_settings() -> Settings {
        let mut settings = Settings::default();
        settings.timings.menu_delay = (0, 0);
        settings
    }

    /// Builder menu with one upgradeable wall
    fn wall_screen() -> ScriptedScreen {
        ScriptedScreen::new()
            .with(elements::BUILDER_MENU, 40, 550)
            .with(elements::WALL_ROW, 800, 400)
            .with(elements::UPGRADE_BUTTON, 1200, 760)
            .with(elements::UPGRADE_CONFIRM, 1000, 600)
            .with(elements::CLOSE, 1540, 60)
    }

    #[test]
    fn test_first_call_only_schedules() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = wall_screen();

        assert!(!walls.maybe_upgrade(&mut screen, 1, &mut humanizer));
        assert!(screen.taps.is_empty());
        assert!((3..=4).contains(&walls.next_at));
    }

    #[test]
    fn test_pass_waits_for_its_cycle() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = wall_screen();

        walls.maybe_upgrade(&mut screen, 1, &mut humanizer);
        walls.next_at = 5;
        assert!(!walls.maybe_upgrade(&mut screen, 4, &mut humanizer));
        assert!(screen.taps.is_empty());
    }

    #[test]
    fn test_upgrades_one_wall() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = wall_screen();
        walls.next_at = 2;

        assert!(walls.maybe_upgrade(&mut screen, 2, &mut humanizer));
        assert!(screen.taps.contains(&(1000, 600)), "confirm never tapped");
        // a new pass is on the calendar
        assert!((4..=5).contains(&walls.next_at));
    }

    #[test]
    fn test_gem_dialog_backs_out() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = wall_screen().with(elements::GEM_DIALOG, 800, 450);
        walls.next_at = 2;

        assert!(!walls.maybe_upgrade(&mut screen, 2, &mut humanizer));
        // backed out without touching the confirm button
        assert!(!screen.taps.contains(&(1000, 600)));
        assert!(screen.taps.contains(&(1540, 60)), "close never tapped");
    }

    #[test]
    fn test_scrolls_until_wall_row_appears() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = ScriptedScreen::new()
            .with(elements::BUILDER_MENU, 40, 550)
            .with(elements::UPGRADE_BUTTON, 1200, 760)
            .with(elements::UPGRADE_CONFIRM, 1000, 600)
            .with(elements::CLOSE, 1540, 60)
            .script(
                elements::WALL_ROW,
                [None, None, ScriptedScreen::found(800, 400)],
            );
        walls.next_at = 2;

        assert!(walls.maybe_upgrade(&mut screen, 2, &mut humanizer));
        assert_eq!(screen.swipes.len(), 2);
    }

    #[test]
    fn test_no_builder_menu_is_a_no_op() {
        let mut walls = WallUpgrader::new(&fast_settings());
        let mut humanizer = Humanizer::new();
        let mut screen = ScriptedScreen::new();
        walls.next_at = 2;

        assert!(!walls.maybe_upgrade(&mut screen, 2, &mut humanizer));
        assert!(screen.taps.is_empty());
    }
}
