//! Attack deployment
//!
//! Runs one attack end to end: find the cards on the deployment bar,
//! drop the troop wave, heroes and spells, fire hero abilities, then
//! wait the battle out and return home. Every phase is best-effort
//! except the exit: whatever happens mid-battle, the engine does not
//! come back until it has tried to leave the match.

pub mod targets;

use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;

use crate::config::{DeploySettings, Settings, TimingSettings};
use crate::device::{find_and_tap, Region, ScreenControl};
use crate::retry::Retry;
use crate::session::AttackSession;
use crate::stealth::{HumanizedTap, Humanizer};
use crate::vision::elements;
use crate::vision::matcher::DEFAULT_THRESHOLD;

use targets::TargetPool;

/// Most heroes deployable in one attack
pub const MAX_HEROES: usize = 4;

/// Taps spent selecting one card before giving up on it
const CARD_TAP_ATTEMPTS: u32 = 3;

/// Phases of one attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    Prepare,
    DeployTroops,
    DeployHeroes,
    DeploySpells,
    ActivateAbilities,
    AwaitEnd,
    Done,
    Failed,
}

/// A card found on the deployment bar
#[derive(Debug, Clone)]
pub struct DeploymentElement {
    pub name: String,
    /// Card center on screen
    pub position: (i32, i32),
    /// Drop taps this card gets once selected
    pub unit_count: u32,
    pub confidence: f32,
}

/// Runs one attack end to end
pub struct DeploymentEngine {
    settings: DeploySettings,
    timings: TimingSettings,
    humanizer: Humanizer,
    rng: StdRng,
    phase: AttackPhase,
}

impl DeploymentEngine {
    pub fn new(settings: &Settings) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x5eed);
        Self {
            settings: settings.deploy.clone(),
            timings: settings.timings.clone(),
            humanizer: Humanizer::new(),
            rng: StdRng::seed_from_u64(seed),
            phase: AttackPhase::Prepare,
        }
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Fight the battle currently on screen
    ///
    /// Returns whether the engine got back out of the match. Heroes
    /// that made it onto the field are recorded in the session.
    pub fn execute_attack<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        session: &mut AttackSession,
    ) -> bool {
        session.deployed_heroes.clear();
        let Some(bar_cards) = self.prepare(screen) else {
            warn!("deployment bar not ready, sitting this battle out");
            let exited = self.await_end(screen);
            self.phase = AttackPhase::Failed;
            return exited;
        };

        self.phase = AttackPhase::DeployTroops;
        if !self.deploy_troops(screen, &bar_cards) {
            warn!("most of the troop wave failed to land");
        }

        self.phase = AttackPhase::DeployHeroes;
        self.deploy_heroes(screen, &bar_cards, session);

        self.phase = AttackPhase::DeploySpells;
        self.deploy_spells(screen, &bar_cards);

        self.phase = AttackPhase::ActivateAbilities;
        self.activate_abilities(screen, session);

        self.phase = AttackPhase::AwaitEnd;
        let exited = self.await_end(screen);
        self.phase = if exited {
            AttackPhase::Done
        } else {
            AttackPhase::Failed
        };
        exited
    }

    /// Find every expected card on the deployment bar
    ///
    /// Returns None when the army is not worth deploying: no troop
    /// card, or fewer ready heroes than the configured minimum.
    fn prepare<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
    ) -> Option<HashMap<String, DeploymentElement>> {
        self.phase = AttackPhase::Prepare;
        let wait = self.humanizer.between(self.timings.battle_start_wait);
        thread::sleep(Duration::from_millis(wait));

        if let Err(e) = screen.capture() {
            warn!("no frame at battle start: {e}");
            return None;
        }
        let bar = screen.frame().map(|f| bar_region(f.width(), f.height()));

        let mut bar_cards = HashMap::new();
        for (name, unit_count) in self.catalogue() {
            match screen.locate_in(&name, self.settings.confidence_floor, bar) {
                Some(card) => {
                    debug!(
                        "card {name} at ({}, {}), confidence {:.2}",
                        card.x, card.y, card.confidence
                    );
                    bar_cards.insert(
                        name.clone(),
                        DeploymentElement {
                            name,
                            position: (card.x, card.y),
                            unit_count,
                            confidence: card.confidence,
                        },
                    );
                }
                None => debug!("card {name} not on the bar"),
            }
        }

        if !bar_cards.contains_key(&self.settings.troop) {
            warn!("troop card {} missing from the bar", self.settings.troop);
            return None;
        }
        let heroes_ready = self
            .settings
            .heroes
            .iter()
            .filter(|h| bar_cards.contains_key(*h))
            .count();
        if heroes_ready < self.settings.min_heroes {
            warn!(
                "only {heroes_ready} heroes ready, need {}",
                self.settings.min_heroes
            );
            return None;
        }
        Some(bar_cards)
    }

    /// Every card the engine expects, with its drop budget
    fn catalogue(&self) -> Vec<(String, u32)> {
        let mut cards = vec![(self.settings.troop.clone(), self.settings.troop_count)];
        for spell in &self.settings.spells {
            cards.push((spell.clone(), self.settings.spell_targets.len() as u32));
        }
        for hero in &self.settings.heroes {
            cards.push((hero.clone(), 1));
        }
        cards
    }

    /// Tap a selector card until the tap lands
    fn select_card<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        card: &DeploymentElement,
    ) -> bool {
        let pre = self.humanizer.between(self.timings.card_tap_delay);
        thread::sleep(Duration::from_millis(pre));
        let (x, y) = card.position;
        Retry::new(CARD_TAP_ATTEMPTS, self.timings.card_retry_delay).run(|| screen.tap(x, y))
    }

    /// Drop the troop wave; true when at least half the drops landed
    fn deploy_troops<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        bar_cards: &HashMap<String, DeploymentElement>,
    ) -> bool {
        let Some(card) = bar_cards.get(&self.settings.troop) else {
            return false;
        };
        if !self.select_card(screen, card) {
            warn!("could not select {}", card.name);
            return false;
        }

        let pool = TargetPool::new(self.settings.troop_targets.clone());
        let drops = pool.sequence(&mut self.rng, card.unit_count as usize);
        let mut landed = 0usize;
        for (x, y) in drops.iter().copied() {
            let tap = HumanizedTap::at(
                &mut self.humanizer,
                x,
                y,
                self.settings.troop_offset,
                self.timings.troop_tap_delay,
            );
            if tap.send(screen) {
                landed += 1;
            }
            if self.humanizer.should_micro_pause(self.settings.micro_pause_chance) {
                let pause = self.humanizer.get_micro_pause_duration();
                thread::sleep(Duration::from_millis(pause));
            }
        }
        info!("dropped {landed}/{} troops", drops.len());
        landed * 2 >= drops.len()
    }

    /// Deploy up to [`MAX_HEROES`] of the detected hero cards
    fn deploy_heroes<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        bar_cards: &HashMap<String, DeploymentElement>,
        session: &mut AttackSession,
    ) {
        let detected: Vec<&DeploymentElement> = self
            .settings
            .heroes
            .iter()
            .filter_map(|name| bar_cards.get(name))
            .collect();
        if detected.is_empty() {
            debug!("no hero cards on the bar");
            return;
        }
        let chosen: Vec<&DeploymentElement> = if detected.len() > MAX_HEROES {
            detected
                .choose_multiple(&mut self.rng, MAX_HEROES)
                .copied()
                .collect()
        } else {
            detected
        };

        let pool = TargetPool::new(self.settings.hero_targets.clone());
        let spots = pool.sequence(&mut self.rng, chosen.len());
        for (card, (x, y)) in chosen.iter().copied().zip(spots) {
            if !self.select_card(screen, card) {
                warn!("hero {} would not select", card.name);
                continue;
            }
            let tap = HumanizedTap::at(
                &mut self.humanizer,
                x,
                y,
                self.settings.hero_offset,
                self.timings.hero_tap_delay,
            );
            if tap.send(screen) {
                session
                    .deployed_heroes
                    .insert(card.name.clone(), card.position);
                info!("deployed {}", card.name);
            }
        }
    }

    /// Cast each available spell over the whole spell target pool
    fn deploy_spells<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        bar_cards: &HashMap<String, DeploymentElement>,
    ) {
        let spells = self.settings.spells.clone();
        for name in spells {
            let Some(card) = bar_cards.get(&name) else {
                debug!("spell {name} not on the bar");
                continue;
            };
            if !self.select_card(screen, card) {
                warn!("spell {name} would not select");
                continue;
            }
            let pool = TargetPool::new(self.settings.spell_targets.clone());
            for (x, y) in pool.sequence(&mut self.rng, card.unit_count as usize) {
                let tap = HumanizedTap::at(
                    &mut self.humanizer,
                    x,
                    y,
                    self.settings.spell_offset,
                    self.timings.spell_tap_delay,
                );
                if !tap.send(screen) {
                    warn!("spell cast at ({x}, {y}) missed");
                }
            }
        }
    }

    /// Re-tap the card slot of every deployed hero to fire its ability
    fn activate_abilities<S: ScreenControl + ?Sized>(
        &mut self,
        screen: &mut S,
        session: &AttackSession,
    ) {
        if session.deployed_heroes.is_empty() {
            return;
        }
        let settle = self.humanizer.between(self.timings.ability_settle);
        thread::sleep(Duration::from_millis(settle));

        // slot positions were captured while the cards were still on
        // the bar; the ability buttons appear in the same slots
        let heroes: Vec<(String, (i32, i32))> = session
            .deployed_heroes
            .iter()
            .map(|(name, pos)| (name.clone(), *pos))
            .collect();
        for (name, (x, y)) in heroes {
            let tap = HumanizedTap::at(
                &mut self.humanizer,
                x,
                y,
                self.settings.hero_offset,
                self.timings.card_tap_delay,
            );
            if tap.send(screen) {
                debug!("ability triggered for {name}");
            }
        }
    }

    /// Wait for the battle to end and return home
    ///
    /// Bounded by the battle wall-clock budget; past it the engine
    /// forces the exit rather than hang mid-match.
    fn await_end<S: ScreenControl + ?Sized>(&mut self, screen: &mut S) -> bool {
        let deadline = Instant::now() + Duration::from_secs(self.timings.battle_timeout_secs);
        loop {
            if screen.capture().is_ok()
                && find_and_tap(screen, elements::RETURN_HOME, DEFAULT_THRESHOLD)
            {
                info!("battle over, returning home");
                return true;
            }
            if Instant::now() >= deadline {
                return self.force_exit(screen);
            }
            let poll = self.humanizer.humanize_delay(self.timings.battle_poll, 20);
            thread::sleep(Duration::from_millis(poll));
        }
    }

    /// Walk the exit chain: end battle, surrender, confirm, go home
    fn force_exit<S: ScreenControl + ?Sized>(&mut self, screen: &mut S) -> bool {
        warn!("battle ran past its budget, forcing the exit");
        let mut exited = false;
        for element in [
            elements::END_BATTLE,
            elements::SURRENDER,
            elements::OKAY_BUTTON,
            elements::RETURN_HOME,
        ] {
            if let Err(e) = screen.capture() {
                warn!("screenshot failed during forced exit: {e}");
            }
            if find_and_tap(screen, element, DEFAULT_THRESHOLD) {
                debug!("forced exit tapped {element}");
                exited = true;
            }
            let pause = self.humanizer.between(self.timings.menu_delay);
            thread::sleep(Duration::from_millis(pause));
        }
        exited
    }
}

/// The bottom strip of the frame where the deployment bar lives
fn bar_region(width: u32, height: u32) -> Region {
    let strip = height * 22 / 100;
    (0, height - strip, width, strip)
}
