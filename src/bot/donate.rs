//! Clan donations
//!
//! Between cycles the bot can peek into clan chat and fill one open
//! donation request. Off by default: donating costs the troops the next
//! raid would use, so only enable it with a cheap army.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::config::{Settings, TimingSettings};
use crate::device::{find_and_tap, ScreenControl};
use crate::retry::Retry;
use crate::stealth::Humanizer;
use crate::vision::elements;
use crate::vision::matcher::DEFAULT_THRESHOLD;

/// Fills one donation request per run
pub struct DonationSequence {
    timings: TimingSettings,
}

impl DonationSequence {
    pub fn new(settings: &Settings) -> Self {
        Self {
            timings: settings.timings.clone(),
        }
    }

    /// Open clan chat, fill one request, and come back home
    pub fn run<S: ScreenControl + ?Sized>(
        &self,
        screen: &mut S,
        humanizer: &mut Humanizer,
    ) -> bool {
        if screen.capture().is_err() {
            return false;
        }
        // the back arrow showing means chat is already open
        let in_chat = screen
            .locate(elements::BACK_BUTTON, DEFAULT_THRESHOLD)
            .is_some();
        if !in_chat && !find_and_tap(screen, elements::CLAN_CHAT, DEFAULT_THRESHOLD) {
            debug!("clan chat tab not on screen");
            return false;
        }
        self.pause(humanizer);

        // requests can take a beat to render after the chat opens
        let poll = Retry::new(2, self.timings.menu_delay);
        let Some(request) = poll.run_for(|| {
            if screen.capture().is_err() {
                return None;
            }
            screen.locate(elements::DONATE_REQUEST, DEFAULT_THRESHOLD)
        }) else {
            debug!("no open donation requests");
            self.go_back(screen, humanizer);
            return false;
        };
        screen.tap(request.x, request.y);
        self.pause(humanizer);

        let mut donated = false;
        if screen.capture().is_ok() {
            thread::sleep(Duration::from_millis(humanizer.get_confirmation_delay()));
            donated = find_and_tap(screen, elements::DONATE_BUTTON, DEFAULT_THRESHOLD);
        }
        if donated {
            info!("filled a donation request");
        }
        self.go_back(screen, humanizer);
        donated
    }

    fn go_back<S: ScreenControl + ?Sized>(&self, screen: &mut S, humanizer: &mut Humanizer) {
        self.pause(humanizer);
        if screen.capture().is_ok() {
            let _ = find_and_tap(screen, elements::BACK_BUTTON, DEFAULT_THRESHOLD);
        }
    }

    fn pause(&self, humanizer: &mut Humanizer) {
        let ms = humanizer.between(self.timings.menu_delay);
        thread::sleep(Duration::from_millis(ms));
    }
}
