//! Computer vision subsystem
//!
//! Template matching against a user-supplied crop library, digit OCR
//! over the loot panel, and normalization of the raw readings into
//! trustworthy numbers.

pub mod matcher;
pub mod ocr;
pub mod resources;

use thiserror::Error;

pub use matcher::TemplateLibrary;
pub use ocr::{DigitOcr, DigitReader};
pub use resources::{CeilingRule, ResourceExtractor, ResourceReader, ResourceReading};

/// Vision system errors
#[derive(Error, Debug)]
pub enum VisionError {
    /// Template directory missing or unreadable
    #[error("template directory {path}: {source}")]
    TemplateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A template file exists but did not decode as an image
    #[error("template {path} failed to decode: {source}")]
    TemplateDecode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    /// The library loaded but contains no usable templates
    #[error("no templates found under {0}")]
    EmptyLibrary(String),
}

/// Template keys for the screen elements the bot interacts with
///
/// Each key names a subdirectory of the template root; every crop in
/// that subdirectory is tried and the best match wins.
pub mod elements {
    /// Attack button on the home screen
    pub const ATTACK_BUTTON: &str = "buttons/attack";
    /// Find-a-match button in the attack menu
    pub const FIND_MATCH: &str = "buttons/find_match";
    /// Next button during base search
    pub const NEXT_BUTTON: &str = "buttons/next";
    /// Generic okay / confirm button
    pub const OKAY_BUTTON: &str = "buttons/okay";
    /// Return-home button on the battle result screen
    pub const RETURN_HOME: &str = "buttons/return_home";
    /// End-battle button shown once all troops are spent
    pub const END_BATTLE: &str = "buttons/end_battle";
    /// Surrender confirmation button
    pub const SURRENDER: &str = "buttons/surrender";
    /// Generic close / X button on popups
    pub const CLOSE: &str = "buttons/close";
    /// Anchor element proving the home screen is visible
    pub const HOME_ANCHOR: &str = "screens/home";
    /// Gold collector ready to collect
    pub const GOLD_COLLECT: &str = "collect/gold";
    /// Elixir collector ready to collect
    pub const ELIXIR_COLLECT: &str = "collect/elixir";
    /// Dark elixir drill ready to collect
    pub const DARK_COLLECT: &str = "collect/dark_elixir";
    /// Builder menu button
    pub const BUILDER_MENU: &str = "walls/builder_menu";
    /// A wall row inside the builder menu
    pub const WALL_ROW: &str = "walls/wall_entry";
    /// Upgrade button on a selected wall
    pub const UPGRADE_BUTTON: &str = "walls/upgrade";
    /// Upgrade confirmation button
    pub const UPGRADE_CONFIRM: &str = "walls/confirm";
    /// Gem spend dialog; its appearance means the upgrade is abandoned
    pub const GEM_DIALOG: &str = "walls/gem_dialog";
    /// Clan chat tab
    pub const CLAN_CHAT: &str = "clan/chat_tab";
    /// Back arrow out of clan chat
    pub const BACK_BUTTON: &str = "clan/back";
    /// A donation request row in clan chat
    pub const DONATE_REQUEST: &str = "clan/request";
    /// Donate button on an opened request
    pub const DONATE_BUTTON: &str = "clan/donate";
}
