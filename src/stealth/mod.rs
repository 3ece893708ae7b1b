//! Stealth and anti-detection module
//!
//! This module provides functionality to make automation less detectable:
//! - Humanized timing with random variance
//! - Humanized tap positions with slight offsets
//! - Random micro-pauses to simulate human attention drift

pub mod humanize;

pub use humanize::{Humanizer, HumanizedTap};
