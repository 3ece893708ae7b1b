//! Device control layer
//!
//! Everything the bot does to a phone goes through the [`ScreenControl`]
//! trait: capture a frame, locate a template in it, tap, swipe. The real
//! implementation drives a device over ADB; tests substitute a scripted
//! fake.

pub mod adb;

use image::RgbaImage;
use thiserror::Error;

pub use adb::{AdbDevice, AdbScreen};

/// A template located on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Center X of the match
    pub x: i32,
    /// Center Y of the match
    pub y: i32,
    /// Normalized cross-correlation score, 0.0 to 1.0
    pub confidence: f32,
}

/// A rectangular screen region as (x, y, width, height)
pub type Region = (u32, u32, u32, u32);

/// Device control errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Failed to spawn the adb binary
    #[error("failed to run adb: {0}")]
    Spawn(#[from] std::io::Error),

    /// adb ran but reported failure
    #[error("adb exited with status {status}: {stderr}")]
    CommandFailed { status: i32, stderr: String },

    /// No device attached
    #[error("no device attached")]
    NoDevice,

    /// Screenshot bytes did not decode
    #[error("screenshot decode failed: {0}")]
    BadScreenshot(#[from] image::ImageError),
}

/// Screen capture and input injection for one device
pub trait ScreenControl {
    /// Grab a fresh frame from the device
    fn capture(&mut self) -> Result<(), DeviceError>;

    /// The most recently captured frame, if any
    fn frame(&self) -> Option<&RgbaImage>;

    /// Locate a template element in the current frame
    fn locate(&self, element: &str, min_confidence: f32) -> Option<Detection> {
        self.locate_in(element, min_confidence, None)
    }

    /// Locate a template element, optionally restricted to a region
    fn locate_in(
        &self,
        element: &str,
        min_confidence: f32,
        region: Option<Region>,
    ) -> Option<Detection>;

    /// Tap at screen coordinates; false when the injection failed
    fn tap(&mut self, x: i32, y: i32) -> bool;

    /// Swipe between two points over the given duration
    fn swipe(&mut self, from: (i32, i32), to: (i32, i32), duration_ms: u32) -> bool;
}

/// Locate an element in the current frame and tap its center
///
/// Returns false when the element is not on screen or the tap failed.
pub fn find_and_tap<S: ScreenControl + ?Sized>(
    screen: &mut S,
    element: &str,
    min_confidence: f32,
) -> bool {
    match screen.locate(element, min_confidence) {
        Some(found) => screen.tap(found.x, found.y),
        None => false,
    }
}

#[cfg(test)]
pub mod fake {
    //! Scripted screen for engine tests

    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    /// A fake screen that answers lookups from a script
    ///
    /// Each element either has a fixed detection (always found) or a
    /// queue of per-lookup answers that is drained front to back. Taps
    /// and swipes are recorded for assertions.
    pub struct ScriptedScreen {
        frame: RgbaImage,
        fixed: HashMap<String, Detection>,
        queued: RefCell<HashMap<String, VecDeque<Option<Detection>>>>,
        /// Frames captured so far
        pub captures: u32,
        /// Every tap sent, in order
        pub taps: Vec<(i32, i32)>,
        /// Every swipe sent, in order
        pub swipes: Vec<((i32, i32), (i32, i32))>,
        /// Result for taps once `tap_results` is drained
        pub tap_ok: bool,
        /// Per-tap results, drained front to back
        pub tap_results: VecDeque<bool>,
        /// When set, `capture` reports a device error
        pub capture_fails: bool,
    }

    impl ScriptedScreen {
        pub fn new() -> Self {
            Self {
                frame: RgbaImage::new(4, 4),
                fixed: HashMap::new(),
                queued: RefCell::new(HashMap::new()),
                captures: 0,
                taps: Vec::new(),
                swipes: Vec::new(),
                tap_ok: true,
                tap_results: VecDeque::new(),
                capture_fails: false,
            }
        }

        /// Make an element always visible at the given point
        pub fn with(mut self, element: &str, x: i32, y: i32) -> Self {
            self.fixed.insert(
                element.to_string(),
                Detection {
                    x,
                    y,
                    confidence: 0.95,
                },
            );
            self
        }

        /// Make an element always visible with a specific confidence
        pub fn with_confidence(mut self, element: &str, x: i32, y: i32, confidence: f32) -> Self {
            self.fixed
                .insert(element.to_string(), Detection { x, y, confidence });
            self
        }

        /// Script per-lookup answers for an element
        pub fn script<I>(self, element: &str, answers: I) -> Self
        where
            I: IntoIterator<Item = Option<Detection>>,
        {
            self.queued
                .borrow_mut()
                .insert(element.to_string(), answers.into_iter().collect());
            self
        }

        /// Shorthand for a scripted hit
        pub fn found(x: i32, y: i32) -> Option<Detection> {
            Some(Detection {
                x,
                y,
                confidence: 0.95,
            })
        }
    }

    impl Default for ScriptedScreen {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ScreenControl for ScriptedScreen {
        fn capture(&mut self) -> Result<(), DeviceError> {
            if self.capture_fails {
                return Err(DeviceError::NoDevice);
            }
            self.captures += 1;
            Ok(())
        }

        fn frame(&self) -> Option<&RgbaImage> {
            Some(&self.frame)
        }

        fn locate_in(
            &self,
            element: &str,
            min_confidence: f32,
            _region: Option<Region>,
        ) -> Option<Detection> {
            if let Some(queue) = self.queued.borrow_mut().get_mut(element) {
                return queue
                    .pop_front()
                    .flatten()
                    .filter(|d| d.confidence >= min_confidence);
            }
            self.fixed
                .get(element)
                .copied()
                .filter(|d| d.confidence >= min_confidence)
        }

        fn tap(&mut self, x: i32, y: i32) -> bool {
            self.taps.push((x, y));
            self.tap_results.pop_front().unwrap_or(self.tap_ok)
        }

        fn swipe(&mut self, from: (i32, i32), to: (i32, i32), _duration_ms: u32) -> bool {
            self.swipes.push((from, to));
            true
        }
    }
}
