//! Loot panel reading
//!
//! Crops the fixed loot boxes out of a frame, OCRs each one, and
//! repairs the values OCR gets wrong. The floors and ceilings below
//! come from what the game can actually show: a misread above the
//! ceiling is always OCR noise, never real loot.

use std::fmt;

use image::{imageops, RgbaImage};
use log::warn;
use serde::{Deserialize, Serialize};

use super::DigitOcr;
use crate::device::Region;

/// Resolution the loot boxes were calibrated against
pub const REFERENCE_RESOLUTION: (u32, u32) = (1600, 900);

/// Smallest believable available-loot value
pub const LOOT_FLOOR: u64 = 1_000;
/// Largest believable gold or elixir value
pub const LOOT_CEILING: u64 = 4_000_000;
/// Largest believable dark elixir value
pub const DARK_CEILING: u64 = 50_000;
/// Largest believable trophy count
pub const TROPHY_CEILING: u64 = 10_000;

/// Loot box positions on the search screen at the reference resolution
pub mod regions {
    use crate::device::Region;

    pub const GOLD: Region = (65, 95, 135, 25);
    pub const ELIXIR: Region = (65, 135, 135, 25);
    pub const DARK_ELIXIR: Region = (65, 175, 105, 25);
    pub const TROPHIES: Region = (65, 210, 105, 25);
}

/// One reading of the loot panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceReading {
    pub gold: u32,
    pub elixir: u32,
    pub dark_elixir: u32,
    /// Only populated when trophy reading is enabled
    pub trophies: Option<u32>,
}

impl ResourceReading {
    pub fn new(gold: u32, elixir: u32, dark_elixir: u32) -> Self {
        Self {
            gold,
            elixir,
            dark_elixir,
            trophies: None,
        }
    }

    /// All three loot fields read as zero
    pub fn is_blank(&self) -> bool {
        self.gold == 0 && self.elixir == 0 && self.dark_elixir == 0
    }

    /// Same loot as another reading; trophies do not count
    pub fn same_loot(&self, other: &ResourceReading) -> bool {
        self.gold == other.gold
            && self.elixir == other.elixir
            && self.dark_elixir == other.dark_elixir
    }
}

impl fmt::Display for ResourceReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gold {} / elixir {} / dark {}",
            self.gold, self.elixir, self.dark_elixir
        )
    }
}

/// What to do with a loot value above the plausible ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingRule {
    /// Treat the reading as noise and zero it
    #[default]
    ZeroOut,
    /// Assume extra digits crept in and divide by 10 until plausible
    ScaleDown,
}

/// Anything that can turn a frame into a loot reading
pub trait ResourceReader {
    fn read(&self, frame: &RgbaImage) -> ResourceReading;
}

/// Reads the loot panel with a [`DigitOcr`] backend
pub struct ResourceExtractor<O: DigitOcr> {
    ocr: O,
    ceiling_rule: CeilingRule,
    read_trophies: bool,
}

impl<O: DigitOcr> ResourceExtractor<O> {
    pub fn new(ocr: O, ceiling_rule: CeilingRule, read_trophies: bool) -> Self {
        Self {
            ocr,
            ceiling_rule,
            read_trophies,
        }
    }

    /// OCR one loot box; anything illegible reads as 0
    fn field(&self, frame: &RgbaImage, region: Region) -> u64 {
        let (x, y, w, h) = region;
        if x + w > frame.width() || y + h > frame.height() {
            warn!(
                "loot box {region:?} is outside the {}x{} frame",
                frame.width(),
                frame.height()
            );
            return 0;
        }
        let crop = imageops::crop_imm(frame, x, y, w, h).to_image();
        let gray = imageops::grayscale(&crop);
        match self.ocr.read_digits(&gray) {
            Some(text) => text.parse::<u64>().unwrap_or(0),
            None => 0,
        }
    }
}

impl<O: DigitOcr> ResourceReader for ResourceExtractor<O> {
    fn read(&self, frame: &RgbaImage) -> ResourceReading {
        let gold = normalize_loot(self.field(frame, regions::GOLD), self.ceiling_rule);
        let elixir = normalize_loot(self.field(frame, regions::ELIXIR), self.ceiling_rule);
        let dark_elixir = normalize_dark(self.field(frame, regions::DARK_ELIXIR));
        let trophies = self
            .read_trophies
            .then(|| normalize_trophies(self.field(frame, regions::TROPHIES)));
        ResourceReading {
            gold,
            elixir,
            dark_elixir,
            trophies,
        }
    }
}

/// Repair a gold or elixir reading
pub fn normalize_loot(raw: u64, rule: CeilingRule) -> u32 {
    if raw < LOOT_FLOOR {
        return 0;
    }
    if raw <= LOOT_CEILING {
        return raw as u32;
    }
    match rule {
        CeilingRule::ZeroOut => 0,
        CeilingRule::ScaleDown => {
            let mut v = raw;
            while v > LOOT_CEILING {
                v /= 10;
            }
            if v < LOOT_FLOOR {
                0
            } else {
                v as u32
            }
        }
    }
}

/// Repair a dark elixir reading
pub fn normalize_dark(raw: u64) -> u32 {
    if raw > DARK_CEILING {
        0
    } else {
        raw as u32
    }
}

/// Repair a trophy reading
pub fn normalize_trophies(raw: u64) -> u32 {
    if raw > TROPHY_CEILING {
        0
    } else {
        raw as u32
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use image::GrayImage;

    use super::*;

    /// DigitOcr that answers from a queue, one answer per loot box
    struct QueueOcr {
        answers: RefCell<VecDeque<Option<String>>>,
    }

    impl QueueOcr {
        fn new<const N: usize>(answers: [Option<&str>; N]) -> Self {
            Self {
                answers: RefCell::new(
                    answers
                        .into_iter()
                        .map(|a| a.map(str::to_string))
                        .collect(),
                ),
            }
        }
    }

    impl DigitOcr for QueueOcr {
        fn read_digits(&self, _image: &GrayImage) -> Option<String> {
            self.answers.borrow_mut().pop_front().flatten()
        }
    }

    fn frame() -> RgbaImage {
        RgbaImage::new(400, 300)
    }

    #[test]
    fn test_read_in_panel_order() {
        // boxes are read gold, elixir, dark
        let ocr = QueueOcr::new([Some("2100000"), Some("950"), Some("6200")]);
        let extractor = ResourceExtractor::new(ocr, CeilingRule::ZeroOut, false);
        let reading = extractor.read(&frame());
        assert_eq!(reading.gold, 2_100_000);
        // 950 is under the loot floor
        assert_eq!(reading.elixir, 0);
        assert_eq!(reading.dark_elixir, 6_200);
        assert_eq!(reading.trophies, None);
    }

    #[test]
    fn test_read_trophies_when_enabled() {
        let ocr = QueueOcr::new([Some("500000"), Some("500000"), Some("100"), Some("3456")]);
        let extractor = ResourceExtractor::new(ocr, CeilingRule::ZeroOut, true);
        let reading = extractor.read(&frame());
        assert_eq!(reading.trophies, Some(3_456));
    }

    #[test]
    fn test_illegible_boxes_read_zero() {
        let ocr = QueueOcr::new([None, Some("99999999999999999999"), None]);
        let extractor = ResourceExtractor::new(ocr, CeilingRule::ZeroOut, false);
        let reading = extractor.read(&frame());
        assert!(reading.is_blank());
    }

    #[test]
    fn test_boxes_outside_frame_read_zero() {
        let ocr = QueueOcr::new([Some("500000"), Some("500000"), Some("100")]);
        let extractor = ResourceExtractor::new(ocr, CeilingRule::ZeroOut, false);
        let reading = extractor.read(&RgbaImage::new(50, 50));
        assert!(reading.is_blank());
    }

    #[test]
    fn test_loot_floor() {
        assert_eq!(normalize_loot(999, CeilingRule::ZeroOut), 0);
        assert_eq!(normalize_loot(1_000, CeilingRule::ZeroOut), 1_000);
    }

    #[test]
    fn test_loot_ceiling_zero_out() {
        assert_eq!(normalize_loot(4_000_000, CeilingRule::ZeroOut), 4_000_000);
        assert_eq!(normalize_loot(4_000_001, CeilingRule::ZeroOut), 0);
    }

    #[test]
    fn test_loot_ceiling_scale_down() {
        // a stray digit turned 530k into 53M; two divisions repair it
        assert_eq!(normalize_loot(53_000_000, CeilingRule::ScaleDown), 530_000);
        assert_eq!(normalize_loot(12_345, CeilingRule::ScaleDown), 12_345);
    }

    #[test]
    fn test_dark_ceiling() {
        assert_eq!(normalize_dark(50_000), 50_000);
        assert_eq!(normalize_dark(50_001), 0);
    }

    #[test]
    fn test_trophy_ceiling() {
        assert_eq!(normalize_trophies(10_001), 0);
        assert_eq!(normalize_trophies(2_900), 2_900);
    }

    #[test]
    fn test_same_loot_ignores_trophies() {
        let mut a = ResourceReading::new(100_000, 200_000, 500);
        let b = a;
        a.trophies = Some(30);
        assert!(a.same_loot(&b));
        assert!(a != b);
    }

    #[test]
    fn test_is_blank() {
        assert!(ResourceReading::default().is_blank());
        assert!(!ResourceReading::new(0, 0, 1).is_blank());
    }
}
