//! Digit OCR
//!
//! Loot numbers are read by shelling out to the tesseract CLI with a
//! digit whitelist. Crops are blurred, thresholded and inverted first
//! so tesseract sees black glyphs on a white page, which is what its
//! models are trained on.

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use image::{GrayImage, Luma};
use log::{debug, warn};

/// Pixels brighter than this count as glyph ink
const GLYPH_THRESHOLD: u8 = 140;

/// Reads a digit string out of a grayscale crop
pub trait DigitOcr {
    /// Digits found in the crop, or None when nothing legible is there
    fn read_digits(&self, image: &GrayImage) -> Option<String>;
}

/// Digit OCR backed by the system tesseract binary
pub struct DigitReader {
    available: bool,
    work_dir: PathBuf,
    seq: AtomicU64,
}

impl DigitReader {
    /// Probe for tesseract and set up a scratch directory
    pub fn new() -> Self {
        let available = Command::new("tesseract")
            .arg("--version")
            .output()
            .is_ok_and(|out| out.status.success());
        if !available {
            warn!("tesseract not found on PATH; all loot numbers will read as 0");
        }
        Self {
            available,
            work_dir: std::env::temp_dir(),
            seq: AtomicU64::new(0),
        }
    }

    /// Whether the tesseract binary answered the startup probe
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn run_tesseract(&self, image: &GrayImage, whitelist: &str) -> Option<String> {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        let input = self
            .work_dir
            .join(format!("goblin-ocr-{}-{n}.png", std::process::id()));
        if let Err(e) = image.save(&input) {
            warn!("could not write OCR scratch image: {e}");
            return None;
        }

        let whitelist_arg = format!("tessedit_char_whitelist={whitelist}");
        let output = Command::new("tesseract")
            .arg(&input)
            .arg("stdout")
            .args(["--psm", "7", "-c"])
            .arg(&whitelist_arg)
            .output();
        let _ = std::fs::remove_file(&input);

        match output {
            Ok(out) if out.status.success() => {
                Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
            }
            Ok(out) => {
                debug!("tesseract exited with {}", out.status);
                None
            }
            Err(e) => {
                warn!("failed to run tesseract: {e}");
                None
            }
        }
    }
}

impl Default for DigitReader {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitOcr for DigitReader {
    fn read_digits(&self, image: &GrayImage) -> Option<String> {
        if !self.available {
            return None;
        }
        let prepared = preprocess(image);
        let text = self.run_tesseract(&prepared, "0123456789")?;
        let digits: String = text.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            None
        } else {
            Some(digits)
        }
    }
}

/// Blur, threshold and invert so bright game digits come out as black
/// ink on a white page
pub(crate) fn preprocess(image: &GrayImage) -> GrayImage {
    let blurred = imageproc::filter::gaussian_blur_f32(image, 1.2);
    GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        if blurred.get_pixel(x, y).0[0] > GLYPH_THRESHOLD {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_inverts_bright_glyphs() {
        // dark background with one bright block, as the loot panel is
        let src = GrayImage::from_fn(30, 30, |x, y| {
            if (10..20).contains(&x) && (10..20).contains(&y) {
                Luma([250])
            } else {
                Luma([20])
            }
        });
        let out = preprocess(&src);
        // block center becomes ink, background becomes page
        assert_eq!(out.get_pixel(15, 15).0[0], 0);
        assert_eq!(out.get_pixel(2, 2).0[0], 255);
    }

    #[test]
    fn test_unavailable_reader_reads_nothing() {
        let reader = DigitReader {
            available: false,
            work_dir: std::env::temp_dir(),
            seq: AtomicU64::new(0),
        };
        let crop = GrayImage::new(10, 10);
        assert!(reader.read_digits(&crop).is_none());
    }
}
