//! Template matching
//!
//! The template library is a directory tree of screenshot crops. Each
//! leaf directory is one element; its key is the directory path relative
//! to the root, e.g. `buttons/attack`. Keeping several crops per element
//! (different lighting, different skins) costs nothing: every crop is
//! matched and the best score wins.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use image::{imageops, GrayImage, RgbaImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use log::{info, warn};

use super::VisionError;
use crate::device::{Detection, Region};

/// Default confidence floor for template lookups
pub const DEFAULT_THRESHOLD: f32 = 0.8;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// All known templates, keyed by element
pub struct TemplateLibrary {
    templates: HashMap<String, Vec<GrayImage>>,
}

impl TemplateLibrary {
    /// Load every template crop under the given root directory
    pub fn load(root: &Path) -> Result<Self, VisionError> {
        let mut templates: HashMap<String, Vec<GrayImage>> = HashMap::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(dir) = stack.pop() {
            let entries = fs::read_dir(&dir).map_err(|e| VisionError::TemplateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
            for entry in entries {
                let entry = entry.map_err(|e| VisionError::TemplateDir {
                    path: dir.display().to_string(),
                    source: e,
                })?;
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let is_image = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    });
                if !is_image {
                    continue;
                }
                let Some(key) = element_key(root, &path) else {
                    warn!("ignoring template outside an element directory: {}", path.display());
                    continue;
                };
                let img = image::open(&path).map_err(|e| VisionError::TemplateDecode {
                    path: path.display().to_string(),
                    source: e,
                })?;
                templates.entry(key).or_default().push(img.to_luma8());
            }
        }

        if templates.is_empty() {
            return Err(VisionError::EmptyLibrary(root.display().to_string()));
        }
        let crops: usize = templates.values().map(Vec::len).sum();
        info!("loaded {} elements ({crops} template crops)", templates.len());
        Ok(Self { templates })
    }

    /// Whether an element has at least one crop
    pub fn contains(&self, element: &str) -> bool {
        self.templates.contains_key(element)
    }

    /// Number of known elements
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Find the best match for an element anywhere in the frame
    pub fn locate(&self, frame: &RgbaImage, element: &str, min_confidence: f32) -> Option<Detection> {
        let gray = imageops::grayscale(frame);
        self.locate_in_gray(&gray, element, min_confidence)
    }

    /// Find the best match inside a region, in frame coordinates
    pub fn locate_within(
        &self,
        frame: &RgbaImage,
        element: &str,
        min_confidence: f32,
        region: Region,
    ) -> Option<Detection> {
        let (rx, ry, rw, rh) = region;
        if rx + rw > frame.width() || ry + rh > frame.height() {
            warn!("search region {region:?} is outside the {}x{} frame", frame.width(), frame.height());
            return None;
        }
        let crop = imageops::crop_imm(frame, rx, ry, rw, rh).to_image();
        let gray = imageops::grayscale(&crop);
        self.locate_in_gray(&gray, element, min_confidence)
            .map(|d| Detection {
                x: d.x + rx as i32,
                y: d.y + ry as i32,
                confidence: d.confidence,
            })
    }

    fn locate_in_gray(
        &self,
        gray: &GrayImage,
        element: &str,
        min_confidence: f32,
    ) -> Option<Detection> {
        let crops = self.templates.get(element)?;
        let mut best: Option<Detection> = None;

        for crop in crops {
            if crop.width() > gray.width() || crop.height() > gray.height() {
                continue;
            }
            let scores =
                match_template(gray, crop, MatchTemplateMethod::CrossCorrelationNormalized);
            let extremes = find_extremes(&scores);
            if extremes.max_value < min_confidence {
                continue;
            }
            let (mx, my) = extremes.max_value_location;
            let candidate = Detection {
                x: mx as i32 + (crop.width() / 2) as i32,
                y: my as i32 + (crop.height() / 2) as i32,
                confidence: extremes.max_value,
            };
            if best.is_none_or(|b| candidate.confidence > b.confidence) {
                best = Some(candidate);
            }
        }
        best
    }
}

/// Element key for a crop file: its parent directory relative to the root
fn element_key(root: &Path, file: &Path) -> Option<String> {
    let rel = file.parent()?.strip_prefix(root).ok()?;
    let key = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8x8 checkerboard; patterned so correlation peaks only at the
    /// true location
    fn checker() -> GrayImage {
        GrayImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    /// A 100x100 frame with the checkerboard stamped at (30, 40)
    fn frame_with_pattern() -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(100, 100, image::Rgba([10, 10, 10, 255]));
        let pattern = checker();
        for (x, y, p) in pattern.enumerate_pixels() {
            let v = p.0[0];
            frame.put_pixel(30 + x, 40 + y, image::Rgba([v, v, v, 255]));
        }
        frame
    }

    fn library_with(element: &str, crop: GrayImage) -> TemplateLibrary {
        let mut templates = HashMap::new();
        templates.insert(element.to_string(), vec![crop]);
        TemplateLibrary { templates }
    }

    #[test]
    fn test_locate_finds_pattern_center() {
        let library = library_with("buttons/attack", checker());
        let found = library
            .locate(&frame_with_pattern(), "buttons/attack", 0.9)
            .unwrap();
        // match center = top-left + half the template
        assert_eq!((found.x, found.y), (34, 44));
        assert!(found.confidence > 0.9);
    }

    #[test]
    fn test_locate_unknown_element() {
        let library = library_with("buttons/attack", checker());
        assert!(library
            .locate(&frame_with_pattern(), "buttons/next", 0.5)
            .is_none());
    }

    #[test]
    fn test_locate_within_offsets_into_frame_coords() {
        let library = library_with("buttons/attack", checker());
        let found = library
            .locate_within(&frame_with_pattern(), "buttons/attack", 0.9, (20, 30, 40, 40))
            .unwrap();
        assert_eq!((found.x, found.y), (34, 44));
    }

    #[test]
    fn test_locate_within_rejects_out_of_bounds_region() {
        let library = library_with("buttons/attack", checker());
        assert!(library
            .locate_within(&frame_with_pattern(), "buttons/attack", 0.5, (90, 90, 40, 40))
            .is_none());
    }

    #[test]
    fn test_template_larger_than_frame_is_skipped() {
        let library = library_with("buttons/attack", checker());
        let tiny = RgbaImage::new(4, 4);
        assert!(library.locate(&tiny, "buttons/attack", 0.1).is_none());
    }

    #[test]
    fn test_load_from_directory_tree() {
        let dir = tempfile::tempdir().unwrap();
        let element_dir = dir.path().join("buttons").join("attack");
        std::fs::create_dir_all(&element_dir).unwrap();
        checker().save(element_dir.join("crop1.png")).unwrap();
        checker().save(element_dir.join("crop2.png")).unwrap();
        // non-image files are ignored
        std::fs::write(element_dir.join("notes.txt"), "calibration notes").unwrap();

        let library = TemplateLibrary::load(dir.path()).unwrap();
        assert_eq!(library.len(), 1);
        assert!(library.contains("buttons/attack"));
        assert!(library
            .locate(&frame_with_pattern(), "buttons/attack", 0.9)
            .is_some());
    }

    #[test]
    fn test_load_missing_directory() {
        let err = TemplateLibrary::load(Path::new("/definitely/not/here"));
        assert!(matches!(err, Err(VisionError::TemplateDir { .. })));
    }

    #[test]
    fn test_load_empty_library() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("buttons")).unwrap();
        let err = TemplateLibrary::load(dir.path());
        assert!(matches!(err, Err(VisionError::EmptyLibrary(_))));
    }

    #[test]
    fn test_load_rejects_corrupt_template() {
        let dir = tempfile::tempdir().unwrap();
        let element_dir = dir.path().join("buttons").join("attack");
        std::fs::create_dir_all(&element_dir).unwrap();
        std::fs::write(element_dir.join("bad.png"), "not an image").unwrap();
        let err = TemplateLibrary::load(dir.path());
        assert!(matches!(err, Err(VisionError::TemplateDecode { .. })));
    }
}
