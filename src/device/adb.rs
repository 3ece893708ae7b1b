//! ADB transport
//!
//! Shells out to the `adb` binary for screenshots and input injection.
//! Screenshots go over `exec-out screencap -p` so no file ever lands on
//! the device.

use std::process::{Command, Stdio};

use image::RgbaImage;
use log::{debug, warn};

use super::{Detection, DeviceError, Region, ScreenControl};
use crate::vision::TemplateLibrary;

/// Handle to one attached Android device
#[derive(Debug, Clone)]
pub struct AdbDevice {
    serial: String,
}

impl AdbDevice {
    /// Address a device by serial
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
        }
    }

    /// Serials of all attached devices in the `device` state
    pub fn devices() -> Result<Vec<String>, DeviceError> {
        let output = Command::new("adb").arg("devices").output()?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(parse_devices(&String::from_utf8_lossy(&output.stdout)))
    }

    /// The first attached device
    pub fn first() -> Result<Self, DeviceError> {
        Self::devices()?
            .into_iter()
            .next()
            .map(Self::new)
            .ok_or(DeviceError::NoDevice)
    }

    /// Device serial
    pub fn serial(&self) -> &str {
        &self.serial
    }

    fn run(&self, args: &[&str]) -> Result<Vec<u8>, DeviceError> {
        let output = Command::new("adb")
            .arg("-s")
            .arg(&self.serial)
            .args(args)
            .output()?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Capture the screen as an RGBA image
    pub fn screencap(&self) -> Result<RgbaImage, DeviceError> {
        let png = self.run(&["exec-out", "screencap", "-p"])?;
        Ok(image::load_from_memory(&png)?.to_rgba8())
    }

    /// Inject a tap
    pub fn tap(&self, x: i32, y: i32) -> Result<(), DeviceError> {
        let (x, y) = (x.to_string(), y.to_string());
        self.run(&["shell", "input", "tap", &x, &y])?;
        Ok(())
    }

    /// Inject a swipe
    pub fn swipe(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        duration_ms: u32,
    ) -> Result<(), DeviceError> {
        let (x1, y1) = (from.0.to_string(), from.1.to_string());
        let (x2, y2) = (to.0.to_string(), to.1.to_string());
        let duration = duration_ms.to_string();
        self.run(&["shell", "input", "swipe", &x1, &y1, &x2, &y2, &duration])?;
        Ok(())
    }

    /// Screen size in the game's landscape orientation
    pub fn screen_size(&self) -> Result<(u32, u32), DeviceError> {
        let out = self.run(&["shell", "wm", "size"])?;
        let (w, h) =
            parse_wm_size(&String::from_utf8_lossy(&out)).ok_or(DeviceError::CommandFailed {
                status: 0,
                stderr: "unparseable wm size output".to_string(),
            })?;
        // the game renders landscape even when the device reports portrait
        Ok(if w < h { (h, w) } else { (w, h) })
    }

    /// Two-finger pinch toward screen center
    ///
    /// Runs two swipes concurrently, which emulators read as a pinch.
    /// The game treats it as a zoom-out.
    pub fn pinch_in(&self) -> Result<(), DeviceError> {
        let (w, h) = self.screen_size()?;
        let (w, h) = (w as f32, h as f32);
        let fingers = [
            ((w * 0.2, h * 0.2), (w * 0.45, h * 0.45)),
            ((w * 0.8, h * 0.8), (w * 0.55, h * 0.55)),
        ];

        let mut children = Vec::with_capacity(fingers.len());
        for ((x1, y1), (x2, y2)) in fingers {
            let child = Command::new("adb")
                .arg("-s")
                .arg(&self.serial)
                .args(["shell", "input", "swipe"])
                .arg((x1 as i32).to_string())
                .arg((y1 as i32).to_string())
                .arg((x2 as i32).to_string())
                .arg((y2 as i32).to_string())
                .arg("1000")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            children.push(child);
        }
        for mut child in children {
            let status = child.wait()?;
            if !status.success() {
                warn!("pinch finger swipe exited with {status}");
            }
        }
        Ok(())
    }
}

/// Parse `adb devices` output into serials in the `device` state
fn parse_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// Parse `wm size` output, preferring the override size when present
fn parse_wm_size(output: &str) -> Option<(u32, u32)> {
    let mut physical = None;
    let mut override_size = None;
    for line in output.lines() {
        let parsed = line
            .split(':')
            .nth(1)
            .and_then(|dims| dims.trim().split_once('x'))
            .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)));
        if line.starts_with("Override size") {
            override_size = parsed;
        } else if line.starts_with("Physical size") {
            physical = parsed;
        }
    }
    override_size.or(physical)
}

/// [`ScreenControl`] over a live ADB connection
///
/// Holds the template library and the last captured frame so lookups
/// never touch the device.
pub struct AdbScreen {
    device: AdbDevice,
    templates: TemplateLibrary,
    frame: Option<RgbaImage>,
}

impl AdbScreen {
    pub fn new(device: AdbDevice, templates: TemplateLibrary) -> Self {
        Self {
            device,
            templates,
            frame: None,
        }
    }

    pub fn device(&self) -> &AdbDevice {
        &self.device
    }

    /// Pinch the camera out to the calibrated distance
    pub fn zoom_out(&mut self) -> bool {
        debug!("sending zoom-out pinch");
        match self.device.pinch_in() {
            Ok(()) => true,
            Err(e) => {
                warn!("zoom-out pinch failed: {e}");
                false
            }
        }
    }
}

impl ScreenControl for AdbScreen {
    fn capture(&mut self) -> Result<(), DeviceError> {
        self.frame = Some(self.device.screencap()?);
        Ok(())
    }

    fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    fn locate_in(
        &self,
        element: &str,
        min_confidence: f32,
        region: Option<Region>,
    ) -> Option<Detection> {
        let frame = self.frame.as_ref()?;
        match region {
            Some(r) => self
                .templates
                .locate_within(frame, element, min_confidence, r),
            None => self.templates.locate(frame, element, min_confidence),
        }
    }

    fn tap(&mut self, x: i32, y: i32) -> bool {
        match self.device.tap(x, y) {
            Ok(()) => true,
            Err(e) => {
                warn!("tap at ({x}, {y}) failed: {e}");
                false
            }
        }
    }

    fn swipe(&mut self, from: (i32, i32), to: (i32, i32), duration_ms: u32) -> bool {
        match self.device.swipe(from, to, duration_ms) {
            Ok(()) => true,
            Err(e) => {
                warn!("swipe {from:?} -> {to:?} failed: {e}");
                false
            }
        }
    }
}
