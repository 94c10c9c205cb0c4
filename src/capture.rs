//! Screen capture module
//! Uses `xcap` for screenshots of the primary display.
//! Crops to the requested search region, clamped to the screen edges.
//! Latency goal: 30-50ms per region.
//! Debug: set `DEBUG_CAPTURE=1` to save each cropped region to `screenshots/debug_region.png`.

use image::RgbaImage;
use image::imageops;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use xcap::Monitor;

use crate::action::{Region, Rgb};
use crate::error::{MacroError, MacroResult};

const DEBUG_DIR: &str = "screenshots";

/// A captured region. `origin` is the screen coordinate of pixel (0, 0).
#[derive(Debug, Clone)]
pub struct Capture {
    pub image: RgbaImage,
    pub origin: (i32, i32),
}

pub trait ScreenSource {
    fn capture_region(&mut self, region: Region) -> MacroResult<Capture>;

    /// Color of a single screen pixel.
    fn pixel(&mut self, x: i32, y: i32) -> MacroResult<Rgb> {
        let capture = self.capture_region(Region::new(x, y, 1, 1))?;
        let [r, g, b, _] = capture.image.get_pixel(0, 0).0;
        Ok(Rgb(r, g, b))
    }
}

/// Primary monitor, whose top-left corner is screen (0, 0).
/// Permissions note: on macOS the terminal needs Screen Recording permission.
#[derive(Debug, Default)]
pub struct MonitorSource;

impl MonitorSource {
    fn grab_screen(&self) -> MacroResult<RgbaImage> {
        let monitors =
            Monitor::all().map_err(|e| MacroError::capture(format!("failed to enumerate monitors: {}", e)))?;

        let primary_monitor = monitors
            .first()
            .ok_or_else(|| MacroError::capture("no monitors found"))?;

        let screenshot = primary_monitor.capture_image().map_err(|e| {
            MacroError::capture(format!(
                "failed to capture image ({}). On macOS, grant Screen Recording permission to the terminal",
                e
            ))
        })?;

        if screenshot.dimensions() == (0, 0) {
            return Err(MacroError::capture(
                "captured empty screenshot - possible permission issue or no display",
            ));
        }
        Ok(screenshot)
    }
}

impl ScreenSource for MonitorSource {
    fn capture_region(&mut self, region: Region) -> MacroResult<Capture> {
        let start = Instant::now();
        let screenshot = self.grab_screen()?;
        let capture = crop_to_screen(&screenshot, region)?;

        if env::var_os("DEBUG_CAPTURE").is_some() {
            dump_debug(&capture.image, Path::new(DEBUG_DIR));
        }

        tracing::debug!(
            latency = ?start.elapsed(),
            x = capture.origin.0,
            y = capture.origin.1,
            width = capture.image.width(),
            height = capture.image.height(),
            "captured region"
        );
        Ok(capture)
    }
}

/// Crops a full-screen image to `region`, clamping it to the screen.
pub fn crop_to_screen(screenshot: &RgbaImage, region: Region) -> MacroResult<Capture> {
    let (screen_w, screen_h) = screenshot.dimensions();
    let screen = Region::new(0, 0, screen_w, screen_h);

    let clipped = region.intersect(&screen).ok_or_else(|| {
        MacroError::capture(format!(
            "region ({},{},{},{}) lies outside screen {}x{}",
            region.x, region.y, region.width, region.height, screen_w, screen_h
        ))
    })?;

    let image = imageops::crop_imm(
        screenshot,
        clipped.x as u32,
        clipped.y as u32,
        clipped.width,
        clipped.height,
    )
    .to_image();

    Ok(Capture {
        image,
        origin: (clipped.x, clipped.y),
    })
}

fn save_debug(image: &RgbaImage, dir: &Path) -> MacroResult<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| MacroError::io(dir, e))?;
    let path = dir.join("debug_region.png");
    image
        .save(&path)
        .map_err(|e| MacroError::capture(format!("failed to save debug region: {}", e)))?;
    Ok(path)
}

/// Debug dumps never fail a capture.
fn dump_debug(image: &RgbaImage, dir: &Path) {
    match save_debug(image, dir) {
        Ok(path) => tracing::debug!(path = %path.display(), "saved debug capture"),
        Err(e) => tracing::warn!(error = %e, "could not save debug capture"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn screen(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn test_crop_inside_screen() {
        let capture = crop_to_screen(&screen(100, 80), Region::new(10, 20, 30, 40)).unwrap();
        assert_eq!(capture.origin, (10, 20));
        assert_eq!(capture.image.dimensions(), (30, 40));
        assert_eq!(capture.image.get_pixel(0, 0).0, [10, 20, 0, 255]);
    }

    #[test]
    fn test_crop_clamps_negative_origin() {
        let capture = crop_to_screen(&screen(100, 80), Region::centered_on(5, 5, 20, 20)).unwrap();
        assert_eq!(capture.origin, (0, 0));
        assert_eq!(capture.image.dimensions(), (15, 15));
    }

    #[test]
    fn test_crop_outside_screen_fails() {
        let err = crop_to_screen(&screen(100, 80), Region::new(200, 0, 10, 10)).unwrap_err();
        assert!(err.to_string().contains("outside screen"));
    }

    #[test]
    fn test_debug_dump_failure_is_swallowed() {
        let dir = tempfile::TempDir::new().unwrap();
        let image = screen(4, 4);

        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, b"").unwrap();
        assert!(save_debug(&image, &blocker).is_err());
        dump_debug(&image, &blocker);

        let out = dir.path().join("shots");
        dump_debug(&image, &out);
        assert!(out.join("debug_region.png").is_file());
    }

    #[test]
    #[ignore = "requires graphical display and screen recording permissions"]
    fn test_capture_dimensions() {
        let mut source = MonitorSource;
        let capture = source
            .capture_region(Region::new(0, 0, 64, 64))
            .expect("capture_region failed");
        let (w, h) = capture.image.dimensions();
        assert!(w > 0 && h > 0, "captured image has invalid dimensions {}x{}", w, h);
    }
}
