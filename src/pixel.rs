//! Pixel matching.
//! A pixel matches a target color when every RGB channel is within `tolerance`
//! of the target; alpha is ignored. Scan is a single raster pass over the capture.

use image::{GrayImage, Luma, RgbaImage};

use crate::action::Rgb;

pub const MATCH: Luma<u8> = Luma([255]);
pub const NO_MATCH: Luma<u8> = Luma([0]);

#[inline]
pub fn color_matches(pixel: [u8; 4], target: Rgb, tolerance: u8) -> bool {
    pixel[0].abs_diff(target.0) <= tolerance
        && pixel[1].abs_diff(target.1) <= tolerance
        && pixel[2].abs_diff(target.2) <= tolerance
}

/// Binary mask of `image`: 255 where the pixel matches, 0 elsewhere.
pub fn match_mask(image: &RgbaImage, target: Rgb, tolerance: u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if color_matches(image.get_pixel(x, y).0, target, tolerance) {
            MATCH
        } else {
            NO_MATCH
        }
    })
}

/// Screen coordinates of every matching pixel, in raster order.
pub fn matching_points(image: &RgbaImage, target: Rgb, tolerance: u8, origin: (i32, i32)) -> Vec<(i32, i32)> {
    image
        .enumerate_pixels()
        .filter(|(_, _, px)| color_matches(px.0, target, tolerance))
        .map(|(x, y, _)| (origin.0 + x as i32, origin.1 + y as i32))
        .collect()
}

/// Mean of all points, or `None` for an empty set. Averaging every match is
/// only reliable when a single blob of the color is on screen; see `cluster`.
pub fn mean_position(points: &[(i32, i32)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    Some((sx / n, sy / n))
}
