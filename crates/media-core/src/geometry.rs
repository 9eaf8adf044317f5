//! Placement math for drawing frames onto the surface.

use serde::{Deserialize, Serialize};

/// Where and how large an image is drawn on the surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Uniform scale applied to the source image.
    pub scale: f64,
}

impl FitRect {
    /// Rectangle rounded to whole pixels as `(x, y, width, height)`.
    ///
    /// Width and height never round below one pixel.
    pub fn to_pixels(&self) -> (i64, i64, u32, u32) {
        (
            self.x.round() as i64,
            self.y.round() as i64,
            (self.width.round() as u32).max(1),
            (self.height.round() as u32).max(1),
        )
    }
}

/// Scale an image uniformly to fit inside the surface and center it.
///
/// The scale is `min(sw / iw, sh / ih)`, so the aspect ratio is preserved
/// and the drawn rectangle never exceeds the surface. Unused space on one
/// axis is split evenly (letterboxing).
pub fn fit_and_center(
    image_width: u32,
    image_height: u32,
    surface_width: u32,
    surface_height: u32,
) -> FitRect {
    let iw = image_width.max(1) as f64;
    let ih = image_height.max(1) as f64;
    let sw = surface_width as f64;
    let sh = surface_height as f64;

    let scale = (sw / iw).min(sh / ih);
    let width = iw * scale;
    let height = ih * scale;

    FitRect {
        x: (sw - width) / 2.0,
        y: (sh - height) / 2.0,
        width,
        height,
        scale,
    }
}

/// Round dimensions down to even values (required by most video encoders),
/// never going below 2x2.
pub fn even_dimensions(width: u32, height: u32) -> (u32, u32) {
    ((width / 2 * 2).max(2), (height / 2 * 2).max(2))
}
