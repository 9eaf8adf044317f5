//! The 2D drawing surface frames are painted onto before capture.

use std::fmt;
use std::sync::Arc;

use image::imageops::{self, FilterType};
pub use image::{Rgba, RgbaImage};

use lapse_common::error::{LapseError, LapseResult};

use crate::geometry::{fit_and_center, FitRect};

/// Solid background painted behind every frame.
pub const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A decoded, drawable image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    /// A single-color image, handy for placeholders and tests.
    pub fn solid(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, color))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// RGBA canvas owned by the frame scheduler while recording.
#[derive(Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.pixels.width())
            .field("height", &self.pixels.height())
            .finish()
    }
}

impl Canvas {
    /// Create a canvas cleared to [`BACKGROUND`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, BACKGROUND),
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Paint the whole surface with one color.
    pub fn fill(&mut self, color: Rgba<u8>) {
        for pixel in self.pixels.pixels_mut() {
            *pixel = color;
        }
    }

    /// Draw `image` scaled into `rect`. Parts outside the canvas are clipped.
    pub fn draw_image(&mut self, image: &DecodedImage, rect: FitRect) {
        let (x, y, width, height) = rect.to_pixels();
        if width == image.width() && height == image.height() {
            imageops::overlay(&mut self.pixels, image.pixels(), x, y);
        } else {
            let scaled = imageops::resize(image.pixels(), width, height, FilterType::Triangle);
            imageops::overlay(&mut self.pixels, &scaled, x, y);
        }
    }

    /// Clear to `background` and draw `image` fitted and centered.
    pub fn draw_fitted(&mut self, image: &DecodedImage, background: Rgba<u8>) -> FitRect {
        self.fill(background);
        let rect = fit_and_center(image.width(), image.height(), self.width(), self.height());
        self.draw_image(image, rect);
        rect
    }

    /// Copy of the current pixels, as captured by a stream track.
    pub fn snapshot(&self) -> Arc<RgbaImage> {
        Arc::new(self.pixels.clone())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.pixels.get_pixel(x, y)
    }
}

/// Constructs drawing surfaces.
pub trait SurfaceFactory: Send + Sync + fmt::Debug {
    fn create(&self, width: u32, height: u32) -> LapseResult<Canvas>;

    /// Largest size with the aspect ratio of `width x height` that
    /// [`SurfaceFactory::create`] accepts.
    fn fit_within(&self, width: u32, height: u32) -> (u32, u32) {
        (width, height)
    }
}

/// In-memory raster surfaces.
#[derive(Debug, Clone)]
pub struct RasterSurfaces {
    /// Largest accepted width or height.
    pub max_dimension: u32,
}

impl Default for RasterSurfaces {
    fn default() -> Self {
        Self {
            max_dimension: 8192,
        }
    }
}

impl SurfaceFactory for RasterSurfaces {
    fn fit_within(&self, width: u32, height: u32) -> (u32, u32) {
        let longest = width.max(height);
        if longest <= self.max_dimension {
            return (width, height);
        }
        let shrink = |d: u32| {
            let scaled = u64::from(d) * u64::from(self.max_dimension) / u64::from(longest);
            (scaled as u32).max(1)
        };
        (shrink(width), shrink(height))
    }

    fn create(&self, width: u32, height: u32) -> LapseResult<Canvas> {
        if width == 0 || height == 0 {
            return Err(LapseError::invalid_input(format!(
                "Surface dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(LapseError::invalid_input(format!(
                "Surface {width}x{height} exceeds the {max} pixel limit",
                max = self.max_dimension
            )));
        }
        Ok(Canvas::new(width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREY: Rgba<u8> = Rgba([40, 40, 40, 255]);

    #[test]
    fn fit_within_keeps_aspect_under_the_limit() {
        let surfaces = RasterSurfaces { max_dimension: 1000 };
        assert_eq!(surfaces.fit_within(640, 480), (640, 480));
        assert_eq!(surfaces.fit_within(4000, 1000), (1000, 250));
        assert_eq!(surfaces.fit_within(300, 9000), (33, 1000));
        assert_eq!(surfaces.fit_within(100_000, 10), (1000, 1));
        let (w, h) = surfaces.fit_within(4000, 1000);
        assert!(surfaces.create(w, h).is_ok());
    }

    #[test]
    fn draw_fitted_letterboxes_wide_image() {
        let mut canvas = Canvas::new(100, 100);
        let image = DecodedImage::solid(200, 100, RED);
        let rect = canvas.draw_fitted(&image, GREY);

        assert_eq!(rect.to_pixels(), (0, 25, 100, 50));
        // Bars above and below keep the background.
        assert_eq!(canvas.pixel(50, 10), GREY);
        assert_eq!(canvas.pixel(50, 90), GREY);
        // The image covers the middle band edge to edge.
        assert_eq!(canvas.pixel(0, 50), RED);
        assert_eq!(canvas.pixel(99, 50), RED);
    }

    #[test]
    fn snapshot_is_detached_from_later_draws() {
        let mut canvas = Canvas::new(4, 4);
        let before = canvas.snapshot();
        canvas.fill(RED);
        assert_eq!(*before.get_pixel(0, 0), BACKGROUND);
        assert_eq!(canvas.pixel(0, 0), RED);
    }

    #[test]
    fn raster_surfaces_reject_bad_dimensions() {
        let surfaces = RasterSurfaces { max_dimension: 64 };
        assert!(surfaces.create(0, 10).is_err());
        assert!(surfaces.create(65, 10).is_err());
        let canvas = surfaces.create(64, 32).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (64, 32));
    }
}
