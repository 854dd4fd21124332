use image::{GrayImage, ImageResult, Luma};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A 2D drawing target for waveforms.
pub trait Surface: Send {
    /// Layout size in CSS pixels
    fn css_size(&self) -> (f32, f32);

    fn device_pixel_ratio(&self) -> f32;

    /// Set the backing store size in physical pixels
    fn resize_backing(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    /// Stroke a one-pixel vertical line at column `x` from `y0` to `y1`
    fn vertical_line(&mut self, x: f32, y0: f32, y1: f32);
}

/// Surface shared between the live visualizer and the preview coordinator.
pub type SharedSurface = Arc<Mutex<dyn Surface>>;

pub fn lock_surface(surface: &SharedSurface) -> MutexGuard<'_, dyn Surface + 'static> {
    surface.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Grayscale raster surface backed by an [`image::GrayImage`].
pub struct ImageSurface {
    css_width: f32,
    css_height: f32,
    pixel_ratio: f32,
    background: Luma<u8>,
    ink: Luma<u8>,
    image: GrayImage,
}

impl ImageSurface {
    pub fn new(css_width: f32, css_height: f32, pixel_ratio: f32) -> Self {
        Self {
            css_width,
            css_height,
            pixel_ratio,
            background: Luma([255]),
            ink: Luma([0]),
            image: GrayImage::new(0, 0),
        }
    }

    pub fn shared(self) -> Arc<Mutex<ImageSurface>> {
        Arc::new(Mutex::new(self))
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Number of inked pixels in column `x`
    pub fn column_coverage(&self, x: u32) -> u32 {
        if x >= self.image.width() {
            return 0;
        }
        (0..self.image.height())
            .filter(|&y| *self.image.get_pixel(x, y) == self.ink)
            .count() as u32
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> ImageResult<()> {
        self.image.save(path)
    }
}

impl Default for ImageSurface {
    fn default() -> Self {
        Self::new(600.0, 64.0, 1.0)
    }
}

impl Surface for ImageSurface {
    fn css_size(&self) -> (f32, f32) {
        (self.css_width, self.css_height)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = GrayImage::from_pixel(width, height, self.background);
        }
    }

    fn clear(&mut self) {
        let background = self.background;
        self.image.pixels_mut().for_each(|p| *p = background);
    }

    fn vertical_line(&mut self, x: f32, y0: f32, y1: f32) {
        let (width, height) = self.image.dimensions();
        if height == 0 || x < 0.0 || x >= width as f32 {
            return;
        }

        let column = x as u32;
        let top = y0.min(y1).floor().clamp(0.0, (height - 1) as f32) as u32;
        let bottom = y0.max(y1).floor().clamp(0.0, (height - 1) as f32) as u32;

        for y in top..=bottom {
            self.image.put_pixel(column, y, self.ink);
        }
    }
}
