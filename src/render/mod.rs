//! Waveform rasterization onto 2D surfaces.

pub mod renderer;
pub mod surface;

pub use renderer::render_peaks;
pub use surface::{lock_surface, ImageSurface, SharedSurface, Surface};
