pub mod camera;
pub mod frustum_helper;
mod gpu;

pub use camera::{OrbitControls, PerspectiveCamera};
pub use gpu::RenderContext;

use crate::scene::Scene;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter found")]
    AdapterUnavailable,
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire surface texture: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Pixel rectangle with its origin at the bottom-left of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// What the frame loop needs from a renderer.
pub trait RenderBackend {
    /// Current pixel size of the drawable area (the window's inner size).
    fn drawable_size(&self) -> (u32, u32);
    /// Pixel size the output surface is configured for.
    fn surface_size(&self) -> (u32, u32);
    fn resize_surface(&mut self, width: u32, height: u32);
    fn set_scissor_test(&mut self, enabled: bool);
    fn set_scissor(&mut self, rect: Viewport);
    fn set_viewport(&mut self, rect: Viewport);
    /// Draws `scene` from `camera` into the current viewport and presents it.
    fn render_frame(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError>;
}

#[cfg(test)]
mod tests {
    use super::Viewport;

    #[test]
    fn viewport_aspect_guards_zero_height() {
        assert_eq!(Viewport::full(1024, 768).aspect(), 1024.0 / 768.0);
        assert_eq!(Viewport::full(640, 0).aspect(), 640.0);
    }
}
