use wgpu::SurfaceError;

/// One acquired swapchain image plus the encoder recording into it.
///
/// Hand it back to [`Gpu::submit`](super::Gpu::submit) promptly; holding it
/// blocks acquisition of the next frame.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

/// What the runtime should do after a failed frame acquisition.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; try again next frame.
    Reconfigured,
    SkipFrame,
    /// Out of memory; shut down.
    Fatal,
}

impl SurfaceErrorAction {
    /// Classifies `err`. `Reconfigured` means the caller must reconfigure the surface.
    pub fn classify(err: &SurfaceError) -> Self {
        match err {
            SurfaceError::Lost | SurfaceError::Outdated => SurfaceErrorAction::Reconfigured,
            SurfaceError::OutOfMemory => SurfaceErrorAction::Fatal,
            SurfaceError::Timeout | SurfaceError::Other => SurfaceErrorAction::SkipFrame,
        }
    }
}
