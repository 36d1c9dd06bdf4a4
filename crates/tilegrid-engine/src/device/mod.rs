//! GPU device + surface management.
//!
//! Creates the wgpu Instance/Adapter/Device/Queue for a window, keeps the
//! surface configured across resizes, and hands out one frame at a time.

mod frame;
mod gpu;
mod init;

pub use frame::{GpuFrame, SurfaceErrorAction};
pub use gpu::Gpu;
pub use init::GpuInit;
