//! GPU rendering subsystem.
//!
//! Renderers own their GPU resources (pipelines, buffers, textures) and
//! record into a [`RenderTarget`] handed out by the frame context.
//!
//! Convention:
//! - CPU geometry is in physical pixels.
//! - Vertex shaders convert to NDC using a resolution uniform.

mod ctx;
pub mod tiles;

pub use ctx::{RenderCtx, RenderTarget};
