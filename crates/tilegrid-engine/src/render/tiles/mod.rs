//! Tile map renderer.
//!
//! A fixed grid of uniform tiles, each sampling one cell of a shared atlas,
//! drawn with a single call per frame.
//!
//! Pixel space here is y-up with the origin at the bottom-left of the
//! surface; board row 0 sits `y_offset` pixels above the bottom edge.

mod atlas;
mod grid;
mod pipeline;
mod quads;
mod renderer;
mod status;

#[cfg(test)]
pub(crate) mod test_device {
    /// Headless device; validation runs, nothing is executed.
    pub(crate) fn noop() -> (wgpu::Device, wgpu::Queue) {
        wgpu::Device::noop(&wgpu::DeviceDescriptor::default())
    }
}

pub use atlas::{
    build_mip_chain, mip_level_count, AtlasImage, AtlasLoader, AtlasSource, TileAtlas,
    PLACEHOLDER_TEXEL,
};
pub use grid::{is_visible, AtlasGrid, Board, BoardError, GridSize, EMPTY_TILE};
pub use pipeline::{
    check_link, compile_stage, CompiledStage, ShaderError, StageKind, TilePipeline,
    FRAGMENT_ENTRY, FRAGMENT_SOURCE, VERTEX_ENTRY, VERTEX_SOURCE,
};
pub use quads::{build_quads, QuadBuffer, TileLayout, TileVertex, FLOATS_PER_VERTEX, VERTICES_PER_TILE};
pub use renderer::{ResolutionUniform, TileMapConfig, TileRenderer};
pub use status::{Status, StatusSink};
