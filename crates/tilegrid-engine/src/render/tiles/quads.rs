//! CPU-side quad geometry for the tile board.

use bytemuck::{Pod, Zeroable};

use super::grid::{is_visible, AtlasGrid, Board, GridSize};

/// Vertices emitted per visible tile (two triangles, no index buffer).
pub const VERTICES_PER_TILE: usize = 6;

/// Floats per vertex: `position.xy, texcoord.uv`.
pub const FLOATS_PER_VERTEX: usize = 4;

/// Interleaved vertex: pixel-space position + atlas-cell UV. 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct TileVertex {
    pub position: [f32; 2],
    pub texcoord: [f32; 2],
}

impl TileVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2  // texcoord
    ];

    #[inline]
    const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { position: [x, y], texcoord: [u, v] }
    }

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

/// How board cells map to pixels and atlas cells.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileLayout {
    pub atlas: AtlasGrid,
    /// Edge length of a tile in pixels; equals the atlas cell size.
    pub tile_size: f32,
    /// Vertical margin below the board, reserved for UI.
    pub y_offset: f32,
}

impl TileLayout {
    /// Pixel-space corner of world cell `(x, y)`.
    #[inline]
    pub fn corner(&self, x: u32, y: u32) -> [f32; 2] {
        [x as f32 * self.tile_size, self.y_offset + y as f32 * self.tile_size]
    }
}

impl Default for TileLayout {
    fn default() -> Self {
        Self {
            atlas: AtlasGrid::default(),
            tile_size: 32.0,
            y_offset: 64.0,
        }
    }
}

/// Writes one quad per visible cell of `board` into `out`, front to back.
///
/// Returns the number of visible tiles; only the first
/// `visible * VERTICES_PER_TILE` vertices of `out` are meaningful afterwards.
/// The rest of `out` is left as it was.
///
/// # Panics
/// If `out` holds fewer than `board.len() * VERTICES_PER_TILE` vertices.
pub fn build_quads(board: &Board, layout: &TileLayout, out: &mut [TileVertex]) -> usize {
    assert!(
        out.len() >= board.len() * VERTICES_PER_TILE,
        "quad output holds {} vertices, board needs up to {}",
        out.len(),
        board.len() * VERTICES_PER_TILE
    );

    let grid = board.grid();
    let s = layout.tile_size;
    let mut cursor = 0usize;

    for (index, &code) in board.cells().iter().enumerate() {
        if !is_visible(code) {
            continue;
        }

        let (x, y) = grid.cell_of(index);
        let [x0, y0] = layout.corner(x, y);
        let (x1, y1) = (x0 + s, y0 + s);
        let ([u0, v0], [u1, v1]) = layout.atlas.uv_bounds(code);

        let tl = TileVertex::new(x0, y0, u0, v0);
        let bl = TileVertex::new(x0, y1, u0, v1);
        let tr = TileVertex::new(x1, y0, u1, v0);
        let br = TileVertex::new(x1, y1, u1, v1);

        out[cursor..cursor + VERTICES_PER_TILE].copy_from_slice(&[tl, bl, tr, tr, bl, br]);
        cursor += VERTICES_PER_TILE;
    }

    cursor / VERTICES_PER_TILE
}

/// Pre-allocated vertex storage sized for a fully visible board.
///
/// Never grows; each [`build`](Self::build) rewrites the prefix in place.
#[derive(Debug, Clone)]
pub struct QuadBuffer {
    grid: GridSize,
    vertices: Vec<TileVertex>,
    visible: usize,
}

impl QuadBuffer {
    pub fn new(grid: GridSize) -> Self {
        Self {
            grid,
            vertices: vec![TileVertex::zeroed(); grid.cell_count() * VERTICES_PER_TILE],
            visible: 0,
        }
    }

    /// Rebuilds geometry from `board`. Returns the visible tile count.
    pub fn build(&mut self, board: &Board, layout: &TileLayout) -> usize {
        debug_assert_eq!(board.grid(), self.grid, "board grid does not match quad buffer");
        self.visible = build_quads(board, layout, &mut self.vertices);
        self.visible
    }

    #[inline]
    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Visible tiles from the last build.
    #[inline]
    pub fn visible_count(&self) -> usize {
        self.visible
    }

    /// Vertex count for the draw call (`6 * visible`).
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        (self.visible * VERTICES_PER_TILE) as u32
    }

    /// Meaningful prefix from the last build.
    #[inline]
    pub fn vertices(&self) -> &[TileVertex] {
        &self.vertices[..self.visible * VERTICES_PER_TILE]
    }

    /// Meaningful prefix as raw floats (`visible * 24`).
    #[inline]
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(self.vertices())
    }

    /// Total vertex capacity (`W * H * 6`).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    /// Capacity in bytes, for sizing the GPU buffer.
    #[inline]
    pub fn capacity_bytes(&self) -> u64 {
        (self.vertices.len() * std::mem::size_of::<TileVertex>()) as u64
    }
}
