use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::{ColorRgba, Viewport};
use crate::render::{RenderCtx, RenderTarget};

use super::atlas::{AtlasSource, TileAtlas};
use super::grid::{AtlasGrid, Board, GridSize};
use super::pipeline::{
    TilePipeline, ATLAS_SAMPLER_BINDING, ATLAS_TEXTURE_BINDING, RESOLUTION_BINDING,
};
use super::quads::{QuadBuffer, TileLayout};
use super::status::{Status, StatusSink};

/// Constructor-time configuration for [`TileRenderer`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TileMapConfig {
    pub grid: GridSize,
    pub atlas: AtlasGrid,
    /// Edge length of one tile in pixels; equals the atlas cell size.
    pub tile_size: f32,
    /// Vertical margin below the board, in pixels.
    pub y_offset: f32,
    pub clear_color: ColorRgba,
}

impl TileMapConfig {
    #[inline]
    pub fn layout(&self) -> TileLayout {
        TileLayout {
            atlas: self.atlas,
            tile_size: self.tile_size,
            y_offset: self.y_offset,
        }
    }

    /// Surface size needed to show the whole board, in pixels.
    pub fn board_extent(&self) -> (f32, f32) {
        (
            self.grid.width as f32 * self.tile_size,
            self.grid.height as f32 * self.tile_size + self.y_offset,
        )
    }
}

impl Default for TileMapConfig {
    fn default() -> Self {
        Self {
            grid: GridSize::default(),
            atlas: AtlasGrid::default(),
            tile_size: 32.0,
            y_offset: 64.0,
            clear_color: ColorRgba::gray(0.2),
        }
    }
}

/// `resolution` uniform: surface size in pixels, padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable, PartialEq)]
pub struct ResolutionUniform {
    pub size: [f32; 2],
    pub _pad: [f32; 2],
}

impl ResolutionUniform {
    pub fn from_viewport(viewport: Viewport) -> Self {
        Self {
            size: [viewport.width.max(1.0), viewport.height.max(1.0)],
            _pad: [0.0; 2],
        }
    }
}

pub(super) fn resolution_ubo_min_binding_size() -> NonZeroU64 {
    NonZeroU64::new(std::mem::size_of::<ResolutionUniform>() as u64)
        .unwrap_or(NonZeroU64::MIN)
}

/// Draws one board of tiles per frame in a single draw call.
///
/// Owns everything the tile map needs on the GPU: pipeline, atlas, vertex
/// buffer (sized once for a fully visible board) and the resolution uniform.
pub struct TileRenderer {
    config: TileMapConfig,
    layout: TileLayout,

    pipeline: Option<TilePipeline>,
    atlas: TileAtlas,

    bind_group: Option<wgpu::BindGroup>,

    resolution_ubo: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    quads: QuadBuffer,

    warned_no_pipeline: bool,
    warned_grid_mismatch: bool,
}

impl TileRenderer {
    /// Sets up pipeline, placeholder atlas and buffers, and starts loading `atlas`.
    ///
    /// A failed pipeline is logged and leaves the renderer clearing only.
    pub fn new(ctx: &RenderCtx<'_>, config: TileMapConfig, atlas: Option<AtlasSource>) -> Self {
        let pipeline = TilePipeline::new(ctx.device, ctx.surface_format);
        let atlas = TileAtlas::new(ctx.device, ctx.queue, atlas);

        let resolution_ubo = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tilegrid resolution ubo"),
            contents: bytemuck::bytes_of(&ResolutionUniform::from_viewport(ctx.viewport)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let quads = QuadBuffer::new(config.grid);
        let vertex_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tilegrid tile vbo"),
            size: quads.capacity_bytes(),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "tile renderer: {}x{} grid, {} vertex capacity",
            config.grid.width,
            config.grid.height,
            quads.capacity()
        );

        let mut renderer = Self {
            config,
            layout: config.layout(),
            pipeline,
            atlas,
            bind_group: None,
            resolution_ubo,
            vertex_buffer,
            quads,
            warned_no_pipeline: false,
            warned_grid_mismatch: false,
        };
        renderer.rebuild_bind_group(ctx.device);
        renderer
    }

    /// Renders `board` into `target` and forwards `status` to `sink`.
    ///
    /// Clears to the configured color, then issues exactly one draw with
    /// `6 * visible` vertices (zero for an empty board).
    pub fn render_frame(
        &mut self,
        ctx: &RenderCtx<'_>,
        target: &mut RenderTarget<'_>,
        board: &Board,
        status: &Status,
        sink: &mut dyn StatusSink,
    ) {
        if self.atlas.poll(ctx.device, ctx.queue) {
            self.rebuild_bind_group(ctx.device);
        }

        sink.show_status(&status.to_string());

        if board.grid() == self.quads.grid() {
            self.quads.build(board, &self.layout);
        } else {
            if !self.warned_grid_mismatch {
                log::warn!(
                    "TileRenderer: board is {}x{}, renderer expects {}x{}; drawing nothing",
                    board.grid().width,
                    board.grid().height,
                    self.config.grid.width,
                    self.config.grid.height
                );
                self.warned_grid_mismatch = true;
            }
            self.quads.build(&Board::empty(self.config.grid), &self.layout);
        }

        if !self.quads.vertices().is_empty() {
            ctx.queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(self.quads.vertices()));
        }

        ctx.queue.write_buffer(
            &self.resolution_ubo,
            0,
            bytemuck::bytes_of(&ResolutionUniform::from_viewport(ctx.viewport)),
        );

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tilegrid tile pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.config.clear_color.to_wgpu()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        let (Some(pipeline), Some(bind_group)) = (self.pipeline.as_ref(), self.bind_group.as_ref()) else {
            if !self.warned_no_pipeline {
                log::warn!("TileRenderer: no valid pipeline; frames are cleared but not drawn");
                self.warned_no_pipeline = true;
            }
            return;
        };

        rpass.set_pipeline(pipeline.pipeline());
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        rpass.draw(0..self.quads.vertex_count(), 0..1);
    }

    /// Releases GPU buffers now instead of at drop.
    pub fn shutdown(self) {
        self.vertex_buffer.destroy();
        self.resolution_ubo.destroy();
        log::debug!("tile renderer shut down");
    }

    fn rebuild_bind_group(&mut self, device: &wgpu::Device) {
        let Some(pipeline) = self.pipeline.as_ref() else { return };

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tilegrid tile bind group"),
            layout: pipeline.bind_group_layout(),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: RESOLUTION_BINDING,
                    resource: self.resolution_ubo.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: ATLAS_TEXTURE_BINDING,
                    resource: wgpu::BindingResource::TextureView(self.atlas.view()),
                },
                wgpu::BindGroupEntry {
                    binding: ATLAS_SAMPLER_BINDING,
                    resource: wgpu::BindingResource::Sampler(self.atlas.sampler()),
                },
            ],
        }));
        log::debug!("tile bind group built (atlas generation {})", self.atlas.generation());
    }

    #[inline]
    pub fn config(&self) -> &TileMapConfig {
        &self.config
    }

    #[inline]
    pub fn has_pipeline(&self) -> bool {
        self.pipeline.is_some()
    }

    #[inline]
    pub fn atlas(&self) -> &TileAtlas {
        &self.atlas
    }

    /// Visible tiles drawn by the last frame.
    #[inline]
    pub fn visible_count(&self) -> usize {
        self.quads.visible_count()
    }

    /// Vertex count passed to the last draw.
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.quads.vertex_count()
    }
}
