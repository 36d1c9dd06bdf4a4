//! Shader stages and the tile render pipeline.
//!
//! The two stages are separate WGSL sources. Each is compiled (parsed and
//! validated with naga) on its own, then both are linked into a single
//! `wgpu::RenderPipeline`. Failures are logged and turn into `None`; the
//! frame renderer checks for that before drawing.

use std::fmt;

use wgpu::naga;

use super::quads::TileVertex;

pub const VERTEX_SOURCE: &str = include_str!("shaders/tile_vs.wgsl");
pub const FRAGMENT_SOURCE: &str = include_str!("shaders/tile_fs.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Vertex attribute slots.
pub const POSITION_LOCATION: u32 = 0;
pub const TEXCOORD_LOCATION: u32 = 1;

/// Group 0 bindings.
pub const RESOLUTION_BINDING: u32 = 0;
pub const ATLAS_TEXTURE_BINDING: u32 = 1;
pub const ATLAS_SAMPLER_BINDING: u32 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    fn naga_stage(self) -> naga::ShaderStage {
        match self {
            StageKind::Vertex => naga::ShaderStage::Vertex,
            StageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Vertex => f.write_str("vertex"),
            StageKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} stage failed to compile:\n{message}")]
    Compile { stage: StageKind, message: String },

    #[error("{stage} stage has no `{entry}` entry point")]
    MissingEntryPoint { stage: StageKind, entry: String },

    #[error("vertex stage does not consume attribute `{name}` at location {location}")]
    MissingAttribute { name: &'static str, location: u32 },

    #[error("no stage declares `{name}` at @group(0) @binding({binding})")]
    MissingBinding { name: &'static str, binding: u32 },

    #[error("fragment input at location {location} {reason}")]
    StageInterface { location: u32, reason: &'static str },

    #[error("device rejected the tile program: {0}")]
    Device(String),
}

/// A validated shader stage, ready to be linked.
#[derive(Debug)]
pub struct CompiledStage {
    kind: StageKind,
    entry: String,
    source: String,
    module: naga::Module,
}

impl CompiledStage {
    #[inline]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    #[inline]
    pub fn entry(&self) -> &str {
        &self.entry
    }

    fn entry_point(&self) -> Option<&naga::EntryPoint> {
        self.module.entry_points.iter().find(|ep| ep.name == self.entry)
    }

    /// `@location` inputs of the entry point, with their types.
    fn input_locations(&self) -> Vec<(u32, naga::TypeInner)> {
        let mut out = Vec::new();
        if let Some(ep) = self.entry_point() {
            for arg in &ep.function.arguments {
                self.collect_locations(arg.binding.as_ref(), arg.ty, &mut out);
            }
        }
        out
    }

    /// `@location` outputs of the entry point, with their types.
    fn output_locations(&self) -> Vec<(u32, naga::TypeInner)> {
        let mut out = Vec::new();
        if let Some(result) = self.entry_point().and_then(|ep| ep.function.result.as_ref()) {
            self.collect_locations(result.binding.as_ref(), result.ty, &mut out);
        }
        out
    }

    /// Flattens one interface value; structs contribute their members.
    fn collect_locations(
        &self,
        binding: Option<&naga::Binding>,
        ty: naga::Handle<naga::Type>,
        out: &mut Vec<(u32, naga::TypeInner)>,
    ) {
        let inner = &self.module.types[ty].inner;
        match binding {
            Some(naga::Binding::Location { location, .. }) => out.push((*location, inner.clone())),
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = inner {
                    for m in members {
                        self.collect_locations(m.binding.as_ref(), m.ty, out);
                    }
                }
            }
        }
    }

    fn has_input_location(&self, location: u32) -> bool {
        self.input_locations().iter().any(|(l, _)| *l == location)
    }

    fn has_binding(&self, group: u32, binding: u32) -> bool {
        self.module
            .global_variables
            .iter()
            .any(|(_, gv)| gv.binding.as_ref().is_some_and(|b| b.group == group && b.binding == binding))
    }
}

/// Parses and validates one stage.
///
/// The entry point must exist and belong to `kind`.
pub fn compile_stage(kind: StageKind, source: &str, entry: &str) -> Result<CompiledStage, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        stage: kind,
        message: e.emit_to_string(source),
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    );
    validator.validate(&module).map_err(|e| ShaderError::Compile {
        stage: kind,
        message: e.emit_to_string(source),
    })?;

    let found = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry && ep.stage == kind.naga_stage());
    if !found {
        return Err(ShaderError::MissingEntryPoint { stage: kind, entry: entry.to_string() });
    }

    Ok(CompiledStage {
        kind,
        entry: entry.to_string(),
        source: source.to_string(),
        module,
    })
}

/// Checks that `vs` and `fs` expose everything the tile layout needs.
pub fn check_link(vs: &CompiledStage, fs: &CompiledStage) -> Result<(), ShaderError> {
    for (name, location) in [("position", POSITION_LOCATION), ("texcoord", TEXCOORD_LOCATION)] {
        if !vs.has_input_location(location) {
            return Err(ShaderError::MissingAttribute { name, location });
        }
    }

    let bindings = [
        ("resolution", RESOLUTION_BINDING),
        ("atlas texture", ATLAS_TEXTURE_BINDING),
        ("atlas sampler", ATLAS_SAMPLER_BINDING),
    ];
    for (name, binding) in bindings {
        if !vs.has_binding(0, binding) && !fs.has_binding(0, binding) {
            return Err(ShaderError::MissingBinding { name, binding });
        }
    }

    let outputs = vs.output_locations();
    for (location, ty) in fs.input_locations() {
        match outputs.iter().find(|(l, _)| *l == location) {
            None => {
                return Err(ShaderError::StageInterface { location, reason: "is not written by the vertex stage" });
            }
            Some((_, written)) if *written != ty => {
                return Err(ShaderError::StageInterface { location, reason: "has a different type in the vertex stage" });
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Straight-alpha "over": `src * 1 + dst * (1 - src.a)`.
pub(crate) fn tile_blend() -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState { color: component, alpha: component }
}

/// Linked tile program: render pipeline + its bind group layout.
pub struct TilePipeline {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl TilePipeline {
    /// Compiles the built-in stages and links them for `format`.
    ///
    /// Returns `None` after logging if any step fails.
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Option<Self> {
        Self::from_sources(device, format, VERTEX_SOURCE, FRAGMENT_SOURCE)
    }

    /// Like [`new`](Self::new) with caller-supplied stage sources.
    pub fn from_sources(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Option<Self> {
        let linked = compile_stage(StageKind::Vertex, vertex_source, VERTEX_ENTRY).and_then(|vs| {
            let fs = compile_stage(StageKind::Fragment, fragment_source, FRAGMENT_ENTRY)?;
            check_link(&vs, &fs)?;
            Self::link_checked(device, format, &vs, &fs)
        });

        match linked {
            Ok(linked) => {
                log::info!("tile pipeline linked for {format:?}");
                Some(linked)
            }
            Err(e) => {
                log::error!("tile pipeline setup failed: {e}");
                None
            }
        }
    }

    /// Runs [`link`](Self::link) inside a validation error scope; device-side
    /// rejections come back as [`ShaderError::Device`].
    fn link_checked(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vs: &CompiledStage,
        fs: &CompiledStage,
    ) -> Result<Self, ShaderError> {
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let linked = Self::link(device, format, vs, fs);
        match pollster::block_on(scope.pop()) {
            Some(err) => Err(ShaderError::Device(err.to_string())),
            None => Ok(linked),
        }
    }

    fn link(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        vs: &CompiledStage,
        fs: &CompiledStage,
    ) -> Self {
        let vs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tilegrid tile vs"),
            source: wgpu::ShaderSource::Wgsl(vs.source.as_str().into()),
        });
        let fs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tilegrid tile fs"),
            source: wgpu::ShaderSource::Wgsl(fs.source.as_str().into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tilegrid tile bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: RESOLUTION_BINDING,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(super::renderer::resolution_ubo_min_binding_size()),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: ATLAS_TEXTURE_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: ATLAS_SAMPLER_BINDING,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tilegrid tile pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tilegrid tile pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs_module,
                entry_point: Some(vs.entry()),
                compilation_options: Default::default(),
                buffers: &[TileVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs_module,
                entry_point: Some(fs.entry()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(tile_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            // 2D only: tiles never overlap, so no depth attachment.
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Self { format, pipeline, bind_group_layout }
    }

    #[inline]
    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    #[inline]
    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    #[inline]
    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> (CompiledStage, CompiledStage) {
        let vs = compile_stage(StageKind::Vertex, VERTEX_SOURCE, VERTEX_ENTRY).unwrap();
        let fs = compile_stage(StageKind::Fragment, FRAGMENT_SOURCE, FRAGMENT_ENTRY).unwrap();
        (vs, fs)
    }

    #[test]
    fn builtin_stages_compile_and_link() {
        let (vs, fs) = builtin();
        assert_eq!(vs.kind(), StageKind::Vertex);
        assert_eq!(fs.kind(), StageKind::Fragment);
        check_link(&vs, &fs).unwrap();
    }

    #[test]
    fn syntax_error_is_a_compile_error() {
        let err = compile_stage(StageKind::Vertex, "@vertex fn vs_main( {", VERTEX_ENTRY).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: StageKind::Vertex, .. }));
    }

    #[test]
    fn type_error_is_a_compile_error() {
        let src = "@fragment fn fs_main() -> @location(0) vec4<f32> { return 1.0; }";
        let err = compile_stage(StageKind::Fragment, src, FRAGMENT_ENTRY).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: StageKind::Fragment, .. }));
    }

    #[test]
    fn wrong_stage_entry_point_is_rejected() {
        let err = compile_stage(StageKind::Vertex, FRAGMENT_SOURCE, FRAGMENT_ENTRY).unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { stage: StageKind::Vertex, .. }));
    }

    #[test]
    fn link_requires_texcoord_attribute() {
        let src = "
            @vertex
            fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position, 0.0, 1.0);
            }
        ";
        let vs = compile_stage(StageKind::Vertex, src, VERTEX_ENTRY).unwrap();
        let (_, fs) = builtin();
        let err = check_link(&vs, &fs).unwrap_err();
        assert!(matches!(err, ShaderError::MissingAttribute { location: TEXCOORD_LOCATION, .. }));
    }

    #[test]
    fn link_requires_resolution_uniform() {
        let src = "
            @vertex
            fn vs_main(
                @location(0) position: vec2<f32>,
                @location(1) texcoord: vec2<f32>,
            ) -> @builtin(position) vec4<f32> {
                return vec4<f32>(position + texcoord, 0.0, 1.0);
            }
        ";
        let vs = compile_stage(StageKind::Vertex, src, VERTEX_ENTRY).unwrap();
        let (_, fs) = builtin();
        let err = check_link(&vs, &fs).unwrap_err();
        assert!(matches!(err, ShaderError::MissingBinding { binding: RESOLUTION_BINDING, .. }));
    }

    // ── stage interface ──────────────────────────────────────────────────

    const VS_TEXCOORD_AT_3: &str = "
        struct Resolution { size: vec2<f32>, _pad: vec2<f32> };
        @group(0) @binding(0) var<uniform> resolution: Resolution;

        struct VsOut {
            @builtin(position) clip: vec4<f32>,
            @location(3) texcoord: vec2<f32>,
        };

        @vertex
        fn vs_main(@location(0) position: vec2<f32>, @location(1) texcoord: vec2<f32>) -> VsOut {
            var out: VsOut;
            out.clip = vec4<f32>(position / resolution.size, 0.0, 1.0);
            out.texcoord = texcoord;
            return out;
        }
    ";

    #[test]
    fn link_rejects_fragment_input_not_written_by_vertex() {
        let vs = compile_stage(StageKind::Vertex, VS_TEXCOORD_AT_3, VERTEX_ENTRY).unwrap();
        let (_, fs) = builtin();
        let err = check_link(&vs, &fs).unwrap_err();
        assert!(matches!(err, ShaderError::StageInterface { location: 0, .. }));
    }

    #[test]
    fn link_rejects_varying_type_mismatch() {
        let src = "
            struct Resolution { size: vec2<f32>, _pad: vec2<f32> };
            @group(0) @binding(0) var<uniform> resolution: Resolution;

            struct VsOut {
                @builtin(position) clip: vec4<f32>,
                @location(0) texcoord: vec4<f32>,
            };

            @vertex
            fn vs_main(@location(0) position: vec2<f32>, @location(1) texcoord: vec2<f32>) -> VsOut {
                var out: VsOut;
                out.clip = vec4<f32>(position / resolution.size, 0.0, 1.0);
                out.texcoord = vec4<f32>(texcoord, 0.0, 0.0);
                return out;
            }
        ";
        let vs = compile_stage(StageKind::Vertex, src, VERTEX_ENTRY).unwrap();
        let (_, fs) = builtin();
        let err = check_link(&vs, &fs).unwrap_err();
        assert!(matches!(err, ShaderError::StageInterface { location: 0, .. }));
    }

    #[test]
    fn builtin_varyings_line_up() {
        let (vs, fs) = builtin();
        let written: Vec<u32> = vs.output_locations().into_iter().map(|(l, _)| l).collect();
        let read: Vec<u32> = fs.input_locations().into_iter().map(|(l, _)| l).collect();
        assert_eq!(written, vec![0]);
        assert_eq!(read, vec![0]);
    }

    // ── device ───────────────────────────────────────────────────────────

    #[test]
    fn builtin_pipeline_builds_on_device() {
        let (device, _queue) = crate::tiles::test_device::noop();
        let format = wgpu::TextureFormat::Bgra8UnormSrgb;
        let pipeline = TilePipeline::new(&device, format).unwrap();
        assert_eq!(pipeline.format(), format);
    }

    #[test]
    fn interface_mismatch_yields_no_pipeline() {
        let (device, _queue) = crate::tiles::test_device::noop();
        let pipeline = TilePipeline::from_sources(
            &device,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            VS_TEXCOORD_AT_3,
            FRAGMENT_SOURCE,
        );
        assert!(pipeline.is_none());
    }

    // ── blend ────────────────────────────────────────────────────────────

    #[test]
    fn blend_is_one_one_minus_src_alpha() {
        let b = tile_blend();
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(b.color.operation, wgpu::BlendOperation::Add);
        assert_eq!(b.alpha, b.color);
    }
}
