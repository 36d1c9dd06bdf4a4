mod cli;
mod demo;

use anyhow::Result;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use tilegrid_engine::core::{App, AppControl, FrameCtx};
use tilegrid_engine::device::GpuInit;
use tilegrid_engine::logging::{init_logging, LoggingConfig};
use tilegrid_engine::tiles::{AtlasSource, TileMapConfig, TileRenderer};
use tilegrid_engine::window::{Runtime, RuntimeConfig};

use demo::Demo;

struct Viewer {
    config: TileMapConfig,
    atlas: Option<AtlasSource>,
    key_frame_interval: u64,
    demo: Demo,
    renderer: Option<TileRenderer>,
}

impl App for Viewer {
    fn on_window_event(&mut self, _id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if self.renderer.is_none() {
            let rctx = ctx.render_ctx();
            self.renderer = Some(TileRenderer::new(&rctx, self.config, self.atlas.take()));
        }

        if ctx.time.is_keyframe(self.key_frame_interval) {
            self.demo.step();
        }

        let Some(renderer) = self.renderer.as_mut() else { return AppControl::Continue };
        let board = self.demo.board();
        let status = *self.demo.status();

        ctx.render(|rctx, target, window| {
            renderer.render_frame(rctx, target, &board, &status, window);
        })
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.shutdown();
        }
    }
}

fn main() -> Result<()> {
    let args = cli::parse();

    init_logging(match args.log_level {
        Some(filter) => LoggingConfig::with_filter(filter),
        None => LoggingConfig::default(),
    });

    let config = TileMapConfig::default();
    log::info!(
        "atlas {}, key frame every {} frames",
        args.atlas.display(),
        args.key_frame_interval.max(1)
    );

    let viewer = Viewer {
        config,
        atlas: Some(AtlasSource::Path(args.atlas)),
        key_frame_interval: args.key_frame_interval,
        demo: Demo::new(config.grid),
        renderer: None,
    };

    Runtime::run(RuntimeConfig::default(), GpuInit::default(), viewer)
}
