use std::path::PathBuf;

use clap::Parser;

/// Tilegrid viewer: draws a demo board from a 12x8 tile atlas.
#[derive(Parser, Debug)]
#[command(name = "tilegrid-viewer", version, about)]
pub struct Args {
    /// Atlas image (PNG); 32 px cells in a 12x8 grid.
    #[arg(default_value = "assets/icons32.png")]
    pub atlas: PathBuf,

    /// Advance the demo board every N frames.
    #[arg(long, default_value_t = 8)]
    pub key_frame_interval: u64,

    /// Log filter override (env_logger syntax, e.g. "debug").
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
