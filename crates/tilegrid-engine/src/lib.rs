//! Tilegrid engine crate.
//!
//! A window + GPU runtime and a renderer that draws one flat grid of
//! uniform tiles from a single texture atlas, one draw call per frame.

pub mod core;
pub mod coords;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;

pub use render::tiles;
