//! Small value types shared by the runtime and renderers.
//!
//! Pixel quantities are physical pixels. Tile geometry uses a y-up space
//! with the origin at the bottom-left of the surface.

mod color;
mod viewport;

pub use color::ColorRgba;
pub use viewport::Viewport;
