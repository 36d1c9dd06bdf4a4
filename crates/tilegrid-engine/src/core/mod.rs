//! Contract between the runtime loop and the application.
//!
//! The runtime owns windows and GPU state; the application sees them only
//! through [`FrameCtx`] once per frame.

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
