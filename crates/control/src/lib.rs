#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `control` implements the controller process: it turns user intent into
//! protocol messages, paces chunk requests to the compute module's worker
//! count, and assembles streamed results into an RGB bitmap.
//!
//! # Design
//!
//! - The [`Dispatcher`] owns the pending-chunk queue and the pacing rule:
//!   at any moment the number of `Compute` frames sent but not yet
//!   acknowledged with `Done` stays at or below the module's advertised
//!   worker count (1 until the `Startup` banner arrives). Priming sends
//!   `min(workers, chunks)` requests; each `Done` releases exactly one
//!   more.
//! - The [`Controller`] glues the dispatcher to the view state (region,
//!   chunk grid, parameters, bitmap) and the abstract [`Screen`]. Burst
//!   placement uses chunk ids, never arrival order, so interleaved results
//!   from different workers land correctly.
//! - The windowing toolkit stays outside this crate: [`Screen`] is the
//!   narrow interface the controller drives, and [`LogScreen`] is the
//!   default implementation that logs redraw requests.
//!
//! # See also
//!
//! - The `compute` crate for the peer that executes the chunks.

mod bitmap;
mod config;
mod controller;
mod dispatcher;
mod keyboard;
mod run;
mod screen;

pub use crate::bitmap::Bitmap;
pub use crate::config::ControlConfig;
pub use crate::controller::Controller;
pub use crate::dispatcher::{Dispatcher, Session};
pub use crate::keyboard::Key;
pub use crate::run::{RunError, run};
pub use crate::screen::{LogScreen, Screen, WindowState};

/// Chunk width in pixels; image widths are multiples of this.
pub const CHUNK_WIDTH: u8 = 64;

/// Chunk height in pixels; image heights are multiples of this.
pub const CHUNK_HEIGHT: u8 = 48;

/// Default iteration cap.
pub const DEFAULT_ITERATIONS: u8 = 100;

/// File the `x` command writes the bitmap to.
pub const EXPORT_PATH: &str = "fractal.png";
