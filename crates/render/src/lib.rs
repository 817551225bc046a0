#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `render` holds the arithmetic both processes agree on: the complex-plane
//! geometry that turns a viewing region into per-pixel steps and chunk
//! origins, the escape-time kernel the workers iterate, and the palette the
//! controller maps iteration counts through.
//!
//! # Design
//!
//! - [`Complex`] is a minimal value type; the kernel needs only squaring,
//!   addition, and the squared norm.
//! - [`ChunkGrid`] owns every index computation involving chunk ids, so the
//!   planner and the burst handler cannot drift apart: the id assigned when
//!   a chunk is planned is the id used to place its pixels.
//! - [`escape_time`] is pure and deterministic; identical inputs produce
//!   identical counts on both ends, which the end-to-end tests rely on.
//!
//! # Examples
//!
//! ```
//! use render::{Complex, escape_time};
//!
//! let c = Complex::new(-0.4, 0.6);
//! let z0 = Complex::new(-1.6, -1.1);
//! assert_eq!(escape_time(z0, c, 10), 1);
//! ```

mod geometry;
mod kernel;
mod palette;

pub use crate::geometry::{ChunkGrid, Region};
pub use crate::kernel::{Complex, escape_time};
pub use crate::palette::shade;
