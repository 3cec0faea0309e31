#![warn(missing_docs)]

//! Overlap resolution between independently tessellated solids.
//!
//! Solids that share a scene are tessellated one at a time, so a triangle
//! of one can cut through a triangle of another. [`resolve_overlaps`]
//! finds such pairs (face boxes first, then per-face triangle trees and an
//! exact contact test) and splits their longer edges until every remaining
//! contact is a touch or the edges reach the length floor.
//!
//! ```
//! use cdt_kernel_brep::make_cube;
//! use cdt_kernel_overlap::{resolve_overlaps, OverlapParams};
//! use cdt_kernel_tessellate::{TessState, TessellationParams};
//!
//! let mut states = Vec::new();
//! for dx in [0.0, 0.5] {
//!     let mut brep = make_cube(1.0, 1.0, 1.0).unwrap();
//!     brep.translate(dx, 0.25, 0.25).unwrap();
//!     let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
//!     state.tessellate(None).unwrap();
//!     states.push(state);
//! }
//! let report = resolve_overlaps(&mut states, &OverlapParams::default()).unwrap();
//! assert!(report.iterations >= 1);
//! ```

pub mod contact;
mod error;
pub mod overt;
mod params;
mod resolve;

pub use contact::{classify, Contact, ContactCounts};
pub use error::{OverlapError, Result};
pub use overt::{OverlapVertex, VertexIndex};
pub use params::OverlapParams;
pub use resolve::{resolve_overlaps, OverlapReport};
