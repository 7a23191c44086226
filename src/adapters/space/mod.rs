//! # Space Adapters
//!
//! In-crate implementations of the [`Oracle`](crate::ports::Oracle) port.
//!
//! Available adapters:
//! - `BoxSpace` - Euclidean box with a pluggable validity predicate and
//!   discretized motion checking

mod box_space;

pub use box_space::{BoxSpace, ValidityFn};
