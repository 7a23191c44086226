//! # Adapters
//!
//! Swappable implementations of port traits.
//!
//! - Index adapters: Linear (brute force), GNAT (pivot tree)
//! - Space adapters: Euclidean box oracle
//! - Path simplification: greedy shortcutting
//!
//! Each adapter implements one port trait.
//! Adapters can be swapped without changing the engine.

pub mod index;
pub mod simplify;
pub mod space;
