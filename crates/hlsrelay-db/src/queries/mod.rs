//! Database query operations.

pub mod overlays;
