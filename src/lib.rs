//! hlsrelay - RTSP to HLS relay
//!
//! This library crate exposes the server components for integration testing.

pub mod config;
pub mod conversion;
pub mod overlays;
pub mod server;
