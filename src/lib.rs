//! Clustered, prioritized, collision-aware content markers on a terminal map.
//!
//! The engine ([`engine::MarkerEngine`]) is generic over the host rendering
//! surface and projection; [`map`] provides the terminal host used by the
//! `tui-pinmap` binary.

pub mod braille;
pub mod cluster;
pub mod collision;
pub mod config;
pub mod data;
pub mod engine;
pub mod entity;
pub mod error;
pub mod geo;
mod hash;
pub mod icon;
pub mod interaction;
pub mod loader;
pub mod logging;
pub mod map;
pub mod pool;
pub mod render;
pub mod surface;
pub mod timing;
