//! Spatial placement visualization and validation engine.
//!
//! Keeps a 3D scene in sync with container and item data, previews
//! suggested placements as a ghost box, hit-tests the pointer against placed
//! items and checks placements geometrically before they are committed.

pub mod camera;
pub mod client;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod model;
pub mod picking;
pub mod preview;
pub mod render;
pub mod scene;
pub mod types;
