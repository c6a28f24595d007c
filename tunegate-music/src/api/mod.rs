//! HTTP API handlers for tunegate-music

pub mod buildinfo;
pub mod cors;
pub mod health;
pub mod music;

pub use buildinfo::get_build_info;
pub use cors::{answer_options, cors_layer};
pub use health::{health_check, health_routes};
