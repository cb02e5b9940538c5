//! Shared types for the scenelink workspace.

mod types;

pub use types::Entity;

pub fn crate_info() -> &'static str {
    "scenelink-common v0.1.0"
}
