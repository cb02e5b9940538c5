//! Developer tooling: a text backend for the inspector UI and read-only
//! manager diagnostics.
//!
//! # Invariants
//! - Diagnostics never mutate the manager.
//! - [`TextInspector`] answers interactions only from its script, so a frame
//!   rendered without a script stages nothing.

mod inspector;
mod text;

pub use inspector::{EntityInfo, ManagerInspector, ManagerSummary};
pub use text::TextInspector;

pub fn crate_info() -> &'static str {
    "scenelink-tools v0.1.0"
}
