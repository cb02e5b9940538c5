//! Sparse-set entity-component registry.
//!
//! Entities are generational `(index, generation)` ids. Each component type
//! lives in its own sparse set keyed by entity index. Index-addressed tables
//! are paged, so memory follows the pages in use rather than the largest index.
//!
//! # Invariants
//! - An id validates only while its slot is alive with the same generation.
//! - Destroying an entity removes every component it owns.
//! - `Registry::entities` yields live ids in ascending index order.

mod paged;
mod registry;
mod storage;

pub use registry::{Registry, RegistryError};
pub use scenelink_common::Entity;
pub use storage::Storage;

/// Marker for types that can be stored in a [`Registry`].
pub trait Component: 'static {}

impl<T: 'static> Component for T {}

pub fn crate_info() -> &'static str {
    "scenelink-ecs v0.1.0"
}
