//! Registry ⇄ scene synchronization core.
//!
//! The [`Manager`] owns an entity registry and keeps it consistent with a
//! scene graph: entities are either bare (registry only) or materialized
//! (registry plus a scene node carrying an [`EntityHandle`]).
//!
//! # Invariants
//! - An entity is materialized iff it carries [`EntityMaterialized`] iff a live
//!   handle bound to it exists.
//! - No two live handles are bound to the same entity.
//! - Entity ids survive materialize/dematerialize cycles and serialization.
//! - Serialized output lists entities and components in ascending index order,
//!   and component types in name order.

mod config;
mod error;
mod factory;
mod inspector;
mod manager;
mod serialization;
mod tags;

#[cfg(test)]
mod testing;

pub use config::ManagerConfig;
pub use error::CoreError;
pub use factory::{
    ComponentFactory, DefaultComponentFactory, PersistentComponent, serialize_components,
};
pub use inspector::InspectorUi;
pub use manager::Manager;
pub use serialization::HandleData;
pub use tags::{EntityMaterialized, EntityTransformDirty, MaterializationStatus};

pub use scenelink_archive::{Archive, ArchiveError, ArchiveExt, ArchiveValue, serialize_value};
pub use scenelink_ecs::{Entity, Registry, RegistryError};
pub use scenelink_scene::{EntityHandle, NodeId, Scene, SceneError, SceneHost, SceneObserver};

pub fn crate_info() -> &'static str {
    "scenelink-core v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("core"));
    }
}
