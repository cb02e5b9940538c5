use std::rc::{Rc, Weak};

use scenelink_archive::{Archive, ArchiveError, serialize_value};
use scenelink_scene::EntityHandle;

use crate::PersistentComponent;

/// Marks a materialized entity. Never keeps the handle alive.
#[derive(Debug, Clone, Default)]
pub struct EntityMaterialized {
    pub handle: Weak<EntityHandle>,
}

impl EntityMaterialized {
    pub fn new(handle: &Rc<EntityHandle>) -> Self {
        Self {
            handle: Rc::downgrade(handle),
        }
    }

    pub fn upgrade(&self) -> Option<Rc<EntityHandle>> {
        self.handle.upgrade()
    }
}

/// Set when the node of a materialized entity is marked transformed.
/// Clearing it is up to the consumer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityTransformDirty;

/// Persisted desired state: should the entity have a scene node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializationStatus {
    pub materialized: bool,
}

impl PersistentComponent for MaterializationStatus {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "materialized", &mut self.materialized)
    }
}
