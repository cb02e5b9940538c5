use scenelink_archive::ArchiveError;
use scenelink_ecs::{Entity, RegistryError};
use scenelink_scene::SceneError;

/// Precondition failures of the manager's public entry points.
///
/// Faults inside individual archive blocks are logged and skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("entity {0} is not valid")]
    InvalidEntity(Entity),

    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    #[error("component type '{0}' is already registered")]
    DuplicateComponentType(String),

    #[error("entity {entity} already has component '{component}'")]
    ComponentAlreadyPresent { entity: Entity, component: String },

    #[error("entity {entity} has no component '{component}'")]
    ComponentMissing { entity: Entity, component: String },

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("scene error: {0}")]
    Scene(#[from] SceneError),
}
