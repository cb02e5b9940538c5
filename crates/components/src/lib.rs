//! Builtin persistent components.
//!
//! Every type here implements
//! [`PersistentComponent`](scenelink_core::PersistentComponent) and can be registered
//! with a [`Manager`] in one call through [`register_builtin_components`].
//!
//! # Invariants
//! - Registered names are stable: they are written into every archive.
//! - A layout change bumps the type's `VERSION`; older layouts stay readable.

mod gameplay;
mod transform;

pub use gameplay::{Flag, Health, Name, Renderable, RigidBody};
pub use transform::Transform;

use scenelink_core::{CoreError, Manager};

/// Names under which [`register_builtin_components`] registers each type.
pub const BUILTIN_COMPONENT_NAMES: [&str; 6] =
    ["Flag", "Health", "Name", "Renderable", "RigidBody", "Transform"];

/// Register every builtin component type. Fails if one of the names is taken.
pub fn register_builtin_components(manager: &mut Manager) -> Result<(), CoreError> {
    manager.add_component_type::<Flag>("Flag")?;
    manager.add_component_type::<Health>("Health")?;
    manager.add_component_type::<Name>("Name")?;
    manager.add_component_type::<Renderable>("Renderable")?;
    manager.add_component_type::<RigidBody>("RigidBody")?;
    manager.add_component_type::<Transform>("Transform")?;
    tracing::debug!(count = BUILTIN_COMPONENT_NAMES.len(), "builtin components registered");
    Ok(())
}

pub fn crate_info() -> &'static str {
    "scenelink-components v0.1.0"
}
