use std::marker::PhantomData;
use std::mem::size_of;

use scenelink_archive::{Archive, ArchiveError, ArchiveExt, serialize_value};
use scenelink_ecs::{Component, Entity, Registry, RegistryError};

use crate::InspectorUi;

/// A component type the manager can persist and edit.
///
/// Zero-sized types are tags: only their presence is stored and they have no
/// edit form.
pub trait PersistentComponent: Component + Clone + Default {
    /// Layout version written next to every serialized storage. Bump it when
    /// the fields change and branch on it in `serialize_in_block`.
    const VERSION: u32 = 0;

    /// Read or write the fields into the current (unordered) block.
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        version: u32,
    ) -> Result<(), ArchiveError> {
        let _ = (archive, version);
        Ok(())
    }

    /// Draw an edit form. Returns whether the value was changed.
    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let _ = ui;
        false
    }
}

/// Type-erased operations over one registered component type.
pub trait ComponentFactory {
    /// Stable name used in archives and the inspector.
    fn name(&self) -> &str;

    fn is_empty(&self) -> bool;

    fn version(&self) -> u32;

    fn has_component(&self, registry: &Registry, entity: Entity) -> bool;

    /// Callers check presence first.
    fn create_component(
        &self,
        registry: &mut Registry,
        entity: Entity,
    ) -> Result<(), RegistryError>;

    fn destroy_component(&self, registry: &mut Registry, entity: Entity);

    /// Fields of one component, into the current block.
    fn serialize_component(
        &self,
        archive: &mut dyn Archive,
        registry: &mut Registry,
        entity: Entity,
        version: u32,
    ) -> Result<(), ArchiveError>;

    /// The whole storage as a `"components"` array.
    fn serialize_components(
        &self,
        archive: &mut dyn Archive,
        registry: &mut Registry,
        version: u32,
    ) -> Result<(), ArchiveError>;

    /// Draw the edit form of `entity`'s component. A change is staged and the
    /// live value left untouched until [`ComponentFactory::commit_actions`].
    fn render_ui(
        &mut self,
        ui: &mut dyn InspectorUi,
        registry: &mut Registry,
        entity: Entity,
    ) -> bool;

    fn has_pending_edits(&self) -> bool;

    /// Apply staged edits. Edits of entities or components that no longer
    /// exist are logged and dropped.
    fn commit_actions(&mut self, registry: &mut Registry);
}

/// [`ComponentFactory`] for any [`PersistentComponent`].
pub struct DefaultComponentFactory<T> {
    name: String,
    pending_edits: Vec<(Entity, T)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: PersistentComponent> DefaultComponentFactory<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending_edits: Vec::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: PersistentComponent> ComponentFactory for DefaultComponentFactory<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_empty(&self) -> bool {
        size_of::<T>() == 0
    }

    fn version(&self) -> u32 {
        T::VERSION
    }

    fn has_component(&self, registry: &Registry, entity: Entity) -> bool {
        registry.has::<T>(entity)
    }

    fn create_component(
        &self,
        registry: &mut Registry,
        entity: Entity,
    ) -> Result<(), RegistryError> {
        registry.insert(entity, T::default()).map(drop)
    }

    fn destroy_component(&self, registry: &mut Registry, entity: Entity) {
        registry.remove::<T>(entity);
    }

    fn serialize_component(
        &self,
        archive: &mut dyn Archive,
        registry: &mut Registry,
        entity: Entity,
        version: u32,
    ) -> Result<(), ArchiveError> {
        if self.is_empty() {
            return Ok(());
        }
        match registry.get_mut::<T>(entity) {
            Some(component) => component.serialize_in_block(archive, version),
            None => Ok(()),
        }
    }

    fn serialize_components(
        &self,
        archive: &mut dyn Archive,
        registry: &mut Registry,
        version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_components::<T>(archive, "components", registry, version)
    }

    fn render_ui(
        &mut self,
        ui: &mut dyn InspectorUi,
        registry: &mut Registry,
        entity: Entity,
    ) -> bool {
        if self.is_empty() {
            return false;
        }
        let Some(component) = registry.get_mut::<T>(entity) else {
            return false;
        };
        let backup = component.clone();
        if !component.render_inspector(ui) {
            return false;
        }
        let edited = std::mem::replace(component, backup);
        self.pending_edits.push((entity, edited));
        true
    }

    fn has_pending_edits(&self) -> bool {
        !self.pending_edits.is_empty()
    }

    fn commit_actions(&mut self, registry: &mut Registry) {
        for (entity, value) in self.pending_edits.drain(..) {
            if !registry.valid(entity) {
                tracing::error!(
                    component = %self.name,
                    %entity,
                    "Cannot edit component of invalid entity"
                );
                continue;
            }
            if let Err(err) = registry.replace(entity, value) {
                tracing::error!(component = %self.name, %entity, %err, "Cannot edit component");
            }
        }
    }
}

/// Read or write every `T` in `registry` as an array block called `name`.
///
/// Each element is an unordered `"component"` block holding the raw entity id
/// under `"_entity"` followed by the component fields. Output is sorted by
/// entity index. On input, components of entities missing from the registry
/// are skipped.
pub fn serialize_components<T: PersistentComponent>(
    archive: &mut dyn Archive,
    name: &str,
    registry: &mut Registry,
    version: u32,
) -> Result<(), ArchiveError> {
    let is_tag = size_of::<T>() == 0;
    let count = registry.count::<T>();
    archive.array_block(name, count, |archive, len| {
        if archive.is_input() {
            for _ in 0..len {
                archive.unordered_block("component", |archive| {
                    let mut bits = 0u64;
                    serialize_value(archive, "_entity", &mut bits)?;
                    let entity = Entity::from_bits(bits);

                    let mut component = T::default();
                    if !is_tag {
                        component.serialize_in_block(archive, version)?;
                    }
                    if let Err(err) = registry.insert(entity, component) {
                        tracing::warn!(storage = name, %err, "skipping component");
                    }
                    Ok(())
                })?;
            }
        } else {
            let mut entities = registry
                .storage::<T>()
                .map(|storage| storage.entities().to_vec())
                .unwrap_or_default();
            entities.sort_by_key(|entity| entity.index());

            for entity in entities {
                archive.unordered_block("component", |archive| {
                    let mut bits = entity.to_bits();
                    serialize_value(archive, "_entity", &mut bits)?;
                    match registry.get_mut::<T>(entity) {
                        Some(component) if !is_tag => {
                            component.serialize_in_block(archive, version)
                        }
                        _ => Ok(()),
                    }
                })?;
            }
        }
        Ok(())
    })
}
