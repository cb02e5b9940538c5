use std::rc::{Rc, Weak};

use scenelink_ecs::{Entity, Registry};
use scenelink_scene::{EntityHandle, NodeId, SceneError, SceneHost, SceneObserver};

use crate::tags::{EntityMaterialized, EntityTransformDirty, MaterializationStatus};
use crate::{
    ComponentFactory, CoreError, DefaultComponentFactory, ManagerConfig, PersistentComponent,
};

type EntityListener = Box<dyn FnMut(&mut Manager, &mut dyn SceneHost, Entity, &Rc<EntityHandle>)>;
type SynchronizedListener = Box<dyn FnMut(&mut Registry)>;
type EntityLabeler = Box<dyn Fn(&Registry, Entity) -> String>;

/// Inspector requests waiting for [`Manager::commit_actions`].
#[derive(Default)]
pub(crate) struct StagedEdits {
    pub(crate) materializations: Vec<(Entity, bool)>,
    pub(crate) new_entities: usize,
    pub(crate) create_components: Vec<(Entity, String)>,
    pub(crate) destroy_components: Vec<(Entity, String)>,
    pub(crate) edit_components: Vec<String>,
}

impl StagedEdits {
    pub(crate) fn is_empty(&self) -> bool {
        self.materializations.is_empty()
            && self.new_entities == 0
            && self.create_components.is_empty()
            && self.destroy_components.is_empty()
            && self.edit_components.is_empty()
    }
}

/// Owns the registry and keeps it in step with a scene.
///
/// The scene reports handle additions and removals through the
/// [`SceneObserver`] impl. Additions are queued and reconciled by
/// [`Manager::synchronize`]; removals destroy the bound entity right away.
pub struct Manager {
    pub(crate) registry: Registry,
    config: ManagerConfig,
    entities_container: Option<NodeId>,

    pub(crate) factories: Vec<Box<dyn ComponentFactory>>,
    factories_sorted: bool,

    pub(crate) registry_dirty: bool,
    pending_added: Vec<Weak<EntityHandle>>,
    pending_decodes: Vec<(Weak<EntityHandle>, Vec<u8>)>,
    synchronizing: bool,
    suppress_component_events: bool,

    pub(crate) staged: StagedEdits,
    entity_label: Option<EntityLabeler>,

    on_materialized: Vec<EntityListener>,
    on_dematerialized: Vec<EntityListener>,
    on_synchronized: Vec<SynchronizedListener>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl Manager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            registry: Registry::new(),
            config,
            entities_container: None,
            factories: Vec::new(),
            factories_sorted: true,
            registry_dirty: false,
            pending_added: Vec::new(),
            pending_decodes: Vec::new(),
            synchronizing: false,
            suppress_component_events: false,
            staged: StagedEdits::default(),
            entity_label: None,
            on_materialized: Vec::new(),
            on_dematerialized: Vec::new(),
            on_synchronized: Vec::new(),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Live entities in ascending index order.
    pub fn entities(&self) -> Vec<Entity> {
        self.registry.entities().collect()
    }

    /// Node holding materialized entities, once attached.
    pub fn entities_container(&self) -> Option<NodeId> {
        self.entities_container
    }

    /// Handles waiting for the next [`Manager::synchronize`].
    pub fn pending_additions(&self) -> usize {
        self.pending_added
            .iter()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }

    pub fn pending_decodes(&self) -> usize {
        self.pending_decodes.len()
    }

    /// Whether the next [`Manager::synchronize`] runs a materialization sweep.
    pub fn is_registry_dirty(&self) -> bool {
        self.registry_dirty
    }

    /// Find or create the entities container under the scene root, then
    /// synchronize. The container is always looked up by name here.
    pub fn attach_to_scene(&mut self, scene: &mut dyn SceneHost) -> Result<NodeId, CoreError> {
        self.entities_container = None;
        let container = self.resolve_container(scene)?;
        tracing::debug!(
            %container,
            container_name = %self.config.entities_container,
            "attached to scene"
        );
        self.synchronize(scene);
        Ok(container)
    }

    /// The cached container is reused only while it is still the root's child
    /// of the configured name; node ids are not unique across scenes.
    fn resolve_container(&mut self, scene: &mut dyn SceneHost) -> Result<NodeId, SceneError> {
        let root = scene.root();
        let name = self.config.entities_container.as_str();
        let cached = self.entities_container.filter(|&id| {
            scene.contains(id) && scene.parent(id) == Some(root) && scene.name(id) == Some(name)
        });
        if let Some(container) = cached {
            return Ok(container);
        }
        let container = match scene.find_child(root, &self.config.entities_container) {
            Some(existing) => existing,
            None => scene.create_child(root, &self.config.entities_container)?,
        };
        self.entities_container = Some(container);
        Ok(container)
    }

    // Listeners

    /// Called after an entity got its scene node.
    pub fn on_entity_materialized(
        &mut self,
        listener: impl FnMut(&mut Manager, &mut dyn SceneHost, Entity, &Rc<EntityHandle>) + 'static,
    ) {
        self.on_materialized.push(Box::new(listener));
    }

    /// Called before an entity loses its scene node, while its components and
    /// node are still in place.
    pub fn on_entity_dematerialized(
        &mut self,
        listener: impl FnMut(&mut Manager, &mut dyn SceneHost, Entity, &Rc<EntityHandle>) + 'static,
    ) {
        self.on_dematerialized.push(Box::new(listener));
    }

    /// Called by [`Manager::on_forced_post_update`] after synchronizing.
    pub fn on_synchronized(&mut self, listener: impl FnMut(&mut Registry) + 'static) {
        self.on_synchronized.push(Box::new(listener));
    }

    /// Override how entities are labelled in the inspector.
    pub fn set_entity_label(&mut self, labeler: impl Fn(&Registry, Entity) -> String + 'static) {
        self.entity_label = Some(Box::new(labeler));
    }

    pub fn entity_label(&self, entity: Entity) -> String {
        match &self.entity_label {
            Some(labeler) => labeler(&self.registry, entity),
            None => entity.to_string(),
        }
    }

    fn emit_entity_signal(
        &mut self,
        materialized: bool,
        scene: &mut dyn SceneHost,
        entity: Entity,
        handle: &Rc<EntityHandle>,
    ) {
        let slot = if materialized {
            &mut self.on_materialized
        } else {
            &mut self.on_dematerialized
        };
        let mut listeners = std::mem::take(slot);
        if listeners.is_empty() {
            return;
        }

        let was_synchronizing = std::mem::replace(&mut self.synchronizing, true);
        for listener in &mut listeners {
            listener(&mut *self, &mut *scene, entity, handle);
        }
        self.synchronizing = was_synchronizing;

        let slot = if materialized {
            &mut self.on_materialized
        } else {
            &mut self.on_dematerialized
        };
        let added = std::mem::replace(slot, listeners);
        slot.extend(added);
    }

    // Component types

    /// Register `T` under `name` with the default factory.
    pub fn add_component_type<T: PersistentComponent>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<(), CoreError> {
        self.add_component_factory(Box::new(DefaultComponentFactory::<T>::new(name)))
    }

    pub fn add_component_factory(
        &mut self,
        factory: Box<dyn ComponentFactory>,
    ) -> Result<(), CoreError> {
        if self.factory_index(factory.name()).is_some() {
            tracing::warn!(component = factory.name(), "component type is already registered");
            return Err(CoreError::DuplicateComponentType(factory.name().to_owned()));
        }
        tracing::debug!(component = factory.name(), "component type registered");
        self.factories.push(factory);
        self.factories_sorted = false;
        Ok(())
    }

    pub fn find_component_type(&self, name: &str) -> Option<&dyn ComponentFactory> {
        self.factory_index(name).map(|index| self.factories[index].as_ref())
    }

    /// Registered type names in serialization order.
    pub fn component_type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|f| f.name().to_owned()).collect();
        names.sort();
        names
    }

    pub(crate) fn factory_index(&self, name: &str) -> Option<usize> {
        self.factories.iter().position(|factory| factory.name() == name)
    }

    pub(crate) fn ensure_component_types_sorted(&mut self) {
        if !self.factories_sorted {
            self.factories.sort_by(|a, b| a.name().cmp(b.name()));
            self.factories_sorted = true;
        }
    }

    pub fn has_component(&self, name: &str, entity: Entity) -> bool {
        self.find_component_type(name)
            .is_some_and(|factory| factory.has_component(&self.registry, entity))
    }

    pub fn create_component(&mut self, name: &str, entity: Entity) -> Result<(), CoreError> {
        let index = self.checked_factory(name, entity)?;
        let factory = &self.factories[index];
        if factory.has_component(&self.registry, entity) {
            return Err(CoreError::ComponentAlreadyPresent {
                entity,
                component: name.to_owned(),
            });
        }
        factory.create_component(&mut self.registry, entity)?;
        Ok(())
    }

    pub fn destroy_component(&mut self, name: &str, entity: Entity) -> Result<(), CoreError> {
        let index = self.checked_factory(name, entity)?;
        let factory = &self.factories[index];
        if !factory.has_component(&self.registry, entity) {
            return Err(CoreError::ComponentMissing {
                entity,
                component: name.to_owned(),
            });
        }
        factory.destroy_component(&mut self.registry, entity);
        Ok(())
    }

    fn checked_factory(&self, name: &str, entity: Entity) -> Result<usize, CoreError> {
        if !self.registry.valid(entity) {
            return Err(CoreError::InvalidEntity(entity));
        }
        self.factory_index(name)
            .ok_or_else(|| CoreError::UnknownComponentType(name.to_owned()))
    }

    // Materialization

    pub fn is_materialized(&self, entity: Entity) -> bool {
        self.registry.has::<EntityMaterialized>(entity)
    }

    /// Live handle bound to `entity`.
    pub fn handle(&self, entity: Entity) -> Option<Rc<EntityHandle>> {
        self.registry
            .get::<EntityMaterialized>(entity)
            .and_then(EntityMaterialized::upgrade)
    }

    pub fn entity_node(&self, entity: Entity) -> Option<NodeId> {
        self.handle(entity)?.node()
    }

    pub fn node_entity(&self, scene: &dyn SceneHost, node: NodeId) -> Option<Entity> {
        let entity = scene.handle(node)?.entity();
        (!entity.is_null()).then_some(entity)
    }

    fn tag_materialized(&mut self, entity: Entity, handle: &Rc<EntityHandle>) {
        let tagged = self
            .registry
            .insert(entity, EntityMaterialized::new(handle))
            .and_then(|_| {
                self.registry
                    .insert(entity, MaterializationStatus { materialized: true })
            });
        if let Err(err) = tagged {
            tracing::error!(%entity, %err, "cannot tag materialized entity");
        }
    }

    /// Give `entity` a scene node under the entities container.
    ///
    /// Returns the existing handle when already materialized and `None` when
    /// the entity is invalid or the scene refuses the node.
    pub fn materialize(
        &mut self,
        scene: &mut dyn SceneHost,
        entity: Entity,
    ) -> Option<Rc<EntityHandle>> {
        if !self.registry.valid(entity) {
            tracing::error!(%entity, "cannot materialize invalid entity");
            return None;
        }
        if let Some(existing) = self.handle(entity) {
            tracing::warn!(%entity, "entity is already materialized");
            return Some(existing);
        }
        tracing::trace!(%entity, "entity is materializing");

        let node = match self
            .resolve_container(scene)
            .and_then(|container| scene.create_child(container, "Entity"))
        {
            Ok(node) => node,
            Err(err) => {
                tracing::error!(%entity, %err, "cannot create entity node");
                return None;
            }
        };

        let handle = EntityHandle::with_entity(entity);
        let previous_status = self.registry.get::<MaterializationStatus>(entity).copied();
        self.tag_materialized(entity, &handle);

        self.suppress_component_events = true;
        let attached = scene.attach_handle(node, Rc::clone(&handle), self);
        self.suppress_component_events = false;
        if let Err(err) = attached {
            tracing::error!(%entity, %err, "cannot attach entity handle");
            self.rollback_materialize(scene, entity, node, previous_status);
            return None;
        }

        self.emit_entity_signal(true, scene, entity, &handle);
        Some(handle)
    }

    fn rollback_materialize(
        &mut self,
        scene: &mut dyn SceneHost,
        entity: Entity,
        node: NodeId,
        previous_status: Option<MaterializationStatus>,
    ) {
        self.registry.remove::<EntityMaterialized>(entity);
        match previous_status {
            Some(status) => {
                if let Err(err) = self.registry.insert(entity, status) {
                    tracing::error!(%entity, %err, "cannot restore materialization status");
                }
            }
            None => {
                self.registry.remove::<MaterializationStatus>(entity);
            }
        }

        self.suppress_component_events = true;
        let removed = scene.remove_node(node, self);
        self.suppress_component_events = false;
        if let Err(err) = removed {
            tracing::error!(%entity, %node, %err, "cannot remove orphaned entity node");
        }
    }

    /// Remove the scene node of `entity`, keeping the entity and its
    /// components. Direct child nodes move up to the removed node's parent.
    pub fn dematerialize(&mut self, scene: &mut dyn SceneHost, entity: Entity) {
        if !self.is_materialized(entity) {
            tracing::warn!(%entity, "entity is already dematerialized");
            return;
        }
        tracing::trace!(%entity, "entity is dematerializing");

        match self.handle(entity) {
            Some(handle) => {
                self.emit_entity_signal(false, scene, entity, &handle);

                if let Some(node) = handle.node() {
                    flatten_children(scene, node);
                }
                handle.bind(Entity::NULL);

                if let Some(node) = handle.node() {
                    self.suppress_component_events = true;
                    let removed = scene.remove_node(node, self);
                    self.suppress_component_events = false;
                    if let Err(err) = removed {
                        tracing::error!(%entity, %err, "cannot remove entity node");
                    }
                }
            }
            None => tracing::error!(%entity, "materialized entity lost its handle"),
        }

        self.registry.remove::<EntityMaterialized>(entity);
        if let Err(err) = self
            .registry
            .insert(entity, MaterializationStatus { materialized: false })
        {
            tracing::debug!(%entity, %err, "entity vanished while dematerializing");
        }
    }

    // Synchronization

    /// Reconcile queued handle additions, apply queued decodes and, after a
    /// registry load, materialize or dematerialize entities to match their
    /// persisted status. Nested calls return immediately.
    pub fn synchronize(&mut self, scene: &mut dyn SceneHost) {
        if self.synchronizing {
            return;
        }
        let _span = tracing::info_span!("synchronize").entered();
        self.synchronizing = true;

        self.reconcile_added_handles();
        self.apply_pending_decodes();

        if self.registry_dirty {
            self.registry_dirty = false;
            self.ensure_entities_materialized(scene);
        }

        self.synchronizing = false;
    }

    /// Per-tick hook: synchronize, then notify `on_synchronized` listeners.
    pub fn on_forced_post_update(&mut self, scene: &mut dyn SceneHost) {
        self.synchronize(scene);

        let mut listeners = std::mem::take(&mut self.on_synchronized);
        for listener in &mut listeners {
            listener(&mut self.registry);
        }
        let added = std::mem::replace(&mut self.on_synchronized, listeners);
        self.on_synchronized.extend(added);
    }

    fn reconcile_added_handles(&mut self) {
        let pending = std::mem::take(&mut self.pending_added);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "reconciling added handles");
        }

        for handle in pending.iter().filter_map(Weak::upgrade) {
            let claimed = handle.entity();
            let owner = self.handle(claimed);
            if owner.as_ref().is_some_and(|owner| Rc::ptr_eq(owner, &handle)) {
                continue;
            }

            let entity = if self.registry.valid(claimed) && owner.is_none() {
                tracing::trace!(entity = %claimed, "handle adopts bare entity");
                claimed
            } else {
                let created = self.registry.create_with_hint(claimed);
                tracing::trace!(entity = %created, hint = %claimed, "handle creates entity");
                handle.bind(created);
                created
            };
            self.tag_materialized(entity, &handle);
        }
    }

    fn apply_pending_decodes(&mut self) {
        let pending = std::mem::take(&mut self.pending_decodes);
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "applying queued entity decodes");
        }

        for (handle, bytes) in pending {
            let Some(handle) = handle.upgrade() else {
                continue;
            };
            let entity = handle.entity();
            if entity.is_null() {
                continue;
            }
            if let Err(err) = self.decode_entity(entity, &bytes) {
                tracing::warn!(%entity, %err, "queued entity decode failed");
            }
        }
    }

    fn ensure_entities_materialized(&mut self, scene: &mut dyn SceneHost) {
        for entity in self.entities() {
            if !self.registry.valid(entity) {
                continue;
            }
            let wanted = self
                .registry
                .get::<MaterializationStatus>(entity)
                .is_some_and(|status| status.materialized);
            let live = self.is_materialized(entity);
            if wanted && !live {
                self.materialize(scene, entity);
            } else if !wanted && live {
                self.dematerialize(scene, entity);
            }
        }
    }

    // Per-entity decode queue

    /// Decode `bytes` into the handle's entity on the next synchronize.
    pub fn queue_decode_entity(&mut self, handle: &Rc<EntityHandle>, bytes: Vec<u8>) {
        self.pending_decodes.push((Rc::downgrade(handle), bytes));
    }

    fn is_bound_handle(&self, entity: Entity, handle: &Rc<EntityHandle>) -> bool {
        self.handle(entity)
            .is_some_and(|bound| Rc::ptr_eq(&bound, handle))
    }
}

/// Move the direct children of `node` to its parent.
fn flatten_children(scene: &mut dyn SceneHost, node: NodeId) {
    let Some(parent) = scene.parent(node) else {
        return;
    };
    for child in scene.children(node).to_vec() {
        if let Err(err) = scene.set_parent(child, parent) {
            tracing::warn!(%child, %err, "cannot lift child of entity node");
        }
    }
}

impl SceneObserver for Manager {
    fn on_handle_added(&mut self, handle: &Rc<EntityHandle>) {
        if self.suppress_component_events {
            return;
        }
        let weak = Rc::downgrade(handle);
        if !self.pending_added.iter().any(|queued| queued.ptr_eq(&weak)) {
            self.pending_added.push(weak);
        }
    }

    fn on_handle_removed(&mut self, handle: &Rc<EntityHandle>) {
        if self.suppress_component_events {
            return;
        }
        let weak = Rc::downgrade(handle);
        self.pending_added.retain(|queued| !queued.ptr_eq(&weak));

        let entity = handle.entity();
        if entity.is_null() {
            return;
        }
        if self.is_bound_handle(entity, handle) {
            tracing::trace!(%entity, "handle removed, destroying entity");
            self.registry.destroy(entity);
        } else {
            tracing::debug!(%entity, "removed handle was never reconciled");
        }
    }

    fn on_node_marked_dirty(&mut self, handle: &Rc<EntityHandle>) {
        let entity = handle.entity();
        if !self.registry.valid(entity) {
            return;
        }
        if let Err(err) = self.registry.insert(entity, EntityTransformDirty) {
            tracing::error!(%entity, %err, "cannot tag transform dirty");
        }
    }

    fn on_forced_post_update(&mut self, scene: &mut dyn SceneHost) {
        Manager::on_forced_post_update(self, scene);
    }
}
