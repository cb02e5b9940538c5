use std::cell::Cell;
use std::rc::Rc;

use scenelink_common::Entity;

use crate::NodeId;

/// Scene-side object tying a node to a registry entity.
///
/// Owned by the node it is attached to. Anything else should hold a
/// `Weak<EntityHandle>`.
#[derive(Debug, Default)]
pub struct EntityHandle {
    entity: Cell<Entity>,
    node: Cell<Option<NodeId>>,
}

impl EntityHandle {
    /// An unbound handle (entity is null).
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A handle that claims `entity`. The claim is only a request until the
    /// registry side adopts it.
    pub fn with_entity(entity: Entity) -> Rc<Self> {
        let handle = Self::new();
        handle.bind(entity);
        handle
    }

    pub fn entity(&self) -> Entity {
        self.entity.get()
    }

    pub fn bind(&self, entity: Entity) {
        self.entity.set(entity);
    }

    /// Node the handle is attached to, if any.
    pub fn node(&self) -> Option<NodeId> {
        self.node.get()
    }

    /// Record the attachment. Called by scene hosts only.
    pub fn set_node(&self, node: Option<NodeId>) {
        self.node.set(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_handle_is_unbound() {
        let handle = EntityHandle::new();
        assert!(handle.entity().is_null());
        assert_eq!(handle.node(), None);
    }

    #[test]
    fn rebinding_through_shared_reference() {
        let handle = EntityHandle::with_entity(Entity::new(4, 1));
        let alias = Rc::clone(&handle);
        alias.bind(Entity::NULL);
        assert!(handle.entity().is_null());
    }
}
