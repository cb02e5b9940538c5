use std::fmt;
use std::rc::Rc;

use crate::EntityHandle;

/// Generational node identifier. Stale ids never resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.generation)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),
    #[error("node {0} already carries an entity handle")]
    HandleAlreadyAttached(NodeId),
    #[error("reparenting node {0} would create a cycle")]
    CyclicParent(NodeId),
    #[error("the root node cannot be removed or reparented")]
    RootIsFixed,
}

/// Receives scene notifications.
///
/// Hosts call these synchronously from inside the mutating operation, after
/// the scene itself is consistent again.
pub trait SceneObserver {
    fn on_handle_added(&mut self, handle: &Rc<EntityHandle>);

    fn on_handle_removed(&mut self, handle: &Rc<EntityHandle>);

    fn on_node_marked_dirty(&mut self, handle: &Rc<EntityHandle>);

    /// Once per tick, after the host finished its own update.
    fn on_forced_post_update(&mut self, scene: &mut dyn SceneHost);
}

/// Observer that ignores everything.
impl SceneObserver for () {
    fn on_handle_added(&mut self, _handle: &Rc<EntityHandle>) {}

    fn on_handle_removed(&mut self, _handle: &Rc<EntityHandle>) {}

    fn on_node_marked_dirty(&mut self, _handle: &Rc<EntityHandle>) {}

    fn on_forced_post_update(&mut self, _scene: &mut dyn SceneHost) {}
}

/// The operations the registry side needs from a scene graph.
pub trait SceneHost {
    fn root(&self) -> NodeId;

    fn contains(&self, node: NodeId) -> bool;

    fn name(&self, node: NodeId) -> Option<&str>;

    /// First direct child of `parent` called `name`.
    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId>;

    fn create_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Direct children in insertion order. Empty for unknown nodes.
    fn children(&self, node: NodeId) -> &[NodeId];

    /// Move `node` to the end of `parent`'s children.
    fn set_parent(&mut self, node: NodeId, parent: NodeId) -> Result<(), SceneError>;

    fn handle(&self, node: NodeId) -> Option<Rc<EntityHandle>>;

    /// Attach `handle` to `node` and report it to `observer`.
    fn attach_handle(
        &mut self,
        node: NodeId,
        handle: Rc<EntityHandle>,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError>;

    /// Remove `node` and its subtree, reporting every removed handle.
    fn remove_node(
        &mut self,
        node: NodeId,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError>;
}
