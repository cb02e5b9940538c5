use std::fmt::Write as _;
use std::rc::Rc;

use crate::{EntityHandle, NodeId, SceneError, SceneHost, SceneObserver};

struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    handle: Option<Rc<EntityHandle>>,
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed scene tree.
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let root = NodeId {
            index: 0,
            generation: 0,
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(Node {
                    name: "Scene".to_owned(),
                    parent: None,
                    children: Vec::new(),
                    handle: None,
                }),
            }],
            free: Vec::new(),
            root,
        }
    }

    /// Number of live nodes, root included.
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    /// Detach the handle of `node` without removing the node.
    pub fn detach_handle(
        &mut self,
        node: NodeId,
        observer: &mut dyn SceneObserver,
    ) -> Option<Rc<EntityHandle>> {
        let handle = self.node_mut(node)?.handle.take()?;
        handle.set_node(None);
        observer.on_handle_removed(&handle);
        Some(handle)
    }

    /// Report every handle in the subtree of `node` as transformed.
    pub fn mark_dirty(&mut self, node: NodeId, observer: &mut dyn SceneObserver) {
        for id in self.subtree(node) {
            if let Some(handle) = self.handle(id) {
                observer.on_node_marked_dirty(&handle);
            }
        }
    }

    /// Per-tick forced post update.
    pub fn update(&mut self, observer: &mut dyn SceneObserver) {
        observer.on_forced_post_update(self);
    }

    /// Every handle currently attached, in depth-first order.
    pub fn handles(&self) -> Vec<Rc<EntityHandle>> {
        self.subtree(self.root)
            .into_iter()
            .filter_map(|id| self.handle(id))
            .collect()
    }

    /// Indented outline of the tree, one node per line.
    pub fn tree_string(&self) -> String {
        let mut out = String::new();
        self.write_tree(self.root, 0, &mut out);
        out
    }

    fn write_tree(&self, id: NodeId, depth: usize, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        let _ = write!(out, "{:indent$}{}", "", node.name, indent = depth * 2);
        if let Some(handle) = &node.handle {
            let _ = write!(out, " [{}]", handle.entity());
        }
        out.push('\n');
        for &child in &node.children {
            self.write_tree(child, depth + 1, out);
        }
    }

    /// `node` and all of its descendants, preorder.
    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.node(id) {
                out.push(id);
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn free_slot(&mut self, id: NodeId) -> Option<Node> {
        let slot = self.slots.get_mut(id.index as usize)?;
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(node)
    }
}

impl SceneHost for Scene {
    fn root(&self) -> NodeId {
        self.root
    }

    fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn name(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.name.as_str())
    }

    fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.name(child) == Some(name))
    }

    fn create_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let node = Node {
            name: name.to_owned(),
            parent: Some(parent),
            children: Vec::new(),
            handle: None,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        tracing::trace!(%id, %parent, node_name = name, "node created");
        Ok(id)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map_or(&[], |n| n.children.as_slice())
    }

    fn set_parent(&mut self, node: NodeId, parent: NodeId) -> Result<(), SceneError> {
        if node == self.root {
            return Err(SceneError::RootIsFixed);
        }
        if !self.contains(node) {
            return Err(SceneError::NodeNotFound(node));
        }
        if !self.contains(parent) {
            return Err(SceneError::NodeNotFound(parent));
        }
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == node {
                return Err(SceneError::CyclicParent(node));
            }
            ancestor = self.parent(id);
        }

        if let Some(old) = self.parent(node).and_then(|old| self.node_mut(old)) {
            old.children.retain(|&child| child != node);
        }
        if let Some(p) = self.node_mut(parent) {
            p.children.push(node);
        }
        if let Some(n) = self.node_mut(node) {
            n.parent = Some(parent);
        }
        Ok(())
    }

    fn handle(&self, node: NodeId) -> Option<Rc<EntityHandle>> {
        self.node(node)?.handle.clone()
    }

    fn attach_handle(
        &mut self,
        node: NodeId,
        handle: Rc<EntityHandle>,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        if let Some(existing) = handle.node() {
            return Err(SceneError::HandleAlreadyAttached(existing));
        }
        let n = self.node_mut(node).ok_or(SceneError::NodeNotFound(node))?;
        if n.handle.is_some() {
            return Err(SceneError::HandleAlreadyAttached(node));
        }
        n.handle = Some(Rc::clone(&handle));
        handle.set_node(Some(node));
        observer.on_handle_added(&handle);
        Ok(())
    }

    fn remove_node(
        &mut self,
        node: NodeId,
        observer: &mut dyn SceneObserver,
    ) -> Result<(), SceneError> {
        if node == self.root {
            return Err(SceneError::RootIsFixed);
        }
        if !self.contains(node) {
            return Err(SceneError::NodeNotFound(node));
        }

        let subtree = self.subtree(node);
        if let Some(parent) = self.parent(node).and_then(|parent| self.node_mut(parent)) {
            parent.children.retain(|&child| child != node);
        }
        let mut removed = Vec::new();
        for id in subtree {
            if let Some(handle) = self.free_slot(id).and_then(|n| n.handle) {
                handle.set_node(None);
                removed.push(handle);
            }
        }
        for handle in &removed {
            observer.on_handle_removed(handle);
        }
        Ok(())
    }
}
