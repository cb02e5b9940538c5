//! Scene side of the registry/scene pairing.
//!
//! A scene is a tree of named nodes. A node may carry one [`EntityHandle`]
//! binding it to a registry entity. Hosts report structural changes to a
//! [`SceneObserver`] passed into each mutating call.
//!
//! # Invariants
//! - A handle is attached to at most one node, and a node carries at most one
//!   handle.
//! - Removing a node removes its whole subtree; the observer hears about every
//!   handle in it after the nodes are gone.
//! - The root node can be neither removed nor reparented.

mod handle;
mod host;
mod scene;

pub use handle::EntityHandle;
pub use host::{NodeId, SceneError, SceneHost, SceneObserver};
pub use scene::Scene;

pub fn crate_info() -> &'static str {
    "scenelink-scene v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("scene"));
    }
}
