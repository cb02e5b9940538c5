use scenelink_components::Transform;
use scenelink_core::{Entity, Manager, NodeId};

use crate::TextInspector;

/// Manager inspector for developer tooling.
///
/// Read-only queries against the manager state for debugging and the CLI.
pub struct ManagerInspector;

impl ManagerInspector {
    /// Produce a summary of the manager state.
    pub fn summary(manager: &Manager) -> ManagerSummary {
        let entities = manager.entities();
        ManagerSummary {
            entity_count: entities.len(),
            materialized_count: entities
                .iter()
                .filter(|&&entity| manager.is_materialized(entity))
                .count(),
            component_types: manager.component_type_names(),
            pending_additions: manager.pending_additions(),
            pending_decodes: manager.pending_decodes(),
            registry_dirty: manager.is_registry_dirty(),
        }
    }

    /// Components and scene binding of one entity.
    pub fn inspect_entity(manager: &Manager, entity: Entity) -> Option<EntityInfo> {
        if !manager.registry().valid(entity) {
            return None;
        }
        let components = manager
            .component_type_names()
            .into_iter()
            .filter(|name| manager.has_component(name, entity))
            .collect();
        Some(EntityInfo {
            entity,
            label: manager.entity_label(entity),
            node: manager.entity_node(entity),
            components,
            position: manager
                .registry()
                .get::<Transform>(entity)
                .map(|transform| transform.position.to_array()),
        })
    }

    /// List all entities in index order.
    pub fn list_entities(manager: &Manager) -> Vec<Entity> {
        manager.entities()
    }

    /// Render the manager inspector followed by every entity's inspector as
    /// text. Nothing is staged.
    pub fn render_text(manager: &mut Manager) -> String {
        let mut ui = TextInspector::new();
        manager.render_manager_inspector(&mut ui);
        for entity in manager.entities() {
            manager.render_entity_inspector(&mut ui, entity);
        }
        ui.text()
    }
}

/// Summary of manager state for the inspector.
#[derive(Debug, Clone)]
pub struct ManagerSummary {
    pub entity_count: usize,
    pub materialized_count: usize,
    pub component_types: Vec<String>,
    pub pending_additions: usize,
    pub pending_decodes: usize,
    pub registry_dirty: bool,
}

impl std::fmt::Display for ManagerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Manager: entities={} materialized={} types=[{}] pending_additions={} pending_decodes={} dirty={}",
            self.entity_count,
            self.materialized_count,
            self.component_types.join(", "),
            self.pending_additions,
            self.pending_decodes,
            self.registry_dirty
        )
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone)]
pub struct EntityInfo {
    pub entity: Entity,
    pub label: String,
    pub node: Option<NodeId>,
    pub components: Vec<String>,
    pub position: Option<[f32; 3]>,
}

impl std::fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity [{}] \"{}\"", self.entity, self.label)?;
        match self.node {
            Some(node) => write!(f, " node={node}")?,
            None => write!(f, " bare")?,
        }
        write!(f, " components=[{}]", self.components.join(", "))?;
        if let Some([x, y, z]) = self.position {
            write!(f, " pos=({x:.2}, {y:.2}, {z:.2})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenelink_components::{Flag, Name, register_builtin_components};
    use scenelink_core::Scene;

    fn setup() -> (Manager, Scene) {
        let mut manager = Manager::default();
        register_builtin_components(&mut manager).unwrap();
        let mut scene = Scene::new();
        manager.attach_to_scene(&mut scene).unwrap();
        (manager, scene)
    }

    #[test]
    fn summary_empty_manager() {
        let (manager, _scene) = setup();
        let summary = ManagerInspector::summary(&manager);
        assert_eq!(summary.entity_count, 0);
        assert_eq!(summary.materialized_count, 0);
        assert_eq!(summary.component_types.len(), 6);
        assert!(!summary.registry_dirty);
    }

    #[test]
    fn summary_counts_materialized() {
        let (mut manager, mut scene) = setup();
        let a = manager.registry_mut().create();
        manager.registry_mut().create();
        manager.materialize(&mut scene, a);

        let summary = ManagerInspector::summary(&manager);
        assert_eq!(summary.entity_count, 2);
        assert_eq!(summary.materialized_count, 1);
    }

    #[test]
    fn summary_display() {
        let (manager, _scene) = setup();
        let s = ManagerInspector::summary(&manager).to_string();
        assert!(s.contains("entities=0"));
        assert!(s.contains("Flag, Health"));
    }

    #[test]
    fn inspect_entity_found() {
        let (mut manager, mut scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Flag).unwrap();
        manager
            .registry_mut()
            .insert(e, Transform::from_position(glam::Vec3::new(1.0, 2.0, 3.0)))
            .unwrap();
        manager.materialize(&mut scene, e);

        let info = ManagerInspector::inspect_entity(&manager, e).unwrap();
        assert_eq!(info.components, vec!["Flag".to_owned(), "Transform".to_owned()]);
        assert_eq!(info.position, Some([1.0, 2.0, 3.0]));
        assert!(info.node.is_some());
        assert!(info.to_string().contains("pos=(1.00, 2.00, 3.00)"));
    }

    #[test]
    fn inspect_entity_not_found() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().destroy(e);
        assert!(ManagerInspector::inspect_entity(&manager, e).is_none());
    }

    #[test]
    fn render_text_lists_everything() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Name("crate".into())).unwrap();
        manager.set_entity_label(|registry, entity| {
            registry
                .get::<Name>(entity)
                .map_or_else(|| entity.to_string(), |name| name.0.clone())
        });

        let text = ManagerInspector::render_text(&mut manager);
        assert!(text.contains("[ ] crate"));
        assert!(text.contains(&format!("Entity {e}")));
        assert!(text.contains("name: \"crate\""));
        assert!(!manager.has_staged_actions());
    }
}
