use scenelink_ecs::Entity;
use scenelink_scene::SceneHost;

use crate::Manager;

/// Immediate-mode widget set the inspector draws with.
///
/// Interactive widgets return `true` when the user acted on them this frame.
/// Widget identity is the label inside the current id scope.
pub trait InspectorUi {
    fn heading(&mut self, text: &str);

    fn label(&mut self, text: &str);

    fn push_id(&mut self, id: &str);

    fn pop_id(&mut self);

    fn indent(&mut self);

    fn unindent(&mut self);

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool;

    fn button(&mut self, label: &str) -> bool;

    /// Returns whether the menu is open. Call [`InspectorUi::end_menu`] only
    /// in that case.
    fn begin_menu(&mut self, label: &str, enabled: bool) -> bool;

    fn menu_item(&mut self, label: &str, enabled: bool) -> bool;

    fn end_menu(&mut self);

    /// Returns whether the section is expanded. `leaf` headers have no body.
    fn collapsing_header(&mut self, label: &str, leaf: bool) -> bool;

    fn edit_f32(&mut self, label: &str, value: &mut f32) -> bool;

    fn edit_i32(&mut self, label: &str, value: &mut i32) -> bool;

    fn edit_u32(&mut self, label: &str, value: &mut u32) -> bool;

    fn edit_text(&mut self, label: &str, value: &mut String) -> bool;

    fn set_clipboard_text(&mut self, text: &str);

    /// Edit a small fixed vector, one scalar field per element.
    fn edit_f32_array(&mut self, label: &str, values: &mut [f32]) -> bool {
        const AXES: [&str; 4] = ["x", "y", "z", "w"];
        self.push_id(label);
        self.label(label);
        let mut changed = false;
        for (i, value) in values.iter_mut().enumerate() {
            let axis = AXES.get(i).copied().unwrap_or("_");
            changed |= self.edit_f32(axis, value);
        }
        self.pop_id();
        changed
    }
}

impl Manager {
    /// Entity list with a materialization toggle per entity, and an
    /// "Add Entity" action. Returns whether anything was staged.
    pub fn render_manager_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let mut changed = false;
        ui.indent();

        ui.heading("Materialized Entities:");
        for entity in self.entities() {
            ui.push_id(&entity.to_bits().to_string());
            let mut materialized = self.is_materialized(entity);
            if ui.checkbox(&self.entity_label(entity), &mut materialized) {
                self.staged.materializations.push((entity, materialized));
                changed = true;
            }
            ui.pop_id();
        }

        if ui.button("Add Entity") {
            self.staged.new_entities += 1;
            changed = true;
        }

        ui.unindent();
        changed
    }

    /// Components of `entity` with remove buttons and edit forms, plus an
    /// "Add Component" menu of the types it lacks. Returns whether anything
    /// was staged.
    pub fn render_entity_inspector(&mut self, ui: &mut dyn InspectorUi, entity: Entity) -> bool {
        if !self.registry.valid(entity) {
            ui.label(&format!("Entity {entity} is not valid"));
            return false;
        }
        self.ensure_component_types_sorted();

        let mut changed = false;
        ui.indent();

        render_entity_header(ui, entity);
        if self.render_existing_components(ui, entity) {
            changed = true;
        }
        if let Some(name) = self.render_create_component(ui, entity) {
            self.staged.create_components.push((entity, name));
            changed = true;
        }

        ui.unindent();
        changed
    }

    fn render_existing_components(&mut self, ui: &mut dyn InspectorUi, entity: Entity) -> bool {
        let registry = &mut self.registry;
        let staged = &mut self.staged;
        let mut changed = false;

        for factory in &mut self.factories {
            if !factory.has_component(registry, entity) {
                continue;
            }
            let name = factory.name().to_owned();
            ui.push_id(&name);

            if ui.button("Remove") {
                staged.destroy_components.push((entity, name.clone()));
                changed = true;
            }

            if ui.collapsing_header(&name, factory.is_empty()) {
                ui.indent();
                if factory.render_ui(ui, registry, entity) {
                    if !staged.edit_components.contains(&name) {
                        staged.edit_components.push(name.clone());
                    }
                    changed = true;
                }
                ui.unindent();
            }

            ui.pop_id();
        }
        changed
    }

    fn render_create_component(&self, ui: &mut dyn InspectorUi, entity: Entity) -> Option<String> {
        if !ui.begin_menu("Add Component", !self.factories.is_empty()) {
            return None;
        }
        let picked = self.factories.iter().find_map(|factory| {
            let present = factory.has_component(&self.registry, entity);
            ui.menu_item(factory.name(), !present)
                .then(|| factory.name().to_owned())
        });
        ui.end_menu();
        picked
    }

    /// Whether inspector requests are waiting for [`Manager::commit_actions`].
    pub fn has_staged_actions(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Apply everything staged by the inspectors, in this order:
    /// materialization toggles, new entities, component creation, component
    /// removal, component edits. Requests that no longer apply are logged and
    /// skipped.
    pub fn commit_actions(&mut self, scene: &mut dyn SceneHost) {
        let staged = std::mem::take(&mut self.staged);

        for (entity, materialized) in staged.materializations {
            if materialized {
                self.materialize(scene, entity);
            } else {
                self.dematerialize(scene, entity);
            }
        }

        for _ in 0..staged.new_entities {
            let entity = self.registry.create();
            self.materialize(scene, entity);
        }

        for (entity, name) in staged.create_components {
            let Some(index) = self.factory_index(&name) else {
                tracing::error!(component = %name, %entity, "Cannot add component of unknown type");
                continue;
            };
            let factory = &self.factories[index];
            if !self.registry.valid(entity) || factory.has_component(&self.registry, entity) {
                tracing::error!(component = %name, %entity, "Cannot add component");
                continue;
            }
            if let Err(err) = factory.create_component(&mut self.registry, entity) {
                tracing::error!(component = %name, %entity, %err, "Cannot add component");
            }
        }

        for (entity, name) in staged.destroy_components {
            let Some(index) = self.factory_index(&name) else {
                tracing::error!(
                    component = %name,
                    %entity,
                    "Cannot remove component of unknown type"
                );
                continue;
            };
            let factory = &self.factories[index];
            if !self.registry.valid(entity) || !factory.has_component(&self.registry, entity) {
                tracing::error!(component = %name, %entity, "Cannot remove component");
                continue;
            }
            factory.destroy_component(&mut self.registry, entity);
        }

        for name in staged.edit_components {
            if let Some(index) = self.factory_index(&name) {
                self.factories[index].commit_actions(&mut self.registry);
            }
        }
    }
}

fn render_entity_header(ui: &mut dyn InspectorUi, entity: Entity) {
    ui.heading(&format!("Entity {entity}"));
    if ui.button("Copy ID") {
        ui.set_clipboard_text(&entity.to_bits().to_string());
    }
}
