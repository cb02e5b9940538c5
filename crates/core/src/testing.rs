//! Fixtures shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};

use scenelink_archive::{Archive, ArchiveError, serialize_value};
use scenelink_scene::{Scene, SceneHost};

use crate::{InspectorUi, Manager, PersistentComponent};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Health {
    pub value: i32,
    pub max: i32,
}

impl PersistentComponent for Health {
    const VERSION: u32 = 1;

    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "value", &mut self.value)?;
        if version >= 1 {
            serialize_value(archive, "max", &mut self.max)?;
        }
        Ok(())
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        ui.edit_i32("value", &mut self.value) | ui.edit_i32("max", &mut self.max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flag;

impl PersistentComponent for Flag {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Name(pub String);

impl PersistentComponent for Name {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "text", &mut self.0)
    }
}

/// Manager with Health, Flag and Name registered, attached to a new scene.
pub fn setup() -> (Manager, Scene) {
    let mut manager = Manager::default();
    manager.add_component_type::<Health>("Health").unwrap();
    manager.add_component_type::<Flag>("Flag").unwrap();
    manager.add_component_type::<Name>("Name").unwrap();
    let mut scene = Scene::new();
    manager.attach_to_scene(&mut scene).unwrap();
    (manager, scene)
}

/// Direct children of the entities container.
pub fn container_children(manager: &Manager, scene: &Scene) -> usize {
    manager
        .entities_container()
        .map_or(0, |container| scene.children(container).len())
}

/// Inspector double: records what was drawn and answers interactions from a
/// script keyed by widget label.
#[derive(Default)]
pub struct ScriptedUi {
    pub lines: Vec<String>,
    pub clipboard: Option<String>,
    ids: Vec<String>,
    clicks: HashSet<String>,
    toggles: HashSet<String>,
    ints: HashMap<String, i32>,
}

impl ScriptedUi {
    pub fn click(&mut self, label: &str) {
        self.clicks.insert(label.to_owned());
    }

    pub fn toggle(&mut self, label: &str) {
        self.toggles.insert(label.to_owned());
    }

    pub fn set_i32(&mut self, label: &str, value: i32) {
        self.ints.insert(label.to_owned(), value);
    }

    fn scoped(&self, label: &str) -> String {
        let mut path = self.ids.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(label);
        path
    }

    fn clicked(&self, label: &str) -> bool {
        self.clicks.contains(label) || self.clicks.contains(&self.scoped(label))
    }
}

impl InspectorUi for ScriptedUi {
    fn heading(&mut self, text: &str) {
        self.lines.push(text.to_owned());
    }

    fn label(&mut self, text: &str) {
        self.lines.push(text.to_owned());
    }

    fn push_id(&mut self, id: &str) {
        self.ids.push(id.to_owned());
    }

    fn pop_id(&mut self) {
        self.ids.pop();
    }

    fn indent(&mut self) {}

    fn unindent(&mut self) {}

    fn checkbox(&mut self, label: &str, value: &mut bool) -> bool {
        self.lines.push(format!("[{}] {label}", if *value { "x" } else { " " }));
        if self.toggles.contains(label) || self.toggles.contains(&self.scoped(label)) {
            *value = !*value;
            return true;
        }
        false
    }

    fn button(&mut self, label: &str) -> bool {
        self.lines.push(format!("<{label}>"));
        self.clicked(label)
    }

    fn begin_menu(&mut self, label: &str, enabled: bool) -> bool {
        enabled && self.clicked(label)
    }

    fn menu_item(&mut self, label: &str, enabled: bool) -> bool {
        enabled && self.clicked(label)
    }

    fn end_menu(&mut self) {}

    fn collapsing_header(&mut self, label: &str, _leaf: bool) -> bool {
        self.lines.push(format!("# {label}"));
        true
    }

    fn edit_f32(&mut self, label: &str, _value: &mut f32) -> bool {
        self.lines.push(label.to_owned());
        false
    }

    fn edit_i32(&mut self, label: &str, value: &mut i32) -> bool {
        self.lines.push(format!("{label} = {value}"));
        match self.ints.get(label) {
            Some(&new) if new != *value => {
                *value = new;
                true
            }
            _ => false,
        }
    }

    fn edit_u32(&mut self, label: &str, _value: &mut u32) -> bool {
        self.lines.push(label.to_owned());
        false
    }

    fn edit_text(&mut self, label: &str, _value: &mut String) -> bool {
        self.lines.push(label.to_owned());
        false
    }

    fn set_clipboard_text(&mut self, text: &str) {
        self.clipboard = Some(text.to_owned());
    }
}
