use glam::Vec3;
use scenelink_core::{Archive, ArchiveError, InspectorUi, PersistentComponent, serialize_value};

/// Marker with no payload. Only its presence is persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flag;

impl PersistentComponent for Flag {}

/// Display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name(pub String);

impl PersistentComponent for Name {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "name", &mut self.0)
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        ui.edit_text("name", &mut self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self { current: 100.0, max: 100.0 }
    }
}

impl Health {
    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }

    /// Fraction of `max` left, clamped to `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        (self.current / self.max).clamp(0.0, 1.0)
    }
}

impl PersistentComponent for Health {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "current", &mut self.current)?;
        serialize_value(archive, "max", &mut self.max)
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let mut changed = ui.edit_f32("current", &mut self.current);
        changed |= ui.edit_f32("max", &mut self.max);
        if changed {
            self.max = self.max.max(0.0);
            self.current = self.current.min(self.max);
        }
        changed
    }
}

/// Asset references a renderer resolves. Nothing here is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderable {
    pub mesh: String,
    pub material: String,
    pub visible: bool,
}

impl Default for Renderable {
    fn default() -> Self {
        Self {
            mesh: String::new(),
            material: String::new(),
            visible: true,
        }
    }
}

impl PersistentComponent for Renderable {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "mesh", &mut self.mesh)?;
        serialize_value(archive, "material", &mut self.material)?;
        serialize_value(archive, "visible", &mut self.visible)
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let mut changed = ui.edit_text("mesh", &mut self.mesh);
        changed |= ui.edit_text("material", &mut self.material);
        changed |= ui.checkbox("visible", &mut self.visible);
        changed
    }
}

/// Version 0 stored mass and velocity only; version 1 adds `is_kinematic`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidBody {
    pub mass: f32,
    pub velocity: Vec3,
    pub is_kinematic: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            mass: 1.0,
            velocity: Vec3::ZERO,
            is_kinematic: false,
        }
    }
}

impl PersistentComponent for RigidBody {
    const VERSION: u32 = 1;

    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        version: u32,
    ) -> Result<(), ArchiveError> {
        serialize_value(archive, "mass", &mut self.mass)?;
        let mut velocity = self.velocity.to_array();
        serialize_value(archive, "velocity", &mut velocity)?;
        self.velocity = Vec3::from_array(velocity);
        if version >= 1 {
            serialize_value(archive, "is_kinematic", &mut self.is_kinematic)?;
        }
        Ok(())
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let mut changed = ui.edit_f32("mass", &mut self.mass);
        let mut velocity = self.velocity.to_array();
        if ui.edit_f32_array("velocity", &mut velocity) {
            self.velocity = Vec3::from_array(velocity);
            changed = true;
        }
        changed |= ui.checkbox("is_kinematic", &mut self.is_kinematic);
        changed
    }
}
