use glam::{EulerRot, Mat4, Quat, Vec3};
use scenelink_core::{
    Archive, ArchiveError, Entity, EntityTransformDirty, InspectorUi, PersistentComponent,
    Registry, serialize_value,
};

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Drain the transform-dirty tags set by the scene, in index order.
    pub fn take_dirty(registry: &mut Registry) -> Vec<Entity> {
        let mut dirty: Vec<Entity> = registry
            .view::<EntityTransformDirty>()
            .map(|(entity, _)| entity)
            .collect();
        dirty.sort_by_key(|entity| entity.index());
        for &entity in &dirty {
            registry.remove::<EntityTransformDirty>(entity);
        }
        dirty
    }
}

impl PersistentComponent for Transform {
    fn serialize_in_block(
        &mut self,
        archive: &mut dyn Archive,
        _version: u32,
    ) -> Result<(), ArchiveError> {
        let mut position = self.position.to_array();
        let mut rotation = self.rotation.to_array();
        let mut scale = self.scale.to_array();
        serialize_value(archive, "position", &mut position)?;
        serialize_value(archive, "rotation", &mut rotation)?;
        serialize_value(archive, "scale", &mut scale)?;
        self.position = Vec3::from_array(position);
        self.rotation = Quat::from_array(rotation);
        self.scale = Vec3::from_array(scale);
        Ok(())
    }

    fn render_inspector(&mut self, ui: &mut dyn InspectorUi) -> bool {
        let mut changed = false;

        let mut position = self.position.to_array();
        if ui.edit_f32_array("position", &mut position) {
            self.position = Vec3::from_array(position);
            changed = true;
        }

        // Edited as XYZ euler angles in degrees.
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        let mut degrees = [x.to_degrees(), y.to_degrees(), z.to_degrees()];
        if ui.edit_f32_array("rotation", &mut degrees) {
            let [x, y, z] = degrees.map(f32::to_radians);
            self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
            changed = true;
        }

        let mut scale = self.scale.to_array();
        if ui.edit_f32_array("scale", &mut scale) {
            self.scale = Vec3::from_array(scale);
            changed = true;
        }

        changed
    }
}
