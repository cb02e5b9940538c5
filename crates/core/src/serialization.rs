use std::rc::Rc;

use scenelink_archive::{
    Archive, ArchiveError, ArchiveExt, BinaryInputArchive, BinaryOutputArchive, serialize_value,
};
use scenelink_ecs::Entity;
use scenelink_scene::EntityHandle;

use crate::tags::{EntityMaterialized, MaterializationStatus};
use crate::{CoreError, Manager, serialize_components};

impl Manager {
    /// Snapshot of the whole registry. A storage that cannot be written
    /// fails the snapshot instead of leaving a partial block behind.
    pub fn encode_registry(&mut self) -> Result<Vec<u8>, CoreError> {
        let mut archive = BinaryOutputArchive::new();
        self.serialize_registry(&mut archive)?;
        Ok(archive.finish()?)
    }

    /// Replace the registry with a snapshot. Live handles whose entity is part
    /// of the snapshot stay bound; the next [`Manager::synchronize`]
    /// materializes or dematerializes entities to match the stored status.
    pub fn decode_registry(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        let mut archive = BinaryInputArchive::from_bytes(bytes)?;
        self.serialize_auxiliary_data(&mut archive);
        Ok(())
    }

    /// Read or write the registry inside a host archive. Returns whether the
    /// `"registry"` block completed; a failure is logged and unwound.
    pub fn serialize_auxiliary_data(&mut self, archive: &mut dyn Archive) -> bool {
        let completed = archive.consume_archive_error(|archive| self.serialize_registry(archive));
        if archive.is_input() {
            self.registry_dirty = true;
        }
        completed
    }

    fn serialize_registry(&mut self, archive: &mut dyn Archive) -> Result<(), ArchiveError> {
        let bindings: Vec<EntityMaterialized> = if archive.is_input() {
            let bindings = self
                .registry
                .view::<EntityMaterialized>()
                .map(|(_, tag)| tag.clone())
                .collect();
            self.registry.clear();
            bindings
        } else {
            Vec::new()
        };

        let result = archive.unordered_block("registry", |archive| {
            self.serialize_entities(archive)?;
            serialize_components::<MaterializationStatus>(
                archive,
                "materializationStatus",
                &mut self.registry,
                0,
            )?;
            self.serialize_user_components(archive)
        });

        for tag in bindings {
            let Some(handle) = tag.upgrade() else {
                continue;
            };
            let entity = handle.entity();
            if self.registry.valid(entity) {
                if let Err(err) = self.registry.insert(entity, tag) {
                    tracing::error!(%entity, %err, "cannot rebind handle after load");
                }
            } else {
                tracing::debug!(%entity, "handle entity is not part of the loaded registry");
            }
        }
        result
    }

    fn serialize_entities(&mut self, archive: &mut dyn Archive) -> Result<(), ArchiveError> {
        let entities = self.entities();
        let registry = &mut self.registry;
        archive.array_block("entities", entities.len(), |archive, len| {
            if archive.is_input() {
                for _ in 0..len {
                    let mut bits = 0u64;
                    serialize_value(archive, "entity", &mut bits)?;
                    let hint = Entity::from_bits(bits);
                    let created = registry.create_with_hint(hint);
                    if created != hint {
                        tracing::warn!(%hint, %created, "entity id was not free while loading");
                    }
                }
            } else {
                for entity in entities {
                    serialize_value(archive, "entity", &mut entity.to_bits())?;
                }
            }
            Ok(())
        })
    }

    fn serialize_user_components(&mut self, archive: &mut dyn Archive) -> Result<(), ArchiveError> {
        self.ensure_component_types_sorted();
        let registry = &mut self.registry;
        let factories = &self.factories;

        archive.array_block("storages", factories.len(), |archive, len| {
            if archive.is_input() {
                for _ in 0..len {
                    archive.safe_unordered_block("storage", |archive| {
                        let mut type_name = String::new();
                        serialize_value(archive, "type", &mut type_name)?;
                        let mut version = 0u32;
                        serialize_value(archive, "version", &mut version)?;

                        match factories.iter().find(|factory| factory.name() == type_name) {
                            Some(factory) => {
                                factory.serialize_components(archive, registry, version)
                            }
                            None => {
                                tracing::trace!(
                                    component = %type_name,
                                    "skipping unknown component storage"
                                );
                                Ok(())
                            }
                        }
                    });
                }
            } else {
                for factory in factories {
                    archive.unordered_block("storage", |archive| {
                        serialize_value(archive, "type", &mut factory.name().to_owned())?;
                        let mut version = factory.version();
                        serialize_value(archive, "version", &mut version)?;
                        factory.serialize_components(archive, registry, version)
                    })?;
                }
            }
            Ok(())
        })
    }

    /// Every component of `entity`, one block per registered type.
    pub fn encode_entity(&mut self, entity: Entity) -> Result<Vec<u8>, CoreError> {
        if !self.registry.valid(entity) {
            tracing::error!(%entity, "Cannot encode entity");
            return Err(CoreError::InvalidEntity(entity));
        }
        let mut archive = BinaryOutputArchive::new();
        self.serialize_standalone_entity(&mut archive, entity)?;
        Ok(archive.finish()?)
    }

    /// Make `entity`'s components match `bytes` exactly: listed components are
    /// created or overwritten, components flagged absent are destroyed.
    pub fn decode_entity(&mut self, entity: Entity, bytes: &[u8]) -> Result<(), CoreError> {
        if !self.registry.valid(entity) {
            tracing::error!(%entity, "Cannot decode entity");
            return Err(CoreError::InvalidEntity(entity));
        }
        let mut archive = BinaryInputArchive::from_bytes(bytes)?;
        self.serialize_standalone_entity(&mut archive, entity)?;
        Ok(())
    }

    fn serialize_standalone_entity(
        &mut self,
        archive: &mut dyn Archive,
        entity: Entity,
    ) -> Result<(), ArchiveError> {
        self.ensure_component_types_sorted();
        let registry = &mut self.registry;
        let factories = &self.factories;

        archive.array_block("components", factories.len(), |archive, len| {
            if archive.is_input() {
                for _ in 0..len {
                    archive.safe_unordered_block("component", |archive| {
                        let mut type_name = String::new();
                        serialize_value(archive, "_type", &mut type_name)?;
                        let mut should_exist = false;
                        serialize_value(archive, "_exists", &mut should_exist)?;
                        let mut version = 0u32;
                        serialize_value(archive, "_version", &mut version)?;

                        let Some(factory) = factories.iter().find(|f| f.name() == type_name) else {
                            tracing::trace!(component = %type_name, "skipping unknown component");
                            return Ok(());
                        };
                        let exists = factory.has_component(registry, entity);
                        if should_exist {
                            if !exists {
                                if let Err(err) = factory.create_component(registry, entity) {
                                    tracing::error!(
                                        component = %type_name,
                                        %entity,
                                        %err,
                                        "Cannot create component"
                                    );
                                    return Ok(());
                                }
                            }
                            factory.serialize_component(archive, registry, entity, version)?;
                        } else if exists {
                            factory.destroy_component(registry, entity);
                        }
                        Ok(())
                    });
                }
            } else {
                for factory in factories {
                    archive.unordered_block("component", |archive| {
                        serialize_value(archive, "_type", &mut factory.name().to_owned())?;
                        let mut exists = factory.has_component(registry, entity);
                        serialize_value(archive, "_exists", &mut exists)?;
                        let mut version = factory.version();
                        serialize_value(archive, "_version", &mut version)?;
                        if exists {
                            factory.serialize_component(archive, registry, entity, version)?;
                        }
                        Ok(())
                    })?;
                }
            }
            Ok(())
        })
    }
}

/// Per-handle "Data": the bound entity's standalone encoding.
pub trait HandleData {
    /// Empty when the handle is unbound or the entity cannot be encoded.
    fn data(&self, manager: &mut Manager) -> Vec<u8>;

    /// Queue `bytes` for decoding into the bound entity on the next
    /// synchronize. Ignored for unbound handles.
    fn set_data(&self, manager: &mut Manager, bytes: Vec<u8>);
}

impl HandleData for Rc<EntityHandle> {
    fn data(&self, manager: &mut Manager) -> Vec<u8> {
        let entity = self.entity();
        if entity.is_null() {
            return Vec::new();
        }
        manager.encode_entity(entity).unwrap_or_else(|err| {
            tracing::warn!(%entity, %err, "cannot encode handle data");
            Vec::new()
        })
    }

    fn set_data(&self, manager: &mut Manager, bytes: Vec<u8>) {
        if !self.entity().is_null() {
            manager.queue_decode_entity(self, bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Flag, Health, Name, container_children, setup};
    use crate::{Manager, PersistentComponent};
    use scenelink_scene::{Scene, SceneHost};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct LegacyThing {
        weight: u32,
    }

    impl PersistentComponent for LegacyThing {
        fn serialize_in_block(
            &mut self,
            archive: &mut dyn Archive,
            _version: u32,
        ) -> Result<(), ArchiveError> {
            serialize_value(archive, "weight", &mut self.weight)
        }
    }

    fn populate(manager: &mut Manager) -> Vec<Entity> {
        let registry = manager.registry_mut();
        let entities: Vec<Entity> = (0..5).map(|_| registry.create()).collect();
        registry.destroy(entities[1]);
        let reused = registry.create();
        registry.insert(entities[0], Health { value: 10, max: 20 }).unwrap();
        registry.insert(reused, Health { value: -3, max: 7 }).unwrap();
        registry.insert(entities[4], Flag).unwrap();
        registry.insert(entities[2], Name("two".into())).unwrap();
        registry.insert(entities[0], Flag).unwrap();
        manager.entities()
    }

    #[test]
    fn registry_roundtrip_keeps_ids_and_data() {
        let (mut manager, _scene) = setup();
        let entities = populate(&mut manager);
        let bytes = manager.encode_registry().unwrap();

        let (mut loaded, _scene) = setup();
        loaded.decode_registry(&bytes).unwrap();
        assert_eq!(loaded.entities(), entities);
        for &e in &entities {
            let (a, b) = (manager.registry(), loaded.registry());
            assert_eq!(a.get::<Health>(e), b.get::<Health>(e));
            assert_eq!(a.get::<Name>(e), b.get::<Name>(e));
            assert_eq!(a.has::<Flag>(e), b.has::<Flag>(e));
        }
        assert!(loaded.is_registry_dirty());

        // Same state, same bytes.
        assert_eq!(loaded.encode_registry().unwrap(), bytes);
    }

    #[test]
    fn encoding_ignores_insertion_order() {
        let (mut first, _s1) = setup();
        let (mut second, _s2) = setup();
        let a = Entity::new(0, 0);
        let b = Entity::new(1, 0);
        for manager in [&mut first, &mut second] {
            manager.registry_mut().create_with_hint(a);
            manager.registry_mut().create_with_hint(b);
        }
        first.registry_mut().insert(a, Health { value: 1, max: 1 }).unwrap();
        first.registry_mut().insert(b, Health { value: 2, max: 2 }).unwrap();
        second.registry_mut().insert(b, Health { value: 2, max: 2 }).unwrap();
        second.registry_mut().insert(a, Health { value: 1, max: 1 }).unwrap();

        assert_eq!(
            first.encode_registry().unwrap(),
            second.encode_registry().unwrap()
        );
    }

    #[test]
    fn decode_then_synchronize_materializes_stored_status() {
        let (mut manager, mut scene) = setup();
        let shown = manager.registry_mut().create();
        let hidden = manager.registry_mut().create();
        manager.materialize(&mut scene, shown);
        let bytes = manager.encode_registry().unwrap();

        let (mut loaded, mut fresh) = setup();
        loaded.decode_registry(&bytes).unwrap();
        assert!(!loaded.is_materialized(shown));
        loaded.synchronize(&mut fresh);
        assert!(loaded.is_materialized(shown));
        assert!(!loaded.is_materialized(hidden));
        assert_eq!(container_children(&loaded, &fresh), 1);
    }

    #[test]
    fn reload_in_place_keeps_live_bindings() {
        let (mut manager, mut scene) = setup();
        let e = manager.registry_mut().create();
        let handle = manager.materialize(&mut scene, e).unwrap();
        let bytes = manager.encode_registry().unwrap();

        manager.decode_registry(&bytes).unwrap();
        assert!(Rc::ptr_eq(&manager.handle(e).unwrap(), &handle));
        manager.synchronize(&mut scene);
        assert_eq!(container_children(&manager, &scene), 1);
        assert!(Rc::ptr_eq(&manager.handle(e).unwrap(), &handle));
    }

    #[test]
    fn unknown_storage_is_skipped() {
        let (mut writer, _scene) = setup();
        writer.add_component_type::<LegacyThing>("LegacyThing").unwrap();
        let entities: Vec<Entity> = (0..3).map(|_| writer.registry_mut().create()).collect();
        for (i, &e) in entities.iter().enumerate() {
            writer
                .registry_mut()
                .insert(e, LegacyThing { weight: i as u32 })
                .unwrap();
        }
        writer
            .registry_mut()
            .insert(entities[1], Health { value: 4, max: 8 })
            .unwrap();
        // "LegacyThing" sorts between "Health" and "Name".
        writer
            .registry_mut()
            .insert(entities[2], Name("after".into()))
            .unwrap();
        let bytes = writer.encode_registry().unwrap();

        let (mut reader, _scene) = setup();
        reader.decode_registry(&bytes).unwrap();
        assert_eq!(reader.entities(), entities);
        assert_eq!(
            reader.registry().get::<Health>(entities[1]),
            Some(&Health { value: 4, max: 8 })
        );
        assert_eq!(
            reader.registry().get::<Name>(entities[2]),
            Some(&Name("after".into()))
        );
    }

    #[test]
    fn malformed_bytes_leave_registry_untouched() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        assert!(matches!(
            manager.decode_registry(&[0xff, 0xfe]),
            Err(CoreError::Archive(_))
        ));
        assert!(manager.registry().valid(e));
    }

    #[test]
    fn auxiliary_data_embeds_in_host_archive() {
        let (mut manager, _scene) = setup();
        let entities = populate(&mut manager);

        let mut out = BinaryOutputArchive::new();
        out.unordered_block("scene", |archive| {
            serialize_value(archive, "name", &mut String::from("level"))?;
            archive.unordered_block("manager", |archive| {
                assert!(manager.serialize_auxiliary_data(archive));
                Ok(())
            })
        })
        .unwrap();
        let bytes = out.finish().unwrap();

        let (mut loaded, _scene) = setup();
        let mut input = BinaryInputArchive::from_bytes(&bytes).unwrap();
        input
            .unordered_block("scene", |archive| {
                archive.unordered_block("manager", |archive| {
                    assert!(loaded.serialize_auxiliary_data(archive));
                    Ok(())
                })
            })
            .unwrap();
        assert_eq!(loaded.entities(), entities);
        assert!(loaded.is_registry_dirty());
    }

    #[test]
    fn entity_roundtrip_restores_components() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Health { value: 9, max: 12 }).unwrap();
        manager.registry_mut().insert(e, Name("hero".into())).unwrap();
        let bytes = manager.encode_entity(e).unwrap();

        for name in ["Health", "Name"] {
            manager.destroy_component(name, e).unwrap();
        }
        manager.create_component("Flag", e).unwrap();

        manager.decode_entity(e, &bytes).unwrap();
        let registry = manager.registry();
        assert_eq!(registry.get::<Health>(e), Some(&Health { value: 9, max: 12 }));
        assert_eq!(registry.get::<Name>(e), Some(&Name("hero".into())));
        assert!(!registry.has::<Flag>(e));
    }

    #[test]
    fn empty_entity_clears_target() {
        let (mut manager, _scene) = setup();
        let empty = manager.registry_mut().create();
        let target = manager.registry_mut().create();
        manager.registry_mut().insert(target, Health::default()).unwrap();
        manager.registry_mut().insert(target, Flag).unwrap();

        let bytes = manager.encode_entity(empty).unwrap();
        manager.decode_entity(target, &bytes).unwrap();
        for name in manager.component_type_names() {
            assert!(!manager.has_component(&name, target), "{name} survived");
        }
    }

    #[test]
    fn tag_presence_roundtrip() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Health::default()).unwrap();
        manager.create_component("Flag", e).unwrap();
        let with_flag = manager.encode_entity(e).unwrap();

        manager.destroy_component("Flag", e).unwrap();
        let without_flag = manager.encode_entity(e).unwrap();

        manager.decode_entity(e, &with_flag).unwrap();
        assert!(manager.has_component("Flag", e));
        manager.decode_entity(e, &without_flag).unwrap();
        assert!(!manager.has_component("Flag", e));
        assert!(manager.has_component("Health", e));
    }

    #[test]
    fn older_component_version_is_read() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();

        // A Health written before "max" existed.
        let mut out = BinaryOutputArchive::new();
        out.array_block("components", 1, |archive, _| {
            archive.unordered_block("component", |archive| {
                serialize_value(archive, "_type", &mut String::from("Health"))?;
                serialize_value(archive, "_exists", &mut true)?;
                serialize_value(archive, "_version", &mut 0u32)?;
                serialize_value(archive, "value", &mut 33i32)
            })
        })
        .unwrap();
        let bytes = out.finish().unwrap();

        manager.decode_entity(e, &bytes).unwrap();
        assert_eq!(
            manager.registry().get::<Health>(e),
            Some(&Health { value: 33, max: 0 })
        );
    }

    #[test]
    fn malformed_component_block_is_contained() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();

        let mut out = BinaryOutputArchive::new();
        out.array_block("components", 2, |archive, _| {
            archive.unordered_block("component", |archive| {
                serialize_value(archive, "_type", &mut String::from("Health"))?;
                serialize_value(archive, "_exists", &mut true)?;
                serialize_value(archive, "_version", &mut 1u32)?;
                serialize_value(archive, "value", &mut String::from("not a number"))
            })?;
            archive.unordered_block("component", |archive| {
                serialize_value(archive, "_type", &mut String::from("Flag"))?;
                serialize_value(archive, "_exists", &mut true)?;
                serialize_value(archive, "_version", &mut 0u32)
            })
        })
        .unwrap();
        let bytes = out.finish().unwrap();

        manager.decode_entity(e, &bytes).unwrap();
        assert!(manager.has_component("Flag", e));
    }

    #[test]
    fn malformed_storage_block_is_contained() {
        let (mut manager, _scene) = setup();
        let e = Entity::new(0, 0);

        let mut out = BinaryOutputArchive::new();
        out.unordered_block("registry", |archive| {
            archive.array_block("entities", 1, |archive, _| {
                serialize_value(archive, "entity", &mut e.to_bits())
            })?;
            archive.array_block("materializationStatus", 1, |archive, _| {
                archive.unordered_block("component", |archive| {
                    serialize_value(archive, "_entity", &mut e.to_bits())?;
                    serialize_value(archive, "materialized", &mut true)
                })
            })?;
            archive.array_block("storages", 2, |archive, _| {
                archive.unordered_block("storage", |archive| {
                    serialize_value(archive, "type", &mut String::from("Health"))?;
                    serialize_value(archive, "version", &mut 1u32)?;
                    archive.array_block("components", 1, |archive, _| {
                        archive.unordered_block("component", |archive| {
                            serialize_value(archive, "_entity", &mut e.to_bits())?;
                            serialize_value(archive, "value", &mut String::from("ten"))?;
                            serialize_value(archive, "max", &mut 10i32)
                        })
                    })
                })?;
                archive.unordered_block("storage", |archive| {
                    serialize_value(archive, "type", &mut String::from("Name"))?;
                    serialize_value(archive, "version", &mut 0u32)?;
                    archive.array_block("components", 1, |archive, _| {
                        archive.unordered_block("component", |archive| {
                            serialize_value(archive, "_entity", &mut e.to_bits())?;
                            serialize_value(archive, "text", &mut String::from("kept"))
                        })
                    })
                })
            })
        })
        .unwrap();
        let bytes = out.finish().unwrap();

        manager.decode_registry(&bytes).unwrap();
        let registry = manager.registry();
        assert!(registry.valid(e));
        assert_eq!(registry.get::<Health>(e), None);
        assert_eq!(registry.get::<Name>(e), Some(&Name("kept".into())));
        assert_eq!(
            registry.get::<MaterializationStatus>(e),
            Some(&MaterializationStatus { materialized: true })
        );
    }

    #[derive(Debug, Clone, Default)]
    struct Unwritable;

    impl PersistentComponent for Unwritable {
        fn serialize_in_block(
            &mut self,
            archive: &mut dyn Archive,
            _version: u32,
        ) -> Result<(), ArchiveError> {
            if archive.is_input() {
                return Ok(());
            }
            Err(ArchiveError::MissingField("payload".into()))
        }
    }

    #[test]
    fn failed_storage_write_fails_the_snapshot() {
        let (mut manager, _scene) = setup();
        manager.add_component_type::<Unwritable>("Unwritable").unwrap();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Unwritable).unwrap();

        assert!(matches!(
            manager.encode_registry(),
            Err(CoreError::Archive(_))
        ));

        let mut out = BinaryOutputArchive::new();
        assert!(!manager.serialize_auxiliary_data(&mut out));
        assert_eq!(out.depth(), 0);
    }

    #[test]
    fn invalid_entity_is_rejected() {
        let (mut manager, _scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().destroy(e);
        assert!(matches!(
            manager.encode_entity(e),
            Err(CoreError::InvalidEntity(_))
        ));
        assert!(matches!(
            manager.decode_entity(e, &[]),
            Err(CoreError::InvalidEntity(_))
        ));
    }

    #[test]
    fn handle_data_roundtrip_through_queue() {
        let (mut manager, mut scene) = setup();
        let e = manager.registry_mut().create();
        manager.registry_mut().insert(e, Health { value: 5, max: 5 }).unwrap();
        let handle = manager.materialize(&mut scene, e).unwrap();

        let data = handle.data(&mut manager);
        assert!(!data.is_empty());
        manager.destroy_component("Health", e).unwrap();

        handle.set_data(&mut manager, data);
        assert_eq!(manager.pending_decodes(), 1);
        assert!(!manager.has_component("Health", e));

        manager.synchronize(&mut scene);
        assert_eq!(manager.pending_decodes(), 0);
        assert_eq!(manager.registry().get::<Health>(e).unwrap().value, 5);
    }

    #[test]
    fn unbound_handle_has_no_data() {
        let (mut manager, mut scene) = setup();
        let handle = EntityHandle::new();
        assert!(handle.data(&mut manager).is_empty());
        handle.set_data(&mut manager, vec![1, 2, 3]);
        assert_eq!(manager.pending_decodes(), 0);
        manager.synchronize(&mut scene);
        assert_eq!(scene.children(scene.root()).len(), 1);
    }

    #[test]
    fn dropped_handle_decode_is_ignored() {
        let (mut manager, mut scene) = setup();
        let e = manager.registry_mut().create();
        let handle = manager.materialize(&mut scene, e).unwrap();
        let bytes = manager.encode_entity(e).unwrap();
        manager.queue_decode_entity(&handle, bytes);
        manager.dematerialize(&mut scene, e);
        drop(handle);

        manager.synchronize(&mut scene);
        assert_eq!(manager.pending_decodes(), 0);
        assert!(manager.registry().valid(e));
    }

    #[test]
    fn fresh_scene_gets_own_container() {
        let (mut manager, _old) = setup();
        let e = manager.registry_mut().create();
        let mut scene = Scene::new();
        manager.attach_to_scene(&mut scene).unwrap();
        manager.materialize(&mut scene, e).unwrap();
        assert_eq!(container_children(&manager, &scene), 1);
    }
}
