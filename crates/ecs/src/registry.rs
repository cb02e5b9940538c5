use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use scenelink_common::Entity;

use crate::Component;
use crate::paged::PagedVec;
use crate::storage::{ErasedStorage, Storage};

/// Errors from typed registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("entity {0} does not exist")]
    NoSuchEntity(Entity),
    #[error("entity {entity} has no component {component}")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },
    #[error("storage for {0} is registered under a foreign type")]
    StorageMismatch(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

const UNUSED: Slot = Slot {
    generation: 0,
    alive: false,
};

/// Entity-component store.
///
/// Slots are recycled through a LIFO free list; the generation of a slot is
/// bumped when its entity is destroyed. Indices skipped by
/// [`Registry::create_with_hint`] are kept as ranges and handed out once the
/// free list is empty.
pub struct Registry {
    slots: PagedVec<Slot>,
    /// One past the highest index ever handed out.
    end: u32,
    free: Vec<u32>,
    gaps: Vec<Range<u32>>,
    alive: usize,
    storages: HashMap<TypeId, Box<dyn ErasedStorage>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            slots: PagedVec::new(UNUSED),
            end: 0,
            free: Vec::new(),
            gaps: Vec::new(),
            alive: 0,
            storages: HashMap::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive
    }

    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    pub fn valid(&self, entity: Entity) -> bool {
        !entity.is_null()
            && self
                .slots
                .get(entity.index() as usize)
                .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Live entities in ascending index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| Entity::new(index as u32, slot.generation))
    }

    pub fn create(&mut self) -> Entity {
        let index = match self.free.pop() {
            Some(index) => index,
            None => self.take_gap_index().unwrap_or_else(|| {
                debug_assert!(self.end != u32::MAX, "entity index space exhausted");
                self.end += 1;
                self.end - 1
            }),
        };

        let slot = self.slots.entry(index as usize);
        slot.alive = true;
        self.alive += 1;
        Entity::new(index, slot.generation)
    }

    fn take_gap_index(&mut self) -> Option<u32> {
        let gap = self.gaps.last_mut()?;
        let index = gap.start;
        gap.start += 1;
        if gap.is_empty() {
            self.gaps.pop();
        }
        Some(index)
    }

    /// Create an entity reusing the index and generation of `hint` when its
    /// slot is free. Falls back to [`Registry::create`] when the slot is taken.
    ///
    /// Indices skipped to reach the hint are recorded as one range, so a far
    /// hint costs a single page of slots.
    pub fn create_with_hint(&mut self, hint: Entity) -> Entity {
        if hint.is_null() || hint.index() == u32::MAX {
            return self.create();
        }

        let index = hint.index();
        if index >= self.end {
            if index > self.end {
                self.gaps.push(self.end..index);
            }
            self.end = index + 1;
        } else if self.slots.get(index as usize).is_some_and(|slot| slot.alive) {
            return self.create();
        } else if let Some(pos) = self.free.iter().position(|&free| free == index) {
            self.free.swap_remove(pos);
        } else {
            self.claim_gap_index(index);
        }

        *self.slots.entry(index as usize) = Slot {
            generation: hint.generation(),
            alive: true,
        };
        self.alive += 1;
        hint
    }

    /// Split the gap holding `index` around it.
    fn claim_gap_index(&mut self, index: u32) {
        let Some(pos) = self.gaps.iter().position(|gap| gap.contains(&index)) else {
            return;
        };
        let gap = self.gaps.swap_remove(pos);
        if gap.start < index {
            self.gaps.push(gap.start..index);
        }
        if index + 1 < gap.end {
            self.gaps.push(index + 1..gap.end);
        }
    }

    /// Destroy an entity and all of its components. Returns `false` for ids
    /// that are not valid.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.valid(entity) {
            return false;
        }

        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }

        let slot = self.slots.entry(entity.index() as usize);
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index());
        self.alive -= 1;
        true
    }

    /// Remove every entity and component and forget all slot generations.
    pub fn clear(&mut self) {
        for storage in self.storages.values_mut() {
            storage.clear();
        }
        self.slots.clear();
        self.end = 0;
        self.free.clear();
        self.gaps.clear();
        self.alive = 0;
    }

    /// Attach `component` to `entity`, returning the component it replaced.
    pub fn insert<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<Option<T>, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::NoSuchEntity(entity));
        }

        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Storage::<T>::new()));
        match storage.as_any_mut().downcast_mut::<Storage<T>>() {
            Some(storage) => Ok(storage.insert(entity, component)),
            None => Err(RegistryError::StorageMismatch(type_name::<T>())),
        }
    }

    /// Overwrite an existing component, returning the previous value.
    pub fn replace<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<T, RegistryError> {
        if !self.valid(entity) {
            return Err(RegistryError::NoSuchEntity(entity));
        }
        let slot = self
            .get_mut::<T>(entity)
            .ok_or(RegistryError::MissingComponent {
                entity,
                component: type_name::<T>(),
            })?;
        Ok(std::mem::replace(slot, component))
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storage_mut::<T>()?.remove(entity)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>().is_some_and(|storage| storage.contains(entity))
    }

    /// Number of `T` components in the registry.
    pub fn count<T: Component>(&self) -> usize {
        self.storage::<T>().map_or(0, Storage::len)
    }

    /// Iterate `(entity, component)` pairs in storage order.
    pub fn view<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>().into_iter().flat_map(|storage| storage.iter())
    }

    pub fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Storage<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut Storage<T>> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("alive", &self.alive)
            .field("end", &self.end)
            .field("pages", &self.slots.page_count())
            .field("storages", &self.storages.len())
            .finish()
    }
}
