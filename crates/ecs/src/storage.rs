use std::any::Any;

use scenelink_common::Entity;

use crate::paged::PagedVec;

const ABSENT: u32 = u32::MAX;

/// Sparse set holding every component of one type.
///
/// `sparse` maps an entity index to a position in the packed `dense`/`data`
/// arrays. It is paged, so a high index costs one page, not the whole range.
/// Removal swaps the last element into the hole, so iteration order is
/// insertion order perturbed by removals, not index order.
pub struct Storage<T> {
    sparse: PagedVec<u32>,
    dense: Vec<Entity>,
    data: Vec<T>,
}

impl<T> Storage<T> {
    pub(crate) fn new() -> Self {
        Self {
            sparse: PagedVec::new(ABSENT),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.dense.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.position(entity).is_some()
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.position(entity).map(|pos| &self.data[pos])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.position(entity).map(|pos| &mut self.data[pos])
    }

    /// Owners of the stored components, in packed order.
    pub fn entities(&self) -> &[Entity] {
        &self.dense
    }

    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.dense.iter().copied().zip(self.data.iter())
    }

    pub(crate) fn insert(&mut self, entity: Entity, value: T) -> Option<T> {
        if let Some(pos) = self.position(entity) {
            return Some(std::mem::replace(&mut self.data[pos], value));
        }

        *self.sparse.entry(entity.index() as usize) = self.dense.len() as u32;
        self.dense.push(entity);
        self.data.push(value);
        None
    }

    pub(crate) fn remove(&mut self, entity: Entity) -> Option<T> {
        let pos = self.position(entity)?;
        *self.sparse.entry(entity.index() as usize) = ABSENT;
        self.dense.swap_remove(pos);
        let value = self.data.swap_remove(pos);
        if let Some(moved) = self.dense.get(pos) {
            *self.sparse.entry(moved.index() as usize) = pos as u32;
        }
        Some(value)
    }

    fn position(&self, entity: Entity) -> Option<usize> {
        if entity.is_null() {
            return None;
        }
        let slot = *self.sparse.get(entity.index() as usize)?;
        if slot == ABSENT {
            return None;
        }
        let pos = slot as usize;
        (self.dense[pos] == entity).then_some(pos)
    }
}

/// Type-erased view used by the registry for whole-entity operations.
pub(crate) trait ErasedStorage {
    fn remove_entity(&mut self, entity: Entity) -> bool;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedStorage for Storage<T> {
    fn remove_entity(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_some()
    }

    fn clear(&mut self) {
        self.sparse.clear();
        self.dense.clear();
        self.data.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove() {
        let mut storage = Storage::new();
        let a = Entity::new(3, 0);
        assert_eq!(storage.insert(a, 10), None);
        assert_eq!(storage.get(a), Some(&10));
        assert_eq!(storage.insert(a, 11), Some(10));
        assert_eq!(storage.remove(a), Some(11));
        assert!(storage.is_empty());
    }

    #[test]
    fn stale_generation_does_not_match() {
        let mut storage = Storage::new();
        storage.insert(Entity::new(1, 0), "old");
        assert!(!storage.contains(Entity::new(1, 1)));
        assert_eq!(storage.remove(Entity::new(1, 1)), None);
    }

    #[test]
    fn swap_remove_keeps_sparse_consistent() {
        let mut storage = Storage::new();
        let ids: Vec<Entity> = (0..5).map(|i| Entity::new(i, 0)).collect();
        for (n, id) in ids.iter().enumerate() {
            storage.insert(*id, n);
        }
        storage.remove(ids[1]);
        for (n, id) in ids.iter().enumerate() {
            if n == 1 {
                assert!(!storage.contains(*id));
            } else {
                assert_eq!(storage.get(*id), Some(&n));
            }
        }
        assert_eq!(storage.len(), 4);
    }

    #[test]
    fn far_index_stays_small() {
        let mut storage = Storage::new();
        let far = Entity::new(u32::MAX - 1, 0);
        storage.insert(far, 1u8);
        storage.insert(Entity::new(0, 0), 2u8);
        assert_eq!(storage.sparse.page_count(), 2);
        assert_eq!(storage.get(far), Some(&1));
        assert_eq!(storage.remove(far), Some(1));
        assert!(!storage.contains(far));
    }
}
