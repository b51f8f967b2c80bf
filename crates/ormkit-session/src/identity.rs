//! Per-session identity cache.
//!
//! The cache guarantees that one database row corresponds to at most one
//! live instance inside a session: reads that hit a tracked id hand back
//! the already-tracked handle instead of materializing a duplicate, and
//! merge-mode resolution asks it whether an instance is known.
//!
//! Two indexes back this up. Instances are tracked by reference identity
//! (class plus allocation), because an instance can become tracked before
//! the backend has assigned its id. The id index from `(class, objectId)`
//! to the canonical handle is filled in as ids become known.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use ormkit_core::AnyEntity;

/// Tracked instances of one session.
///
/// Holds plain entity handles; cloning a stored [`AnyEntity`] clones the
/// handle, never the instance, so "same instance returned" is observable
/// through pointer identity on the caller side.
#[derive(Debug, Default)]
pub struct IdentityCache {
    by_id: HashMap<(TypeId, i64), AnyEntity>,
    tracked: HashSet<(TypeId, usize)>,
}

fn instance_id(entity: &AnyEntity) -> (TypeId, usize) {
    (entity.entity_type(), entity.instance_key())
}

impl IdentityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an instance, indexing it by id when one is assigned.
    ///
    /// Tracking the same instance again refreshes the id index, which
    /// matters right after a create wrote the backend-assigned id back.
    pub fn track(&mut self, entity: &AnyEntity) {
        self.tracked.insert(instance_id(entity));
        if let Some(id) = entity.object_id() {
            self.by_id
                .insert((entity.entity_type(), id), entity.clone());
        }
    }

    /// Whether this exact instance is tracked.
    #[must_use]
    pub fn is_tracked(&self, entity: &AnyEntity) -> bool {
        self.tracked.contains(&instance_id(entity))
    }

    /// The canonical handle for a class and id, when one is tracked.
    #[must_use]
    pub fn lookup(&self, class: TypeId, id: i64) -> Option<AnyEntity> {
        self.by_id.get(&(class, id)).cloned()
    }

    /// Stop tracking an instance. Returns whether it was tracked.
    ///
    /// The id index entry is dropped only when it points at this same
    /// instance, so evicting a stale duplicate cannot orphan the
    /// canonical handle.
    pub fn evict(&mut self, entity: &AnyEntity) -> bool {
        let was_tracked = self.tracked.remove(&instance_id(entity));
        if let Some(id) = entity.object_id() {
            let key = (entity.entity_type(), id);
            if self
                .by_id
                .get(&key)
                .is_some_and(|held| held.same_instance(entity))
            {
                self.by_id.remove(&key);
            }
        }
        was_tracked
    }

    /// Number of tracked instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Whether nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Drop every tracked instance.
    pub fn clear(&mut self) {
        self.by_id.clear();
        self.tracked.clear();
    }
}
