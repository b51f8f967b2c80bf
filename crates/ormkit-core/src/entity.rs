//! The entity trait and its type-erased handle.
//!
//! Application structs implement [`Entity`] against a `&'static`
//! [`EntityDescriptor`]. Instances move through the engine as
//! [`EntityRef<T>`] shared handles; the session works on the type-erased
//! [`AnyEntity`] so one merge batch can span entity classes.
//!
//! Reference identity is the in-process identity: two `AnyEntity` values
//! are the same instance when they wrap the same allocation, regardless of
//! how many handles exist.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::mapping::{PropertyMapping, RelationDef};
use crate::row::Row;
use crate::value::Value;

/// Shared, mutable handle to a caller-owned entity instance.
pub type EntityRef<T> = Arc<RwLock<T>>;

/// Wrap a freshly built instance in a shared handle.
pub fn entity_ref<T: Entity>(value: T) -> EntityRef<T> {
    Arc::new(RwLock::new(value))
}

pub(crate) fn read_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T: ?Sized>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Static description of one entity class.
///
/// Declared once per type and handed out by [`Entity::descriptor`]. The
/// `type_key` and `make` members are function pointers so descriptors of
/// mutually-referencing classes can still live in statics.
pub struct EntityDescriptor {
    /// Entity class name.
    pub entity: &'static str,

    /// Storage table name. Conventionally the entity name.
    pub table: &'static str,

    /// Simple property mappings, declaration order.
    pub properties: &'static [PropertyMapping],

    /// Declared relations to other entity classes.
    pub relations: &'static [RelationDef],

    /// Class identity accessor.
    pub type_key: fn() -> TypeId,

    /// Materialize an instance from a result row.
    pub make: fn(&Row) -> Result<AnyEntity>,
}

impl EntityDescriptor {
    /// Class identity of the described entity.
    #[must_use]
    pub fn key(&self) -> TypeId {
        (self.type_key)()
    }

    /// The property flagged as objectId, if declared.
    #[must_use]
    pub fn object_id(&self) -> Option<&'static PropertyMapping> {
        self.properties.iter().find(|p| p.object_id)
    }

    /// Look up a property mapping by source name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&'static PropertyMapping> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Look up a relation declaration by name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&'static RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("entity", &self.entity)
            .field("table", &self.table)
            .field("properties", &self.properties.len())
            .field("relations", &self.relations.len())
            .finish()
    }
}

/// Contract for structs the engine can persist.
///
/// `to_record`/`from_record` cover the simple properties only; relation
/// values travel through the graph accessors, and foreign-key columns are
/// derived by the engine from the referenced instances.
pub trait Entity: Sized + Send + Sync + 'static {
    /// The static descriptor of this class.
    fn descriptor() -> &'static EntityDescriptor;

    /// Current objectId value, when one has been assigned.
    fn object_id(&self) -> Option<i64>;

    /// Write back a backend-assigned objectId.
    fn set_object_id(&mut self, id: i64);

    /// Serialize the simple properties in declaration order.
    fn to_record(&self) -> Vec<(&'static str, Value)>;

    /// Construct an instance from a result row.
    #[allow(clippy::result_large_err)]
    fn from_record(row: &Row) -> Result<Self>;

    /// Current targets of the declared many-to-one relations.
    fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)> {
        Vec::new()
    }

    /// Current members of a declared one-to-many relation.
    fn collected(&self, _relation: &str) -> Vec<AnyEntity> {
        Vec::new()
    }

    /// Wire a many-to-one relation to a loaded target.
    fn set_referenced(&mut self, _relation: &str, _target: &AnyEntity) {}

    /// Append a loaded member to a one-to-many relation.
    fn push_collected(&mut self, _relation: &str, _member: &AnyEntity) {}
}

/// Materialize a typed instance from a row, returning the erased handle.
///
/// Descriptors store this (monomorphized) as their `make` member.
pub fn make_instance<T: Entity>(row: &Row) -> Result<AnyEntity> {
    let instance = T::from_record(row)?;
    Ok(AnyEntity::new(&entity_ref(instance)))
}

trait ErasedEntity: Send + Sync {
    fn descriptor(&self) -> &'static EntityDescriptor;
    fn object_id(&self) -> Option<i64>;
    fn set_object_id(&self, id: i64);
    fn record(&self) -> Vec<(&'static str, Value)>;
    fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)>;
    fn collected(&self, relation: &str) -> Vec<AnyEntity>;
    fn set_referenced(&self, relation: &str, target: &AnyEntity);
    fn push_collected(&self, relation: &str, member: &AnyEntity);
    fn instance_key(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
}

struct Erased<T: Entity> {
    cell: EntityRef<T>,
}

impl<T: Entity> ErasedEntity for Erased<T> {
    fn descriptor(&self) -> &'static EntityDescriptor {
        T::descriptor()
    }

    fn object_id(&self) -> Option<i64> {
        read_lock(&self.cell).object_id()
    }

    fn set_object_id(&self, id: i64) {
        write_lock(&self.cell).set_object_id(id);
    }

    fn record(&self) -> Vec<(&'static str, Value)> {
        read_lock(&self.cell).to_record()
    }

    fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)> {
        read_lock(&self.cell).referenced()
    }

    fn collected(&self, relation: &str) -> Vec<AnyEntity> {
        read_lock(&self.cell).collected(relation)
    }

    fn set_referenced(&self, relation: &str, target: &AnyEntity) {
        write_lock(&self.cell).set_referenced(relation, target);
    }

    fn push_collected(&self, relation: &str, member: &AnyEntity) {
        write_lock(&self.cell).push_collected(relation, member);
    }

    fn instance_key(&self) -> usize {
        Arc::as_ptr(&self.cell) as usize
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Type-erased handle to an entity instance.
///
/// Cloning clones the handle, never the instance. The session tracks
/// instances through this type; callers get their typed handle back with
/// [`AnyEntity::downcast`].
#[derive(Clone)]
pub struct AnyEntity {
    inner: Arc<dyn ErasedEntity>,
}

impl AnyEntity {
    /// Erase a typed handle.
    #[must_use]
    pub fn new<T: Entity>(cell: &EntityRef<T>) -> Self {
        Self {
            inner: Arc::new(Erased {
                cell: Arc::clone(cell),
            }),
        }
    }

    /// The descriptor of the wrapped instance's class.
    #[must_use]
    pub fn descriptor(&self) -> &'static EntityDescriptor {
        self.inner.descriptor()
    }

    /// Entity class name, for diagnostics.
    #[must_use]
    pub fn entity_name(&self) -> &'static str {
        self.inner.descriptor().entity
    }

    /// Class identity of the wrapped instance.
    #[must_use]
    pub fn entity_type(&self) -> TypeId {
        self.inner.descriptor().key()
    }

    /// Reference identity of the wrapped instance.
    ///
    /// Stable for the lifetime of the instance; equal across every handle
    /// wrapping the same allocation.
    #[must_use]
    pub fn instance_key(&self) -> usize {
        self.inner.instance_key()
    }

    /// True when both handles wrap the same instance.
    #[must_use]
    pub fn same_instance(&self, other: &AnyEntity) -> bool {
        self.entity_type() == other.entity_type() && self.instance_key() == other.instance_key()
    }

    /// Current objectId value of the instance.
    #[must_use]
    pub fn object_id(&self) -> Option<i64> {
        self.inner.object_id()
    }

    /// Write back a backend-assigned objectId.
    pub fn set_object_id(&self, id: i64) {
        self.inner.set_object_id(id);
    }

    /// Simple-property record of the instance, declaration order.
    #[must_use]
    pub fn record(&self) -> Vec<(&'static str, Value)> {
        self.inner.record()
    }

    /// Current many-to-one targets.
    #[must_use]
    pub fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)> {
        self.inner.referenced()
    }

    /// Current members of a one-to-many relation.
    #[must_use]
    pub fn collected(&self, relation: &str) -> Vec<AnyEntity> {
        self.inner.collected(relation)
    }

    /// Wire a many-to-one relation on the instance.
    pub fn set_referenced(&self, relation: &str, target: &AnyEntity) {
        self.inner.set_referenced(relation, target);
    }

    /// Append a member to a one-to-many relation on the instance.
    pub fn push_collected(&self, relation: &str, member: &AnyEntity) {
        self.inner.push_collected(relation, member);
    }

    /// Recover the typed handle, if the wrapped instance is a `T`.
    #[must_use]
    pub fn downcast<T: Entity>(&self) -> Option<EntityRef<T>> {
        self.inner
            .as_any()
            .downcast_ref::<Erased<T>>()
            .map(|erased| Arc::clone(&erased.cell))
    }
}

impl fmt::Debug for AnyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyEntity")
            .field("entity", &self.entity_name())
            .field("object_id", &self.object_id())
            .finish()
    }
}
