//! Derived entity metadata and its lazy, cycle-guarded cache.
//!
//! A descriptor says what an entity declares; [`EntityMetadata`] is the
//! validated, column-resolved form the rest of the engine consumes. The
//! [`MetadataCache`] derives metadata once per class, guards against
//! mutually-referencing classes with an in-progress set, and hands out
//! shared read-only handles.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use regex::Regex;

use crate::entity::{AnyEntity, Entity, EntityDescriptor};
use crate::error::{Error, Result};
use crate::mapping::{PropertyMapping, RelationDef, RelationKind};
use crate::row::Row;
use crate::types::DataKind;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
    })
}

fn check_identifier(entity: &str, role: &str, name: &str) -> Result<()> {
    if identifier_pattern().is_match(name) {
        Ok(())
    } else {
        Err(Error::mapping(
            entity,
            format!("{role} '{name}' is not a valid identifier"),
        ))
    }
}

/// A relation of one entity class, with its foreign-key column resolved.
#[derive(Debug, Clone)]
pub struct RelationMeta {
    /// The static declaration this was derived from.
    pub def: &'static RelationDef,

    /// Storage column carrying the foreign key. For many-to-one this lives
    /// on the declaring table; for one-to-many it lives on the target table.
    pub column: String,

    /// Data kind of the foreign-key column.
    pub column_kind: DataKind,

    /// Name of the reciprocal relation on the target class, when one exists.
    pub reciprocal: Option<&'static str>,
}

impl RelationMeta {
    /// Relation property name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    /// Cardinality of the relation.
    #[must_use]
    pub fn kind(&self) -> RelationKind {
        self.def.kind
    }

    /// Descriptor of the target class.
    #[must_use]
    pub fn target(&self) -> &'static EntityDescriptor {
        (self.def.target)()
    }
}

/// Validated, column-resolved schema counterpart of one entity class.
///
/// Built once per class by the [`MetadataCache`] and immutable afterwards,
/// so handles can be shared read-only across sessions and threads.
#[derive(Debug)]
pub struct EntityMetadata {
    descriptor: &'static EntityDescriptor,
    object_id: Option<&'static PropertyMapping>,
    relations: Vec<RelationMeta>,
}

impl EntityMetadata {
    /// Entity class name.
    #[must_use]
    pub fn entity(&self) -> &'static str {
        self.descriptor.entity
    }

    /// Storage table name.
    #[must_use]
    pub fn table(&self) -> &'static str {
        self.descriptor.table
    }

    /// Class identity.
    #[must_use]
    pub fn type_key(&self) -> TypeId {
        self.descriptor.key()
    }

    /// Simple property mappings, declaration order.
    #[must_use]
    pub fn properties(&self) -> &'static [PropertyMapping] {
        self.descriptor.properties
    }

    /// The objectId mapping, when the class declares one.
    #[must_use]
    pub fn object_id(&self) -> Option<&'static PropertyMapping> {
        self.object_id
    }

    /// All derived relations, declaration order.
    #[must_use]
    pub fn relations(&self) -> &[RelationMeta] {
        &self.relations
    }

    /// Look up a relation by property name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationMeta> {
        self.relations.iter().find(|r| r.name() == name)
    }

    /// The many-to-one relations of this class.
    pub fn many_to_one(&self) -> impl Iterator<Item = &RelationMeta> {
        self.relations
            .iter()
            .filter(|r| r.kind() == RelationKind::ManyToOne)
    }

    /// The one-to-many relations of this class.
    pub fn one_to_many(&self) -> impl Iterator<Item = &RelationMeta> {
        self.relations
            .iter()
            .filter(|r| r.kind() == RelationKind::OneToMany)
    }

    /// Resolve a property or many-to-one relation name to its storage column.
    #[must_use]
    pub fn column_for_property(&self, name: &str) -> Option<&str> {
        if let Some(property) = self.descriptor.property(name) {
            return Some(property.column);
        }
        self.relations
            .iter()
            .find(|r| r.kind() == RelationKind::ManyToOne && r.name() == name)
            .map(|r| r.column.as_str())
    }

    /// Columns a read of this relation projects: simple properties first,
    /// then many-to-one foreign keys, declaration order throughout.
    #[must_use]
    pub fn select_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = self
            .descriptor
            .properties
            .iter()
            .map(|p| p.column)
            .collect();
        columns.extend(self.many_to_one().map(|r| r.column.as_str()));
        columns
    }

    /// Materialize an instance of this class from a result row.
    #[allow(clippy::result_large_err)]
    pub fn make_instance(&self, row: &Row) -> Result<AnyEntity> {
        (self.descriptor.make)(row)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TypeId, Arc<EntityMetadata>>,
    in_progress: HashSet<TypeId>,
}

/// Lazy cache of derived [`EntityMetadata`], keyed by class identity.
///
/// Derivation for classes that reference each other recurses through the
/// cache; the in-progress set stops the recursion, and the blocked side
/// falls back to descriptor-level facts, which produce the same columns.
#[derive(Debug, Default)]
pub struct MetadataCache {
    state: Mutex<CacheState>,
}

impl MetadataCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Metadata for the entity class `T`, deriving it on first access.
    #[allow(clippy::result_large_err)]
    pub fn get<T: Entity>(&self) -> Result<Arc<EntityMetadata>> {
        self.resolve(T::descriptor())
    }

    /// Metadata for a descriptor, deriving it on first access.
    #[allow(clippy::result_large_err)]
    pub fn resolve(&self, descriptor: &'static EntityDescriptor) -> Result<Arc<EntityMetadata>> {
        let key = descriptor.key();
        {
            let mut state = self.lock();
            if let Some(found) = state.entries.get(&key) {
                return Ok(Arc::clone(found));
            }
            if state.in_progress.contains(&key) {
                // Another derivation of this class is underway; build a
                // detached copy from descriptor facts and let the marked
                // derivation populate the cache.
                drop(state);
                return self.build(descriptor).map(Arc::new);
            }
            state.in_progress.insert(key);
        }

        let built = self.build(descriptor);
        let mut state = self.lock();
        state.in_progress.remove(&key);
        let metadata = Arc::new(built?);
        state.entries.insert(key, Arc::clone(&metadata));
        tracing::debug!(
            entity = metadata.entity(),
            table = metadata.table(),
            properties = metadata.properties().len(),
            relations = metadata.relations().len(),
            "derived entity metadata"
        );
        Ok(metadata)
    }

    /// Validate and cache a relation target unless it is already cached or
    /// mid-derivation on the current call path.
    fn ensure_target(&self, descriptor: &'static EntityDescriptor) -> Result<()> {
        let key = descriptor.key();
        {
            let state = self.lock();
            if state.entries.contains_key(&key) || state.in_progress.contains(&key) {
                return Ok(());
            }
        }
        self.resolve(descriptor).map(|_| ())
    }

    fn build(&self, descriptor: &'static EntityDescriptor) -> Result<EntityMetadata> {
        let entity = descriptor.entity;
        check_identifier(entity, "entity name", entity)?;
        check_identifier(entity, "table name", descriptor.table)?;

        let mut columns: HashSet<String> = HashSet::new();
        let mut object_id = None;
        for property in descriptor.properties {
            check_identifier(entity, "property", property.name)?;
            check_identifier(entity, "column", property.column)?;
            if !columns.insert(property.column.to_string()) {
                return Err(Error::mapping(
                    entity,
                    format!("duplicate column '{}'", property.column),
                ));
            }
            if property.object_id {
                if object_id.is_some() {
                    return Err(Error::mapping(
                        entity,
                        "more than one property is declared as object ID",
                    ));
                }
                object_id = Some(property);
            }
        }

        let mut relations = Vec::with_capacity(descriptor.relations.len());
        for def in descriptor.relations {
            check_identifier(entity, "relation", def.name)?;
            if descriptor.property(def.name).is_some() {
                return Err(Error::mapping(
                    entity,
                    format!("relation '{}' collides with a property", def.name),
                ));
            }
            let target = (def.target)();
            self.ensure_target(target)?;
            if let Some(back) = def.back_reference {
                if target.relation(back).is_none() {
                    return Err(Error::mapping(
                        entity,
                        format!(
                            "back reference '{back}' of relation '{}' does not exist on '{}'",
                            def.name, target.entity
                        ),
                    ));
                }
            }
            let meta = match def.kind {
                RelationKind::ManyToOne => {
                    Self::derive_many_to_one(entity, descriptor, def, target, &mut columns)?
                }
                RelationKind::OneToMany => {
                    Self::derive_one_to_many(entity, descriptor, def, target, object_id)?
                }
            };
            relations.push(meta);
        }

        Ok(EntityMetadata {
            descriptor,
            object_id,
            relations,
        })
    }

    fn derive_many_to_one(
        entity: &'static str,
        descriptor: &'static EntityDescriptor,
        def: &'static RelationDef,
        target: &'static EntityDescriptor,
        columns: &mut HashSet<String>,
    ) -> Result<RelationMeta> {
        let target_id = target.object_id().ok_or_else(|| {
            Error::mapping(
                entity,
                format!(
                    "relation '{}' targets '{}', which declares no object ID",
                    def.name, target.entity
                ),
            )
        })?;
        let column = fk_column_of(def);
        check_identifier(entity, "foreign-key column", &column)?;
        if !columns.insert(column.clone()) {
            return Err(Error::mapping(
                entity,
                format!("duplicate column '{column}'"),
            ));
        }
        let reciprocal = def.back_reference.or_else(|| {
            target
                .relations
                .iter()
                .find(|r| r.kind == RelationKind::OneToMany && (r.target)().key() == descriptor.key())
                .map(|r| r.name)
        });
        Ok(RelationMeta {
            def,
            column,
            column_kind: target_id.kind,
            reciprocal,
        })
    }

    fn derive_one_to_many(
        entity: &'static str,
        descriptor: &'static EntityDescriptor,
        def: &'static RelationDef,
        target: &'static EntityDescriptor,
        object_id: Option<&'static PropertyMapping>,
    ) -> Result<RelationMeta> {
        let own_id = object_id.ok_or_else(|| {
            Error::mapping(
                entity,
                format!(
                    "relation '{}' collects '{}', but '{entity}' declares no object ID",
                    def.name, target.entity
                ),
            )
        })?;
        // The collecting side stores nothing; resolve the column on the
        // target that points back here.
        let (column, reciprocal) = if let Some(explicit) = def.column {
            (explicit.to_string(), def.back_reference)
        } else if let Some(back) = def.back_reference {
            let back_def = target.relation(back).ok_or_else(|| {
                Error::mapping(
                    entity,
                    format!(
                        "back reference '{back}' of relation '{}' does not exist on '{}'",
                        def.name, target.entity
                    ),
                )
            })?;
            (fk_column_of(back_def), Some(back))
        } else {
            let back_def = target
                .relations
                .iter()
                .find(|r| {
                    r.kind == RelationKind::ManyToOne && (r.target)().key() == descriptor.key()
                })
                .ok_or_else(|| {
                    Error::mapping(
                        entity,
                        format!(
                            "relation '{}' has no matching many-to-one relation on '{}'",
                            def.name, target.entity
                        ),
                    )
                })?;
            (fk_column_of(back_def), Some(back_def.name))
        };
        check_identifier(entity, "foreign-key column", &column)?;
        Ok(RelationMeta {
            def,
            column,
            column_kind: own_id.kind,
            reciprocal,
        })
    }
}

fn fk_column_of(def: &RelationDef) -> String {
    match def.column {
        Some(column) => column.to_string(),
        None => format!("{}_id", def.name),
    }
}
