//! OrmKit - object-relational mapping for Rust.
//!
//! OrmKit maps entity classes onto relational tables and fronts every
//! database interaction with a session:
//!
//! - Declarative entity descriptors with typed property and relation
//!   mappings
//! - Cascading merges that expand over the object graph, validate
//!   cross-references, and write required targets first
//! - An identity cache keeping one shared instance per database row
//! - Typed reads with filtering, ordering, and depth-one relation
//!   loading
//! - Declarative transaction scopes with commit and rollback
//!   dispositions
//! - A SQLite provider with lazy, per-class schema synchronization
//!
//! # Quick start
//!
//! ```ignore
//! use ormkit::prelude::*;
//!
//! // Descriptors are usually written once per entity class; see the
//! // Entity trait for the full set of hooks.
//! let mut session = Session::from_config(&SessionConfig::default())?;
//!
//! let town = Town::create("Oulu", 200_526);
//! session.merge(&town)?;
//!
//! let big: Vec<EntityRef<Town>> = session
//!     .from::<Town>()
//!     .filter(Filter::property("population").greater(100_000))
//!     .order_by("name", Order::Asc)
//!     .all()?;
//!
//! let scope = session.declare_transaction(Propagation::Require, Disposition::Commit)?;
//! session.remove(&town)?;
//! scope.end()?;
//! ```

// Core mapping and query model
pub use ormkit_core::{
    AnyEntity,
    ColumnSet,
    Comparison,
    DataKind,
    Entity,
    EntityDescriptor,
    EntityMetadata,
    EntityRef,
    Error,
    ErrorKind,
    Filter,
    FilterProperty,
    FromValue,
    MetadataCache,
    Operation,
    Order,
    PropertyMapping,
    Provider,
    Query,
    QueryBuilder,
    QueryResult,
    RelationDef,
    RelationKind,
    RelationMeta,
    Result,
    Row,
    Value,
    entity_ref,
    make_instance,
};

// Session orchestration
pub use ormkit_session::{
    Disposition, IdentityCache, MergeMode, Propagation, Select, Session, SessionConfig,
    TransactionToken,
};

// SQLite backend
pub use ormkit_sqlite::{SchemaMode, SqliteConfig, SqliteProvider, sqlite_version};

/// Everything an application typically needs, importable in one line.
///
/// ```ignore
/// use ormkit::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        DataKind, Disposition, Entity, EntityDescriptor, EntityRef, Error, Filter, MergeMode,
        MetadataCache, Operation, Order, Propagation, PropertyMapping, Provider, QueryBuilder,
        RelationDef, Result, Row, SchemaMode, Session, SessionConfig, SqliteConfig, SqliteProvider,
        Value, entity_ref, make_instance,
    };
}
