//! Core types and traits for OrmKit.
//!
//! This crate defines the backend-neutral half of the mapping engine:
//! dynamic values and result rows, the entity trait with its static
//! descriptors, lazily derived and cached relation metadata, the immutable
//! query model with its predicate tree, and the provider contract that
//! backends implement.
//!
//! Nothing here talks to a database. The reference backend lives in
//! `ormkit-sqlite`; session orchestration lives in `ormkit-session`.

pub mod entity;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod metadata;
pub mod provider;
pub mod query;
pub mod row;
pub mod types;
pub mod value;

pub use entity::{AnyEntity, Entity, EntityDescriptor, EntityRef, entity_ref, make_instance};
pub use error::{
    ConfigError, EntityError, Error, ErrorKind, MappingError, ProviderError, Result, SchemaError,
    TypeError,
};
pub use filter::{Comparison, Filter, FilterProperty};
pub use mapping::{PropertyMapping, RelationDef, RelationKind};
pub use metadata::{EntityMetadata, MetadataCache, RelationMeta};
pub use provider::{Provider, QueryResult};
pub use query::{Operation, Order, Query, QueryBuilder};
pub use row::{ColumnSet, FromValue, Row};
pub use types::DataKind;
pub use value::Value;
