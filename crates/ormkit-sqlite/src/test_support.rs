//! Shared entity fixtures for this crate's tests.
//!
//! The fixtures are bare descriptors; nothing here is materialized into
//! instances, so no entity types implement the full entity trait.

use std::any::TypeId;
use std::sync::Arc;

use ormkit_core::entity::{AnyEntity, EntityDescriptor};
use ormkit_core::{
    DataKind, EntityMetadata, Error, MetadataCache, PropertyMapping, RelationDef, Result, Row,
};

fn unused_make(_row: &Row) -> Result<AnyEntity> {
    Err(Error::other("fixtures are never materialized"))
}

struct Province;

static PROVINCE_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("name", DataKind::Text),
];

static PROVINCE_RELATIONS: &[RelationDef] =
    &[RelationDef::one_to_many("towns", town_descriptor).back_reference("province")];

static PROVINCE_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Province",
    table: "Province",
    properties: PROVINCE_PROPERTIES,
    relations: PROVINCE_RELATIONS,
    type_key: TypeId::of::<Province>,
    make: unused_make,
};

fn province_descriptor() -> &'static EntityDescriptor {
    &PROVINCE_DESCRIPTOR
}

struct Town;

static TOWN_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("name", DataKind::Text),
    PropertyMapping::new("population", DataKind::Int),
];

static TOWN_RELATIONS: &[RelationDef] =
    &[RelationDef::many_to_one("province", province_descriptor).back_reference("towns")];

static TOWN_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Town",
    table: "Town",
    properties: TOWN_PROPERTIES,
    relations: TOWN_RELATIONS,
    type_key: TypeId::of::<Town>,
    make: unused_make,
};

fn town_descriptor() -> &'static EntityDescriptor {
    &TOWN_DESCRIPTOR
}

struct Specimen;

static SPECIMEN_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("flag", DataKind::Bool),
    PropertyMapping::new("small", DataKind::SmallInt),
    PropertyMapping::new("weight", DataKind::Float),
    PropertyMapping::new("ratio", DataKind::Double),
    PropertyMapping::new("born", DataKind::Date),
    PropertyMapping::new("alarm", DataKind::Time),
    PropertyMapping::new("seen", DataKind::DateTime),
    PropertyMapping::new("grade", DataKind::Char),
    PropertyMapping::new("name", DataKind::Text),
    PropertyMapping::new("payload", DataKind::Blob),
];

static SPECIMEN_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Specimen",
    table: "Specimen",
    properties: SPECIMEN_PROPERTIES,
    relations: &[],
    type_key: TypeId::of::<Specimen>,
    make: unused_make,
};

struct Journal;

static JOURNAL_PROPERTIES: &[PropertyMapping] = &[PropertyMapping::new("note", DataKind::Text)];

static JOURNAL_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Journal",
    table: "Journal",
    properties: JOURNAL_PROPERTIES,
    relations: &[],
    type_key: TypeId::of::<Journal>,
    make: unused_make,
};

pub(crate) fn town_metadata() -> Arc<EntityMetadata> {
    MetadataCache::new().resolve(&TOWN_DESCRIPTOR).unwrap()
}

pub(crate) fn specimen_metadata() -> Arc<EntityMetadata> {
    MetadataCache::new().resolve(&SPECIMEN_DESCRIPTOR).unwrap()
}

pub(crate) fn no_id_metadata() -> Arc<EntityMetadata> {
    MetadataCache::new().resolve(&JOURNAL_DESCRIPTOR).unwrap()
}

/// Path for a file-backed test database, removing any leftover from an
/// earlier run.
pub(crate) fn temp_database(tag: &str) -> String {
    let path = std::env::temp_dir().join(format!("ormkit-{tag}-{}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path.to_string_lossy().into_owned()
}
