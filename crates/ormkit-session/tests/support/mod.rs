//! Entity fixtures and helpers shared by the integration tests.
#![allow(dead_code)]

use std::any::TypeId;

use ormkit_core::{
    AnyEntity, DataKind, Entity, EntityDescriptor, EntityRef, PropertyMapping, RelationDef, Result,
    Row, Value, entity_ref, make_instance,
};
use ormkit_session::{Session, SessionConfig};
use ormkit_sqlite::{SchemaMode, SqliteConfig, SqliteProvider};

pub struct Province {
    pub id: Option<i64>,
    pub name: String,
    pub towns: Vec<EntityRef<Town>>,
}

impl Province {
    pub fn create(name: &str) -> EntityRef<Province> {
        entity_ref(Province {
            id: None,
            name: name.to_string(),
            towns: Vec::new(),
        })
    }
}

static PROVINCE_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("name", DataKind::Text),
];

static PROVINCE_RELATIONS: &[RelationDef] =
    &[RelationDef::one_to_many("towns", Town::descriptor).back_reference("province")];

static PROVINCE_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Province",
    table: "Province",
    properties: PROVINCE_PROPERTIES,
    relations: PROVINCE_RELATIONS,
    type_key: TypeId::of::<Province>,
    make: make_instance::<Province>,
};

impl Entity for Province {
    fn descriptor() -> &'static EntityDescriptor {
        &PROVINCE_DESCRIPTOR
    }

    fn object_id(&self) -> Option<i64> {
        self.id
    }

    fn set_object_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("name", Value::from(self.name.clone())),
        ]
    }

    fn from_record(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            towns: Vec::new(),
        })
    }

    fn collected(&self, relation: &str) -> Vec<AnyEntity> {
        if relation == "towns" {
            self.towns.iter().map(AnyEntity::new).collect()
        } else {
            Vec::new()
        }
    }

    fn push_collected(&mut self, relation: &str, member: &AnyEntity) {
        if relation == "towns" {
            if let Some(town) = member.downcast::<Town>() {
                self.towns.push(town);
            }
        }
    }
}

pub struct Town {
    pub id: Option<i64>,
    pub name: String,
    pub population: i32,
    pub province: Option<EntityRef<Province>>,
}

impl Town {
    pub fn create(name: &str, population: i32) -> EntityRef<Town> {
        entity_ref(Town {
            id: None,
            name: name.to_string(),
            population,
            province: None,
        })
    }
}

static TOWN_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("name", DataKind::Text),
    PropertyMapping::new("population", DataKind::Int),
];

static TOWN_RELATIONS: &[RelationDef] =
    &[RelationDef::many_to_one("province", Province::descriptor).back_reference("towns")];

static TOWN_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Town",
    table: "Town",
    properties: TOWN_PROPERTIES,
    relations: TOWN_RELATIONS,
    type_key: TypeId::of::<Town>,
    make: make_instance::<Town>,
};

impl Entity for Town {
    fn descriptor() -> &'static EntityDescriptor {
        &TOWN_DESCRIPTOR
    }

    fn object_id(&self) -> Option<i64> {
        self.id
    }

    fn set_object_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::from(self.id)),
            ("name", Value::from(self.name.clone())),
            ("population", Value::Int(self.population)),
        ]
    }

    fn from_record(row: &Row) -> Result<Self> {
        Ok(Self {
            id: row.get_named("id")?,
            name: row.get_named("name")?,
            population: row.get_named("population")?,
            province: None,
        })
    }

    fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)> {
        vec![("province", self.province.as_ref().map(AnyEntity::new))]
    }

    fn set_referenced(&mut self, relation: &str, target: &AnyEntity) {
        if relation == "province" {
            self.province = target.downcast::<Province>();
        }
    }
}

/// Keyless entity; no property is declared as object ID.
pub struct Journal {
    pub note: String,
}

impl Journal {
    pub fn create(note: &str) -> EntityRef<Journal> {
        entity_ref(Journal {
            note: note.to_string(),
        })
    }
}

static JOURNAL_PROPERTIES: &[PropertyMapping] = &[PropertyMapping::new("note", DataKind::Text)];

static JOURNAL_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Journal",
    table: "Journal",
    properties: JOURNAL_PROPERTIES,
    relations: &[],
    type_key: TypeId::of::<Journal>,
    make: make_instance::<Journal>,
};

impl Entity for Journal {
    fn descriptor() -> &'static EntityDescriptor {
        &JOURNAL_DESCRIPTOR
    }

    fn object_id(&self) -> Option<i64> {
        None
    }

    fn set_object_id(&mut self, _id: i64) {}

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![("note", Value::from(self.note.clone()))]
    }

    fn from_record(row: &Row) -> Result<Self> {
        Ok(Self {
            note: row.get_named("note")?,
        })
    }
}

/// Session over a private in-memory database.
pub fn memory_session() -> Session<SqliteProvider> {
    Session::new(SqliteProvider::new(SqliteConfig::memory()))
}

/// Session over a file-backed database with the given schema mode.
pub fn file_session(database: &str, mode: SchemaMode) -> Session<SqliteProvider> {
    Session::new(SqliteProvider::new(
        SqliteConfig::file(database).schema_mode(mode),
    ))
}

/// Session built from a JSON configuration document.
pub fn configured_session(json: &str) -> Session<SqliteProvider> {
    let config = SessionConfig::from_json(json).expect("configuration");
    Session::from_config(&config).expect("session")
}

/// Path for a file-backed test database, removing any leftover from an
/// earlier run.
pub fn temp_database(tag: &str) -> String {
    let path = std::env::temp_dir().join(format!("ormkit-{tag}-{}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path.to_string_lossy().into_owned()
}
