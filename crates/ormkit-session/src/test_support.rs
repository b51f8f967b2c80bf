//! Entity fixtures and a call-recording provider shared by in-crate tests.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use ormkit_core::{
    AnyEntity, DataKind, Entity, EntityDescriptor, EntityRef, Error, PropertyMapping, Provider,
    Query, QueryResult, RelationDef, Result, Row, Value, entity_ref, make_instance,
};

pub(crate) struct Province {
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

pub(crate) struct Town {
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
            ("population", Value::from(self.population)),
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

/// Self-referential class for dependency-cycle and chain ordering tests.
pub(crate) struct Employee {
    pub id: Option<i64>,
    pub name: String,
    pub mentor: Option<EntityRef<Employee>>,
}

impl Employee {
    pub fn create(name: &str) -> EntityRef<Employee> {
        entity_ref(Employee {
            id: None,
            name: name.to_string(),
            mentor: None,
        })
    }
}

static EMPLOYEE_PROPERTIES: &[PropertyMapping] = &[
    PropertyMapping::new("id", DataKind::BigInt)
        .object_id(true)
        .auto_generated(true),
    PropertyMapping::new("name", DataKind::Text),
];

static EMPLOYEE_RELATIONS: &[RelationDef] =
    &[RelationDef::many_to_one("mentor", Employee::descriptor)];

static EMPLOYEE_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Employee",
    table: "Employee",
    properties: EMPLOYEE_PROPERTIES,
    relations: EMPLOYEE_RELATIONS,
    type_key: TypeId::of::<Employee>,
    make: make_instance::<Employee>,
};

impl Entity for Employee {
    fn descriptor() -> &'static EntityDescriptor {
        &EMPLOYEE_DESCRIPTOR
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
            mentor: None,
        })
    }

    fn referenced(&self) -> Vec<(&'static str, Option<AnyEntity>)> {
        vec![("mentor", self.mentor.as_ref().map(AnyEntity::new))]
    }

    fn set_referenced(&mut self, relation: &str, target: &AnyEntity) {
        if relation == "mentor" {
            self.mentor = target.downcast::<Employee>();
        }
    }
}

/// Keyless entity; no property is declared as object ID.
pub(crate) struct Memo {
    pub text: String,
}

impl Memo {
    pub fn create(text: &str) -> EntityRef<Memo> {
        entity_ref(Memo {
            text: text.to_string(),
        })
    }
}

static MEMO_PROPERTIES: &[PropertyMapping] = &[PropertyMapping::new("text", DataKind::Text)];

static MEMO_DESCRIPTOR: EntityDescriptor = EntityDescriptor {
    entity: "Memo",
    table: "Memo",
    properties: MEMO_PROPERTIES,
    relations: &[],
    type_key: TypeId::of::<Memo>,
    make: make_instance::<Memo>,
};

impl Entity for Memo {
    fn descriptor() -> &'static EntityDescriptor {
        &MEMO_DESCRIPTOR
    }

    fn object_id(&self) -> Option<i64> {
        None
    }

    fn set_object_id(&mut self, _id: i64) {}

    fn to_record(&self) -> Vec<(&'static str, Value)> {
        vec![("text", Value::from(self.text.clone()))]
    }

    fn from_record(row: &Row) -> Result<Self> {
        Ok(Self {
            text: row.get_named("text")?,
        })
    }
}

/// Provider double that logs each call and never touches a database.
pub(crate) struct RecordingProvider {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub connected: bool,
    pub fail_execute: bool,
    pub rows_affected: u64,
}

impl RecordingProvider {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let provider = Self {
            calls: Arc::clone(&calls),
            connected: false,
            fail_execute: false,
            rows_affected: 1,
        };
        (provider, calls)
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

impl Provider for RecordingProvider {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn execute(&mut self, query: &Query) -> Result<QueryResult> {
        if self.fail_execute {
            return Err(Error::provider("instrumented execute failure"));
        }
        self.log(format!("execute {:?}", query.operation()));
        Ok(QueryResult {
            rows: Vec::new(),
            rows_affected: self.rows_affected,
            last_inserted_id: Some(1),
        })
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.log("begin");
        Ok(())
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.log("commit");
        Ok(())
    }

    fn rollback_transaction(&mut self) -> Result<()> {
        self.log("rollback");
        Ok(())
    }

    fn savepoint(&mut self, name: &str) -> Result<()> {
        self.log(format!("savepoint {name}"));
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.log(format!("release {name}"));
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        self.log(format!("rollback_to {name}"));
        Ok(())
    }
}
