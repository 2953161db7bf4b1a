//! Shared fixtures: an in-memory recording driver and a small entity model
//! (user has-one profile, plus an audit log on a second database).

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use unitwork_core::{
    ColumnMap, Driver, DriverError, DriverRef, Entity, EntityRef, EntitySchema, RelationSchema,
    Result, Schema, Value,
};
use unitwork_session::Session;

type Table = BTreeMap<i64, ColumnMap>;

/// In-memory driver that records every call and keeps actual rows, so tests
/// can assert both the call sequence and the resulting storage state.
pub struct RecordingDriver {
    name: String,
    next_id: Cell<i64>,
    in_tx: Cell<bool>,
    ops: RefCell<Vec<String>>,
    rows: RefCell<HashMap<String, Table>>,
    saved: RefCell<HashMap<String, Table>>,
    fail_insert_into: RefCell<Option<String>>,
    fail_update_of: RefCell<Option<String>>,
    fail_commit: Cell<bool>,
}

impl RecordingDriver {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Self {
            name: name.to_string(),
            next_id: Cell::new(1),
            in_tx: Cell::new(false),
            ops: RefCell::new(Vec::new()),
            rows: RefCell::new(HashMap::new()),
            saved: RefCell::new(HashMap::new()),
            fail_insert_into: RefCell::new(None),
            fail_update_of: RefCell::new(None),
            fail_commit: Cell::new(false),
        })
    }

    /// Every insert into the given table fails until cleared.
    pub fn fail_inserts_into(&self, table: &str) {
        *self.fail_insert_into.borrow_mut() = Some(table.to_string());
    }

    /// Every update of the given table fails until cleared.
    pub fn fail_updates_of(&self, table: &str) {
        *self.fail_update_of.borrow_mut() = Some(table.to_string());
    }

    /// The next commit fails.
    pub fn fail_commit(&self) {
        self.fail_commit.set(true);
    }

    pub fn clear_failures(&self) {
        *self.fail_insert_into.borrow_mut() = None;
        *self.fail_update_of.borrow_mut() = None;
        self.fail_commit.set(false);
    }

    /// The recorded call sequence.
    pub fn ops(&self) -> Vec<String> {
        self.ops.borrow().clone()
    }

    pub fn count_ops(&self, op: &str) -> usize {
        self.ops.borrow().iter().filter(|o| o.as_str() == op).count()
    }

    pub fn row(&self, table: &str, id: i64) -> Option<ColumnMap> {
        self.rows
            .borrow()
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned()
    }

    pub fn table_len(&self, table: &str) -> usize {
        self.rows.borrow().get(table).map_or(0, Table::len)
    }

    fn key_of(key: (&str, &Value)) -> Result<i64> {
        key.1
            .as_i64()
            .ok_or_else(|| DriverError::new("non-integer key").into())
    }
}

impl Driver for RecordingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_transaction(&self) -> Result<()> {
        if self.in_tx.get() {
            return Err(DriverError::new("transaction already open").into());
        }
        self.in_tx.set(true);
        *self.saved.borrow_mut() = self.rows.borrow().clone();
        self.ops.borrow_mut().push("begin".to_string());
        Ok(())
    }

    fn commit_transaction(&self) -> Result<()> {
        if !self.in_tx.get() {
            return Err(DriverError::new("no open transaction").into());
        }
        if self.fail_commit.get() {
            return Err(DriverError::new("commit refused").into());
        }
        self.in_tx.set(false);
        self.ops.borrow_mut().push("commit".to_string());
        Ok(())
    }

    fn rollback_transaction(&self) -> Result<()> {
        if !self.in_tx.get() {
            return Err(DriverError::new("no open transaction").into());
        }
        self.in_tx.set(false);
        *self.rows.borrow_mut() = self.saved.borrow().clone();
        self.ops.borrow_mut().push("rollback".to_string());
        Ok(())
    }

    fn insert(&self, table: &str, row: &ColumnMap) -> Result<Value> {
        if self.fail_insert_into.borrow().as_deref() == Some(table) {
            return Err(DriverError::new(format!("insert into {table} refused")).into());
        }
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.rows
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .insert(id, row.clone());
        self.ops.borrow_mut().push(format!("insert {table}"));
        Ok(Value::Int(id))
    }

    fn update(&self, table: &str, changes: &ColumnMap, key: (&str, &Value)) -> Result<()> {
        if self.fail_update_of.borrow().as_deref() == Some(table) {
            return Err(DriverError::new(format!("update of {table} refused")).into());
        }
        let id = Self::key_of(key)?;
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .get_mut(table)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| DriverError::new(format!("no row {id} in {table}")))?;
        for (column, value) in changes {
            row.insert(column.clone(), value.clone());
        }
        self.ops.borrow_mut().push(format!("update {table}"));
        Ok(())
    }

    fn delete(&self, table: &str, key: (&str, &Value)) -> Result<()> {
        let id = Self::key_of(key)?;
        self.rows
            .borrow_mut()
            .get_mut(table)
            .and_then(|rows| rows.remove(&id))
            .ok_or_else(|| DriverError::new(format!("no row {id} in {table}")))?;
        self.ops.borrow_mut().push(format!("delete {table}"));
        Ok(())
    }
}

pub struct User {
    pub id: Option<i64>,
    pub email: String,
    pub balance: f64,
    pub profile: Option<EntityRef>,
}

impl Entity for User {
    fn role(&self) -> &'static str {
        "user"
    }

    fn extract(&self) -> ColumnMap {
        let mut map = ColumnMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("email".into(), Value::from(self.email.as_str()));
        map.insert("balance".into(), Value::from(self.balance));
        map
    }

    fn hydrate(&mut self, values: &ColumnMap) {
        if let Some(id) = values.get("id").and_then(Value::as_i64) {
            self.id = Some(id);
        }
        if let Some(email) = values.get("email").and_then(Value::as_str) {
            self.email = email.to_string();
        }
        if let Some(balance) = values.get("balance").and_then(Value::as_f64) {
            self.balance = balance;
        }
    }

    fn related(&self, relation: &str) -> Option<EntityRef> {
        match relation {
            "profile" => self.profile.clone(),
            _ => None,
        }
    }
}

pub struct Profile {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub image: String,
}

impl Entity for Profile {
    fn role(&self) -> &'static str {
        "profile"
    }

    fn extract(&self) -> ColumnMap {
        let mut map = ColumnMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("user_id".into(), Value::from(self.user_id));
        map.insert("image".into(), Value::from(self.image.as_str()));
        map
    }

    fn hydrate(&mut self, values: &ColumnMap) {
        if let Some(id) = values.get("id").and_then(Value::as_i64) {
            self.id = Some(id);
        }
        if let Some(user_id) = values.get("user_id").and_then(Value::as_i64) {
            self.user_id = Some(user_id);
        }
        if let Some(image) = values.get("image").and_then(Value::as_str) {
            self.image = image.to_string();
        }
    }
}

pub struct AuditLog {
    pub id: Option<i64>,
    pub message: String,
}

impl Entity for AuditLog {
    fn role(&self) -> &'static str {
        "audit"
    }

    fn extract(&self) -> ColumnMap {
        let mut map = ColumnMap::new();
        map.insert("id".into(), Value::from(self.id));
        map.insert("message".into(), Value::from(self.message.as_str()));
        map
    }

    fn hydrate(&mut self, values: &ColumnMap) {
        if let Some(id) = values.get("id").and_then(Value::as_i64) {
            self.id = Some(id);
        }
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .define(
            EntitySchema::new(
                "user",
                "default",
                "user",
                "id",
                vec!["id".into(), "email".into(), "balance".into()],
            )
            .relation(RelationSchema::has_one("profile", "profile", "id", "user_id")),
        )
        .define(EntitySchema::new(
            "profile",
            "default",
            "profile",
            "id",
            vec!["id".into(), "user_id".into(), "image".into()],
        ))
        .define(EntitySchema::new(
            "audit",
            "archive",
            "audit",
            "id",
            vec!["id".into(), "message".into()],
        ))
}

pub fn session(driver: Rc<RecordingDriver>) -> Session {
    Session::single(schema(), driver)
}

pub fn dual_session(default: Rc<RecordingDriver>, archive: Rc<RecordingDriver>) -> Session {
    let mut drivers: HashMap<String, DriverRef> = HashMap::new();
    drivers.insert("default".to_string(), default);
    drivers.insert("archive".to_string(), archive);
    Session::new(schema(), drivers)
}

pub fn new_user(email: &str, balance: f64) -> Rc<RefCell<User>> {
    Rc::new(RefCell::new(User {
        id: None,
        email: email.to_string(),
        balance,
        profile: None,
    }))
}

pub fn new_profile(image: &str) -> Rc<RefCell<Profile>> {
    Rc::new(RefCell::new(Profile {
        id: None,
        user_id: None,
        image: image.to_string(),
    }))
}

pub fn new_audit(message: &str) -> Rc<RefCell<AuditLog>> {
    Rc::new(RefCell::new(AuditLog {
        id: None,
        message: message.to_string(),
    }))
}

/// Erase a concrete entity handle into the engine's shared handle type.
///
/// The clone shares the allocation, so identity tracking sees the same
/// entity no matter which handle is passed in.
pub fn handle<E: Entity + 'static>(entity: &Rc<RefCell<E>>) -> EntityRef {
    let cloned = Rc::clone(entity);
    cloned
}
