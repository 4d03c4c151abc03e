//! Adapter implementation of [`std::collections::BTreeMap`]. Keys are kept in order, so both scan
//! flavors are supported.
//!
//! ## Configuration Format
//!
//! ### [`Mutex`]-based:
//!
//! ``` toml
//! [map]
//! name = "mutex_btreemap"
//! ```
//!
//! ### [`RwLock`]-based:
//! ``` toml
//! [map]
//! name = "rwlock_btreemap"
//! ```

use crate::stores::{merge, project, Registry};
use crate::*;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::hint::black_box;
use std::ops::Bound;
use std::sync::Arc;

/// Table name to its ordered records.
#[derive(Default)]
pub struct Tables(HashMap<String, BTreeMap<String, FieldMap>>);

impl Tables {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        self.0
            .entry_ref(table)
            .or_default()
            .insert(key.to_string(), fields.clone());
        Status::Ok
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        match self.0.get_mut(table).and_then(|t| t.get_mut(key)) {
            Some(record) => {
                merge(record, fields);
                Status::Ok
            }
            None => Status::NotFound,
        }
    }

    fn read(&self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        match self.0.get(table).and_then(|t| t.get(key)) {
            Some(record) => {
                black_box(project(record, fields));
                Status::Ok
            }
            None => Status::NotFound,
        }
    }

    fn scan(&self, table: &str, start: &str, count: usize, fields: Option<&[String]>) -> Status {
        let Some(records) = self.0.get(table) else {
            return Status::Ok;
        };
        let range = (Bound::Included(start), Bound::Unbounded);
        for (_, record) in records.range::<str, _>(range).take(count) {
            black_box(project(record, fields));
        }
        Status::Ok
    }

    fn range_scan(
        &self,
        table: &str,
        start: &str,
        end: &str,
        limit: usize,
        fields: Option<&[String]>,
    ) -> Status {
        // hashed keys are not ordered like their ordinals, so the bounds may come reversed
        if start > end {
            return Status::Ok;
        }
        let Some(records) = self.0.get(table) else {
            return Status::Ok;
        };
        let range = (Bound::Included(start), Bound::Excluded(end));
        for (_, record) in records.range::<str, _>(range).take(limit) {
            black_box(project(record, fields));
        }
        Status::Ok
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        match self.0.get_mut(table).and_then(|t| t.remove(key)) {
            Some(_) => Status::Ok,
            None => Status::NotFound,
        }
    }

    fn len(&self, table: &str) -> usize {
        self.0.get(table).map_or(0, |t| t.len())
    }
}

// {{{ mutex_btreemap

#[derive(Clone)]
pub struct MutexBTreeMap(Arc<Mutex<Tables>>);

impl MutexBTreeMap {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Tables::default())))
    }

    pub fn new_kvstore(_opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        Ok(Arc::new(Self::new()))
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.0.lock().len(table)
    }
}

impl KVStore for MutexBTreeMap {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for MutexBTreeMap {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        self.0.lock().insert(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        self.0.lock().update(table, key, fields)
    }

    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        self.0.lock().read(table, key, fields)
    }

    fn scan(
        &mut self,
        table: &str,
        start: &str,
        count: usize,
        fields: Option<&[String]>,
    ) -> Status {
        self.0.lock().scan(table, start, count, fields)
    }

    fn range_scan(
        &mut self,
        table: &str,
        start: &str,
        end: &str,
        limit: usize,
        fields: Option<&[String]>,
    ) -> Status {
        self.0.lock().range_scan(table, start, end, limit, fields)
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        self.0.lock().delete(table, key)
    }
}

inventory::submit! {
    Registry::new("mutex_btreemap", MutexBTreeMap::new_kvstore)
}

// }}} mutex_btreemap

// {{{ rwlock_btreemap

#[derive(Clone)]
pub struct RwLockBTreeMap(Arc<RwLock<Tables>>);

impl RwLockBTreeMap {
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(Tables::default())))
    }

    pub fn new_kvstore(_opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        Ok(Arc::new(Self::new()))
    }

    /// Number of records in a table.
    pub fn len(&self, table: &str) -> usize {
        self.0.read().len(table)
    }
}

impl KVStore for RwLockBTreeMap {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for RwLockBTreeMap {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        self.0.write().insert(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        self.0.write().update(table, key, fields)
    }

    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        self.0.read().read(table, key, fields)
    }

    fn scan(
        &mut self,
        table: &str,
        start: &str,
        count: usize,
        fields: Option<&[String]>,
    ) -> Status {
        self.0.read().scan(table, start, count, fields)
    }

    fn range_scan(
        &mut self,
        table: &str,
        start: &str,
        end: &str,
        limit: usize,
        fields: Option<&[String]>,
    ) -> Status {
        self.0.read().range_scan(table, start, end, limit, fields)
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        self.0.write().delete(table, key)
    }
}

inventory::submit! {
    Registry::new("rwlock_btreemap", RwLockBTreeMap::new_kvstore)
}

// }}} rwlock_btreemap
