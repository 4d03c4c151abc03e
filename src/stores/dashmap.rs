//! Adapter implementation of [`dashmap::DashMap`].
//!
//! ## Configuration Format
//!
//! ``` toml
//! [map]
//! name = "dashmap"
//! ```
//!
//! Scans report [`Status::NotImplemented`].

use crate::stores::{merge, project, Registry};
use crate::*;
use std::hint::black_box;
use std::sync::Arc;

type Records = dashmap::DashMap<String, FieldMap>;

/// Table name to records. Tables are created on their first insert.
#[derive(Clone)]
pub struct DashMap(Arc<dashmap::DashMap<String, Arc<Records>>>);

impl DashMap {
    pub fn new() -> Self {
        Self(Arc::new(dashmap::DashMap::new()))
    }

    pub fn new_kvstore(_opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        Ok(Arc::new(Self::new()))
    }

    fn table(&self, table: &str) -> Option<Arc<Records>> {
        self.0.get(table).map(|t| t.value().clone())
    }
}

impl KVStore for DashMap {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for DashMap {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let records = match self.table(table) {
            Some(records) => records,
            None => self.0.entry(table.to_string()).or_default().value().clone(),
        };
        records.insert(key.to_string(), fields.clone());
        Status::Ok
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let Some(records) = self.table(table) else {
            return Status::NotFound;
        };
        match records.get_mut(key) {
            Some(mut record) => {
                merge(record.value_mut(), fields);
                Status::Ok
            }
            None => Status::NotFound,
        }
    }

    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        let Some(records) = self.table(table) else {
            return Status::NotFound;
        };
        match records.get(key) {
            Some(record) => {
                black_box(project(record.value(), fields));
                Status::Ok
            }
            None => Status::NotFound,
        }
    }

    fn scan(
        &mut self,
        _table: &str,
        _start: &str,
        _count: usize,
        _fields: Option<&[String]>,
    ) -> Status {
        Status::NotImplemented
    }

    fn delete(&mut self, table: &str, key: &str) -> Status {
        let Some(records) = self.table(table) else {
            return Status::NotFound;
        };
        match records.remove(key) {
            Some(_) => Status::Ok,
            None => Status::NotFound,
        }
    }
}

inventory::submit! {
    Registry::new("dashmap", DashMap::new_kvstore)
}
