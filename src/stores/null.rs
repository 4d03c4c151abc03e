//! A store that does nothing. It can be used to measure the overhead of the generator itself.
//!
//! ## Configuration Format
//!
//! ``` toml
//! [map]
//! name = "null"
//! ```
//!
//! Every operation succeeds, including reads of records that were never inserted.

use crate::stores::Registry;
use crate::*;
use std::sync::Arc;

#[derive(Clone)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }

    pub fn new_kvstore(_opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        Ok(Arc::new(Self::new()))
    }
}

impl KVStore for NullStore {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for NullStore {
    fn insert(&mut self, _table: &str, _key: &str, _fields: &FieldMap) -> Status {
        Status::Ok
    }

    fn update(&mut self, _table: &str, _key: &str, _fields: &FieldMap) -> Status {
        Status::Ok
    }

    fn read(&mut self, _table: &str, _key: &str, _fields: Option<&[String]>) -> Status {
        Status::Ok
    }

    fn scan(
        &mut self,
        _table: &str,
        _start: &str,
        _count: usize,
        _fields: Option<&[String]>,
    ) -> Status {
        Status::Ok
    }

    fn range_scan(
        &mut self,
        _table: &str,
        _start: &str,
        _end: &str,
        _limit: usize,
        _fields: Option<&[String]>,
    ) -> Status {
        Status::Ok
    }

    fn delete(&mut self, _table: &str, _key: &str) -> Status {
        Status::Ok
    }
}

inventory::submit! {
    Registry::new("null", NullStore::new_kvstore)
}
