//! Adapter implementation of [`hashbrown::HashMap`]. Internally sharded by key.
//!
//! Keys are not ordered, so scans report [`Status::NotImplemented`].
//!
//! ## Configuration Format
//!
//! ### [`Mutex`]-based:
//!
//! ``` toml
//! [map]
//! name = "mutex_hashmap"
//! shards = ... # number of shards
//! ```
//!
//! ### [`RwLock`]-based:
//! ``` toml
//! [map]
//! name = "rwlock_hashmap"
//! shards = ... # number of shards
//! ```

use crate::stores::{merge, parse_opt, project, Registry};
use crate::*;
use ::hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHasher;
use serde::Deserialize;
use std::hash::Hasher;
use std::hint::black_box;
use std::sync::Arc;

/// Calculate the [`u64`] hash value of a given key using [`FxHasher`].
pub fn hash(key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(key.as_bytes());
    hasher.finish()
}

pub fn shard(key: &str, nr_shards: usize) -> usize {
    (hash(key) % nr_shards as u64) as usize
}

/// Table name to records, for the keys that fall into one shard.
///
/// It is used as the building block of other types. Note that this is not [`KVStore`].
#[derive(Default)]
pub struct BaseHashMap(HashMap<String, HashMap<String, FieldMap>>);

impl BaseHashMap {
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

    fn delete(&mut self, table: &str, key: &str) -> Status {
        match self.0.get_mut(table).and_then(|t| t.remove(key)) {
            Some(_) => Status::Ok,
            None => Status::NotFound,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct HashMapOpt {
    pub shards: usize,
}

impl HashMapOpt {
    fn parse(opt: &toml::Table) -> Result<Self> {
        let opt: Self = parse_opt(opt)?;
        if opt.shards == 0 {
            return Err(Error::Store("shards must be positive".to_string()));
        }
        Ok(opt)
    }
}

// {{{ mutex_hashmap

#[derive(Clone)]
pub struct MutexHashMap {
    nr_shards: usize,
    shards: Arc<Vec<Mutex<BaseHashMap>>>,
}

impl MutexHashMap {
    pub fn new(opt: &HashMapOpt) -> Self {
        let nr_shards = opt.shards.max(1);
        let shards = (0..nr_shards)
            .map(|_| Mutex::new(BaseHashMap::default()))
            .collect();
        let shards = Arc::new(shards);
        Self { nr_shards, shards }
    }

    pub fn new_kvstore(opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        let opt = HashMapOpt::parse(opt)?;
        Ok(Arc::new(Self::new(&opt)))
    }
}

impl KVStore for MutexHashMap {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for MutexHashMap {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].lock().insert(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].lock().update(table, key, fields)
    }

    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].lock().read(table, key, fields)
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
        let sid = shard(key, self.nr_shards);
        self.shards[sid].lock().delete(table, key)
    }
}

inventory::submit! {
    Registry::new("mutex_hashmap", MutexHashMap::new_kvstore)
}

// }}} mutex_hashmap

// {{{ rwlock_hashmap

#[derive(Clone)]
pub struct RwLockHashMap {
    pub nr_shards: usize,
    shards: Arc<Vec<RwLock<BaseHashMap>>>,
}

impl RwLockHashMap {
    pub fn new(opt: &HashMapOpt) -> Self {
        let nr_shards = opt.shards.max(1);
        let shards = (0..nr_shards)
            .map(|_| RwLock::new(BaseHashMap::default()))
            .collect();
        let shards = Arc::new(shards);
        Self { nr_shards, shards }
    }

    pub fn new_kvstore(opt: &toml::Table) -> Result<Arc<dyn KVStore>> {
        let opt = HashMapOpt::parse(opt)?;
        Ok(Arc::new(Self::new(&opt)))
    }
}

impl KVStore for RwLockHashMap {
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>> {
        Ok(Box::new(self.clone()))
    }
}

impl KVStoreHandle for RwLockHashMap {
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].write().insert(table, key, fields)
    }

    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].write().update(table, key, fields)
    }

    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status {
        let sid = shard(key, self.nr_shards);
        self.shards[sid].read().read(table, key, fields)
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
        let sid = shard(key, self.nr_shards);
        self.shards[sid].write().delete(table, key)
    }
}

inventory::submit! {
    Registry::new("rwlock_hashmap", RwLockHashMap::new_kvstore)
}

// }}} rwlock_hashmap
