//! Adapters for built-in and external key-value stores.
//!
//! ## Built-in Stores
//!
//! The usage of built-in stores can be found in the module-level documentations. Please note that
//! it may be necessary to enable specific features of the crate to enable a certain built-in
//! store.
//!
//! ## Registering New Stores
//!
//! When users would like to dynamically register new key-value stores from their own crate, first
//! of all, they need to implement [`KVStore`] and [`KVStoreHandle`] for the store. Then, they need
//! to create a constructor function with a signature of
//! `fn(&toml::Table) -> kvgen::Result<Arc<dyn KVStore>>`. The table holds every option of the
//! `[map]` section except `name`.
//!
//! The final step is to register the store's constructor (along with its name) using
//! [`inventory`]. A minimal example would be: `inventory::submit! { Registry::new("name",
//! constructor_fn) };`.
//!
//! The source code of all built-in stores provide good examples on this process.

use crate::*;
use hashbrown::HashMap;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use toml::Table;

/// The constructor of a registered store.
pub type Constructor = fn(&Table) -> Result<Arc<dyn KVStore>>;

/// The centralized registry that maps the name of newly added key-value store to its constructor
/// function.
///
/// A user-defined store can use the [`inventory::submit!`] macro to register their own stores to
/// be used in the benchmark framework.
pub struct Registry<'a> {
    pub(crate) name: &'a str,
    constructor: Constructor,
}

impl<'a> Registry<'a> {
    pub const fn new(name: &'a str, constructor: Constructor) -> Self {
        Self { name, constructor }
    }
}

inventory::collect!(Registry<'static>);

/// The `[map]` section: the name of a registered store plus its own options.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct KVStoreOpt {
    pub(crate) name: String,
    #[serde(flatten)]
    pub(crate) opt: Table,
}

/// Names of all registered stores, sorted.
pub fn registered() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<Registry>
        .into_iter()
        .map(|r| r.name)
        .collect();
    names.sort_unstable();
    names
}

pub(crate) fn new_store(opt: &KVStoreOpt) -> Result<Arc<dyn KVStore>> {
    // construct the hashmap.. this will be done every time
    let mut registered: HashMap<&'static str, Constructor> = HashMap::new();
    for r in inventory::iter::<Registry> {
        debug!("Adding supported store: {}", r.name);
        assert!(
            registered.insert(r.name, r.constructor).is_none(),
            "store {} registered twice",
            r.name
        );
    }
    let f = registered
        .get(opt.name.as_str())
        .ok_or_else(|| Error::UnknownStore(opt.name.clone()))?;
    f(&opt.opt)
}

/// Parse store-specific options out of the `[map]` table.
pub fn parse_opt<T: serde::de::DeserializeOwned>(opt: &Table) -> Result<T> {
    opt.clone()
        .try_into()
        .map_err(|e: toml::de::Error| Error::Store(e.to_string()))
}

/// Copy out the requested fields of a record, or all of them.
pub fn project(record: &FieldMap, fields: Option<&[String]>) -> FieldMap {
    match fields {
        None => record.clone(),
        Some(names) => names
            .iter()
            .filter_map(|n| record.get(n).map(|v| (n.clone(), v.clone())))
            .collect(),
    }
}

/// Overwrite the given fields of a record, keeping the others.
pub fn merge(record: &mut FieldMap, fields: &FieldMap) {
    for (name, value) in fields.iter() {
        record.insert(name.clone(), value.clone());
    }
}

pub mod btreemap;
#[cfg(feature = "dashmap")]
pub mod dashmap;
pub mod hashmap;
pub mod null;
