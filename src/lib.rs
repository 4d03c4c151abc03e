#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! A workload generator and request dispatcher for benchmarking key-value stores, in the style of
//! YCSB's core workload.
//!
//! `kvgen` synthesizes reproducible, statistically-shaped streams of read, update, insert, scan
//! and read-modify-write operations and dispatches them concurrently to a pluggable store. The
//! same workload definition can be replayed against different stores so that they are compared
//! under identical load.
//!
//! The moving parts are:
//!
//! - [`mod@generator`]: integer generators implementing the distribution laws (uniform, Zipfian,
//! scrambled Zipfian, hotspot, sliding hotspot, exponential, latest, histogram, counter and
//! constant).
//! - [`mod@chooser`]: the weighted operation-mix chooser.
//! - [`mod@keyspace`]: the insertion frontier and the ordinal to key mapping.
//! - [`mod@fields`]: synthesized record payloads.
//! - [`mod@slider`]: the background task that moves a sliding hotspot over time.
//! - [`mod@workload`]: the orchestrator that ties all of the above into per-operation decisions.
//! - [`mod@bench`]: the multi-threaded runner of the load and run phases.
//!
//! Stores implement [`KVStore`] and [`KVStoreHandle`] and register themselves by name; see
//! [`mod@stores`]. The exported [`cmdline()`] can be reused by other crates so that their own
//! stores are benchmarked by the same binary.

use hashbrown::HashMap;
use std::fmt;

/// A record: field name to opaque payload. The order of fields is irrelevant.
pub type FieldMap = HashMap<String, Box<[u8]>>;

/// The outcome of a single store operation.
///
/// Anything other than [`Status::Ok`] is a failure that is counted, never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The operation succeeded.
    Ok,

    /// The key (or table) does not exist.
    NotFound,

    /// The store does not support the operation.
    NotImplemented,

    /// No transaction key could be resolved within the configured retry budget, so the operation
    /// was never dispatched.
    Unavailable,

    /// A store-specific failure code. The code should be non-zero.
    Error(i32),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    /// The numeric return code: 0 for success, non-zero otherwise.
    pub fn code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::NotFound => -1,
            Status::NotImplemented => -2,
            Status::Unavailable => -3,
            Status::Error(c) => *c,
        }
    }

    /// Combine two statuses of a composite operation, keeping the first failure.
    pub fn and(self, other: Status) -> Status {
        match self {
            Status::Ok => other,
            failed => failed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::NotFound => write!(f, "NOT_FOUND"),
            Status::NotImplemented => write!(f, "NOT_IMPLEMENTED"),
            Status::Unavailable => write!(f, "UNAVAILABLE"),
            Status::Error(c) => write!(f, "ERROR({})", c),
        }
    }
}

/// A thread-safe key-value store that can be benchmarked.
///
/// The store itself is never called directly. Each worker thread creates its own handle with
/// [`KVStore::handle`] and issues all of its operations through it.
pub trait KVStore: Send + Sync + 'static {
    /// Create a handle that is used by one thread. For most in-memory stores, this can just be
    /// done by cloning an `Arc`. Stores that open connections should report a failure here.
    fn handle(&self) -> Result<Box<dyn KVStoreHandle>>;

    /// The thread management used to spawn workers for this store.
    fn thread(&self) -> std::sync::Arc<dyn crate::thread::Thread> {
        std::sync::Arc::new(self::thread::DefaultThread)
    }
}

/// A per-thread handle that references a [`KVStore`].
///
/// The handle is the real object that exposes the record interface. A `None` field list means
/// "all fields".
pub trait KVStoreHandle {
    /// Insert a new record.
    fn insert(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status;

    /// Overwrite the given fields of an existing record.
    fn update(&mut self, table: &str, key: &str, fields: &FieldMap) -> Status;

    /// Read a record, or a subset of its fields.
    fn read(&mut self, table: &str, key: &str, fields: Option<&[String]>) -> Status;

    /// Read up to `count` records starting from the first key greater than or equal to `start`.
    fn scan(&mut self, table: &str, start: &str, count: usize, fields: Option<&[String]>)
        -> Status;

    /// Read up to `limit` records whose keys fall into `[start, end)`.
    fn range_scan(
        &mut self,
        _table: &str,
        _start: &str,
        _end: &str,
        _limit: usize,
        _fields: Option<&[String]>,
    ) -> Status {
        Status::NotImplemented
    }

    /// Remove a record.
    fn delete(&mut self, table: &str, key: &str) -> Status;
}

pub mod bench;
pub mod chooser;
mod cmdline;
mod error;
pub mod fields;
pub mod generator;
pub mod keyspace;
pub mod measurement;
pub mod slider;
pub mod stores;
pub mod thread;
pub mod workload;

pub use cmdline::cmdline;
pub use error::{Error, Result};

pub extern crate inventory;
pub extern crate toml;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        for s in [
            Status::NotFound,
            Status::NotImplemented,
            Status::Unavailable,
            Status::Error(7),
        ] {
            assert!(!s.is_ok());
            assert_ne!(s.code(), 0);
        }
    }

    #[test]
    fn status_and_keeps_first_failure() {
        assert_eq!(Status::Ok.and(Status::Ok), Status::Ok);
        assert_eq!(Status::Ok.and(Status::NotFound), Status::NotFound);
        assert_eq!(Status::Error(3).and(Status::NotFound), Status::Error(3));
    }
}
