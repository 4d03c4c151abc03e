//! The error type shared by the whole crate.
//!
//! Only configuration and resource problems are errors. A store that fails a single operation
//! reports it through a [`Status`](crate::Status) instead, which is counted by the measurement
//! layer and never aborts a run.

use std::path::PathBuf;

/// Errors raised while setting up or tearing down a benchmark.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A distribution name that is not supported in the given position.
    #[error("unknown {what} distribution \"{name}\"")]
    UnknownDistribution { what: &'static str, name: String },

    /// A generator was asked to cover an empty range.
    #[error("empty range: lower bound {lo} is greater than upper bound {hi}")]
    EmptyRange { lo: u64, hi: u64 },

    /// An option has a value outside of its domain.
    #[error("invalid value for {name}: {detail}")]
    InvalidOption { name: &'static str, detail: String },

    /// All operation proportions are zero, so nothing can ever be chosen.
    #[error("operation proportions sum to zero")]
    ZeroProportions,

    /// Occupancy sizing produced no records.
    #[error("object count is zero, perhaps disksize {disk_size} is too low")]
    ZeroObjectCount { disk_size: u64 },

    /// The histogram file could not be opened or read.
    #[error("failed to read histogram file {path:?}: {source}")]
    HistogramFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The histogram file was read but its content is unusable.
    #[error("malformed histogram {path:?}: {detail}")]
    MalformedHistogram { path: PathBuf, detail: String },

    /// The sliding hotspot task was started twice.
    #[error("sliding hotspot task is already started")]
    AlreadyStarted,

    /// No store with the given name was registered.
    #[error("store \"{0}\" not found in registry")]
    UnknownStore(String),

    /// A store could not create a handle, or rejected its options.
    #[error("store error: {0}")]
    Store(String),

    /// The configuration document could not be parsed or extracted.
    #[error("config error: {0}")]
    Config(#[from] Box<figment::Error>),

    /// Wrapper around [`std::io::Error`].
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

/// Shorthand for results carrying [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
