use thiserror::Error;

/// Result type alias for taxonomy operations
pub type Result<T> = std::result::Result<T, TaxoError>;

/// Errors that abort a taxonomy pass or an export
#[derive(Error, Debug)]
pub enum TaxoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A node already hangs under `existing` and something tried to move it under `requested`.
    #[error("node {child} is linked to parent {existing}, refusing new parent {requested}")]
    ParentConflict {
        child: u64,
        existing: u64,
        requested: u64,
    },

    #[error("unknown node id: {0}")]
    UnknownNode(u64),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Reasons a single lineage could not be resolved to a leaf node.
///
/// These never abort a pass; the builder counts them as missed rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineageError {
    #[error("lineage has no tokens")]
    Empty,

    #[error("every level from position {0} to the top has an empty description")]
    EmptyChain(usize),

    /// Tabs would break the `\t|\t` separated dump records.
    #[error("level at position {0} contains a tab")]
    InvalidName(usize),
}
