use memtable::{SchemaError, TableId};
use rowfile::RowFileError;
use thiserror::Error;

/// Errors from segment writing, reading, iteration and merging.
///
/// Every failing operation surfaces exactly one of these kinds; nothing is
/// swallowed or retried internally.
#[derive(Debug, Error)]
pub enum SegmentError {
    /// A file service call failed, tagged with the operation and offset.
    #[error("{op} failed at offset {offset}: {source}")]
    Io {
        op: &'static str,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    /// Buffer allocation failed. The in-progress call is aborted; the
    /// caller may retry after freeing memory elsewhere.
    #[error("failed to reserve {bytes} bytes for a row buffer")]
    OutOfMemory { bytes: usize },

    /// A row arrived with a timestamp below the table's tracked end
    /// timestamp. This is a contract violation by the caller, not a
    /// retryable condition.
    #[error("table {table}: row at ts {got} after ts {have}; timestamps must not decrease")]
    OrderingViolation { table: TableId, have: i64, got: i64 },

    /// Operation on a writer or merger past its close call.
    #[error("already closed")]
    AlreadyClosed,

    /// The file failed structural validation.
    #[error("corrupt segment: {0}")]
    Corrupt(String),

    /// Schema resolution failed.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A row-file source failed under iteration.
    #[error(transparent)]
    RowFile(#[from] RowFileError),
}

impl SegmentError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        SegmentError::Corrupt(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SegmentError>;
