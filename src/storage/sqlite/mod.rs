//! `SQLite` implementation of the store traits.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition and per-connection pragmas
//! - [`rows`]: column lists and row-to-model conversion
//! - [`metrics`]: storage operation metrics
//! - `students` / `communications`: [`StudentStore`](crate::storage::StudentStore)
//!   and [`CommunicationStore`](crate::storage::CommunicationStore) for
//!   [`UnitOfWork`](crate::storage::UnitOfWork)

mod communications;
mod connection;
mod metrics;
mod rows;
mod students;

pub use connection::{DEFAULT_BUSY_TIMEOUT, acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use rows::{
    LOG_COLUMNS, LogRow, STUDENT_COLUMNS, StudentRow, encode_tags, from_micros, to_micros,
};

/// Maps a rusqlite error to [`crate::Error::OperationFailed`].
pub(crate) fn query_error(operation: &str, e: &rusqlite::Error) -> crate::Error {
    crate::Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}
