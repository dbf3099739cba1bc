//! Database abstraction layer
//!
//! The [`Database`] trait is the minimal transport contract the rest of the
//! crate is written against: connect, run a statement with bound values,
//! explicit transaction boundaries, close. [`postgres::PostgresProvider`]
//! implements it over tokio-postgres; tests plug in a recording double.

pub mod coerce;
pub mod postgres;
pub mod schema;
pub mod session;
pub mod types;


use crate::config::{ConnectionProfile, Settings};
use crate::error::DbResult;

// Re-export main types
pub use coerce::{BoundValue, coerce_inputs};
pub use schema::{ColumnInfo, TableDescriptor};
pub use session::{ExecOutcome, Session};
pub use types::{CellValue, ColumnDef, DataType, QueryResults, Row, RowSnapshot, Snapshot};

/// Transport contract for one exclusively owned connection
#[allow(async_fn_in_trait)]
pub trait Database: Sized {
    /// Establish a connection
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` on authentication or network failure
    async fn connect(profile: &ConnectionProfile, settings: &Settings) -> DbResult<Self>;

    /// Run a statement with bound values and return its rows
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` carrying the backend's message
    async fn query(&mut self, sql: &str, params: &[BoundValue]) -> DbResult<QueryResults>;

    /// Run parameterless text and return every value in the server's own
    /// text representation.
    ///
    /// The text may hold several statements; the rows of the last one that
    /// returned a result set are kept.
    async fn query_text(&mut self, sql: &str) -> DbResult<QueryResults>;

    /// Run parameterless text, possibly several statements, and return the
    /// total affected-row count
    async fn execute_text(&mut self, sql: &str) -> DbResult<u64>;

    /// Run a statement with bound values and return the affected-row count
    async fn execute(&mut self, sql: &str, params: &[BoundValue]) -> DbResult<u64>;

    /// Open a transaction block
    async fn begin(&mut self) -> DbResult<()>;

    /// Commit the open transaction block
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back the open transaction block
    async fn rollback(&mut self) -> DbResult<()>;

    /// Close the connection
    async fn close(self) -> DbResult<()>;
}
