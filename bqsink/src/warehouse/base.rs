use std::future::Future;

use crate::error::SinkResult;
use crate::mapping::TableRow;
use crate::schema::FieldSchema;
use crate::table::TableIdentity;

/// One error reported by the warehouse for a rejected row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowErrorDetail {
    pub reason: Option<String>,
    pub location: Option<String>,
    pub message: Option<String>,
    pub debug_info: Option<String>,
}

/// Errors reported for the row at `index` of an insert request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowInsertError {
    pub index: usize,
    pub errors: Vec<RowErrorDetail>,
}

/// Classified result of an insert request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Every row was accepted.
    Success,
    /// The request was accepted but rows were rejected. BigQuery inserts none of the rows of a
    /// request with row errors, rejecting the valid ones with reason `stopped`.
    PartialRowErrors(Vec<RowInsertError>),
    /// The credentials were refused.
    Unauthorized(String),
    /// The request did not reach the warehouse or got no usable answer.
    Transient(String),
    /// The warehouse answered with an error.
    Fatal(String),
}

/// Remote table store the sink streams rows into.
///
/// Implementations are owned by a single sink and used from its coordinator task only.
pub trait Warehouse {
    /// Returns the name of the warehouse.
    fn name() -> &'static str;

    /// Returns whether `table` exists.
    ///
    /// A missing table is `Ok(false)`, any other failure is an error.
    fn table_exists(&self, table: &TableIdentity) -> impl Future<Output = SinkResult<bool>> + Send;

    /// Creates `table` with `schema`.
    ///
    /// Fails with [`crate::error::ErrorKind::DestinationTableAlreadyExists`] when the table was
    /// created concurrently.
    fn create_table(
        &self,
        table: &TableIdentity,
        schema: &FieldSchema,
    ) -> impl Future<Output = SinkResult<()>> + Send;

    /// Streams `rows` into `table`.
    fn insert_rows(
        &self,
        table: &TableIdentity,
        rows: &[TableRow],
    ) -> impl Future<Output = InsertOutcome> + Send;

    /// Releases the client. The default implementation is a no-op.
    fn close(&self) -> impl Future<Output = SinkResult<()>> + Send {
        async { Ok(()) }
    }
}
