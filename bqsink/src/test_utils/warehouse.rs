use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SinkResult};
use crate::mapping::TableRow;
use crate::schema::FieldSchema;
use crate::sink_error;
use crate::table::TableIdentity;
use crate::warehouse::{InsertOutcome, RowErrorDetail, RowInsertError, Warehouse};

/// A call received by a [`ScriptedWarehouse`].
#[derive(Debug, Clone, PartialEq)]
pub enum WarehouseCall {
    TableExists(TableIdentity),
    CreateTable(TableIdentity),
    InsertRows {
        table: TableIdentity,
        rows: Vec<TableRow>,
    },
    Close,
}

#[derive(Debug, Default)]
struct Inner {
    exists: VecDeque<Result<bool, ErrorKind>>,
    creates: VecDeque<Result<(), ErrorKind>>,
    inserts: VecDeque<InsertOutcome>,
    insert_delay: Option<Duration>,
    calls: Vec<WarehouseCall>,
    accepted: Vec<TableRow>,
}

/// [`Warehouse`] answering with queued responses and recording every call.
///
/// Once a queue is empty the warehouse answers as if everything worked: tables exist, creations
/// succeed and inserts are accepted. Clones share the same script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_exists(&self, response: Result<bool, ErrorKind>) {
        self.inner.lock().await.exists.push_back(response);
    }

    pub async fn push_create(&self, response: Result<(), ErrorKind>) {
        self.inner.lock().await.creates.push_back(response);
    }

    pub async fn push_insert(&self, outcome: InsertOutcome) {
        self.inner.lock().await.inserts.push_back(outcome);
    }

    /// Makes every insert take `delay` before answering.
    pub async fn set_insert_delay(&self, delay: Duration) {
        self.inner.lock().await.insert_delay = Some(delay);
    }

    pub async fn calls(&self) -> Vec<WarehouseCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn exists_calls(&self) -> usize {
        self.count(|call| matches!(call, WarehouseCall::TableExists(_)))
            .await
    }

    pub async fn insert_calls(&self) -> usize {
        self.count(|call| matches!(call, WarehouseCall::InsertRows { .. }))
            .await
    }

    pub async fn close_calls(&self) -> usize {
        self.count(|call| matches!(call, WarehouseCall::Close)).await
    }

    /// Returns the rows of every insert answered with success, in order.
    pub async fn accepted_rows(&self) -> Vec<TableRow> {
        self.inner.lock().await.accepted.clone()
    }

    async fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&WarehouseCall) -> bool,
    {
        let inner = self.inner.lock().await;
        inner.calls.iter().filter(|call| predicate(call)).count()
    }
}

impl Warehouse for ScriptedWarehouse {
    fn name() -> &'static str {
        "scripted"
    }

    async fn table_exists(&self, table: &TableIdentity) -> SinkResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(WarehouseCall::TableExists(table.clone()));

        match inner.exists.pop_front().unwrap_or(Ok(true)) {
            Ok(exists) => Ok(exists),
            Err(kind) => Err(sink_error!(kind, "Scripted existence check failure")),
        }
    }

    async fn create_table(&self, table: &TableIdentity, _schema: &FieldSchema) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;
        inner.calls.push(WarehouseCall::CreateTable(table.clone()));

        match inner.creates.pop_front().unwrap_or(Ok(())) {
            Ok(()) => Ok(()),
            Err(kind) => Err(sink_error!(kind, "Scripted table creation failure")),
        }
    }

    async fn insert_rows(&self, table: &TableIdentity, rows: &[TableRow]) -> InsertOutcome {
        let delay = {
            let mut inner = self.inner.lock().await;
            inner.calls.push(WarehouseCall::InsertRows {
                table: table.clone(),
                rows: rows.to_vec(),
            });
            inner.insert_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        let outcome = inner.inserts.pop_front().unwrap_or(InsertOutcome::Success);
        if outcome == InsertOutcome::Success {
            inner.accepted.extend_from_slice(rows);
        }

        outcome
    }

    async fn close(&self) -> SinkResult<()> {
        self.inner.lock().await.calls.push(WarehouseCall::Close);

        Ok(())
    }
}

/// Builds a response rejecting the row at `index` with `reason`.
pub fn row_errors(index: usize, reason: &str) -> InsertOutcome {
    InsertOutcome::PartialRowErrors(vec![RowInsertError {
        index,
        errors: vec![RowErrorDetail {
            reason: Some(reason.to_string()),
            location: Some("msg".to_string()),
            message: Some(format!("row {index} rejected")),
            debug_info: None,
        }],
    }])
}
