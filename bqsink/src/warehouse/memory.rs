use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::mapping::TableRow;
use crate::schema::FieldSchema;
use crate::table::TableIdentity;
use crate::warehouse::{InsertOutcome, Warehouse};

#[derive(Debug)]
struct MemoryTable {
    schema: Option<FieldSchema>,
    rows: Vec<TableRow>,
}

#[derive(Debug)]
struct Inner {
    tables: HashMap<TableIdentity, MemoryTable>,
    create_on_insert: bool,
}

/// In-memory warehouse for dry runs and tests.
///
/// Rows are kept until the process exits. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct MemoryWarehouse {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryWarehouse {
    /// Creates an empty warehouse rejecting inserts into tables that were never created.
    pub fn new() -> Self {
        Self::with_create_on_insert(false)
    }

    /// Creates an empty warehouse that creates unknown tables on insert, like a dataset that
    /// already holds every table.
    pub fn permissive() -> Self {
        Self::with_create_on_insert(true)
    }

    fn with_create_on_insert(create_on_insert: bool) -> Self {
        let inner = Inner {
            tables: HashMap::new(),
            create_on_insert,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the identities of all stored tables.
    pub async fn tables(&self) -> Vec<TableIdentity> {
        let inner = self.inner.lock().await;
        inner.tables.keys().cloned().collect()
    }

    /// Returns a copy of the rows stored in `table`.
    pub async fn rows(&self, table: &TableIdentity) -> Vec<TableRow> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// Returns the schema `table` was created with.
    pub async fn schema(&self, table: &TableIdentity) -> Option<FieldSchema> {
        let inner = self.inner.lock().await;
        inner.tables.get(table).and_then(|table| table.schema.clone())
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Warehouse for MemoryWarehouse {
    fn name() -> &'static str {
        "memory"
    }

    async fn table_exists(&self, table: &TableIdentity) -> SinkResult<bool> {
        let inner = self.inner.lock().await;
        Ok(inner.tables.contains_key(table))
    }

    async fn create_table(&self, table: &TableIdentity, schema: &FieldSchema) -> SinkResult<()> {
        let mut inner = self.inner.lock().await;

        if inner.tables.contains_key(table) {
            bail!(
                ErrorKind::DestinationTableAlreadyExists,
                "Table already exists",
                table.to_string()
            );
        }

        info!(%table, fields = schema.len(), "creating table in memory");
        inner.tables.insert(
            table.clone(),
            MemoryTable {
                schema: Some(schema.clone()),
                rows: Vec::new(),
            },
        );

        Ok(())
    }

    async fn insert_rows(&self, table: &TableIdentity, rows: &[TableRow]) -> InsertOutcome {
        let mut inner = self.inner.lock().await;
        if !inner.create_on_insert && !inner.tables.contains_key(table) {
            return InsertOutcome::Fatal(format!("Not found: Table {table}"));
        }

        let stored = inner
            .tables
            .entry(table.clone())
            .or_insert_with(|| MemoryTable {
                schema: None,
                rows: Vec::new(),
            });

        info!(%table, rows = rows.len(), "writing a batch of rows");
        for row in rows {
            info!("  {}", row.to_json());
        }
        stored.rows.extend_from_slice(rows);

        InsertOutcome::Success
    }
}
