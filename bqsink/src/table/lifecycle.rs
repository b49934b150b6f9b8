use tracing::debug;

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::error::{ErrorKind, SinkResult};
use crate::schema::FieldSchema;
use crate::table::TableIdentity;
use crate::warehouse::Warehouse;

/// Makes sure the destination table exists before rows are sent.
///
/// Only active when auto creation is enabled. Existence is checked once per resolved table name,
/// [`TableLifecycleManager::invalidate`] must be called when the name changes.
#[derive(Debug)]
pub struct TableLifecycleManager {
    auto_create: bool,
    existence_known: bool,
}

impl TableLifecycleManager {
    pub fn new(auto_create: bool) -> Self {
        Self {
            auto_create,
            existence_known: false,
        }
    }

    pub fn existence_known(&self) -> bool {
        self.existence_known
    }

    /// Forgets the cached existence, the next [`Self::ensure_exists`] checks again.
    pub fn invalidate(&mut self) {
        self.existence_known = false;
    }

    /// Creates `table` from `schema` when it does not exist.
    ///
    /// Existence check failures are returned. Creation failures are reported through
    /// `diagnostics` and swallowed, the following insert fails on its own if the table is really
    /// missing.
    pub async fn ensure_exists<W, D>(
        &mut self,
        warehouse: &W,
        table: &TableIdentity,
        schema: &FieldSchema,
        diagnostics: &D,
    ) -> SinkResult<()>
    where
        W: Warehouse,
        D: Diagnostics + ?Sized,
    {
        if !self.auto_create || self.existence_known {
            return Ok(());
        }

        if warehouse.table_exists(table).await? {
            debug!(%table, "destination table exists");
        } else {
            match warehouse.create_table(table, schema).await {
                Ok(()) => diagnostics.emit(DiagnosticEvent::TableCreated {
                    table: table.to_string(),
                }),
                Err(err) if err.kind() == ErrorKind::DestinationTableAlreadyExists => {
                    debug!(%table, "destination table was created concurrently");
                }
                Err(err) => diagnostics.emit(DiagnosticEvent::TableCreateFailed {
                    table: table.to_string(),
                    message: err.to_string(),
                }),
            }
        }

        self.existence_known = true;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldMode, FieldType};
    use crate::test_utils::diagnostics::RecordingDiagnostics;
    use crate::test_utils::warehouse::{ScriptedWarehouse, WarehouseCall};

    fn schema() -> FieldSchema {
        FieldSchema::new(vec![FieldDescriptor::new(
            "msg",
            FieldType::String,
            FieldMode::Required,
        )])
        .unwrap()
    }

    fn table() -> TableIdentity {
        TableIdentity::new("project", "logs", "events")
    }

    #[tokio::test]
    async fn disabled_auto_create_never_touches_the_warehouse() {
        let warehouse = ScriptedWarehouse::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut manager = TableLifecycleManager::new(false);

        manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap();

        assert!(warehouse.calls().await.is_empty());
    }

    #[tokio::test]
    async fn creates_missing_table_once() {
        let warehouse = ScriptedWarehouse::new();
        warehouse.push_exists(Ok(false)).await;
        let diagnostics = RecordingDiagnostics::new();
        let mut manager = TableLifecycleManager::new(true);

        for _ in 0..2 {
            manager
                .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
                .await
                .unwrap();
        }

        assert_eq!(
            warehouse.calls().await,
            vec![
                WarehouseCall::TableExists(table()),
                WarehouseCall::CreateTable(table())
            ]
        );
        assert_eq!(
            diagnostics.events(),
            vec![DiagnosticEvent::TableCreated {
                table: "project.logs.events".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn invalidation_checks_again() {
        let warehouse = ScriptedWarehouse::new();
        let diagnostics = RecordingDiagnostics::new();
        let mut manager = TableLifecycleManager::new(true);

        manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap();
        manager.invalidate();
        assert!(!manager.existence_known());
        manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap();

        assert_eq!(warehouse.exists_calls().await, 2);
    }

    #[tokio::test]
    async fn conflicts_and_create_failures_are_swallowed() {
        let warehouse = ScriptedWarehouse::new();
        warehouse.push_exists(Ok(false)).await;
        warehouse.push_exists(Ok(false)).await;
        warehouse.push_create(Err(ErrorKind::DestinationTableAlreadyExists)).await;
        warehouse.push_create(Err(ErrorKind::DestinationQueryFailed)).await;
        let diagnostics = RecordingDiagnostics::new();
        let mut manager = TableLifecycleManager::new(true);

        manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap();
        assert!(diagnostics.events().is_empty());

        manager.invalidate();
        manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap();
        assert!(matches!(
            diagnostics.events().as_slice(),
            [DiagnosticEvent::TableCreateFailed { .. }]
        ));
        assert!(manager.existence_known());
    }

    #[tokio::test]
    async fn existence_check_failures_propagate() {
        let warehouse = ScriptedWarehouse::new();
        warehouse.push_exists(Err(ErrorKind::AuthenticationError)).await;
        let diagnostics = RecordingDiagnostics::new();
        let mut manager = TableLifecycleManager::new(true);

        let err = manager
            .ensure_exists(&warehouse, &table(), &schema(), &diagnostics)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
        assert!(!manager.existence_known());
    }
}
