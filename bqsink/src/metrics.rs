//! Metric names and descriptions of the sink.

use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};

static REGISTER: Once = Once::new();

/// Label for the resolved destination table.
pub const TABLE_NAME_LABEL: &str = "table_name";

/// Label for the insert outcome classification.
pub const OUTCOME_LABEL: &str = "outcome";

/// Counter for rows acknowledged by the warehouse.
pub const BQSINK_ROWS_INSERTED_TOTAL: &str = "bqsink_rows_inserted_total";

/// Counter for failed insert attempts.
pub const BQSINK_INSERT_FAULTS_TOTAL: &str = "bqsink_insert_faults_total";

/// Counter for batches given up on.
pub const BQSINK_BATCHES_DROPPED_TOTAL: &str = "bqsink_batches_dropped_total";

/// Counter for events rejected because the buffer was full.
pub const BQSINK_EVENTS_DROPPED_TOTAL: &str = "bqsink_events_dropped_total";

/// Counter for tables created on first use.
pub const BQSINK_TABLES_CREATED_TOTAL: &str = "bqsink_tables_created_total";

/// Histogram of the rows per insert request.
pub const BQSINK_BATCH_SIZE: &str = "bqsink_batch_size";

/// Registers sink metric descriptions. Safe to call multiple times.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        describe_counter!(
            BQSINK_ROWS_INSERTED_TOTAL,
            Unit::Count,
            "Total number of rows acknowledged by BigQuery"
        );
        describe_counter!(
            BQSINK_INSERT_FAULTS_TOTAL,
            Unit::Count,
            "Total number of failed insert attempts, labeled by outcome"
        );
        describe_counter!(
            BQSINK_BATCHES_DROPPED_TOTAL,
            Unit::Count,
            "Total number of batches dropped after exhausting retries or failing terminally"
        );
        describe_counter!(
            BQSINK_EVENTS_DROPPED_TOTAL,
            Unit::Count,
            "Total number of events rejected because the buffer was full"
        );
        describe_counter!(
            BQSINK_TABLES_CREATED_TOTAL,
            Unit::Count,
            "Total number of destination tables created by the sink"
        );
        describe_histogram!(
            BQSINK_BATCH_SIZE,
            Unit::Count,
            "Number of rows sent per insert request"
        );
    });
}
