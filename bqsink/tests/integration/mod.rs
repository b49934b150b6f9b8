mod buffering_test;
mod common;
mod end_to_end_test;
mod retry_test;
mod table_lifecycle_test;
