//! Coordination primitives of the sink's background task.

pub mod coordinator;
pub mod shutdown;
