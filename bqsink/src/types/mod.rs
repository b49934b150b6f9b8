mod cell;
mod event;

pub use cell::Cell;
pub use event::{EventLevel, EventRecord, Payload};
