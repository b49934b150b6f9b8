mod field;
mod loader;

pub use field::{FieldDescriptor, FieldMode, FieldType};
pub use loader::FieldSchema;
