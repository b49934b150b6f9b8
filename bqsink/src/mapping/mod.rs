mod builtin;
mod mapper;
mod resolver;

pub use builtin::BuiltinAttribute;
pub use mapper::{InsertIdStrategy, RowMapper, TableRow, UUID_INSERT_ID_SENTINEL};
pub use resolver::FieldAccessor;
