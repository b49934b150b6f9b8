mod identity;
mod lifecycle;
mod name;

pub use identity::TableIdentity;
pub use lifecycle::TableLifecycleManager;
pub use name::{Clock, TableNameExpander, TableNameExpansion};
