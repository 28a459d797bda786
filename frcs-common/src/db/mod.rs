//! Database initialization and table layout

pub mod init;
pub mod schema_sync;
pub mod table_schemas;

pub use init::*;
pub use table_schemas::*;
