//! Database initialization and schema migrations

pub mod init;
pub mod migrations;

pub use init::*;
pub use migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};
