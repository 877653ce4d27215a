//! Core persistence logic for ClientDB.
//! This crate owns the client/phone schema and every query that touches it.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;

pub use db::{ensure_schema, open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::client::{
    Client, ClientField, ClientId, ClientUpdate, ClientValidationError, NewClient, Phone, PhoneId,
};
pub use repo::client_repo::{
    ClientRepository, ConstraintKind, RepoError, RepoResult, SqliteClientRepository,
};
pub use search::filter::{ClientFilter, ClientRow};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
