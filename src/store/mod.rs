//! Persistence layer — libSQL-backed sessions and contact log.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::{ContactLogRow, LibSqlBackend};
pub use traits::{LogSink, SessionStore};
