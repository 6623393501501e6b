//! SQLite access for the CRS catalog: statement execution, custom scalar
//! functions, layout validation, auxiliary catalog attachment, object caches
//! and the insert-statement session.

pub mod attach;
pub mod cache;
pub mod config;
pub mod context;
pub mod exec;
pub mod functions;
pub mod insert;
pub mod layout;
pub mod param;
pub mod search_path;

/// Catalog schema, as shipped with the catalog builder.
pub const CATALOG_SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

pub use context::DatabaseContext;
pub use param::{Param, Row};
