//! Database layer for nuget-assembly
//!
//! Handles SQLite persistence for the catalog crawl cursor.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`cursor`]: Named crawl cursors and the [`DatabaseCursor`] adapter

use sqlx::sqlite::SqlitePool;

mod cursor;
mod migrations;

pub use cursor::DatabaseCursor;

/// Database handle for nuget-assembly
pub struct Database {
    pool: SqlitePool,
}
