//! # tenure-db
//!
//! Storage layer for the Tenure subscription ledger.
//!
//! The ledger reads and writes through the [`LedgerStore`] trait, which
//! exposes three logical tables — account records keyed by sequential
//! account number, the identity → number index, and the identity → token
//! index — plus atomic account-number allocation. Account records are
//! opaque JSON text at this layer; decoding them is the ledger's job.
//!
//! ## Modules
//!
//! - [`store`] — The [`LedgerStore`] trait
//! - [`memory`] — In-memory store for tests and ephemeral use
//! - [`sqlite`] — SQLite-backed store
//! - [`schema`] — SQL schema definitions
//! - [`migrations`] — Forward-only schema migrations

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::LedgerStore;

/// Current database schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Storage error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
