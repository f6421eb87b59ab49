//! SQL schema definitions.

/// Complete schema for the Tenure v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Account records, keyed by sequential account number.
-- The record column is the JSON-encoded account.
-- ============================================================

CREATE TABLE IF NOT EXISTS accounts (
    number INTEGER PRIMARY KEY,
    record TEXT NOT NULL
);

-- ============================================================
-- Identity indexes
-- ============================================================

CREATE TABLE IF NOT EXISTS account_index (
    identity TEXT PRIMARY KEY,
    number INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_account_index_number ON account_index(number);

CREATE TABLE IF NOT EXISTS identity_tokens (
    identity TEXT PRIMARY KEY,
    token TEXT NOT NULL
);

-- ============================================================
-- Named sequences (account numbering)
-- ============================================================

CREATE TABLE IF NOT EXISTS counters (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;
