//! # tenure-types
//!
//! Shared domain types for the Tenure subscription ledger: the entitlement
//! transaction model and the per-identity account record.

pub mod account;
pub mod transaction;

pub use account::Account;
pub use transaction::{Schedule, Transaction, TransactionKind};

/// Sequential account number, assigned once per identity.
pub type AccountNumber = u64;

/// Current account record schema version.
///
/// Version 1 records carry a flat `expiry` timestamp; version 2 records
/// carry a transaction history and compute expiry from it. Records without
/// a version field are treated as version 1.
pub const ACCOUNT_SCHEMA_VERSION: u32 = 2;

/// Transaction id used by the single synthesized `legacy` grant.
pub const LEGACY_TRANSACTION_ID: &str = "0";
