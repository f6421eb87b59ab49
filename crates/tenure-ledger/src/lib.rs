//! # tenure-ledger
//!
//! The account ledger of the Tenure subscription service.
//!
//! A ledger maps an external identity (a pubkey string, authenticated by
//! the caller) to an account record holding that identity's entitlement
//! transaction history. Expiry is recomputed from the history on every
//! read; no stored expiry is ever trusted. Merging new transactions is
//! idempotent under duplicate delivery, so payment-provider events can be
//! applied at-least-once.
//!
//! ## Modules
//!
//! - [`ledger`] — Account operations and the identity-token index
//! - [`refresh`] — Provider history refresh policy
//! - [`inflight`] — Per-key single-flight registry for upstream calls
//! - [`config`] — TOML-loadable ledger configuration
//! - [`time`] — Wall-clock helper

pub mod config;
pub mod inflight;
pub mod ledger;
pub mod refresh;
pub mod time;

pub use config::{ConfigError, LedgerConfig};
pub use inflight::{Flight, InflightRegistry};
pub use ledger::{AccountInfo, AccountStanding, Ledger};

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The identity has no account.
    #[error("account not found")]
    NotFound,

    /// A create was attempted for an identity that already has an account.
    #[error("account already exists")]
    AlreadyExists,

    /// The underlying store failed; nothing was written.
    #[error("store error: {0}")]
    Store(#[from] tenure_db::DbError),

    /// An account record could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
