//! The storage trait the ledger is written against.

use tenure_types::AccountNumber;

use crate::Result;

/// Key-value access to the ledger's three logical tables.
///
/// Implementations must be safe to share across request handlers; each
/// method is an independent atomic operation. Scan methods return rows in
/// ascending key order.
pub trait LedgerStore: Send + Sync {
    /// Fetch an account record (opaque JSON text) by number.
    fn get_account(&self, number: AccountNumber) -> Result<Option<String>>;

    /// Write an account record under its number.
    fn put_account(&self, number: AccountNumber, record: &str) -> Result<()>;

    /// Delete an account record. Deleting an absent record is not an error.
    fn delete_account(&self, number: AccountNumber) -> Result<()>;

    /// All account records, ascending by number.
    fn scan_accounts(&self) -> Result<Vec<(AccountNumber, String)>>;

    /// Look up the account number assigned to an identity.
    fn get_account_number(&self, identity: &str) -> Result<Option<AccountNumber>>;

    /// Record the identity → number assignment.
    fn put_account_number(&self, identity: &str, number: AccountNumber) -> Result<()>;

    /// Remove an identity's number assignment.
    fn delete_account_number(&self, identity: &str) -> Result<()>;

    /// The whole identity → number index, ascending by identity.
    fn scan_account_numbers(&self) -> Result<Vec<(String, AccountNumber)>>;

    /// Fetch the correlation token stored for an identity.
    fn get_identity_token(&self, identity: &str) -> Result<Option<String>>;

    /// Store an identity's correlation token.
    fn put_identity_token(&self, identity: &str, token: &str) -> Result<()>;

    /// Remove an identity's correlation token.
    fn delete_identity_token(&self, identity: &str) -> Result<()>;

    /// The whole identity → token index, ascending by identity.
    fn scan_identity_tokens(&self) -> Result<Vec<(String, String)>>;

    /// Allocate the next sequential account number.
    ///
    /// Allocation is atomically sequenced: two concurrent callers can
    /// never observe the same number. The sequence is seeded from the
    /// highest existing account number on first use, so numbering stays
    /// monotonic after the store is restored from a snapshot.
    fn allocate_account_number(&self) -> Result<AccountNumber>;
}
