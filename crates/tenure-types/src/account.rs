//! Per-identity account record.

use serde::{Deserialize, Serialize};

use crate::{Transaction, TransactionKind, ACCOUNT_SCHEMA_VERSION, LEGACY_TRANSACTION_ID};

/// One identity's ledger state, as persisted in the account table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// External identity this account belongs to.
    pub pubkey: String,
    /// Unix seconds when the account was created.
    #[serde(default)]
    pub created_at: u64,
    /// True if the account was created by the identity itself, false if it
    /// might have been created on its behalf (e.g. by a payment event).
    #[serde(default)]
    pub created_by_user: bool,
    /// Pre-history flat expiry. Superseded by the transaction history and
    /// cleared on the first write once any transaction exists.
    #[serde(default)]
    pub expiry: Option<u64>,
    /// Every entitlement grant ever merged into this account.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Unix seconds of the last provider history refresh, if any.
    #[serde(default)]
    pub last_history_refresh: Option<u64>,
    /// Record schema version; absent in records written before versioning.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    1
}

impl Account {
    /// Upgrade a stored record to the current schema version.
    ///
    /// Version 1 records express entitlement as a flat `expiry` timestamp.
    /// The upgrade synthesizes a single `legacy` grant ending at that
    /// timestamp and prepends it to the transaction list, after which
    /// expiry is always computed from the history. A stored expiry of zero
    /// carries no entitlement and synthesizes nothing. Already-current
    /// records pass through untouched.
    pub fn upgraded(mut self) -> Self {
        if self.schema_version >= ACCOUNT_SCHEMA_VERSION {
            return self;
        }
        if let Some(expiry) = self.expiry.filter(|e| *e > 0) {
            let already_migrated = self.transactions.iter().any(|tx| {
                tx.kind == TransactionKind::Legacy && tx.id == LEGACY_TRANSACTION_ID
            });
            if !already_migrated {
                self.transactions.insert(0, Transaction::legacy(expiry));
            }
        }
        self.schema_version = ACCOUNT_SCHEMA_VERSION;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_record(expiry: Option<u64>) -> Account {
        Account {
            pubkey: "abc".to_string(),
            created_at: 1_700_000_000,
            created_by_user: true,
            expiry,
            transactions: Vec::new(),
            last_history_refresh: None,
            schema_version: 1,
        }
    }

    #[test]
    fn test_upgrade_synthesizes_legacy_grant() {
        let account = v1_record(Some(1_800_000_000)).upgraded();
        assert_eq!(account.schema_version, ACCOUNT_SCHEMA_VERSION);
        assert_eq!(account.transactions.len(), 1);

        let legacy = &account.transactions[0];
        assert_eq!(legacy.kind, TransactionKind::Legacy);
        assert_eq!(legacy.id, LEGACY_TRANSACTION_ID);
        assert_eq!(legacy.start_date, Some(0));
        assert_eq!(legacy.end_date, Some(1_800_000_000));
        // The flat field is retained until the next write clears it.
        assert_eq!(account.expiry, Some(1_800_000_000));
    }

    #[test]
    fn test_upgrade_prepends_before_existing_history() {
        let mut account = v1_record(Some(1_800_000_000));
        account
            .transactions
            .push(Transaction::fixed_purchase("1", 100, 200));
        let account = account.upgraded();
        assert_eq!(account.transactions.len(), 2);
        assert_eq!(account.transactions[0].kind, TransactionKind::Legacy);
        assert_eq!(account.transactions[1].id, "1");
    }

    #[test]
    fn test_upgrade_without_expiry() {
        let account = v1_record(None).upgraded();
        assert_eq!(account.schema_version, ACCOUNT_SCHEMA_VERSION);
        assert!(account.transactions.is_empty());
    }

    #[test]
    fn test_upgrade_skips_zero_expiry() {
        let account = v1_record(Some(0)).upgraded();
        assert!(account.transactions.is_empty());
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let once = v1_record(Some(1_800_000_000)).upgraded();
        let twice = once.clone().upgraded();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upgrade_does_not_duplicate_migrated_grant() {
        // A v1 record that somehow already carries its migrated grant.
        let mut account = v1_record(Some(1_800_000_000));
        account.transactions.push(Transaction::legacy(1_800_000_000));
        let account = account.upgraded();
        assert_eq!(account.transactions.len(), 1);
    }

    #[test]
    fn test_current_record_passes_through() {
        let mut account = v1_record(Some(1_800_000_000));
        account.schema_version = ACCOUNT_SCHEMA_VERSION;
        let upgraded = account.clone().upgraded();
        assert_eq!(upgraded, account);
        assert!(upgraded.transactions.is_empty());
    }

    #[test]
    fn test_deserialize_versionless_record() {
        // Records written before versioning: no schema_version field, and
        // possibly no transaction list at all.
        let account: Account = serde_json::from_str(
            r#"{"pubkey": "abc", "created_at": 1700000000,
                "created_by_user": true, "expiry": 1800000000}"#,
        )
        .expect("deserialize");
        assert_eq!(account.schema_version, 1);
        assert!(account.transactions.is_empty());
        assert_eq!(account.expiry, Some(1_800_000_000));

        let upgraded = account.upgraded();
        assert_eq!(upgraded.transactions.len(), 1);
    }

    #[test]
    fn test_roundtrip_preserves_unknown_shape_transactions() {
        let json = r#"{"pubkey": "abc", "created_at": 1, "created_by_user": false,
            "expiry": null,
            "transactions": [{"type": "flexible_purchase", "id": "weird"}],
            "schema_version": 2}"#;
        let account: Account = serde_json::from_str(json).expect("deserialize");
        assert_eq!(account.transactions.len(), 1);
        assert_eq!(account.transactions[0].schedule(), None);

        let raw = serde_json::to_string(&account).expect("serialize");
        let back: Account = serde_json::from_str(&raw).expect("reparse");
        assert_eq!(back, account);
    }
}
