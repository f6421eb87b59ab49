//! Account operations and the identity-token index.
//!
//! Every operation is keyed by the caller-supplied identity. Lookup runs
//! identity → account number → account record; the record is decoded,
//! upgraded to the current schema, and its expiry recomputed from the
//! transaction history on the spot. A record that fails to decode is
//! recovered as an account with no usable transactions rather than
//! surfaced as an error, so one corrupt row can never take down
//! resolution for its identity.

use serde::Serialize;

use tenure_db::LedgerStore;
use tenure_expiry::{compute_expiry, dedup_history};
use tenure_types::{Account, AccountNumber, Transaction, ACCOUNT_SCHEMA_VERSION};

use crate::config::LedgerConfig;
use crate::time::current_timestamp;
use crate::{LedgerError, Result};

/// The account ledger, generic over its backing store.
pub struct Ledger<S: LedgerStore> {
    store: S,
    config: LedgerConfig,
}

/// An identity's entitlement standing at a point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountStanding {
    /// Entitlement runs until `expires_at` (exclusive).
    Active {
        /// Computed expiry, Unix seconds.
        expires_at: u64,
    },
    /// The account exists but its coverage has run out (or it never had
    /// any usable grants).
    Expired {
        /// Computed expiry, if any grant ever contributed coverage.
        expires_at: Option<u64>,
    },
    /// The identity has no account.
    NotFound,
}

impl AccountStanding {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Human-readable reason for an inactive standing.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Active { .. } => None,
            Self::Expired { .. } => Some("account expired"),
            Self::NotFound => Some("account not found"),
        }
    }
}

/// Read-only account projection handed to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub pubkey: String,
    pub created_at: u64,
    /// Expiry computed from the transaction history, never a stored value.
    pub expiry: Option<u64>,
    pub account_number: AccountNumber,
    pub active: bool,
    /// Privileged post-authentication field; only populated for an
    /// authenticated caller with an active account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perk_url: Option<String>,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Look up an identity's account.
    ///
    /// Returns `None` when the identity has no account. The returned
    /// record is already upgraded to the current schema version.
    pub fn resolve(&self, identity: &str) -> Result<Option<(AccountNumber, Account)>> {
        let Some(number) = self.store.get_account_number(identity)? else {
            return Ok(None);
        };
        let Some(record) = self.store.get_account(number)? else {
            // Index entry without a record: a write failed between record
            // and index, or the record was removed out of band.
            tracing::warn!(identity, number, "dangling account index entry");
            return Ok(None);
        };
        let account = match serde_json::from_str::<Account>(&record) {
            Ok(account) => account,
            Err(error) => {
                // Recovered locally: the identity resolves to an account
                // with no usable transactions instead of an error.
                tracing::warn!(identity, number, %error, "malformed account record");
                Account {
                    pubkey: identity.to_string(),
                    created_at: 0,
                    created_by_user: false,
                    expiry: None,
                    transactions: Vec::new(),
                    last_history_refresh: None,
                    schema_version: ACCOUNT_SCHEMA_VERSION,
                }
            }
        };
        Ok(Some((number, account.upgraded())))
    }

    /// Create an account for a previously unknown identity.
    ///
    /// Not idempotent by design: a second create for the same identity
    /// fails with [`LedgerError::AlreadyExists`]. Callers that want
    /// merge-or-create semantics use [`Ledger::merge_transactions`].
    /// The initial transactions are stored as given; duplicates collapse
    /// inside the expiry computation and on the first merge.
    pub fn create(
        &self,
        identity: &str,
        initial_transactions: Vec<Transaction>,
        created_by_user: bool,
    ) -> Result<(AccountNumber, Account)> {
        if self.resolve(identity)?.is_some() {
            return Err(LedgerError::AlreadyExists);
        }
        let account = Account {
            pubkey: identity.to_string(),
            created_at: current_timestamp(),
            created_by_user,
            expiry: None,
            transactions: initial_transactions,
            last_history_refresh: None,
            schema_version: ACCOUNT_SCHEMA_VERSION,
        };
        let (number, account) = self.put(identity, account)?;
        tracing::info!(identity, number, created_by_user, "account created");
        Ok((number, account))
    }

    /// Persist an account record for an identity.
    ///
    /// Assigns a sequential account number on the identity's first write.
    /// The legacy flat `expiry` field is cleared once any transaction
    /// exists; from then on expiry is always computed from the history.
    /// The record is written before a newly assigned index entry, so a
    /// failure between the two leaves an unreachable record rather than
    /// an index entry pointing at nothing.
    pub fn put(&self, identity: &str, mut account: Account) -> Result<(AccountNumber, Account)> {
        if !account.transactions.is_empty() {
            account.expiry = None;
        }
        account.schema_version = ACCOUNT_SCHEMA_VERSION;

        let existing = self.store.get_account_number(identity)?;
        let number = match existing {
            Some(number) => number,
            None => self.store.allocate_account_number()?,
        };
        let record = serde_json::to_string(&account)?;
        self.store.put_account(number, &record)?;
        if existing.is_none() {
            self.store.put_account_number(identity, number)?;
        }
        Ok((number, account))
    }

    /// Merge verified transactions into an identity's account, creating
    /// the account if it does not exist yet.
    ///
    /// This is the idempotency boundary for at-least-once provider
    /// delivery: the merged history is deduplicated by `(kind, id)` with
    /// the first occurrence winning, so delivering the same event twice
    /// changes nothing after the first application.
    pub fn merge_transactions(
        &self,
        identity: &str,
        new_transactions: Vec<Transaction>,
    ) -> Result<(AccountNumber, Account)> {
        let Some((_, mut account)) = self.resolve(identity)? else {
            return self.create(identity, new_transactions, true);
        };
        account.transactions.extend(new_transactions);
        account.transactions = dedup_history(&account.transactions);
        let (number, account) = self.put(identity, account)?;
        tracing::info!(
            identity,
            number,
            transactions = account.transactions.len(),
            "transactions merged"
        );
        Ok((number, account))
    }

    /// Record that the provider transaction history was refreshed, without
    /// touching the transactions themselves.
    pub fn mark_history_refreshed(&self, identity: &str) -> Result<(AccountNumber, Account)> {
        let Some((_, mut account)) = self.resolve(identity)? else {
            return Err(LedgerError::NotFound);
        };
        account.last_history_refresh = Some(current_timestamp());
        self.put(identity, account)
    }

    /// An identity's entitlement standing right now.
    ///
    /// Computed strictly from the transaction history; active means the
    /// computed expiry lies strictly in the future.
    pub fn is_active(&self, identity: &str) -> Result<AccountStanding> {
        let Some((_, account)) = self.resolve(identity)? else {
            return Ok(AccountStanding::NotFound);
        };
        Ok(standing_at(&account, current_timestamp()))
    }

    /// Build the read-only projection of an account.
    ///
    /// `include_extra` gates privileged fields only; it never affects the
    /// entitlement computation itself.
    pub fn info_view(
        &self,
        account: &Account,
        account_number: AccountNumber,
        include_extra: bool,
    ) -> AccountInfo {
        let now = current_timestamp();
        let expiry = compute_expiry(&account.transactions);
        let active = expiry.is_some_and(|e| now < e);
        AccountInfo {
            pubkey: account.pubkey.clone(),
            created_at: account.created_at,
            expiry,
            account_number,
            active,
            perk_url: if include_extra && active {
                self.config.perk_url.clone()
            } else {
                None
            },
        }
    }

    /// Whether the account's provider history is due for a refresh, per
    /// the configured cooldown.
    pub fn history_refresh_due(&self, account: &Account) -> bool {
        crate::refresh::needs_history_refresh(
            account,
            current_timestamp(),
            self.config.refresh_cooldown_secs,
        )
    }

    /// Administratively erase an identity: account record, index entry,
    /// and correlation token.
    pub fn erase(&self, identity: &str) -> Result<()> {
        let Some(number) = self.store.get_account_number(identity)? else {
            return Err(LedgerError::NotFound);
        };
        self.store.delete_account(number)?;
        self.store.delete_account_number(identity)?;
        self.store.delete_identity_token(identity)?;
        tracing::info!(identity, number, "account erased");
        Ok(())
    }

    /// Fetch the identity's correlation token, generating and persisting
    /// one on first use.
    ///
    /// Tokens are opaque upper-cased UUIDs used only to correlate the
    /// identity with an external payment-provider subscriber reference.
    pub fn get_or_create_token(&self, identity: &str) -> Result<String> {
        if let Some(token) = self.store.get_identity_token(identity)? {
            return Ok(token);
        }
        let token = uuid::Uuid::new_v4().to_string().to_uppercase();
        self.store.put_identity_token(identity, &token)?;
        tracing::debug!(identity, "correlation token created");
        Ok(token)
    }

    /// Administrative override: store an externally supplied token
    /// verbatim. Used to re-seed the mapping after data loss elsewhere.
    pub fn force_set_token(&self, identity: &str, token: &str) -> Result<()> {
        self.store.put_identity_token(identity, token)?;
        tracing::info!(identity, "correlation token overridden");
        Ok(())
    }
}

/// Standing of an account at the given time.
pub fn standing_at(account: &Account, now: u64) -> AccountStanding {
    match compute_expiry(&account.transactions) {
        Some(expires_at) if now < expires_at => AccountStanding::Active { expires_at },
        expires_at => AccountStanding::Expired { expires_at },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenure_db::MemoryStore;
    use tenure_types::TransactionKind;

    const DAY: u64 = 60 * 60 * 24;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new())
    }

    /// A fixed grant still running a year from now.
    fn active_grant() -> Transaction {
        let now = current_timestamp();
        Transaction::fixed_purchase("tx-1", now - DAY, now + 365 * DAY)
    }

    fn expired_grant() -> Transaction {
        let now = current_timestamp();
        Transaction::fixed_purchase("tx-0", now - 60 * DAY, now - 30 * DAY)
    }

    #[test]
    fn test_resolve_unknown_identity() {
        let ledger = ledger();
        assert!(ledger.resolve("npub-a").expect("resolve").is_none());
        assert_eq!(
            ledger.is_active("npub-a").expect("is_active"),
            AccountStanding::NotFound
        );
    }

    #[test]
    fn test_create_and_resolve() {
        let ledger = ledger();
        let (number, account) = ledger
            .create("npub-a", vec![active_grant()], true)
            .expect("create");
        assert_eq!(number, 1);
        assert!(account.created_by_user);

        let (resolved_number, resolved) = ledger
            .resolve("npub-a")
            .expect("resolve")
            .expect("account exists");
        assert_eq!(resolved_number, 1);
        assert_eq!(resolved.transactions.len(), 1);
        assert_eq!(resolved.pubkey, "npub-a");
    }

    #[test]
    fn test_create_twice_fails() {
        let ledger = ledger();
        ledger.create("npub-a", vec![], true).expect("create");
        assert!(matches!(
            ledger.create("npub-a", vec![], true),
            Err(LedgerError::AlreadyExists)
        ));
    }

    #[test]
    fn test_sequential_account_numbers() {
        let ledger = ledger();
        let (first, _) = ledger.create("npub-a", vec![], true).expect("create");
        let (second, _) = ledger.create("npub-b", vec![], true).expect("create");
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn test_merge_creates_missing_account() {
        let ledger = ledger();
        let (number, account) = ledger
            .merge_transactions("npub-a", vec![active_grant()])
            .expect("merge");
        assert_eq!(number, 1);
        // Auto-created accounts are attributed to the user.
        assert!(account.created_by_user);
        assert_eq!(account.transactions.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let ledger = ledger();
        let batch = vec![active_grant(), expired_grant()];

        let mut counts = Vec::new();
        let mut expiries = Vec::new();
        for _ in 0..3 {
            let (_, account) = ledger
                .merge_transactions("npub-a", batch.clone())
                .expect("merge");
            counts.push(account.transactions.len());
            expiries.push(compute_expiry(&account.transactions));
        }
        assert_eq!(counts, vec![2, 2, 2]);
        assert_eq!(expiries[0], expiries[1]);
        assert_eq!(expiries[1], expiries[2]);
    }

    #[test]
    fn test_merge_keeps_first_delivery() {
        let ledger = ledger();
        let now = current_timestamp();
        ledger
            .merge_transactions(
                "npub-a",
                vec![Transaction::fixed_purchase("tx-1", now, now + 30 * DAY)],
            )
            .expect("merge");
        // Re-delivery with a different window must not replace the stored
        // grant.
        let (_, account) = ledger
            .merge_transactions(
                "npub-a",
                vec![Transaction::fixed_purchase("tx-1", now, now + 90 * DAY)],
            )
            .expect("merge");
        assert_eq!(account.transactions.len(), 1);
        assert_eq!(account.transactions[0].end_date, Some(now + 30 * DAY));
    }

    #[test]
    fn test_put_clears_legacy_expiry() {
        let ledger = ledger();
        let account = Account {
            pubkey: "npub-a".to_string(),
            created_at: 1,
            created_by_user: true,
            expiry: Some(9_999_999_999),
            transactions: vec![active_grant()],
            last_history_refresh: None,
            schema_version: ACCOUNT_SCHEMA_VERSION,
        };
        let (_, stored) = ledger.put("npub-a", account).expect("put");
        assert_eq!(stored.expiry, None);
    }

    #[test]
    fn test_put_keeps_expiry_while_history_empty() {
        // An account that has not been migrated yet keeps its flat expiry.
        let ledger = ledger();
        let account = Account {
            pubkey: "npub-a".to_string(),
            created_at: 1,
            created_by_user: true,
            expiry: Some(9_999_999_999),
            transactions: Vec::new(),
            last_history_refresh: None,
            schema_version: 1,
        };
        let (_, stored) = ledger.put("npub-a", account).expect("put");
        assert_eq!(stored.expiry, Some(9_999_999_999));
    }

    #[test]
    fn test_is_active_boundaries() {
        let ledger = ledger();
        ledger
            .create("active", vec![active_grant()], true)
            .expect("create");
        ledger
            .create("expired", vec![expired_grant()], true)
            .expect("create");
        ledger.create("empty", vec![], true).expect("create");

        assert!(ledger.is_active("active").expect("standing").is_active());

        let standing = ledger.is_active("expired").expect("standing");
        assert!(!standing.is_active());
        assert_eq!(standing.reason(), Some("account expired"));

        assert_eq!(
            ledger.is_active("empty").expect("standing"),
            AccountStanding::Expired { expires_at: None }
        );
    }

    #[test]
    fn test_standing_at_expiry_instant_is_expired() {
        let account = Account {
            pubkey: "npub-a".to_string(),
            created_at: 0,
            created_by_user: true,
            expiry: None,
            transactions: vec![Transaction::fixed_purchase("tx-1", 100, 200)],
            last_history_refresh: None,
            schema_version: ACCOUNT_SCHEMA_VERSION,
        };
        assert!(standing_at(&account, 199).is_active());
        assert!(!standing_at(&account, 200).is_active());
    }

    #[test]
    fn test_mark_history_refreshed() {
        let ledger = ledger();
        ledger
            .create("npub-a", vec![active_grant()], true)
            .expect("create");

        let before = current_timestamp();
        let (_, account) = ledger.mark_history_refreshed("npub-a").expect("mark");
        let stamp = account.last_history_refresh.expect("stamp set");
        assert!(stamp >= before);
        assert_eq!(account.transactions.len(), 1);

        assert!(matches!(
            ledger.mark_history_refreshed("npub-b"),
            Err(LedgerError::NotFound)
        ));
    }

    #[test]
    fn test_info_view_gates_perk_url() {
        let config = LedgerConfig {
            perk_url: Some("https://example.com/beta".to_string()),
            ..LedgerConfig::default()
        };
        let ledger = Ledger::with_config(MemoryStore::new(), config);
        let (number, account) = ledger
            .create("npub-a", vec![active_grant()], true)
            .expect("create");

        let privileged = ledger.info_view(&account, number, true);
        assert!(privileged.active);
        assert_eq!(
            privileged.perk_url.as_deref(),
            Some("https://example.com/beta")
        );

        let public = ledger.info_view(&account, number, false);
        assert!(public.active);
        assert_eq!(public.perk_url, None);

        let (expired_number, expired) = ledger
            .create("npub-b", vec![expired_grant()], true)
            .expect("create");
        let inactive = ledger.info_view(&expired, expired_number, true);
        assert!(!inactive.active);
        assert_eq!(inactive.perk_url, None);
    }

    #[test]
    fn test_info_view_serializes_without_absent_perk() {
        let ledger = ledger();
        let (number, account) = ledger.create("npub-a", vec![], true).expect("create");
        let info = ledger.info_view(&account, number, false);
        let json = serde_json::to_value(&info).expect("serialize");
        assert!(json.get("perk_url").is_none());
        assert_eq!(json["account_number"], 1);
    }

    #[test]
    fn test_legacy_record_resolves_through_upgrade() {
        let ledger = ledger();
        let number = ledger
            .store()
            .allocate_account_number()
            .expect("allocate");
        ledger
            .store()
            .put_account(
                number,
                r#"{"pubkey": "npub-a", "created_at": 1600000000,
                    "created_by_user": true, "expiry": 9999999999}"#,
            )
            .expect("seed record");
        ledger
            .store()
            .put_account_number("npub-a", number)
            .expect("seed index");

        let (_, account) = ledger
            .resolve("npub-a")
            .expect("resolve")
            .expect("account exists");
        assert_eq!(account.transactions.len(), 1);
        assert_eq!(account.transactions[0].kind, TransactionKind::Legacy);
        assert!(ledger.is_active("npub-a").expect("standing").is_active());
    }

    #[test]
    fn test_malformed_record_recovers_as_empty() {
        let ledger = ledger();
        ledger
            .store()
            .put_account(1, "not json at all")
            .expect("seed record");
        ledger
            .store()
            .put_account_number("npub-a", 1)
            .expect("seed index");

        let (_, account) = ledger
            .resolve("npub-a")
            .expect("resolve must not fail")
            .expect("account exists");
        assert!(account.transactions.is_empty());
        assert_eq!(
            ledger.is_active("npub-a").expect("standing"),
            AccountStanding::Expired { expires_at: None }
        );
    }

    #[test]
    fn test_dangling_index_treated_as_absent() {
        let ledger = ledger();
        ledger
            .store()
            .put_account_number("npub-a", 42)
            .expect("seed index");
        assert!(ledger.resolve("npub-a").expect("resolve").is_none());
    }

    #[test]
    fn test_erase_removes_everything() {
        let ledger = ledger();
        ledger
            .create("npub-a", vec![active_grant()], true)
            .expect("create");
        ledger.get_or_create_token("npub-a").expect("token");

        ledger.erase("npub-a").expect("erase");
        assert!(ledger.resolve("npub-a").expect("resolve").is_none());
        assert_eq!(
            ledger
                .store()
                .get_identity_token("npub-a")
                .expect("token lookup"),
            None
        );

        assert!(matches!(ledger.erase("npub-a"), Err(LedgerError::NotFound)));
    }

    #[test]
    fn test_erased_number_is_not_reused() {
        let ledger = ledger();
        ledger.create("npub-a", vec![], true).expect("create");
        ledger.erase("npub-a").expect("erase");
        let (number, _) = ledger.create("npub-b", vec![], true).expect("create");
        assert_eq!(number, 2);
    }

    #[test]
    fn test_token_is_stable_and_uppercase() {
        let ledger = ledger();
        let first = ledger.get_or_create_token("npub-a").expect("token");
        let second = ledger.get_or_create_token("npub-a").expect("token");
        assert_eq!(first, second);
        assert_eq!(first, first.to_uppercase());
        assert_eq!(first.len(), 36);

        let other = ledger.get_or_create_token("npub-b").expect("token");
        assert_ne!(first, other);
    }

    #[test]
    fn test_force_set_token() {
        let ledger = ledger();
        ledger.get_or_create_token("npub-a").expect("token");
        ledger
            .force_set_token("npub-a", "SEEDED-TOKEN")
            .expect("force set");
        assert_eq!(
            ledger.get_or_create_token("npub-a").expect("token"),
            "SEEDED-TOKEN"
        );
    }
}
