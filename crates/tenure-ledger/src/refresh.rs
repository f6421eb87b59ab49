//! Provider history refresh policy.
//!
//! A store-receipt subscription can renew on the provider's side without
//! any event reaching us, so an account that looks expired may just be
//! stale. The policy below decides when a resolved account is worth a
//! round-trip to the provider; the round-trip itself belongs to the
//! calling collaborator, which stamps the account via
//! [`Ledger::mark_history_refreshed`](crate::Ledger::mark_history_refreshed)
//! afterwards.

use tenure_types::{Account, TransactionKind};

use crate::ledger::standing_at;

/// Minimum seconds between provider history refreshes for one account.
pub const HISTORY_REFRESH_COOLDOWN_SECS: u64 = 60 * 60 * 24;

/// Whether the account's provider history should be refreshed now.
///
/// True only when the account is inactive, its newest transaction is a
/// store-receipt purchase (the only kind the provider can have renewed
/// behind our back), and no refresh ran within the cooldown window.
pub fn needs_history_refresh(account: &Account, now: u64, cooldown_secs: u64) -> bool {
    if standing_at(account, now).is_active() {
        return false;
    }
    let last_is_fixed_purchase = account
        .transactions
        .last()
        .is_some_and(|tx| tx.kind == TransactionKind::FixedPurchase);
    if !last_is_fixed_purchase {
        return false;
    }
    match account.last_history_refresh {
        Some(refreshed_at) => now.saturating_sub(refreshed_at) >= cooldown_secs,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenure_types::{Transaction, ACCOUNT_SCHEMA_VERSION};

    const DAY: u64 = 60 * 60 * 24;
    const NOW: u64 = 1_700_000_000;

    fn account_with(transactions: Vec<Transaction>) -> Account {
        Account {
            pubkey: "npub-a".to_string(),
            created_at: NOW - 100 * DAY,
            created_by_user: true,
            expiry: None,
            transactions,
            last_history_refresh: None,
            schema_version: ACCOUNT_SCHEMA_VERSION,
        }
    }

    fn lapsed_purchase() -> Transaction {
        Transaction::fixed_purchase("tx-1", NOW - 40 * DAY, NOW - 10 * DAY)
    }

    #[test]
    fn test_lapsed_store_purchase_needs_refresh() {
        let account = account_with(vec![lapsed_purchase()]);
        assert!(needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));
    }

    #[test]
    fn test_active_account_skips_refresh() {
        let account = account_with(vec![Transaction::fixed_purchase(
            "tx-1",
            NOW - DAY,
            NOW + 20 * DAY,
        )]);
        assert!(!needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));
    }

    #[test]
    fn test_non_store_tail_skips_refresh() {
        // The provider cannot have renewed a pay-per-period credit.
        let account = account_with(vec![
            lapsed_purchase(),
            Transaction::flexible_purchase("inv-1", NOW - 5 * DAY, DAY),
        ]);
        assert!(!needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));
    }

    #[test]
    fn test_empty_history_skips_refresh() {
        let account = account_with(Vec::new());
        assert!(!needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));
    }

    #[test]
    fn test_cooldown_window() {
        let mut account = account_with(vec![lapsed_purchase()]);

        account.last_history_refresh = Some(NOW - HISTORY_REFRESH_COOLDOWN_SECS + 1);
        assert!(!needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));

        account.last_history_refresh = Some(NOW - HISTORY_REFRESH_COOLDOWN_SECS);
        assert!(needs_history_refresh(
            &account,
            NOW,
            HISTORY_REFRESH_COOLDOWN_SECS
        ));
    }
}
