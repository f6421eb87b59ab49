//! # tenure-expiry
//!
//! Expiry computation for the Tenure subscription ledger.
//!
//! An account's entitlement history is an unordered, possibly duplicated
//! list of grants. [`compute_expiry`] merges that list into a single
//! timeline and returns the furthest covered timestamp:
//!
//! - Fixed-schedule grants define hard coverage intervals.
//! - Flexible-schedule grants are duration credits, consumed first to
//!   bridge gaps between later grants and otherwise appended at the tail
//!   of the timeline, so a credit is never wasted inside a period that is
//!   already covered.
//!
//! The computation is a pure function of its input: no I/O, no clock, no
//! mutation of the caller's list, and it never fails. Unrecognized grant
//! shapes contribute no time.

use std::collections::HashSet;

use tenure_types::{Schedule, Transaction, TransactionKind};

/// Copy a transaction history, dropping duplicate deliveries.
///
/// Two transactions are duplicates when they share `(kind, id)`; the first
/// occurrence in list order is retained. Payment providers deliver events
/// at-least-once, so the same grant can legitimately appear twice.
/// Shape-invalid transactions are kept; storage preserves them verbatim
/// and only the expiry walk skips them.
pub fn dedup_history(history: &[Transaction]) -> Vec<Transaction> {
    let mut seen: HashSet<(TransactionKind, String)> = HashSet::with_capacity(history.len());
    let mut unique = Vec::with_capacity(history.len());
    for tx in history {
        if seen.insert((tx.kind, tx.id.clone())) {
            unique.push(tx.clone());
        }
    }
    unique
}

/// Compute the entitlement expiry for a transaction history.
///
/// Returns `None` when the history contains no usable grants (no
/// entitlement was ever granted). Otherwise returns the furthest Unix
/// timestamp covered by the merged timeline.
///
/// The walk keeps two accumulators: `cursor`, the furthest covered
/// timestamp so far, and `bank`, flexible credit seconds not yet placed on
/// the timeline. Credit is spent to close a gap up to the next grant's
/// earliest date, never past it; whatever remains after the last grant is
/// appended at the tail.
pub fn compute_expiry(history: &[Transaction]) -> Option<u64> {
    let mut grants: Vec<Transaction> = dedup_history(history)
        .into_iter()
        .filter(|tx| tx.schedule().is_some())
        .collect();
    if grants.is_empty() {
        return None;
    }
    // Stable sort: grants with equal earliest dates keep their input order.
    grants.sort_by_key(|tx| tx.earliest_date().unwrap_or(0));

    let mut cursor: Option<u64> = None;
    let mut bank: u64 = 0;
    let last = grants.len() - 1;

    for (i, tx) in grants.iter().enumerate() {
        match tx.schedule() {
            Some(Schedule::Fixed { end, .. }) => {
                cursor = Some(cursor.map_or(end, |c| c.max(end)));
            }
            Some(Schedule::Flexible {
                purchased,
                duration,
            }) => {
                bank = bank.saturating_add(duration);
                cursor = Some(cursor.map_or(purchased, |c| c.max(purchased)));
            }
            None => continue,
        }

        if i < last {
            let next_earliest = grants[i + 1].earliest_date().unwrap_or(0);
            if let Some(covered) = cursor {
                if covered < next_earliest && bank > 0 {
                    let fill = bank.min(next_earliest - covered);
                    bank -= fill;
                    cursor = Some(covered + fill);
                }
            }
        } else {
            cursor = cursor.map(|c| c.saturating_add(bank));
        }
    }

    tracing::trace!(grants = grants.len(), expiry = ?cursor, "expiry computed");
    cursor
}
