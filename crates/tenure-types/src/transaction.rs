//! Entitlement transaction model.
//!
//! A transaction records a single grant of subscription time. Grants come
//! in two shapes: **fixed-schedule** (an absolute start/end window, as
//! reported by a store receipt or migrated from a legacy record) and
//! **flexible-schedule** (a duration credit earned at a purchase moment,
//! not bound to a calendar window). Shape is determined by which fields
//! are present, never by the `kind` tag, so a record written by an older
//! or newer peer still classifies sensibly.

use serde::{Deserialize, Serialize};

use crate::LEGACY_TRANSACTION_ID;

/// Source of an entitlement grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Store-receipt purchase with a provider-defined window.
    FixedPurchase,
    /// Pay-per-period credit purchased at a point in time.
    FlexiblePurchase,
    /// Grant migrated from a pre-history account record.
    Legacy,
}

/// One entitlement grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Unique within `kind` at the source system (provider transaction id,
    /// checkout id, or `"0"` for legacy).
    pub id: String,
    /// Window start, Unix seconds. Present only for fixed-schedule grants.
    pub start_date: Option<u64>,
    /// Window end, Unix seconds. Present only for fixed-schedule grants.
    pub end_date: Option<u64>,
    /// Purchase moment, Unix seconds. Drives flexible-schedule placement.
    pub purchased_date: Option<u64>,
    /// Credit length in seconds. Present only for flexible-schedule grants.
    pub duration: Option<u64>,
}

/// The schedule shape a transaction resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// Absolute coverage window.
    Fixed { start: u64, end: u64 },
    /// Duration credit anchored at its purchase moment.
    Flexible { purchased: u64, duration: u64 },
}

impl Transaction {
    /// Build a fixed-schedule store purchase.
    pub fn fixed_purchase(id: impl Into<String>, start_date: u64, end_date: u64) -> Self {
        Self {
            kind: TransactionKind::FixedPurchase,
            id: id.into(),
            start_date: Some(start_date),
            end_date: Some(end_date),
            purchased_date: Some(start_date),
            duration: None,
        }
    }

    /// Build a flexible-schedule credit purchase.
    pub fn flexible_purchase(id: impl Into<String>, purchased_date: u64, duration: u64) -> Self {
        Self {
            kind: TransactionKind::FlexiblePurchase,
            id: id.into(),
            start_date: None,
            end_date: None,
            purchased_date: Some(purchased_date),
            duration: Some(duration),
        }
    }

    /// Build the synthesized grant for a migrated legacy expiry.
    ///
    /// The original start of a legacy grant is unknown; the epoch sentinel
    /// keeps the record deterministic and only `end_date` contributes to
    /// coverage.
    pub fn legacy(end_date: u64) -> Self {
        Self {
            kind: TransactionKind::Legacy,
            id: LEGACY_TRANSACTION_ID.to_string(),
            start_date: Some(0),
            end_date: Some(end_date),
            purchased_date: None,
            duration: None,
        }
    }

    /// Classify this transaction's schedule shape.
    ///
    /// Fixed wins when both shapes would match. Returns `None` for a
    /// transaction matching neither shape; such records contribute no time
    /// but are preserved in storage verbatim.
    pub fn schedule(&self) -> Option<Schedule> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            Some(Schedule::Fixed { start, end })
        } else if let (Some(purchased), Some(duration)) = (self.purchased_date, self.duration) {
            Some(Schedule::Flexible {
                purchased,
                duration,
            })
        } else {
            None
        }
    }

    /// The earliest timestamp at which this grant can place coverage.
    pub fn earliest_date(&self) -> Option<u64> {
        match self.schedule()? {
            Schedule::Fixed { start, .. } => Some(start),
            Schedule::Flexible { purchased, .. } => Some(purchased),
        }
    }

    /// Key under which duplicate deliveries of the same grant collapse.
    pub fn dedup_key(&self) -> (TransactionKind, &str) {
        (self.kind, self.id.as_str())
    }
}
