//! Integration test crate for the Tenure subscription ledger.
//!
//! This crate has no library code — it only contains integration tests
//! that exercise end-to-end subscription flows across multiple workspace
//! crates.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tenure-integration-tests
//! ```
