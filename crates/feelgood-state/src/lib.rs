//! Feel Good State Engine - Progress reconciliation
//!
//! Merges a locally held progress record with a remote copy:
//! - Score and flower counters never decrease (max of both sides)
//! - The interval setting follows the more recently modified side
//! - Ties keep the first argument's interval

pub mod reconcile;

pub use reconcile::*;
