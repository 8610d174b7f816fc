//! Shared primitive types used across the entire crate.

/// Stable identifier of an order in the shop's order store.
pub type OrderId = String;

/// Stable identifier of a registered customer. Guest checkouts have none.
pub type CustomerId = String;
