//! Checkout attribution engine.
//!
//! Captures referral/UTM identifiers from inbound query strings, carries
//! them across the visitor's session via cookies, round-trips them through
//! hidden checkout fields, and writes them onto order and customer records
//! when an order completes. The resolver itself is a pure function of
//! (request, configuration); everything stateful lives behind the store.

pub mod clock;
pub mod config;
pub mod cookie;
pub mod error;
pub mod event;
pub mod param;
pub mod pipeline;
pub mod request;
pub mod resolver;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod types;
