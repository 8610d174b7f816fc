//! Typed events recorded by the pipeline.
//!
//! Every externally observable decision — a captured parameter, an issued
//! or invalidated cookie, a blocked checkout, an attributed order — lands
//! in the persisted event log as JSON. Variants are added over time,
//! never removed or reordered.

use crate::{
    param::TrackedParameter,
    types::{CustomerId, OrderId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    Query,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributionEvent {
    ParameterCaptured {
        param: TrackedParameter,
        value: String,
        source: CaptureSource,
    },
    CookieIssued {
        name: String,
        expires_at: DateTime<Utc>,
    },
    CookieInvalidated {
        name: String,
    },
    CheckoutBlocked {
        referral_id: String,
    },
    OrderSubmitted {
        order_id: OrderId,
        captured: usize,
    },
    OrderAttributed {
        order_id: OrderId,
        customer_id: Option<CustomerId>,
        keys: Vec<String>,
    },
}

impl AttributionEvent {
    /// Stable name stored alongside the JSON payload for querying.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ParameterCaptured { .. } => "parameter_captured",
            Self::CookieIssued { .. } => "cookie_issued",
            Self::CookieInvalidated { .. } => "cookie_invalidated",
            Self::CheckoutBlocked { .. } => "checkout_blocked",
            Self::OrderSubmitted { .. } => "order_submitted",
            Self::OrderAttributed { .. } => "order_attributed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub event_type: String,
    pub payload: String, // JSON-serialized AttributionEvent
    pub recorded_at: DateTime<Utc>,
}
