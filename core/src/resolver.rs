//! The attribution resolver.
//!
//! A pure function of (request, configuration): per tracked parameter it
//! decides the value to propagate and which cookie directives to emit.
//! No store access, no clock access, no globals — callers hand in
//! everything, which is what makes the first-touch rules testable.
//!
//! Cookie lifecycle per parameter:
//!   {absent} → {set, fresh} → {stale, invalidated} → {absent}
//! driven only by arrival of a differing value or natural expiry.

use crate::{
    config::{AttributionConfig, GuardScope},
    cookie::CookieAction,
    param::TrackedParameter,
    request::PageRequest,
    snapshot::AttributionSnapshot,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the one-time-use referral check at checkout.
/// Blocked is a business rule, not an error; the calling surface is
/// responsible for disabling the payment UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardDecision {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl GuardDecision {
    pub fn allow() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn block(reason: &str) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.to_string()),
        }
    }
}

const BLOCK_REASON: &str = "Checkout is disabled because this referral code has already been used.";

pub struct AttributionResolver {
    config: AttributionConfig,
}

impl AttributionResolver {
    pub fn new(config: AttributionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Resolve the snapshot for this request: per parameter, prefer the
    /// non-empty query value, fall back to the non-empty cookie value,
    /// otherwise leave the parameter empty.
    pub fn resolve(&self, request: &PageRequest) -> AttributionSnapshot {
        let mut snapshot = AttributionSnapshot::empty();
        if !self.config.enabled {
            return snapshot;
        }
        for param in TrackedParameter::ALL {
            if let Some(value) = request.param_value(param) {
                snapshot.set(param, value);
            } else if let Some(value) = request.cookie_value(param) {
                snapshot.set(param, value);
            }
        }
        snapshot
    }

    /// Decide cookie directives for the resolved values.
    ///
    /// Idempotent: a cookie already holding the resolved value produces no
    /// directive. A differing arrival (necessarily from the query string,
    /// since resolution prefers the query) either invalidates the stale
    /// cookie (first-touch) or overwrites it (last-touch). Under
    /// first-touch, liveness is judged against the jar as it arrived, so a
    /// fresh cookie is issued only on a later request once the stale one
    /// is gone.
    pub fn issue_cookies(
        &self,
        request: &PageRequest,
        snapshot: &AttributionSnapshot,
        now: DateTime<Utc>,
    ) -> Vec<CookieAction> {
        if !self.config.enabled || !self.config.cookie_tracking_enabled {
            return Vec::new();
        }

        let expires_at = now + self.config.cookie_lifetime();
        let mut actions = Vec::new();

        for param in TrackedParameter::ALL {
            let Some(resolved) = snapshot.get(param) else {
                continue;
            };
            match request.cookie_value(param) {
                None => {
                    actions.push(CookieAction::Set {
                        name: param.cookie_name().to_string(),
                        value: resolved.to_string(),
                        expires_at,
                        secure: request.secure,
                    });
                }
                Some(current) if current == resolved => {}
                Some(current) => {
                    log::debug!(
                        "{param}: cookie '{current}' superseded by arriving '{resolved}'"
                    );
                    if self.config.first_touch {
                        actions.push(CookieAction::Expire {
                            name: param.cookie_name().to_string(),
                        });
                    } else {
                        actions.push(CookieAction::Set {
                            name: param.cookie_name().to_string(),
                            value: resolved.to_string(),
                            expires_at,
                            secure: request.secure,
                        });
                    }
                }
            }
        }
        actions
    }

    /// One-time-use referral policy: block checkout when the arriving
    /// referral id is already recorded as used by the marker cookie.
    ///
    /// Comparison is raw string equality — no trimming, no case folding.
    /// Case or whitespace differences defeat both blocking and matching.
    pub fn checkout_guard(&self, request: &PageRequest) -> GuardDecision {
        if !self.config.enabled {
            return GuardDecision::allow();
        }
        let Some(arriving) = request.param_value(TrackedParameter::ReferralId) else {
            return GuardDecision::allow();
        };
        let marker = request
            .cookies
            .get(TrackedParameter::ReferralId.cookie_name());

        let hit = match self.config.guard_scope {
            GuardScope::SameCode => marker == Some(arriving),
            GuardScope::AnyCode => marker.is_some_and(|m| !m.is_empty()),
        };
        if hit {
            GuardDecision::block(BLOCK_REASON)
        } else {
            GuardDecision::allow()
        }
    }

    /// The used-marker Set directive for a consumed referral id. Emitted
    /// at submission or completion depending on configuration; the caller
    /// (pipeline) picks the moment.
    pub fn used_marker(&self, referral_id: &str, secure: bool, now: DateTime<Utc>) -> CookieAction {
        CookieAction::Set {
            name: TrackedParameter::ReferralId.cookie_name().to_string(),
            value: referral_id.to_string(),
            expires_at: now + self.config.cookie_lifetime(),
            secure,
        }
    }
}
