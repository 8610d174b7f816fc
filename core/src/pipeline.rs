//! The attribution pipeline — one entry point per storefront event.
//!
//! EXECUTION POINTS (fixed, mirroring the shop's hook order):
//!   1. on_page_request       — every inbound page view
//!   2. on_checkout_render    — checkout form about to render
//!   3. on_checkout_submitted — checkout form posted, order created
//!   4. on_order_completed    — order reached completed status
//!
//! RULES:
//!   - Resolution logic lives in the resolver; the pipeline only wires it
//!     to the store, the clock, and the event log.
//!   - Every externally observable decision is appended to the event log.
//!   - The pipeline never mutates the request; cookie changes travel back
//!     to the caller as CookieActions.

use crate::{
    clock::Clock,
    config::{AttributionConfig, CookieIssuePoint},
    cookie::CookieAction,
    error::{AttributionError, AttributionResult},
    event::{AttributionEvent, CaptureSource, EventLogEntry},
    param::TrackedParameter,
    request::PageRequest,
    resolver::{AttributionResolver, GuardDecision},
    snapshot::AttributionSnapshot,
    store::AttributionStore,
};

/// What a page request produced: the resolved snapshot plus the cookie
/// directives the surface must emit.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub snapshot: AttributionSnapshot,
    pub cookie_actions: Vec<CookieAction>,
}

/// What the checkout surface needs to render: hidden fields for every
/// tracked parameter and the one-time-use guard decision.
#[derive(Debug, Clone)]
pub struct CheckoutView {
    pub hidden_fields: Vec<(String, String)>,
    pub guard: GuardDecision,
}

/// Order-meta key stamped at checkout submission. Underscore-prefixed so
/// consumers iterating order metadata can tell bookkeeping keys apart
/// from the `<name>_order`/`<name>_completed` attribution values.
pub const SUBMITTED_AT_KEY: &str = "_attribution_submitted_at";

pub struct AttributionPipeline {
    resolver: AttributionResolver,
    store: AttributionStore,
    clock: Clock,
}

impl AttributionPipeline {
    /// Build a pipeline with configuration loaded from the option store.
    pub fn new(store: AttributionStore, clock: Clock) -> AttributionResult<Self> {
        let config = AttributionConfig::load(&store)?;
        Ok(Self::with_config(store, config, clock))
    }

    /// Build with an explicit configuration (tests, settings previews).
    pub fn with_config(store: AttributionStore, config: AttributionConfig, clock: Clock) -> Self {
        Self {
            resolver: AttributionResolver::new(config),
            store,
            clock,
        }
    }

    pub fn config(&self) -> &AttributionConfig {
        self.resolver.config()
    }

    pub fn store(&self) -> &AttributionStore {
        &self.store
    }

    /// Re-read configuration after a settings command.
    pub fn reload_config(&mut self) -> AttributionResult<()> {
        let config = AttributionConfig::load(&self.store)?;
        self.resolver = AttributionResolver::new(config);
        Ok(())
    }

    // ── 1. Page request ────────────────────────────────────────

    pub fn on_page_request(&self, request: &PageRequest) -> AttributionResult<PageOutcome> {
        let snapshot = self.resolver.resolve(request);
        let cookie_actions = self
            .resolver
            .issue_cookies(request, &snapshot, self.clock.now());

        for (param, value) in snapshot.iter() {
            let source = if request.param_value(param).is_some() {
                CaptureSource::Query
            } else {
                CaptureSource::Cookie
            };
            self.record(&AttributionEvent::ParameterCaptured {
                param,
                value: value.to_string(),
                source,
            })?;
        }
        for action in &cookie_actions {
            match action {
                CookieAction::Set { name, expires_at, .. } => {
                    log::info!("cookie set: {name} (expires {expires_at})");
                    self.record(&AttributionEvent::CookieIssued {
                        name: name.clone(),
                        expires_at: *expires_at,
                    })?;
                }
                CookieAction::Expire { name } => {
                    log::info!("cookie invalidated: {name}");
                    self.record(&AttributionEvent::CookieInvalidated { name: name.clone() })?;
                }
            }
        }

        Ok(PageOutcome {
            snapshot,
            cookie_actions,
        })
    }

    // ── 2. Checkout render ─────────────────────────────────────

    pub fn on_checkout_render(&self, request: &PageRequest) -> AttributionResult<CheckoutView> {
        let snapshot = self.resolver.resolve(request);
        let guard = self.resolver.checkout_guard(request);

        if guard.blocked {
            let referral_id = request
                .param_value(TrackedParameter::ReferralId)
                .unwrap_or_default()
                .to_string();
            log::warn!("checkout blocked: referral id '{referral_id}' already used");
            self.record(&AttributionEvent::CheckoutBlocked { referral_id })?;
        }

        Ok(CheckoutView {
            hidden_fields: snapshot.hidden_fields(),
            guard,
        })
    }

    // ── 3. Checkout submission ─────────────────────────────────

    /// Persist the posted hidden fields as `<name>_order` metadata.
    /// Returns the used-marker directive when configuration issues the
    /// marker at submission time.
    pub fn on_checkout_submitted(
        &self,
        order_id: &str,
        posted_fields: &[(String, String)],
        request: &PageRequest,
    ) -> AttributionResult<Vec<CookieAction>> {
        if !self.config().enabled {
            return Ok(Vec::new());
        }
        let now = self.clock.now();

        // Submission stamp: lets completion tell "never submitted" apart
        // from "submitted with no tracked values".
        self.store
            .write_order_meta(order_id, SUBMITTED_AT_KEY, &now.to_rfc3339(), now)?;

        let mut captured = 0usize;
        let mut referral_id = None;
        for (key, value) in posted_fields {
            let Some(param) = TrackedParameter::from_query_key(key) else {
                continue; // unknown posted field, not ours
            };
            if value.is_empty() {
                continue;
            }
            self.store
                .write_order_meta(order_id, &param.order_meta_key(), value, now)?;
            captured += 1;
            if param == TrackedParameter::ReferralId {
                referral_id = Some(value.clone());
            }
        }

        log::info!("order {order_id}: captured {captured} attribution fields at submission");
        self.record(&AttributionEvent::OrderSubmitted {
            order_id: order_id.to_string(),
            captured,
        })?;

        let mut actions = Vec::new();
        if self.config().used_cookie_issued_at == CookieIssuePoint::Submission {
            if let Some(referral_id) = referral_id {
                actions.push(
                    self.resolver
                        .used_marker(&referral_id, request.secure, now),
                );
            }
        }
        Ok(actions)
    }

    // ── 4. Order completion ────────────────────────────────────

    /// Copy the order's submitted attribution to `<name>_completed` keys
    /// on the order and, when the purchaser is identified, the customer.
    /// Returns the used-marker directive when configuration issues the
    /// marker at completion time.
    pub fn on_order_completed(
        &self,
        order_id: &str,
        customer_id: Option<&str>,
        secure: bool,
    ) -> AttributionResult<Vec<CookieAction>> {
        if !self.config().enabled {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        let snapshot = self.submitted_snapshot(order_id)?;

        let mut keys = Vec::new();
        for (param, value) in snapshot.iter() {
            let key = param.completed_meta_key();
            self.store.write_order_meta(order_id, &key, value, now)?;
            if let Some(customer_id) = customer_id {
                self.store
                    .write_customer_meta(customer_id, &key, value, now)?;
            }
            keys.push(key);
        }

        log::info!(
            "order {order_id}: completed with {} attribution keys (customer: {})",
            keys.len(),
            customer_id.unwrap_or("guest")
        );
        self.record(&AttributionEvent::OrderAttributed {
            order_id: order_id.to_string(),
            customer_id: customer_id.map(str::to_string),
            keys,
        })?;

        let mut actions = Vec::new();
        if self.config().used_cookie_issued_at == CookieIssuePoint::Completion {
            if let Some(referral_id) = snapshot.get(TrackedParameter::ReferralId) {
                actions.push(self.resolver.used_marker(referral_id, secure, now));
            }
        }
        Ok(actions)
    }

    /// Rebuild the snapshot an order was submitted with from its
    /// `<name>_order` metadata.
    pub fn submitted_snapshot(&self, order_id: &str) -> AttributionResult<AttributionSnapshot> {
        let mut snapshot = AttributionSnapshot::empty();
        for param in TrackedParameter::ALL {
            if let Some(value) = self.store.order_meta(order_id, &param.order_meta_key())? {
                snapshot.set(param, value);
            }
        }
        if self.store.order_meta(order_id, SUBMITTED_AT_KEY)?.is_none() {
            // Completion without a prior submission is a caller bug worth
            // surfacing; an order submitted with no tracked values is not.
            return Err(AttributionError::OrderNotSubmitted {
                order_id: order_id.to_string(),
            });
        }
        Ok(snapshot)
    }

    fn record(&self, event: &AttributionEvent) -> AttributionResult<()> {
        self.store.append_event(&EventLogEntry {
            id: None,
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(event)?,
            recorded_at: self.clock.now(),
        })
    }
}
