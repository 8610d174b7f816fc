//! Attribution configuration.
//!
//! RULE: Configuration is read from the option store once per request and
//! passed by value into the resolver — never looked up ambiently from
//! inside resolution logic. The settings command (settings.rs) is the only
//! writer.

use crate::{
    error::AttributionResult,
    store::AttributionStore,
};
use chrono::Duration;
use serde::{Deserialize, Serialize};

// Option-store keys. Fixed wire contract with the admin surface.
pub const OPT_REFERRAL_ENABLED: &str = "referral_enabled";
pub const OPT_COOKIE_TRACKING_ENABLED: &str = "cookie_tracking_enabled";
pub const OPT_COOKIE_DURATION_DAYS: &str = "cookie_duration_days";
pub const OPT_FIRST_TOUCH: &str = "first_touch";
pub const OPT_USED_COOKIE_ISSUED_AT: &str = "used_cookie_issued_at";
pub const OPT_GUARD_SCOPE: &str = "guard_scope";

pub const DEFAULT_COOKIE_DURATION_DAYS: u32 = 365;

/// When the used-marker cookie for the referral id is issued.
/// Deliberately a configuration choice, not a fixed behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieIssuePoint {
    Submission,
    Completion,
}

/// What the checkout guard compares against the used-marker cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardScope {
    /// Block only when the arriving referral id equals the marked one.
    SameCode,
    /// Block any arriving referral id once one has been marked used.
    AnyCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Master switch for the whole add-on.
    pub enabled: bool,
    /// When false, no cookie directive is ever produced.
    pub cookie_tracking_enabled: bool,
    /// Lifetime of issued cookies, in whole days. Always ≥ 1.
    pub cookie_duration_days: u32,
    /// First-touch attribution: a differing arrival invalidates the stale
    /// cookie but does not replace it in the same request.
    pub first_touch: bool,
    pub used_cookie_issued_at: CookieIssuePoint,
    pub guard_scope: GuardScope,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_tracking_enabled: true,
            cookie_duration_days: DEFAULT_COOKIE_DURATION_DAYS,
            first_touch: true,
            used_cookie_issued_at: CookieIssuePoint::Completion,
            guard_scope: GuardScope::SameCode,
        }
    }
}

impl AttributionConfig {
    /// Read configuration from the option store. All values are untrusted
    /// strings: absent or malformed options degrade silently to defaults,
    /// matching the rest of the input handling in this crate.
    pub fn load(store: &AttributionStore) -> AttributionResult<Self> {
        let defaults = Self::default();
        let enabled = read_yes_no(store, OPT_REFERRAL_ENABLED)?.unwrap_or(defaults.enabled);
        let cookie_tracking_enabled = read_yes_no(store, OPT_COOKIE_TRACKING_ENABLED)?
            .unwrap_or(defaults.cookie_tracking_enabled);
        let cookie_duration_days = store
            .read_option(OPT_COOKIE_DURATION_DAYS)?
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|d| *d >= 1)
            .unwrap_or(defaults.cookie_duration_days);
        let first_touch = read_yes_no(store, OPT_FIRST_TOUCH)?.unwrap_or(defaults.first_touch);
        let used_cookie_issued_at = store
            .read_option(OPT_USED_COOKIE_ISSUED_AT)?
            .and_then(|v| parse_issue_point(&v))
            .unwrap_or(defaults.used_cookie_issued_at);
        let guard_scope = store
            .read_option(OPT_GUARD_SCOPE)?
            .and_then(|v| parse_guard_scope(&v))
            .unwrap_or(defaults.guard_scope);

        Ok(Self {
            enabled,
            cookie_tracking_enabled,
            cookie_duration_days,
            first_touch,
            used_cookie_issued_at,
            guard_scope,
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self::default()
    }

    pub fn cookie_lifetime(&self) -> Duration {
        Duration::days(i64::from(self.cookie_duration_days))
    }
}

fn read_yes_no(store: &AttributionStore, key: &str) -> AttributionResult<Option<bool>> {
    Ok(store.read_option(key)?.and_then(|v| parse_yes_no(&v)))
}

/// The admin surface posts yes/no strings, not booleans.
pub fn parse_yes_no(value: &str) -> Option<bool> {
    match value.trim() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn parse_issue_point(value: &str) -> Option<CookieIssuePoint> {
    match value.trim() {
        "submission" => Some(CookieIssuePoint::Submission),
        "completion" => Some(CookieIssuePoint::Completion),
        _ => None,
    }
}

fn parse_guard_scope(value: &str) -> Option<GuardScope> {
    match value.trim() {
        "same_code" => Some(GuardScope::SameCode),
        "any_code" => Some(GuardScope::AnyCode),
        _ => None,
    }
}

impl CookieIssuePoint {
    pub fn as_option_value(&self) -> &'static str {
        match self {
            Self::Submission => "submission",
            Self::Completion => "completion",
        }
    }
}

impl GuardScope {
    pub fn as_option_value(&self) -> &'static str {
        match self {
            Self::SameCode => "same_code",
            Self::AnyCode => "any_code",
        }
    }
}
