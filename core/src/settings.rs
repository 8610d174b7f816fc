//! The administrative settings action, as a command.
//!
//! The admin surface posts a partial form; fields left out keep their
//! stored value. Applying the command is the ONLY path that writes
//! configuration options — everything else reads.

use crate::{
    config::{
        yes_no, AttributionConfig, CookieIssuePoint, GuardScope, OPT_COOKIE_DURATION_DAYS,
        OPT_COOKIE_TRACKING_ENABLED, OPT_FIRST_TOUCH, OPT_GUARD_SCOPE, OPT_REFERRAL_ENABLED,
        OPT_USED_COOKIE_ISSUED_AT,
    },
    error::AttributionResult,
    store::AttributionStore,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub referral_enabled: Option<bool>,
    pub cookie_tracking_enabled: Option<bool>,
    pub cookie_duration_days: Option<u32>,
    pub first_touch: Option<bool>,
    pub used_cookie_issued_at: Option<CookieIssuePoint>,
    pub guard_scope: Option<GuardScope>,
}

impl SettingsUpdate {
    /// Persist the posted fields and return the effective configuration.
    /// Durations below one day are clamped to one, matching the form's
    /// `min="1"` constraint rather than rejecting the post.
    pub fn apply(&self, store: &AttributionStore) -> AttributionResult<AttributionConfig> {
        if let Some(enabled) = self.referral_enabled {
            store.write_option(OPT_REFERRAL_ENABLED, yes_no(enabled))?;
        }
        if let Some(tracking) = self.cookie_tracking_enabled {
            store.write_option(OPT_COOKIE_TRACKING_ENABLED, yes_no(tracking))?;
        }
        if let Some(days) = self.cookie_duration_days {
            let days = days.max(1);
            store.write_option(OPT_COOKIE_DURATION_DAYS, &days.to_string())?;
        }
        if let Some(first_touch) = self.first_touch {
            store.write_option(OPT_FIRST_TOUCH, yes_no(first_touch))?;
        }
        if let Some(point) = self.used_cookie_issued_at {
            store.write_option(OPT_USED_COOKIE_ISSUED_AT, point.as_option_value())?;
        }
        if let Some(scope) = self.guard_scope {
            store.write_option(OPT_GUARD_SCOPE, scope.as_option_value())?;
        }

        let config = AttributionConfig::load(store)?;
        log::info!(
            "settings applied: enabled={} cookie_tracking={} duration_days={}",
            config.enabled,
            config.cookie_tracking_enabled,
            config.cookie_duration_days
        );
        Ok(config)
    }
}
