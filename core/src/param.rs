//! The fixed set of tracked attribution parameters.
//!
//! Every parameter maps to one inbound query key, one cookie name, and a
//! pair of metadata keys (submission and completion). The set is closed:
//! variants are added here and nowhere else, and every other module
//! iterates `TrackedParameter::ALL` rather than hardcoding names.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedParameter {
    ReferralId,
    LandingId,
    ClickId,
    UtmSource,
    UtmMedium,
    UtmTerm,
    UtmCampaign,
    UtmContent,
}

impl TrackedParameter {
    pub const ALL: [TrackedParameter; 8] = [
        TrackedParameter::ReferralId,
        TrackedParameter::LandingId,
        TrackedParameter::ClickId,
        TrackedParameter::UtmSource,
        TrackedParameter::UtmMedium,
        TrackedParameter::UtmTerm,
        TrackedParameter::UtmCampaign,
        TrackedParameter::UtmContent,
    ];

    /// Canonical parameter name, used to derive metadata keys.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReferralId => "referral_id",
            Self::LandingId => "landing_id",
            Self::ClickId => "click_id",
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::UtmTerm => "utm_term",
            Self::UtmCampaign => "utm_campaign",
            Self::UtmContent => "utm_content",
        }
    }

    /// Inbound query-string key.
    pub fn query_key(&self) -> &'static str {
        match self {
            Self::ReferralId => "_ref",
            Self::LandingId => "lid",
            Self::ClickId => "cid",
            Self::UtmSource => "utm_source",
            Self::UtmMedium => "utm_medium",
            Self::UtmTerm => "utm_term",
            Self::UtmCampaign => "utm_campaign",
            Self::UtmContent => "utm_content",
        }
    }

    /// Cookie name carrying this parameter across the session.
    /// Names are fixed wire contract — renaming one orphans live cookies.
    pub fn cookie_name(&self) -> &'static str {
        match self {
            Self::ReferralId => "used_ref_id",
            Self::LandingId => "used_lid_id",
            Self::ClickId => "used_cid_id",
            Self::UtmSource => "used_utm_source_id",
            Self::UtmMedium => "used_utm_medium_id",
            Self::UtmTerm => "used_utm_term_id",
            Self::UtmCampaign => "used_utm_campaign_id",
            Self::UtmContent => "used_utm_content_id",
        }
    }

    /// Order-metadata key written at checkout submission.
    pub fn order_meta_key(&self) -> String {
        format!("{}_order", self.name())
    }

    /// Order- and customer-metadata key written at order completion.
    pub fn completed_meta_key(&self) -> String {
        format!("{}_completed", self.name())
    }

    pub fn from_query_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.query_key() == key)
    }
}

impl fmt::Display for TrackedParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
