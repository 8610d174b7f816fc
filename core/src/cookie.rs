//! Cookie directives emitted by the resolver.
//!
//! The resolver never touches an HTTP response itself; it returns a list
//! of CookieActions and the calling surface turns them into Set-Cookie
//! headers. Expire is modelled as its own variant rather than a Set with
//! a past date so callers and tests can tell the two apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// All issued cookies are scoped to the whole site.
pub const COOKIE_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CookieAction {
    /// Issue (or overwrite) a cookie.
    Set {
        name: String,
        value: String,
        expires_at: DateTime<Utc>,
        /// Tied to the request transport: secure iff the page was served
        /// over an encrypted connection.
        secure: bool,
    },
    /// Invalidate a live cookie immediately.
    Expire { name: String },
}

impl CookieAction {
    pub fn name(&self) -> &str {
        match self {
            CookieAction::Set { name, .. } => name,
            CookieAction::Expire { name } => name,
        }
    }

    pub fn is_expire(&self) -> bool {
        matches!(self, CookieAction::Expire { .. })
    }

    /// Render as a Set-Cookie header value. Every cookie is http-only and
    /// path-scoped to the whole site; Expire uses the epoch plus Max-Age=0.
    pub fn header_value(&self) -> String {
        match self {
            CookieAction::Set {
                name,
                value,
                expires_at,
                secure,
            } => {
                let mut header = format!(
                    "{name}={value}; Path={COOKIE_PATH}; Expires={}; HttpOnly",
                    format_http_date(expires_at)
                );
                if *secure {
                    header.push_str("; Secure");
                }
                header
            }
            CookieAction::Expire { name } => {
                format!(
                    "{name}=; Path={COOKIE_PATH}; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Max-Age=0; HttpOnly"
                )
            }
        }
    }
}

/// RFC 7231 IMF-fixdate, the format browsers expect in Expires.
fn format_http_date(instant: &DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
