//! The per-request context handed to the resolver.
//!
//! RULE: The resolver never reaches into ambient globals. Everything it
//! may look at — query parameters, the cookie jar, transport security —
//! travels inside a PageRequest built by the calling surface.

use crate::{cookie::CookieAction, param::TrackedParameter};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The cookies the client sent with this request, name → raw value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.cookies.remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Mirror a directive into the jar the way a browser would:
    /// Set stores the value, Expire drops it.
    pub fn apply(&mut self, action: &CookieAction) {
        match action {
            CookieAction::Set { name, value, .. } => {
                self.cookies.insert(name.clone(), value.clone());
            }
            CookieAction::Expire { name } => {
                self.cookies.remove(name);
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    query: BTreeMap<String, String>,
    pub cookies: CookieJar,
    /// True when the request arrived over an encrypted transport.
    /// Drives the Secure attribute on every issued cookie.
    pub secure: bool,
}

impl PageRequest {
    pub fn new(secure: bool) -> Self {
        Self {
            query: BTreeMap::new(),
            cookies: CookieJar::new(),
            secure,
        }
    }

    /// Parse a raw query string (`_ref=ABC&utm_source=mail`) into a request.
    /// Keys without a value resolve to empty, which the resolver treats as
    /// absent. Untrusted input: anything unparseable degrades to nothing.
    pub fn from_query_string(raw: &str, cookies: CookieJar, secure: bool) -> Self {
        let mut query = BTreeMap::new();
        for pair in raw.trim_start_matches('?').split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.split_once('=') {
                Some((k, v)) => (decode_component(k), decode_component(v)),
                None => (decode_component(pair), String::new()),
            };
            if !key.is_empty() {
                query.insert(key, value);
            }
        }
        Self {
            query,
            cookies,
            secure,
        }
    }

    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// The query value for a tracked parameter, if present and non-empty.
    pub fn param_value(&self, param: TrackedParameter) -> Option<&str> {
        self.query_value(param.query_key()).filter(|v| !v.is_empty())
    }

    /// The live cookie value for a tracked parameter, if present and non-empty.
    pub fn cookie_value(&self, param: TrackedParameter) -> Option<&str> {
        self.cookies.get(param.cookie_name()).filter(|v| !v.is_empty())
    }
}

/// application/x-www-form-urlencoded decoding: `+` becomes a space before
/// the percent pass, so an encoded `%2B` still yields a literal plus.
/// Invalid escapes pass through verbatim rather than fail — these are
/// untrusted marketing strings, not protocol data.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
