//! The per-request attribution snapshot.
//!
//! Invariant: a parameter is present only with a non-empty value that came
//! from the request or a cookie. Empty strings are never stored — setters
//! silently drop them.

use crate::param::TrackedParameter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSnapshot {
    values: BTreeMap<TrackedParameter, String>,
}

impl AttributionSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, param: TrackedParameter) -> Option<&str> {
        self.values.get(&param).map(String::as_str)
    }

    /// Record a resolved value. Empty values are dropped, preserving the
    /// snapshot invariant.
    pub fn set(&mut self, param: TrackedParameter, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.values.insert(param, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Non-empty parameters in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackedParameter, &str)> {
        self.values.iter().map(|(p, v)| (*p, v.as_str()))
    }

    /// Hidden checkout-form fields: one (query-key, value) pair per tracked
    /// parameter, empty string where nothing resolved, so the form
    /// round-trips the full set on submission.
    pub fn hidden_fields(&self) -> Vec<(String, String)> {
        TrackedParameter::ALL
            .into_iter()
            .map(|p| {
                (
                    p.query_key().to_string(),
                    self.get(p).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}
