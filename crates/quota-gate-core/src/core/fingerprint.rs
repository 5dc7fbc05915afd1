// crates/quota-gate-core/src/core/fingerprint.rs
// ============================================================================
// Module: Request Parameters and Fingerprints
// Description: Normalized request parameters and their canonical fingerprint.
// Purpose: Make semantically identical requests collide regardless of key order.
// Dependencies: serde, serde_json, crate::core::hashing
// ============================================================================

//! ## Overview
//! A [`Fingerprint`] is the RFC 8785 canonical JSON of the request parameters.
//! Keys are sorted at every nesting level and absent (`null`) parameters are
//! dropped, so `{zip, radius}` and `{radius, zip}` produce the same value.
//! The fingerprint doubles as the normalized cache key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_string;
use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Request Parameters
// ============================================================================

/// Request parameters keyed by name.
///
/// # Invariants
/// - `null` values are never stored; inserting `null` removes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, Value>);

impl RequestParams {
    /// Creates an empty parameter set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a parameter, removing it when the value is `null`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        match value.into() {
            Value::Null => {
                self.0.remove(&key);
            }
            value => {
                self.0.insert(key, value);
            }
        }
    }

    /// Builder-style variant of [`RequestParams::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a parameter only when a value is present.
    pub fn insert_opt<V: Into<Value>>(&mut self, key: impl Into<String>, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// Returns a parameter value by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no parameters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Renders parameters as query pairs. Strings are used verbatim; other
    /// values use their JSON text.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), text)
            })
            .collect()
    }

    /// Computes the canonical fingerprint for these parameters.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] when canonicalization fails.
    pub fn fingerprint(&self) -> Result<Fingerprint, HashError> {
        let normalized: BTreeMap<&String, Value> =
            self.0.iter().map(|(key, value)| (key, strip_nulls(value))).collect();
        canonical_json_string(&normalized).map(Fingerprint)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Removes `null` members from nested objects.
fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, inner)| !inner.is_null())
                .map(|(key, inner)| (key.clone(), strip_nulls(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Canonical serialization of request parameters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wraps an already-canonical fingerprint (for example, from storage).
    #[must_use]
    pub fn from_canonical(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a SHA-256 digest of the fingerprint, safe for logs.
    #[must_use]
    pub fn digest(&self) -> HashDigest {
        hash_bytes(self.0.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
