// crates/quota-gate-core/src/runtime/cache.rs
// ============================================================================
// Module: Response Cache
// Description: Short-lived in-memory cache of successful upstream responses.
// Purpose: Serve repeated searches without spending quota.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Entries are keyed by `(endpoint, fingerprint)` and expire once they are
//! older than the policy TTL. Expired entries are evicted lazily on lookup.
//! A cache hit never touches the usage ledger. Only successful responses are
//! inserted; failures are never cached.
//!
//! The cache is process-local and is not persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use crate::core::fingerprint::Fingerprint;
use crate::core::identifiers::EndpointId;
use crate::core::policy::CachePolicy;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Cache key: endpoint plus canonical parameters.
type CacheKey = (EndpointId, Fingerprint);

/// Cached response with its insertion time.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    /// Cached response.
    value: V,
    /// Insertion time.
    stored_at: Timestamp,
}

/// TTL cache of upstream responses.
///
/// # Invariants
/// - Entries older than `policy.ttl_ms` are never returned.
/// - When `policy.max_entries` is set, `len() <= max_entries` after every insert.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    /// TTL and size bound.
    policy: CachePolicy,
    /// Entries by key.
    entries: HashMap<CacheKey, CacheEntry<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            entries: HashMap::new(),
        }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Returns the number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a fresh cached response, evicting it if it has expired.
    pub fn get(
        &mut self,
        endpoint_id: &EndpointId,
        fingerprint: &Fingerprint,
        now: Timestamp,
    ) -> Option<V> {
        let key = (endpoint_id.clone(), fingerprint.clone());
        let entry = self.entries.get(&key)?;
        if self.is_expired(entry.stored_at, now) {
            self.entries.remove(&key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stores a successful response, replacing any previous entry for the key.
    pub fn insert(
        &mut self,
        endpoint_id: EndpointId,
        fingerprint: Fingerprint,
        value: V,
        now: Timestamp,
    ) {
        self.entries.insert(
            (endpoint_id, fingerprint),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
        self.enforce_bound(now);
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns true when an entry stored at `stored_at` is stale at `now`.
    fn is_expired(&self, stored_at: Timestamp, now: Timestamp) -> bool {
        let ttl = i64::try_from(self.policy.ttl_ms).unwrap_or(i64::MAX);
        now.millis_since(stored_at) > ttl
    }

    /// Drops expired entries, then the oldest ones, until within bound.
    fn enforce_bound(&mut self, now: Timestamp) {
        let Some(max_entries) = self.policy.max_entries else {
            return;
        };
        if self.entries.len() <= max_entries {
            return;
        }
        let ttl = i64::try_from(self.policy.ttl_ms).unwrap_or(i64::MAX);
        self.entries.retain(|_, entry| now.millis_since(entry.stored_at) <= ttl);
        while self.entries.len() > max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
