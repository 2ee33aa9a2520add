//! # Optimistic Update Cache
//!
//! Two-layer value cache keyed by logical identity. A speculative layer
//! holds values the user has applied locally but the server has not yet
//! confirmed; an authoritative layer holds the last server-confirmed
//! values. Reads prefer speculative over authoritative.
//!
//! Invariants:
//! - At most one speculative entry per key; re-applying before
//!   resolution overwrites the prior entry (last-writer-wins).
//! - A speculative entry is removed exactly once: promoted by `resolve`
//!   or discarded by `rollback`.
//! - While a key holds an unresolved speculative entry, authoritative
//!   pushes absorbed for that key do not change what `read` returns.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::observability::{Event, Logger, MetricsRegistry};

/// A value the user applied locally, pending server confirmation
#[derive(Debug, Clone)]
struct SpeculativeEntry {
    value: Value,
    created_at: DateTime<Utc>,
}

/// Result of a cache read
///
/// Precedence: speculative > authoritative > unknown. The sentinel is
/// explicit so callers can distinguish "no value known" from a stored
/// JSON null.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheRead {
    /// A locally applied value awaiting confirmation
    Speculative(Value),
    /// The last server-confirmed value
    Authoritative(Value),
    /// No value known for this key
    Unknown,
}

impl CacheRead {
    /// The carried value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            CacheRead::Speculative(value) | CacheRead::Authoritative(value) => Some(value),
            CacheRead::Unknown => None,
        }
    }

    /// True for a speculative read
    pub fn is_speculative(&self) -> bool {
        matches!(self, CacheRead::Speculative(_))
    }

    /// True when no value is known
    pub fn is_unknown(&self) -> bool {
        matches!(self, CacheRead::Unknown)
    }
}

/// Overlay of speculative values on authoritative values
#[derive(Debug)]
pub struct OptimisticUpdateCache {
    speculative: RwLock<HashMap<String, SpeculativeEntry>>,
    authoritative: RwLock<HashMap<String, Value>>,
    metrics: Arc<MetricsRegistry>,
}

impl OptimisticUpdateCache {
    /// Create an empty cache
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            speculative: RwLock::new(HashMap::new()),
            authoritative: RwLock::new(HashMap::new()),
            metrics,
        }
    }

    /// Record a speculative value for `key`
    ///
    /// Overwrites any unresolved speculative entry for the same key;
    /// rapid repeated edits keep only the latest intent.
    pub fn apply(&self, key: impl Into<String>, value: Value) {
        let key = key.into();

        if let Ok(mut speculative) = self.speculative.write() {
            speculative.insert(
                key.clone(),
                SpeculativeEntry {
                    value,
                    created_at: Utc::now(),
                },
            );
        }

        Logger::event(Event::CacheApplied, &[("key", &key)]);
    }

    /// Promote `key` to the server-confirmed value
    ///
    /// Removes the speculative entry if one is still present; tolerates
    /// its absence, since a rollback may already have discarded it while
    /// the action stayed queued for retry.
    pub fn resolve(&self, key: &str, server_value: Value) {
        if let Ok(mut speculative) = self.speculative.write() {
            speculative.remove(key);
        }
        if let Ok(mut authoritative) = self.authoritative.write() {
            authoritative.insert(key.to_string(), server_value);
        }

        Logger::event(Event::CacheResolved, &[("key", key)]);
    }

    /// Discard the speculative entry for `key`, if any
    ///
    /// The authoritative value is untouched, so `read` reverts to the
    /// last server-confirmed state. Returns true if an entry was
    /// discarded.
    pub fn rollback(&self, key: &str) -> bool {
        let removed = self
            .speculative
            .write()
            .map(|mut speculative| speculative.remove(key).is_some())
            .unwrap_or(false);

        if removed {
            self.metrics.increment_rollbacks();
            Logger::event(Event::CacheRolledBack, &[("key", key)]);
        }

        removed
    }

    /// Absorb an authoritative value pushed by the change feed
    ///
    /// Stores into the authoritative layer only. A pending speculative
    /// entry keeps read precedence; the absorbed value becomes visible
    /// once the entry resolves or rolls back.
    pub fn absorb(&self, key: impl Into<String>, server_value: Value) {
        if let Ok(mut authoritative) = self.authoritative.write() {
            authoritative.insert(key.into(), server_value);
        }
    }

    /// Read the current value for `key`
    pub fn read(&self, key: &str) -> CacheRead {
        if let Ok(speculative) = self.speculative.read() {
            if let Some(entry) = speculative.get(key) {
                return CacheRead::Speculative(entry.value.clone());
            }
        }

        if let Ok(authoritative) = self.authoritative.read() {
            if let Some(value) = authoritative.get(key) {
                return CacheRead::Authoritative(value.clone());
            }
        }

        CacheRead::Unknown
    }

    /// True if `key` holds an unresolved speculative entry
    pub fn has_speculative(&self, key: &str) -> bool {
        self.speculative
            .read()
            .map(|speculative| speculative.contains_key(key))
            .unwrap_or(false)
    }

    /// When the speculative entry for `key` was applied, if one exists
    pub fn speculative_age(&self, key: &str) -> Option<DateTime<Utc>> {
        self.speculative
            .read()
            .ok()?
            .get(key)
            .map(|entry| entry.created_at)
    }

    /// Number of unresolved speculative entries
    pub fn speculative_len(&self) -> usize {
        self.speculative.read().map(|s| s.len()).unwrap_or(0)
    }
}
