//! Matching-users counts kept for display
//!
//! Entries expire after the configured TTL and are dropped whenever a rule
//! is saved, toggled, deleted or re-evaluated.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheEntry {
    count: usize,
    stored_at: i64,
}

#[derive(Debug, Clone)]
pub struct MatchingCache {
    ttl_secs: i64,
    entries: HashMap<i64, CacheEntry>,
}

impl MatchingCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            entries: HashMap::new(),
        }
    }

    /// Cached count for a rule, if stored less than TTL seconds before `now`
    pub fn get(&self, rule_id: i64, now: i64) -> Option<usize> {
        let entry = self.entries.get(&rule_id)?;
        (now.saturating_sub(entry.stored_at) < self.ttl_secs).then_some(entry.count)
    }

    pub fn store(&mut self, rule_id: i64, count: usize, now: i64) {
        if self.ttl_secs == 0 {
            return;
        }
        self.entries.insert(
            rule_id,
            CacheEntry {
                count,
                stored_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, rule_id: i64) {
        self.entries.remove(&rule_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
