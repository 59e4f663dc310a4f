//! # TtlMap
//!
//! Concurrency-safe key→value store where every entry carries its own
//! expiration.
//!
//! - Reads expire lazily: a lookup that finds a lapsed entry removes it.
//! - [`TtlMap::sweep`] removes every lapsed entry, for keys that are never
//!   looked up again.
//! - Backed by [`DashMap`], so each operation holds a shard lock only for
//!   the duration of the map call and never across an `.await`.
//!
//! An entry is live while `now <= expires_at`.

use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::Clock;

#[derive(Debug, Clone)]
struct Expiring<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> Expiring<V> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

pub struct TtlMap<K, V> {
    entries: DashMap<K, Expiring<V>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the live value for `key`, dropping it if it has lapsed.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Re-check under the write lock: a concurrent insert may have
        // refreshed the entry since the read above.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Inserts or replaces the entry for `key`.
    pub fn insert(&self, key: K, value: V, expires_at: DateTime<Utc>) {
        self.entries.insert(key, Expiring { value, expires_at });
    }

    /// Inserts unless a live entry exists for which `keep` returns true.
    ///
    /// The check and the write happen under one shard lock. Returns whether
    /// the value was written.
    pub fn insert_unless<F>(&self, key: K, value: V, expires_at: DateTime<Utc>, keep: F) -> bool
    where
        F: FnOnce(&V) -> bool,
    {
        let now = self.clock.now();
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if !current.is_expired(now) && keep(&current.value) {
                    return false;
                }
                occupied.insert(Expiring { value, expires_at });
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Expiring { value, expires_at });
                true
            }
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }

    /// Removes every lapsed entry and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = !entry.is_expired(now);
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Live values matching `predicate`. Lapsed entries are skipped, not removed.
    pub fn values_where<P>(&self, mut predicate: P) -> Vec<V>
    where
        P: FnMut(&V) -> bool,
    {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now) && predicate(&entry.value))
            .map(|entry| entry.value.clone())
            .collect()
    }

    /// Number of stored entries, lapsed ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use domains::ManualClock;

    use super::*;

    fn map_with_clock() -> (TtlMap<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        (TtlMap::new(clock.clone()), clock)
    }

    #[test]
    fn get_returns_live_value_until_expiration_inclusive() {
        let (map, clock) = map_with_clock();
        let expires = clock.now() + TimeDelta::seconds(10);
        map.insert("a".to_string(), 1, expires);

        clock.advance(TimeDelta::seconds(10));
        assert_eq!(map.get(&"a".to_string()), Some(1));

        clock.advance(TimeDelta::microseconds(1));
        assert_eq!(map.get(&"a".to_string()), None);
    }

    #[test]
    fn expired_read_removes_the_entry() {
        let (map, clock) = map_with_clock();
        map.insert("a".to_string(), 1, clock.now() + TimeDelta::seconds(1));
        assert_eq!(map.len(), 1);

        clock.advance(TimeDelta::seconds(2));
        assert_eq!(map.get(&"a".to_string()), None);
        assert!(map.is_empty());
    }

    #[test]
    fn sweep_drops_only_lapsed_entries() {
        let (map, clock) = map_with_clock();
        let now = clock.now();
        map.insert("short".to_string(), 1, now + TimeDelta::seconds(5));
        map.insert("long".to_string(), 2, now + TimeDelta::seconds(60));
        map.insert("gone".to_string(), 3, now + TimeDelta::seconds(1));

        clock.advance(TimeDelta::seconds(10));
        assert_eq!(map.sweep(), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&"long".to_string()), Some(2));
    }

    #[test]
    fn insert_unless_respects_keep_for_live_entries() {
        let (map, clock) = map_with_clock();
        let now = clock.now();
        assert!(map.insert_unless("k".to_string(), 1, now + TimeDelta::seconds(5), |_| true));
        assert!(!map.insert_unless("k".to_string(), 2, now + TimeDelta::seconds(5), |_| true));
        assert_eq!(map.get(&"k".to_string()), Some(1));

        assert!(map.insert_unless("k".to_string(), 3, now + TimeDelta::seconds(5), |v| *v > 1));
        assert_eq!(map.get(&"k".to_string()), Some(3));
    }

    #[test]
    fn insert_unless_overwrites_lapsed_entries() {
        let (map, clock) = map_with_clock();
        map.insert("k".to_string(), 1, clock.now() + TimeDelta::seconds(1));
        clock.advance(TimeDelta::seconds(2));

        let expires = clock.now() + TimeDelta::seconds(1);
        assert!(map.insert_unless("k".to_string(), 2, expires, |_| true));
        assert_eq!(map.get(&"k".to_string()), Some(2));
    }

    #[test]
    fn values_where_filters_live_entries() {
        let (map, clock) = map_with_clock();
        let now = clock.now();
        map.insert("a".to_string(), 1, now + TimeDelta::seconds(5));
        map.insert("b".to_string(), 2, now + TimeDelta::seconds(5));
        map.insert("c".to_string(), 2, now - TimeDelta::seconds(5));

        assert_eq!(map.values_where(|v| *v == 2), vec![2]);
    }
}
