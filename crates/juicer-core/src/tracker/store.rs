use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

use crate::status::normalize;

/// Tracked state of one status-bearing element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    /// Last normalized status observed (empty before the first read)
    pub last_status: String,
    /// Whether the settling window has elapsed
    pub armed: bool,
    /// Time after which the entity may fire, once armed
    pub arm_at: Option<Instant>,
}

/// Result of feeding one read into the tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Whether the normalized status differs from the stored one
    pub changed: bool,
    /// Stored status before this read
    pub previous: String,
    /// Normalized status of this read
    pub current: String,
}

/// Last-known status and arming state per entity identity
#[derive(Debug)]
pub struct EntityTracker<K> {
    records: HashMap<K, EntityRecord>,
}

impl<K> Default for EntityTracker<K> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<K> EntityTracker<K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare a read against the stored status and store it unconditionally
    ///
    /// Unknown identities start from a fresh, unarmed record with an empty
    /// status. Feeding the same text twice reports a change at most once.
    pub fn observe(&mut self, key: &K, raw: Option<&str>) -> Observation {
        let current = normalize(raw);
        let record = self
            .records
            .entry(key.clone())
            .or_default();
        let previous = std::mem::replace(&mut record.last_status, current.clone());
        Observation {
            changed: previous != current,
            previous,
            current,
        }
    }

    /// Start tracking an identity with its current read as the initial status
    ///
    /// Any previous record for the identity is replaced by a fresh, unarmed one.
    pub fn register(&mut self, key: K, raw: Option<&str>) -> &EntityRecord {
        let record = EntityRecord {
            last_status: normalize(raw),
            ..Default::default()
        };
        self.records.insert(key.clone(), record);
        &self.records[&key]
    }

    /// Record the arming deadline `now + delay` and return it
    ///
    /// The caller schedules [`mark_armed`](Self::mark_armed) for the deadline.
    /// Returns `None` for untracked identities.
    pub fn arm_later(&mut self, key: &K, delay: Duration, now: Instant) -> Option<Instant> {
        let record = self.records.get_mut(key)?;
        let deadline = now + delay;
        record.arm_at = Some(deadline);
        Some(deadline)
    }

    /// Flip the armed flag (the deadline still gates firing)
    pub fn mark_armed(&mut self, key: &K) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.armed = true;
                true
            }
            None => false,
        }
    }

    /// Drop every record whose identity is not in `seen`, returning how many went
    pub fn retain_seen(&mut self, seen: &HashSet<K>) -> usize {
        let before = self.records.len();
        self.records.retain(|k, _| seen.contains(k));
        before - self.records.len()
    }

    pub fn get(&self, key: &K) -> Option<&EntityRecord> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<EntityRecord> {
        self.records.remove(key)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
