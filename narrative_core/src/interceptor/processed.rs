//! Processed set - remembers which play log entries were already handled.
//!
//! Bounded both ways: identities expire after a TTL, and once the set is full
//! the oldest identity is dropped to make room.

use parking_lot::Mutex;
use sim_world::EventId;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::settings::DedupSettings;

#[derive(Debug, Default)]
struct Inner {
    marked_at: HashMap<EventId, Instant>,
    /// Insertion order, oldest first. Mirrors `marked_at` exactly.
    order: VecDeque<(EventId, Instant)>,
}

impl Inner {
    fn evict_expired(&mut self, now: Instant, ttl: Duration) {
        while let Some(&(id, at)) = self.order.front() {
            if now.saturating_duration_since(at) < ttl {
                break;
            }
            self.order.pop_front();
            self.marked_at.remove(&id);
        }
    }

    fn evict_oldest(&mut self) {
        if let Some((id, _)) = self.order.pop_front() {
            self.marked_at.remove(&id);
        }
    }
}

/// Thread-safe set of handled event identities.
#[derive(Debug)]
pub struct ProcessedSet {
    inner: Mutex<Inner>,
    capacity: usize,
    ttl: Duration,
}

impl ProcessedSet {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn from_settings(settings: &DedupSettings) -> Self {
        Self::new(settings.capacity, settings.ttl())
    }

    /// Mark an event as handled.
    ///
    /// Returns true if this call marked it, false if it was already marked.
    /// Check and insert happen under one lock.
    pub fn try_mark(&self, id: EventId) -> bool {
        self.try_mark_at(id, Instant::now())
    }

    /// Check whether an event is currently marked.
    pub fn contains(&self, id: EventId) -> bool {
        let mut inner = self.inner.lock();
        inner.evict_expired(Instant::now(), self.ttl);
        inner.marked_at.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().marked_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn try_mark_at(&self, id: EventId, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        inner.evict_expired(now, self.ttl);

        if inner.marked_at.contains_key(&id) {
            return false;
        }

        while inner.marked_at.len() >= self.capacity {
            inner.evict_oldest();
        }

        inner.marked_at.insert(id, now);
        inner.order.push_back((id, now));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_mark_once() {
        let set = ProcessedSet::new(16, Duration::from_secs(60));
        let id = EventId::new();

        assert!(set.try_mark(id));
        assert!(!set.try_mark(id));
        assert!(set.contains(id));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let set = ProcessedSet::new(2, Duration::from_secs(60));
        let first = EventId::new();
        let second = EventId::new();
        let third = EventId::new();

        assert!(set.try_mark(first));
        assert!(set.try_mark(second));
        assert!(set.try_mark(third));

        assert_eq!(set.len(), 2);
        assert!(!set.contains(first));
        assert!(set.contains(second));
        assert!(set.contains(third));
    }

    #[test]
    fn test_ttl_expiry() {
        let set = ProcessedSet::new(16, Duration::from_secs(10));
        let id = EventId::new();
        let start = Instant::now();

        assert!(set.try_mark_at(id, start));
        assert!(!set.try_mark_at(id, start + Duration::from_secs(9)));
        // Expired identities may be marked again.
        assert!(set.try_mark_at(id, start + Duration::from_secs(11)));
    }

    #[test]
    fn test_expiry_keeps_fresh_entries() {
        let set = ProcessedSet::new(16, Duration::from_secs(10));
        let old = EventId::new();
        let fresh = EventId::new();
        let start = Instant::now();

        set.try_mark_at(old, start);
        set.try_mark_at(fresh, start + Duration::from_secs(8));
        set.try_mark_at(EventId::new(), start + Duration::from_secs(12));

        assert_eq!(set.len(), 2);
        assert!(!set.try_mark_at(fresh, start + Duration::from_secs(12)));
    }

    #[test]
    fn test_concurrent_marking() {
        let set = Arc::new(ProcessedSet::new(1024, Duration::from_secs(60)));
        let ids: Vec<EventId> = (0..100).map(|_| EventId::new()).collect();

        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let set = Arc::clone(&set);
                    let ids = &ids;
                    scope.spawn(move || ids.iter().filter(|id| set.try_mark(**id)).count())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(wins, 100);
        assert_eq!(set.len(), 100);
    }
}
