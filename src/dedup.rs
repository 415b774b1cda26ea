// src/dedup.rs
//! Process-lifetime dedup of stored post ids.
//!
//! One cache instance is built at startup and shared by every symbol task
//! in a cycle. Bounded: once the cap is reached the oldest ids fall out, so
//! a long-running process cannot grow the set without limit.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

pub const DEFAULT_DEDUP_CAPACITY: usize = 100_000;

#[derive(Debug)]
pub struct DedupCache {
    inner: Mutex<Inner>,
    cap: usize,
}

#[derive(Debug)]
struct Inner {
    seen: HashSet<String>,
    // Nejstarší záznamy odcházejí první.
    order: VecDeque<String>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupCache {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(Inner {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
            cap,
        }
    }

    pub fn seen(&self, id: &str) -> bool {
        let inner = self.inner.lock().expect("dedup mutex poisoned");
        inner.seen.contains(id)
    }

    /// Atomic check-and-mark. Returns `true` when the id is new; `false`
    /// means a concurrent or earlier caller already claimed it.
    pub fn mark_seen(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("dedup mutex poisoned");
        if !inner.seen.insert(id.to_string()) {
            return false;
        }
        inner.order.push_back(id.to_string());
        while inner.order.len() > self.cap {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        true
    }

    /// Ids currently tracked; reported as `processed_posts` in stats.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("dedup mutex poisoned");
        inner.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }
}
