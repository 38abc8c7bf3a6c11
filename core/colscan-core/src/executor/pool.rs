//! Reuse pool for query-scoped objects.
//!
//! Objects are reset when they are returned, never when they are handed out, so
//! nothing from one query is observable by the next acquirer.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// An object that can be returned to a [`ObjectPool`].
pub trait Poolable: Default + Send {
    /// Restore the zero state. Retained buffers must be scrubbed, not just truncated.
    fn reset(&mut self);
}

/// Counters describing pool effectiveness.
#[derive(Debug, Default)]
pub struct PoolStats {
    acquired: AtomicU64,
    reused: AtomicU64,
    returned: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    pub acquired: u64,
    pub reused: u64,
    pub returned: u64,
    /// Returned objects discarded because the pool was full
    pub dropped: u64,
}

impl PoolStats {
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            returned: self.returned.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// 객체 풀 — bounded free list of boxed objects.
pub struct ObjectPool<T: Poolable> {
    free: Mutex<Vec<Box<T>>>,
    capacity: usize,
    stats: PoolStats,
}

impl<T: Poolable> ObjectPool<T> {
    /// Pool retaining at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Take an idle object, or allocate a fresh one when the pool is empty.
    pub fn acquire(&self) -> Box<T> {
        self.stats.acquired.fetch_add(1, Ordering::Relaxed);
        match self.free.lock().pop() {
            Some(obj) => {
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                obj
            }
            None => Box::default(),
        }
    }

    /// Reset `obj` and keep it for reuse if there is room.
    pub fn release(&self, mut obj: Box<T>) {
        obj.reset();
        self.stats.returned.fetch_add(1, Ordering::Relaxed);
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(obj);
        } else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStatsSnapshot {
        self.stats.snapshot()
    }
}
