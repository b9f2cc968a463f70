//! Bounded drop-oldest queue between the network receiver and dispatch
//!
//! Pushing never blocks: when the queue is full the oldest entry is evicted
//! so the newest frame is always admitted. Stale frames are worthless for a
//! live visual stream, so freshness wins over completeness.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded FIFO with drop-oldest backpressure and blocking pop
#[derive(Debug)]
pub struct IngressQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
    capacity: usize,
    dropped: AtomicU64,
}

impl<T> IngressQueue<T> {
    /// Create a queue holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    /// Admit an entry, returning the evicted oldest entry if the queue was full
    ///
    /// Entries pushed after [`IngressQueue::close`] are handed straight back.
    pub fn push(&self, item: T) -> Option<T> {
        let mut inner = self.lock();
        if inner.closed {
            return Some(item);
        }

        let evicted = if inner.items.len() == self.capacity {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            inner.items.pop_front()
        } else {
            None
        };

        inner.items.push_back(item);
        drop(inner);
        self.available.notify_one();
        evicted
    }

    /// Block until an entry is available; `None` once closed and drained
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Wait at most `timeout` for an entry
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if let Some(item) = inner.items.pop_front() {
                return Some(item);
            }
            if inner.closed {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            inner = guard;
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<T> {
        self.lock().items.pop_front()
    }

    /// Close the queue and wake every waiter
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Whether [`IngressQueue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Entries currently queued
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total entries evicted by drop-oldest
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
