//! Bounded FIFO between the decode thread and the render thread.
//!
//! The producer blocks in `push` when the queue is full (backpressure is
//! what bounds decoder memory); the consumer only ever calls `try_pop`.
//! `stop` wakes every waiter and makes `push` refuse new items while
//! leaving already-queued items poppable; `reset` clears both the items
//! and the stop flag for reuse.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use kino_common::DecodedFrame;

/// Queue of decoded frames awaiting display.
pub type FrameQueue = BoundedQueue<DecodedFrame>;

struct Inner<T> {
    items: VecDeque<T>,
    stopped: bool,
}

/// Fixed-capacity blocking FIFO with cooperative shutdown.
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Capacity must be non-zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                stopped: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue `item`, blocking while the queue is full.
    ///
    /// Returns `false` without enqueueing once the queue is stopped, also
    /// when the stop arrives mid-wait.
    pub fn push(&self, item: T) -> bool {
        let mut inner = self.inner.lock();
        while inner.items.len() >= self.capacity && !inner.stopped {
            self.not_full.wait(&mut inner);
        }
        if inner.stopped {
            return false;
        }
        inner.items.push_back(item);
        self.not_empty.notify_one();
        true
    }

    /// Dequeue the oldest item, blocking while empty.
    ///
    /// Returns `None` only when the queue is stopped and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.items.is_empty() && !inner.stopped {
            self.not_empty.wait(&mut inner);
        }
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Dequeue the oldest item without ever blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Refuse further pushes and wake all waiters. Queued items stay
    /// available to `try_pop`/`pop` until `reset`.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Drop all items and clear the stop flag.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.items.clear();
        inner.stopped = false;
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ── Tests ────────────────────────────────────────────────────────────
