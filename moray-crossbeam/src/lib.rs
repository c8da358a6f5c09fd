//! Baseline implementations of the moray collection seams.
//!
//! This crate provides the comparison surface for the lock-free containers in
//! `moray-core`:
//!
//! - [`LockingQueue`] / [`LockingStack`] - mutex-guarded controls
//! - [`SegmentedQueue`] - adaptor over `crossbeam_queue::SegQueue`, the
//!   ecosystem's production lock-free MPMC queue
//!
//! All of them implement [`ConcurrentQueue`]/[`ConcurrentStack`], so the
//! shared contract suites in `moray_core::common_tests` and the criterion
//! benches in `benches/` can drive every implementation interchangeably.

use std::collections::VecDeque;

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use moray_core::{ConcurrentQueue, ConcurrentStack};

/// FIFO control: a `VecDeque` behind a mutex.
pub struct LockingQueue<T> {
    inner: Mutex<VecDeque<T>>,
}

impl<T> LockingQueue<T> {
    pub fn new() -> Self {
        LockingQueue {
            inner: Mutex::new(VecDeque::new()),
        }
    }
}

impl<T> Default for LockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentQueue<T> for LockingQueue<T> {
    fn push(&self, value: T) {
        self.inner.lock().push_back(value);
    }

    fn pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// LIFO control: a `Vec` behind a mutex.
pub struct LockingStack<T> {
    inner: Mutex<Vec<T>>,
}

impl<T> LockingStack<T> {
    pub fn new() -> Self {
        LockingStack {
            inner: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Default for LockingStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for LockingStack<T> {
    fn push(&self, value: T) {
        self.inner.lock().push(value);
    }

    fn pop(&self) -> Option<T> {
        self.inner.lock().pop()
    }

    fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Adaptor giving `crossbeam_queue::SegQueue` the moray queue seam.
pub struct SegmentedQueue<T> {
    inner: SegQueue<T>,
}

impl<T> SegmentedQueue<T> {
    pub fn new() -> Self {
        SegmentedQueue {
            inner: SegQueue::new(),
        }
    }
}

impl<T> Default for SegmentedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentQueue<T> for SegmentedQueue<T> {
    fn push(&self, value: T) {
        self.inner.push(value);
    }

    fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
