use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data_structures::concurrent_collection::ConcurrentQueue;
use crate::data_structures::internal::{AtomicTaggedPtr, Linked, TaggedPtr, TreiberStack};

type NodePtr<T> = *mut QueueNode<T>;

///
/// Lock-free MPMC FIFO queue based on Michael and Scott's "Simple, Fast, and
/// Practical Non-Blocking and Blocking Concurrent Queue Algorithms", with all
/// nodes owned by a per-queue free pool.
///
// =============================================================================
// QUEUE STRUCTURE & INVARIANTS
// =============================================================================
//
// Chain Structure (FIFO, head side dequeues, tail side enqueues):
// ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
// │ SENT │───►│  v0  │───►│  v1  │───►│ NULL │
// │(head)│    │      │    │(tail)│    │      │
// └──────┘    └──────┘    └──────┘    └──────┘
//
// Every link (head, tail, node.next) is a tagged word; the tag is bumped on
// each successful CAS so a stale snapshot cannot win an ABA race against a
// recycled node.
//
// INVARIANTS:
// 1. head is never null; it refers to the sentinel whose value slot is
//    semantically absent and never observed by users
// 2. The first payload value is sentinel.next; the chain from head is acyclic,
//    finite, and reaches tail
// 3. tail refers to the last node OR lags it by exactly one link; any thread
//    that observes tail.next != null helps swing tail before proceeding
// 4. A node's value slot is written only while the node is private to one
//    thread (enqueue fill after pool pop); dequeuers read it non-destructively
// 5. capacity == free pool size + chain length including the sentinel, and
//    never decreases
//
// =============================================================================
// DEQUEUE & NODE RECYCLING
// =============================================================================
//
// A successful dequeue advances head by one link. The node the value was read
// from becomes the new sentinel; the OLD sentinel is retired to the free pool:
//
// Before:  SENT ───► v0 ───► v1        head = SENT
// After:   old  ···  SENT ───► v1      head = old SENT's successor,
//          │                           value v0 moved out to the caller
//          └──► free pool
//
// A thread still holding a snapshot of the old head may dereference it after
// the recycle - that stays safe because pool nodes are never returned to the
// allocator while the queue lives, and its subsequent CAS fails on the bumped
// tag.
//
// Dequeue copies the payload out BEFORE the head-advancing CAS. Together with
// enqueue filling the node before the linking CAS, every operation that can
// unwind (T's clone) runs while the visible queue state is untouched, which is
// what makes push/pop strongly failure safe.
//
struct QueueNode<T> {
    value: Option<T>,
    next: AtomicTaggedPtr<QueueNode<T>>,
}

impl<T> QueueNode<T> {
    fn vacant() -> Self {
        QueueNode {
            value: None,
            next: AtomicTaggedPtr::null(),
        }
    }
}

impl<T> Linked for QueueNode<T> {
    #[inline]
    fn next_link(&self) -> &AtomicTaggedPtr<Self> {
        &self.next
    }
}

pub struct Queue<T> {
    /// Total nodes owned: free + in-flight + sentinel. Monotone.
    capacity: AtomicUsize,
    /// The sentinel. head.next is the first payload node.
    head: AtomicTaggedPtr<QueueNode<T>>,
    /// The last node in the chain, or its predecessor while an enqueue is
    /// mid-flight.
    tail: AtomicTaggedPtr<QueueNode<T>>,
    /// Recycled nodes awaiting reuse.
    free: TreiberStack<QueueNode<T>>,
}

// The queue hands out values, never nodes; T travelling between threads is
// all that is required.
unsafe impl<T: Send> Send for Queue<T> {}
unsafe impl<T: Send> Sync for Queue<T> {}

impl<T> Queue<T> {
    pub const DEFAULT_INITIAL_CAPACITY: usize = 8192;

    /// Construct with the default initial capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_INITIAL_CAPACITY)
    }

    /// Construct with `initial_capacity` pre-allocated nodes.
    ///
    /// No further allocation happens until the number of values held at once
    /// exceeds the pre-allocated pool.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let queue = Queue {
            capacity: AtomicUsize::new(initial_capacity),
            head: AtomicTaggedPtr::null(),
            tail: AtomicTaggedPtr::null(),
            free: TreiberStack::new(),
        };

        // Provision the pool, then promote one node to the sentinel. With a
        // zero initial capacity the promotion itself grows the pool to one.
        //
        for _ in 0..initial_capacity {
            queue.free.push(Box::into_raw(Box::new(QueueNode::vacant())));
        }
        let sentinel = queue.alloc_node();
        // A pooled node's next still threads into the free chain; the
        // sentinel must start with no successor.
        //
        unsafe {
            (*sentinel).next.store(TaggedPtr::null());
        }
        queue.head.store(TaggedPtr::new(sentinel, 0));
        queue.tail.store(TaggedPtr::new(sentinel, 0));
        queue
    }

    // =========================================================================
    // Pooled-node strategy
    // =========================================================================

    /// Get a free node, growing capacity if the pool is exhausted.
    fn alloc_node(&self) -> NodePtr<T> {
        match self.free.pop() {
            Some(node) => node,
            None => {
                self.capacity.fetch_add(1, Ordering::Relaxed);
                Box::into_raw(Box::new(QueueNode::vacant()))
            }
        }
    }

    /// Release a node back to the pool for reuse.
    fn free_node(&self, node: NodePtr<T>) {
        debug_assert!(!node.is_null());
        self.free.push(node);
    }

    // =========================================================================
    // Public surface
    // =========================================================================

    /// Move a value onto the tail of the queue.
    pub fn push(&self, value: T) {
        let node = self.alloc_node();
        // The node is private until the linking CAS inside enqueue publishes
        // it; nothing on this path can unwind.
        //
        unsafe {
            (*node).value = Some(value);
            (*node).next.store(TaggedPtr::null());
        }
        self.enqueue(node);
    }

    /// Copy a value onto the tail of the queue.
    ///
    /// The clone runs before a node leaves the pool, so an unwinding clone
    /// leaves the queue exactly as it was.
    pub fn push_ref(&self, value: &T)
    where
        T: Clone,
    {
        self.push(value.clone());
    }

    /// Remove the value at the head of the queue, or `None` if empty.
    pub fn pop(&self) -> Option<T>
    where
        T: Clone,
    {
        self.dequeue()
    }

    /// Remove the value at the head of the queue into `out`.
    ///
    /// Returns `true` iff a value was assigned.
    pub fn pop_into(&self, out: &mut T) -> bool
    where
        T: Clone,
    {
        match self.dequeue() {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// `true` iff no values are available for dequeueing.
    ///
    /// A one-word-at-a-time snapshot; advisory under concurrent mutation.
    pub fn is_empty(&self) -> bool {
        self.head.load().ptr() == self.tail.load().ptr()
    }

    /// Total number of nodes ever allocated: free + in-flight + sentinel.
    /// Monotonically non-decreasing; may be stale.
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    // =========================================================================
    // Michael-Scott CAS loops
    // =========================================================================

    /// Link a filled node after the last node, then swing the tail.
    fn enqueue(&self, node: NodePtr<T>) {
        let tail = loop {
            let tail = self.tail.load();
            let next = unsafe { (*tail.ptr()).next.load() };

            // Verify the tail and tail.next reads are mutually consistent.
            //
            if tail != self.tail.load() {
                continue;
            }

            if next.is_null() {
                // Attempt to link the new node after the current last node.
                // This CAS is the linearization point of the enqueue.
                //
                let desired = TaggedPtr::new(node, next.tag() + 1);
                if unsafe { (*tail.ptr()).next.compare_exchange(next, desired) }.is_ok() {
                    break tail;
                }
            } else {
                // The tail has fallen behind; help it along before retrying.
                //
                let desired = TaggedPtr::new(next.ptr(), tail.tag() + 1);
                let _ = self.tail.compare_exchange(tail, desired);
            }
        };

        // Swing the tail to the linked node. A failure here is tolerated: the
        // next operation to observe the lag will help.
        //
        let desired = TaggedPtr::new(node, tail.tag() + 1);
        let _ = self.tail.compare_exchange(tail, desired);
    }

    fn dequeue(&self) -> Option<T>
    where
        T: Clone,
    {
        loop {
            // Read the state in an order allowing consistency verification.
            //
            let head = self.head.load();
            let tail = self.tail.load();
            let next = unsafe { (*head.ptr()).next.load() };

            if head != self.head.load() {
                continue;
            }

            if head.ptr() == tail.ptr() {
                if next.is_null() {
                    // No payload nodes.
                    //
                    return None;
                }
                // The tail has fallen behind a mid-flight enqueue; help it
                // along before retrying.
                //
                let desired = TaggedPtr::new(next.ptr(), tail.tag() + 1);
                let _ = self.tail.compare_exchange(tail, desired);
                continue;
            }

            // Read the first payload value before publishing the new head. If
            // the clone unwinds no CAS has happened and the queue state is
            // untouched. The read itself is non-destructive: the slot is only
            // ever written while its node is private to an enqueuer.
            //
            let value = unsafe { (*next.ptr()).value.clone() };
            let desired = TaggedPtr::new(next.ptr(), head.tag() + 1);
            if self.head.compare_exchange(head, desired).is_err() {
                continue;
            }

            // The old sentinel is garbage; its successor is the new sentinel.
            //
            self.free_node(head.ptr());
            debug_assert!(value.is_some());
            return value;
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Queue<T> {
    /// Destroying a non-empty queue is a precondition violation; fail fast
    /// rather than drain.
    fn drop(&mut self) {
        assert!(self.is_empty(), "queue dropped while non-empty");

        while let Some(node) = self.free.pop() {
            drop(unsafe { Box::from_raw(node) });
        }
        drop(unsafe { Box::from_raw(self.head.load().ptr()) });
    }
}

impl<T: Clone + Send> ConcurrentQueue<T> for Queue<T> {
    fn push(&self, value: T) {
        Queue::push(self, value)
    }

    fn pop(&self) -> Option<T> {
        Queue::pop(self)
    }

    fn is_empty(&self) -> bool {
        Queue::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_roundtrip() {
        let queue = Queue::new();
        assert!(queue.is_empty());

        queue.push(42usize);
        assert!(!queue.is_empty());

        assert_eq!(queue.pop(), Some(42));
        assert!(queue.is_empty());
    }

    #[test]
    fn values_come_back_in_insertion_order() {
        let queue = Queue::with_capacity(8);

        for id in 0..5usize {
            queue.push(id);
        }
        for id in 0..5usize {
            assert_eq!(queue.pop(), Some(id));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_on_empty_returns_none_and_leaves_state() {
        let queue: Queue<usize> = Queue::with_capacity(4);
        assert_eq!(queue.pop(), None);

        queue.push(1);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_into_assigns_output() {
        let queue = Queue::with_capacity(4);
        queue.push_ref(&7usize);

        let mut out = 0usize;
        assert!(queue.pop_into(&mut out));
        assert_eq!(out, 7);
        assert!(!queue.pop_into(&mut out));
        assert_eq!(out, 7);
    }

    #[test]
    fn capacity_grows_past_the_initial_pool() {
        let queue = Queue::with_capacity(4);
        assert_eq!(queue.capacity(), 4);

        for id in 0..16usize {
            queue.push(id);
        }
        assert!(queue.capacity() >= 16);

        for id in 0..16usize {
            assert_eq!(queue.pop(), Some(id));
        }

        // Growth is monotone; recycling does not shrink the pool.
        //
        assert!(queue.capacity() >= 16);
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_capacity_queue_still_works() {
        let queue = Queue::with_capacity(0);
        assert_eq!(queue.capacity(), 1);

        queue.push(9usize);
        assert_eq!(queue.pop(), Some(9));
        assert!(queue.is_empty());
    }

    #[test]
    fn construct_then_drop_empty_is_a_noop() {
        let queue: Queue<String> = Queue::with_capacity(16);
        drop(queue);
    }

    #[test]
    fn recycles_nodes_without_growing() {
        let queue = Queue::with_capacity(8);
        for round in 0..100usize {
            queue.push(round);
            assert_eq!(queue.pop(), Some(round));
        }
        assert_eq!(queue.capacity(), 8);
    }
}
