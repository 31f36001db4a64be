/*!
 * Lock-Free MPMC Queue
 *
 * Unbounded Michael-Scott queue over an intrusive singly-linked list with a
 * permanent sentinel at the head. Every mutation is a retry loop around a
 * single CAS; no lock is ever taken.
 *
 * # Memory Reclamation
 *
 * A dequeued sentinel may still be read by a concurrent `push` or `try_pop`
 * that loaded it before the head moved. Nodes are therefore retired through
 * crossbeam-epoch and only freed once every thread pinned at the time of the
 * unlink has unpinned. This also rules out ABA on `head`/`tail`: an address
 * cannot be reused while any thread could still compare against it.
 */

use super::stats::QueueStats;
use crate::core::sync::{Backoff, CachePadded};
use crossbeam_epoch::{self as epoch, Atomic, Owned, Shared};
use std::fmt;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Queue node
///
/// `data` is uninitialized in the sentinel. A node becomes the sentinel when
/// `head` is swung onto it, at which point its value has been moved out.
struct Node<T> {
    data: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

/// Lock-free multi-producer multi-consumer FIFO queue
///
/// # Performance
///
/// - **push**: Lock-free, one allocation plus one successful CAS on `tail.next`
/// - **try_pop**: Lock-free, one successful CAS on `head`
/// - **len**: O(1) relaxed counter, may be momentarily stale
///
/// # Ordering
///
/// Values whose link CAS has completed are popped in link order. Concurrent
/// pushes are ordered by whichever CAS wins.
///
/// # Example
///
/// ```
/// use hcstl::LockFreeQueue;
///
/// let queue = LockFreeQueue::new();
/// queue.push(1);
/// queue.push(2);
/// assert_eq!(queue.try_pop(), Some(1));
/// assert_eq!(queue.try_pop(), Some(2));
/// assert_eq!(queue.try_pop(), None);
/// ```
pub struct LockFreeQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    len: CachePadded<AtomicUsize>,
    pushes: AtomicU64,
    pops: AtomicU64,
    _marker: PhantomData<T>,
}

// Safety: values are moved in by exactly one pusher and out by exactly one
// popper (the winner of the head CAS); they are never shared by reference.
unsafe impl<T: Send> Send for LockFreeQueue<T> {}
unsafe impl<T: Send> Sync for LockFreeQueue<T> {}

impl<T> LockFreeQueue<T> {
    /// Create an empty queue holding only the sentinel
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            len: CachePadded::new(AtomicUsize::new(0)),
            pushes: AtomicU64::new(0),
            pops: AtomicU64::new(0),
            _marker: PhantomData,
        };

        let sentinel = Owned::new(Node {
            data: MaybeUninit::uninit(),
            next: Atomic::null(),
        });

        // Safety: the queue is not shared yet, nothing can observe the sentinel
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = sentinel.into_shared(guard);
            queue.head.store(sentinel, Ordering::Relaxed);
            queue.tail.store(sentinel, Ordering::Relaxed);
        }

        queue
    }

    /// Append a value at the tail (lock-free, never fails)
    pub fn push(&self, value: T) {
        // Count before linking so a racing pop can never drive len below zero
        self.len.fetch_add(1, Ordering::Relaxed);

        let guard = &epoch::pin();
        let new = Owned::new(Node {
            data: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(guard);

        let mut backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // Safety: tail is never null and cannot be freed while we are pinned
            let tail_ref = unsafe { tail.deref() };
            let next = tail_ref.next.load(Ordering::Acquire, guard);

            if !next.is_null() {
                // Another pusher linked but has not swung tail yet; help it
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                continue;
            }

            if tail_ref
                .next
                .compare_exchange(
                    Shared::null(),
                    new,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                )
                .is_ok()
            {
                // Best effort: a failure means someone already helped
                let _ = self.tail.compare_exchange(
                    tail,
                    new,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                break;
            }

            backoff.spin();
        }

        self.pushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove the oldest value, or `None` if the queue is empty right now
    ///
    /// Never blocks, even while other threads are mid-push.
    pub fn try_pop(&self) -> Option<T> {
        let guard = &epoch::pin();
        let mut backoff = Backoff::new();

        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            // Safety: head is never null and cannot be freed while we are pinned
            let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

            if head == tail {
                if next.is_null() {
                    return None;
                }
                // Tail is lagging behind a completed link
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    Ordering::Release,
                    Ordering::Relaxed,
                    guard,
                );
                continue;
            }

            // Safety: head != tail means head has a successor
            let next_ref = match unsafe { next.as_ref() } {
                Some(node) => node,
                None => continue,
            };

            if self
                .head
                .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
                .is_ok()
            {
                // Safety: winning the head CAS grants exclusive ownership of
                // next's value; next is now the sentinel and its data is never
                // read again
                let value = unsafe { next_ref.data.assume_init_read() };
                // Safety: head is unreachable from the queue now
                unsafe { guard.defer_destroy(head) };

                self.len.fetch_sub(1, Ordering::Relaxed);
                self.pops.fetch_add(1, Ordering::Relaxed);
                return Some(value);
            }

            backoff.spin();
        }
    }

    /// Approximate number of queued values
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of queue counters
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            len: self.len(),
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
        }
    }
}

impl<T> Default for LockFreeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeQueue<T> {
    fn drop(&mut self) {
        // Safety: &mut self means no other thread holds a reference; retired
        // sentinels are owned by the epoch collector, not by this chain
        unsafe {
            let guard = epoch::unprotected();
            let mut node = self.head.load(Ordering::Relaxed, guard);
            let mut is_sentinel = true;

            while !node.is_null() {
                let mut owned = node.into_owned();
                node = owned.next.load(Ordering::Relaxed, guard);
                if !is_sentinel {
                    owned.data.assume_init_drop();
                }
                is_sentinel = false;
            }
        }
    }
}

impl<T> fmt::Debug for LockFreeQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
