/*!
 * Segmented Append-Only Vector
 *
 * Grows by allocating fixed-capacity segments on demand. Segments are never
 * moved or freed while the vector lives, so a published element keeps its
 * address.
 *
 * # Slot Assignment
 *
 * Each `push_back` reserves its slot with a single `fetch_add` on the
 * reservation counter and uses the pre-increment value as its index. Two
 * writers can never be handed the same slot.
 *
 * # Segment Table
 *
 * The table of segment pointers is published through `ArcSwap`, so readers
 * and appenders whose segment already exists never lock. Only table growth
 * takes the growth mutex, copies the pointer list, and swaps in the new one.
 */

use super::stats::VectorStats;
use crate::core::config::VectorConfig;
use crate::core::errors::{ContainerError, ContainerResult};
use crate::core::sync::{Backoff, CachePadded};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

struct Slot<T> {
    ready: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity block of slots
struct Segment<T> {
    slots: Box<[Slot<T>]>,
    filled: AtomicUsize,
}

// Safety: each slot is written once by the thread that reserved it and only
// read after `ready` is published with Release ordering
unsafe impl<T: Send> Send for Segment<T> {}
unsafe impl<T: Send + Sync> Sync for Segment<T> {}

impl<T> Segment<T> {
    fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                ready: AtomicBool::new(false),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();

        Self {
            slots,
            filled: AtomicUsize::new(0),
        }
    }

    /// Write a reserved slot and publish it
    ///
    /// # Safety
    /// The caller must hold the unique reservation for `offset`.
    #[inline]
    unsafe fn write(&self, offset: usize, value: T) {
        let slot = &self.slots[offset];
        (*slot.value.get()).write(value);
        slot.ready.store(true, Ordering::Release);
        self.filled.fetch_add(1, Ordering::Relaxed);
    }

    /// Published value at `offset`, if its write has completed
    #[inline]
    fn read(&self, offset: usize) -> Option<&T> {
        let slot = &self.slots[offset];
        if slot.ready.load(Ordering::Acquire) {
            // Safety: ready is only set after the value is fully written, and
            // a published slot is never written again
            Some(unsafe { (*slot.value.get()).assume_init_ref() })
        } else {
            None
        }
    }
}

impl<T> Drop for Segment<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if *slot.ready.get_mut() {
                // Safety: ready slots hold an initialized value, dropped once here
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

type SegmentTable<T> = Vec<Arc<Segment<T>>>;

/// Concurrent append-only vector
///
/// # Performance
///
/// - **push_back**: one `fetch_add` plus a lock-free table load; the growth
///   mutex is taken once per new segment
/// - **at**: lock-free table load plus an Acquire load of the slot flag
///
/// # Visibility
///
/// `len` counts completed writes, which finish out of order. A published
/// slot is always readable, so once `push_back` returns its element is
/// readable at the returned index even if `len` has not reached it yet. An
/// unpublished index below `len` belongs to a writer still in flight and is
/// waited for with a short backoff; anything else is out of range.
///
/// # Example
///
/// ```
/// use hcstl::SegmentedVector;
///
/// let vec = SegmentedVector::new();
/// vec.push_back(10);
/// vec.push_back(20);
/// assert_eq!(vec.at(1).unwrap(), 20);
/// assert!(vec.at(2).is_err());
/// ```
pub struct SegmentedVector<T> {
    segments: ArcSwap<SegmentTable<T>>,
    grow_lock: Mutex<()>,
    reserved: CachePadded<AtomicUsize>,
    len: CachePadded<AtomicUsize>,
    segment_capacity: usize,
}

impl<T> SegmentedVector<T> {
    /// Create an empty vector with 1024-slot segments
    pub fn new() -> Self {
        Self::build(VectorConfig::default().segment_capacity)
    }

    pub fn with_segment_capacity(segment_capacity: usize) -> ContainerResult<Self> {
        Self::with_config(VectorConfig::with_segment_capacity(segment_capacity))
    }

    pub fn with_config(config: VectorConfig) -> ContainerResult<Self> {
        config.validate()?;
        Ok(Self::build(config.segment_capacity))
    }

    fn build(segment_capacity: usize) -> Self {
        debug!(segment_capacity, "SegmentedVector created");
        Self {
            segments: ArcSwap::from_pointee(Vec::new()),
            grow_lock: Mutex::new(()),
            reserved: CachePadded::new(AtomicUsize::new(0)),
            len: CachePadded::new(AtomicUsize::new(0)),
            segment_capacity,
        }
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        (index / self.segment_capacity, index % self.segment_capacity)
    }

    /// Append a value, returning the index it was stored at
    pub fn push_back(&self, value: T) -> usize {
        let index = self.reserved.fetch_add(1, Ordering::Relaxed);
        let (seg, offset) = self.locate(index);

        let segment = self.segment(seg);
        // Safety: the fetch_add above handed this index to us alone
        unsafe { segment.write(offset, value) };

        self.len.fetch_add(1, Ordering::Release);
        index
    }

    /// Segment `seg`, allocating it and any gap before it if needed
    fn segment(&self, seg: usize) -> Arc<Segment<T>> {
        if let Some(segment) = self.segments.load().get(seg) {
            return Arc::clone(segment);
        }
        self.grow(seg)
    }

    fn grow(&self, seg: usize) -> Arc<Segment<T>> {
        let _growth = self.grow_lock.lock();

        let current = self.segments.load_full();
        if let Some(segment) = current.get(seg) {
            // Another appender grew the table while we waited
            return Arc::clone(segment);
        }

        let mut table: SegmentTable<T> = Vec::with_capacity(seg + 1);
        table.extend(current.iter().cloned());
        while table.len() <= seg {
            table.push(Arc::new(Segment::new(self.segment_capacity)));
        }
        let segment = Arc::clone(&table[seg]);

        trace!(segment = seg, table_len = table.len(), "Segment table grown");
        self.segments.store(Arc::new(table));
        segment
    }

    /// Clone of the element at `index`
    ///
    /// Fails with [`ContainerError::IndexOutOfRange`] when the slot is not
    /// published and `index >= len()`.
    pub fn at(&self, index: usize) -> ContainerResult<T>
    where
        T: Clone,
    {
        self.with_element(index, T::clone)
    }

    /// Clone of the element at `index`, or `None` when out of range
    pub fn get(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.at(index).ok()
    }

    /// Run `f` on the element at `index` without cloning it
    pub fn with_element<F, R>(&self, index: usize, f: F) -> ContainerResult<R>
    where
        F: FnOnce(&T) -> R,
    {
        let (seg, offset) = self.locate(index);
        let mut backoff = Backoff::new();
        loop {
            // A published slot is readable even while len lags behind it
            let table = self.segments.load();
            if let Some(value) = table.get(seg).and_then(|segment| segment.read(offset)) {
                return Ok(f(value));
            }
            drop(table);

            let len = self.len();
            if index >= len {
                return Err(ContainerError::IndexOutOfRange { index, len });
            }
            // index < len <= reserved: the owning writer is mid-write
            backoff.snooze();
        }
    }

    /// Completed writes
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    /// Number of allocated segments
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.segments.load().len()
    }

    /// Allocated slots across all segments
    #[inline]
    pub fn capacity(&self) -> usize {
        self.segment_count() * self.segment_capacity
    }

    pub fn stats(&self) -> VectorStats {
        let table = self.segments.load();
        VectorStats {
            len: self.len(),
            reserved: self.reserved.load(Ordering::Relaxed),
            segment_count: table.len(),
            segment_capacity: self.segment_capacity,
            filled: table
                .iter()
                .map(|segment| segment.filled.load(Ordering::Relaxed))
                .sum(),
        }
    }
}

impl<T> Default for SegmentedVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SegmentedVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedVector")
            .field("len", &self.len())
            .field("segment_capacity", &self.segment_capacity)
            .field("segment_count", &self.segment_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let vec = SegmentedVector::new();
        assert!(vec.is_empty());
        assert_eq!(vec.len(), 0);

        assert_eq!(vec.push_back(1), 0);
        assert!(!vec.is_empty());
        assert_eq!(vec.len(), 1);
        assert_eq!(vec.at(0).unwrap(), 1);
    }

    #[test]
    fn test_out_of_range() {
        let vec = SegmentedVector::new();
        assert_eq!(
            vec.at(0),
            Err(ContainerError::IndexOutOfRange { index: 0, len: 0 })
        );

        vec.push_back("x");
        assert_eq!(
            vec.at(1),
            Err(ContainerError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert_eq!(vec.get(1), None);
        assert_eq!(vec.get(0), Some("x"));
    }

    #[test]
    fn test_crosses_segments() {
        let vec = SegmentedVector::with_segment_capacity(4).unwrap();
        for i in 0..10 {
            vec.push_back(i);
        }
        assert_eq!(vec.segment_count(), 3);
        assert_eq!(vec.capacity(), 12);
        for i in 0..10 {
            assert_eq!(vec.at(i).unwrap(), i);
        }

        let stats = vec.stats();
        assert_eq!(stats.len, 10);
        assert_eq!(stats.reserved, 10);
        assert_eq!(stats.filled, 10);
    }

    #[test]
    fn test_invalid_segment_capacity() {
        assert!(matches!(
            SegmentedVector::<u8>::with_segment_capacity(0),
            Err(ContainerError::InvalidSegmentCapacity(0))
        ));
    }

    #[test]
    fn test_with_element() {
        let vec = SegmentedVector::new();
        vec.push_back(vec![1, 2, 3]);
        assert_eq!(vec.with_element(0, |v| v.len()), Ok(3));
        assert!(vec.with_element(1, |v| v.len()).is_err());
    }

    #[test]
    fn test_element_address_is_stable() {
        let vec = SegmentedVector::with_segment_capacity(2).unwrap();
        vec.push_back(7u64);
        let before = vec.with_element(0, |v| v as *const u64 as usize).unwrap();
        for i in 0..100 {
            vec.push_back(i);
        }
        let after = vec.with_element(0, |v| v as *const u64 as usize).unwrap();
        assert_eq!(before, after);
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_drop_releases_each_element_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let vec = SegmentedVector::with_segment_capacity(3).unwrap();
            for _ in 0..7 {
                vec.push_back(DropCounter(drops.clone()));
            }
            assert_eq!(drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_concurrent_push_back() {
        let vec = Arc::new(SegmentedVector::with_segment_capacity(64).unwrap());
        let mut handles = vec![];

        for t in 0..4 {
            let vec = vec.clone();
            handles.push(thread::spawn(move || {
                for j in 0..1000 {
                    vec.push_back(t * 1000 + j);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(vec.len(), 4000);
        let mut values: Vec<_> = (0..4000).map(|i| vec.at(i).unwrap()).collect();
        values.sort_unstable();
        assert_eq!(values, (0..4000).collect::<Vec<_>>());
    }

    #[test]
    fn test_returned_index_reads_back() {
        // Tiny segments force frequent growth, so writes finish out of order
        let vec = Arc::new(SegmentedVector::with_segment_capacity(3).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let vec = vec.clone();
                thread::spawn(move || {
                    for j in 0..2000u32 {
                        let value = t * 10_000 + j;
                        let index = vec.push_back(value);
                        assert_eq!(vec.at(index).unwrap(), value);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(vec.len(), 16_000);
    }

    #[test]
    fn test_published_slot_ahead_of_len() {
        let vec = SegmentedVector::with_segment_capacity(4).unwrap();
        vec.push_back(1);
        // Reserve index 1 without completing it, then publish index 2
        vec.reserved.fetch_add(1, Ordering::Relaxed);
        let index = vec.push_back(3);
        assert_eq!(index, 2);
        assert_eq!(vec.len(), 2);

        assert_eq!(vec.at(2).unwrap(), 3);
        assert_eq!(
            vec.at(3),
            Err(ContainerError::IndexOutOfRange { index: 3, len: 2 })
        );
    }
}
