//! Fan-in Collectors
//!
//! A per-element combinator schedules one unit of work per input element.
//! Each unit reports its result to a shared collector, and exactly one of
//! them, the one delivering the last contribution, learns that the
//! collection is complete and publishes it.
//!
//! # Variants
//!
//! - [`FixedSizeCollector`]: every contribution targets a known index.
//! - [`AppendCollector`]: each index is either accepted or skipped; only
//!   accepted values end up in the result, in index order.
//! - [`CountingCollector`]: exactly `N` anonymous contributions, kept in
//!   the order their slots were reserved. Under contention this need not be
//!   the order in which the contributions completed.
//!
//! Completion is detected with a single atomic increment per contribution,
//! never by scanning the slots, so the "last one" is decided exactly once even
//! when contributions finish simultaneously on different threads.
//!
//! Misuse (an index out of range, an index filled twice, more contributions
//! than capacity, finishing early or twice) is a bug in the caller and panics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::view::VectorView;

/// Counts contributions and reports the one that reaches capacity.
#[derive(Debug)]
struct Tally {
    count: AtomicUsize,
    capacity: usize,
}

impl Tally {
    fn new(capacity: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Record one contribution. Returns `true` for the contribution that
    /// completes the tally.
    fn arrive(&self) -> bool {
        // AcqRel makes every earlier slot write visible to the completing thread.
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(
            count <= self.capacity,
            "collector of capacity {} received {} contributions",
            self.capacity,
            count
        );
        count == self.capacity
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    fn is_complete(&self) -> bool {
        self.count() == self.capacity
    }
}

/// Write-once storage cells, drained once at completion.
#[derive(Debug)]
struct Slots<T> {
    cells: Box<[Mutex<Option<T>>]>,
    drained: AtomicBool,
}

impl<T> Slots<T> {
    fn new(capacity: usize) -> Self {
        Self {
            cells: (0..capacity).map(|_| Mutex::new(None)).collect(),
            drained: AtomicBool::new(false),
        }
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    fn put(&self, index: usize, value: T) {
        assert!(
            index < self.cells.len(),
            "index {} out of range for collector of capacity {}",
            index,
            self.cells.len()
        );
        let mut cell = self.cells[index].lock();
        assert!(cell.is_none(), "index {} constructed twice", index);
        *cell = Some(value);
    }

    fn drain(&self) -> Vec<T> {
        assert!(
            !self.drained.swap(true, Ordering::AcqRel),
            "collector finished twice"
        );
        self.cells.iter().filter_map(|cell| cell.lock().take()).collect()
    }
}

/// Collects exactly one value per index in `0..capacity`.
#[derive(Debug)]
pub struct FixedSizeCollector<T> {
    slots: Slots<T>,
    tally: Tally,
}

impl<T> FixedSizeCollector<T> {
    /// Create a collector expecting `capacity` contributions.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Slots::new(capacity),
            tally: Tally::new(capacity),
        }
    }

    /// Number of expected contributions.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of contributions received so far.
    pub fn size(&self) -> usize {
        self.tally.count()
    }

    /// Whether every index has been constructed.
    pub fn is_complete(&self) -> bool {
        self.tally.is_complete()
    }

    /// Store `value` at `index`.
    ///
    /// Returns `true` if this call completed the collection.
    pub fn construct(&self, index: usize, value: T) -> bool {
        self.slots.put(index, value);
        self.tally.arrive()
    }

    /// Move the collected values out, in index order.
    ///
    /// # Panics
    ///
    /// Panics if the collection is not complete or was already finished.
    pub fn finish(&self) -> VectorView<T> {
        assert!(
            self.is_complete(),
            "collector finished with {} of {} values",
            self.size(),
            self.capacity()
        );
        self.slots.drain().into()
    }
}

/// Collects an accept-or-skip decision for each of `capacity` indices.
#[derive(Debug)]
pub struct AppendCollector<T> {
    slots: Slots<T>,
    accepted: AtomicUsize,
    decisions: Tally,
}

impl<T> AppendCollector<T> {
    /// Create a collector expecting `capacity` decisions.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Slots::new(capacity),
            accepted: AtomicUsize::new(0),
            decisions: Tally::new(capacity),
        }
    }

    /// Number of expected decisions.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of accepted values so far.
    pub fn size(&self) -> usize {
        self.accepted.load(Ordering::Acquire)
    }

    /// Whether every decision has been made.
    pub fn is_complete(&self) -> bool {
        self.decisions.is_complete()
    }

    /// Accept `value` for the input at `index`.
    ///
    /// Returns `true` if this call made the last decision.
    pub fn construct(&self, index: usize, value: T) -> bool {
        self.slots.put(index, value);
        self.accepted.fetch_add(1, Ordering::AcqRel);
        self.decisions.arrive()
    }

    /// Reject one input.
    ///
    /// Returns `true` if this call made the last decision.
    pub fn skip(&self) -> bool {
        self.decisions.arrive()
    }

    /// Move the accepted values out, ordered by their input index.
    ///
    /// # Panics
    ///
    /// Panics if decisions are still outstanding or the collector was
    /// already finished.
    pub fn finish(&self) -> VectorView<T> {
        assert!(
            self.is_complete(),
            "collector finished with {} of {} decisions",
            self.decisions.count(),
            self.capacity()
        );
        self.slots.drain().into()
    }
}

/// Collects exactly `capacity` values without indices.
#[derive(Debug)]
pub struct CountingCollector<T> {
    slots: Slots<T>,
    reserved: AtomicUsize,
    received: Tally,
}

impl<T> CountingCollector<T> {
    /// Create a collector expecting `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Slots::new(capacity),
            reserved: AtomicUsize::new(0),
            received: Tally::new(capacity),
        }
    }

    /// Number of expected values.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of values received so far.
    pub fn size(&self) -> usize {
        self.received.count()
    }

    /// Whether all values have been received.
    pub fn is_complete(&self) -> bool {
        self.received.is_complete()
    }

    /// Add a value.
    ///
    /// Returns `true` if this call delivered the last value.
    pub fn push(&self, value: T) -> bool {
        let index = self.reserved.fetch_add(1, Ordering::AcqRel);
        self.slots.put(index, value);
        self.received.arrive()
    }

    /// Move the values out in the order their slots were reserved.
    ///
    /// # Panics
    ///
    /// Panics if values are still outstanding or the collector was already
    /// finished.
    pub fn finish(&self) -> VectorView<T> {
        assert!(
            self.is_complete(),
            "collector finished with {} of {} values",
            self.size(),
            self.capacity()
        );
        self.slots.drain().into()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
