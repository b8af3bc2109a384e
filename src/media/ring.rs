//! Single-producer, single-consumer frame hand-off.
//!
//! Every slot carries an atomic state:
//!
//! ```text
//!   FREE ──writer──▶ WRITING ──commit──▶ READY ──reader──▶ READING
//!     ▲                 │                  │ ▲                  │
//!     └────abandon──────┘   writer reclaim │ └────release───────┘
//!                          (not latest) ◀──┘
//! ```
//!
//! A slot only becomes `READY` after every write to it has finished, and the index of the
//! newest `READY` slot is published with release ordering. The writer never claims the
//! latest slot or a slot being read; when nothing qualifies the frame is dropped. The
//! reader never waits; a miss returns `None`.
//!
//! With two slots a reader holding the latest frame leaves the writer exactly one slot,
//! and after the next publish none, so frames drop whenever reads overlap two writes.
//! Three slots keep one free slot for the writer in that case.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::foundation::config::MIN_RING_SLOTS;
use crate::foundation::error::{VidgraphError, VidgraphResult};

const FREE: u8 = 0;
const WRITING: u8 = 1;
const READY: u8 = 2;
const READING: u8 = 3;

const NO_SLOT: usize = usize::MAX;

struct Slot<T> {
    state: AtomicU8,
    seq: AtomicU64,
    data: Mutex<T>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RingStats {
    pub published: u64,
    pub dropped: u64,
    pub reads: u64,
    pub misses: u64,
}

pub struct FrameRing<T> {
    slots: Box<[Slot<T>]>,
    latest: AtomicUsize,
    cursor: AtomicUsize,
    next_seq: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    reads: AtomicU64,
    misses: AtomicU64,
}

impl<T> std::fmt::Debug for FrameRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRing")
            .field("slots", &self.slots.len())
            .field("stats", &self.stats())
            .finish()
    }
}

fn lock_slot<T>(m: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match m.try_lock() {
        Ok(g) => Some(g),
        Err(TryLockError::Poisoned(e)) => Some(e.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

impl<T> FrameRing<T> {
    /// Ring of `slots` buffers, each built by `init`.
    pub fn new(slots: usize, mut init: impl FnMut() -> T) -> VidgraphResult<Self> {
        if slots < MIN_RING_SLOTS {
            return Err(VidgraphError::validation(format!(
                "frame ring needs at least {MIN_RING_SLOTS} slots, got {slots}"
            )));
        }
        let slots = (0..slots)
            .map(|_| Slot {
                state: AtomicU8::new(FREE),
                seq: AtomicU64::new(0),
                data: Mutex::new(init()),
            })
            .collect();
        Ok(Self {
            slots,
            latest: AtomicUsize::new(NO_SLOT),
            cursor: AtomicUsize::new(0),
            next_seq: AtomicU64::new(1),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Sequence number of the latest published frame, 0 before the first publish.
    pub fn latest_seq(&self) -> u64 {
        match self.latest.load(Ordering::Acquire) {
            NO_SLOT => 0,
            i => self.slots[i].seq.load(Ordering::Acquire),
        }
    }

    /// Claim a slot to fill. `None` means the frame must be dropped.
    pub fn write(&self) -> Option<WriteGuard<'_, T>> {
        let n = self.slots.len();
        let latest = self.latest.load(Ordering::Acquire);
        let start = self.cursor.load(Ordering::Relaxed);
        for offset in 1..=n {
            let index = (start + offset) % n;
            if index == latest {
                continue;
            }
            let state = &self.slots[index].state;
            let claimed = state
                .compare_exchange(FREE, WRITING, Ordering::Acquire, Ordering::Relaxed)
                .or_else(|_| {
                    state.compare_exchange(READY, WRITING, Ordering::Acquire, Ordering::Relaxed)
                })
                .is_ok();
            if !claimed {
                continue;
            }
            let Some(data) = lock_slot(&self.slots[index].data) else {
                state.store(FREE, Ordering::Release);
                continue;
            };
            self.cursor.store(index, Ordering::Relaxed);
            return Some(WriteGuard {
                ring: self,
                index,
                data: Some(data),
                committed: false,
            });
        }
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(slots = n, "frame ring full, dropping frame");
        None
    }

    /// Borrow the newest published frame.
    pub fn read(&self) -> Option<ReadGuard<'_, T>> {
        for _ in 0..self.slots.len() {
            let index = self.latest.load(Ordering::Acquire);
            if index == NO_SLOT {
                break;
            }
            let slot = &self.slots[index];
            if slot
                .state
                .compare_exchange(READY, READING, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                // The writer reclaimed it after publishing a newer one.
                continue;
            }
            let Some(data) = lock_slot(&slot.data) else {
                slot.state.store(READY, Ordering::Release);
                continue;
            };
            self.reads.fetch_add(1, Ordering::Relaxed);
            return Some(ReadGuard {
                ring: self,
                index,
                seq: slot.seq.load(Ordering::Acquire),
                data: Some(data),
            });
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive access to a slot being filled. Dropping without [`commit`](Self::commit)
/// returns the slot unpublished.
pub struct WriteGuard<'a, T> {
    ring: &'a FrameRing<T>,
    index: usize,
    data: Option<MutexGuard<'a, T>>,
    committed: bool,
}

impl<T> WriteGuard<'_, T> {
    /// Publish the slot as the latest frame and return its sequence number.
    pub fn commit(mut self) -> u64 {
        let ring = self.ring;
        let slot = &ring.slots[self.index];
        let seq = ring.next_seq.fetch_add(1, Ordering::Relaxed);
        self.data = None;
        slot.seq.store(seq, Ordering::Release);
        // Readers that see this slot READY must also see it as latest, so sequence
        // numbers they observe never go backwards.
        ring.latest.store(self.index, Ordering::Release);
        slot.state.store(READY, Ordering::Release);
        ring.published.fetch_add(1, Ordering::Relaxed);
        self.committed = true;
        seq
    }
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.data {
            Some(d) => d,
            None => unreachable!("write guard used after commit"),
        }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.data {
            Some(d) => d,
            None => unreachable!("write guard used after commit"),
        }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        if !self.committed {
            self.data = None;
            self.ring.slots[self.index]
                .state
                .store(FREE, Ordering::Release);
        }
    }
}

/// Shared access to a published frame. The writer skips this slot until it is dropped.
pub struct ReadGuard<'a, T> {
    ring: &'a FrameRing<T>,
    index: usize,
    seq: u64,
    data: Option<MutexGuard<'a, T>>,
}

impl<T> ReadGuard<'_, T> {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.data {
            Some(d) => d,
            None => unreachable!("read guard used after release"),
        }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        self.data = None;
        self.ring.slots[self.index]
            .state
            .store(READY, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/media/ring.rs"]
mod tests;
