// Bounded MPMC queue over a ring of ticket-sequenced slots.
//
// A producer claims ticket `t` from `tail`, waits until slot `t & mask`
// carries sequence `t` (low 32 bits), deposits its value and publishes
// `t + 1`. A consumer claims ticket `h` from `head`, waits for `h + 1`,
// moves the value out and publishes `h + capacity`, handing the slot to
// the producer one lap ahead. Backpressure is therefore enforced per
// slot; the counters never wait on each other.
//
// Sequences are 32-bit and compare modulo 2^32, which is sound as long
// as fewer than 2^32 tickets separate a producer and a consumer meeting
// on the same slot; the 64-bit counters and bounded capacity guarantee
// that.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use thiserror::Error;

use super::backoff::Backoff;
use super::wait::{NoWait, WaitStrategy};

/// Construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("capacity must be a nonzero power of two, got {0}")]
    BadCapacity(u32),
    #[error("cannot allocate a ring of {0} slots")]
    AllocFailed(u32),
}

/// The queue is finished and the caller's ticket lies past the last
/// produced element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queue is finished and fully drained")]
pub struct Closed;

struct Slot<T, W> {
    wait: W,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T, W: WaitStrategy> Slot<T, W> {
    fn new(sequence: u32) -> Self {
        Slot {
            wait: W::new(sequence),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Fixed-capacity MPMC queue with a per-slot wait strategy `W`.
///
/// `enqueue` blocks until a slot frees up and has no failure path;
/// `dequeue` blocks until a value arrives or the queue is [finished]
/// and drained. Order is strictly FIFO by ticket.
///
/// [finished]: BoundedQueue::finish
pub struct BoundedQueue<T, W: WaitStrategy = NoWait> {
    ring: Box<[CachePadded<Slot<T, W>>]>,
    mask: u32,
    finished: AtomicBool,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
}

unsafe impl<T: Send, W: WaitStrategy> Send for BoundedQueue<T, W> {}
unsafe impl<T: Send, W: WaitStrategy> Sync for BoundedQueue<T, W> {}

impl<T, W: WaitStrategy> BoundedQueue<T, W> {
    /// Build a queue of `capacity` cache-line-padded slots, slot `i`
    /// starting at sequence `i`.
    pub fn with_capacity(capacity: u32) -> Result<Self, QueueError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(QueueError::BadCapacity(capacity));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity as usize)
            .map_err(|_| QueueError::AllocFailed(capacity))?;
        for i in 0..capacity {
            slots.push(CachePadded::new(Slot::new(i)));
        }

        Ok(BoundedQueue {
            ring: slots.into_boxed_slice(),
            mask: capacity - 1,
            finished: AtomicBool::new(false),
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
        })
    }

    pub fn capacity(&self) -> u32 {
        self.mask + 1
    }

    #[inline]
    fn slot(&self, ticket: u64) -> &Slot<T, W> {
        &self.ring[(ticket & u64::from(self.mask)) as usize]
    }

    /// Blocking enqueue; parks on the slot as soon as it is not ready.
    ///
    /// Must not be called once [`finish`](Self::finish) has been invoked:
    /// a finished queue no longer guarantees consumers will drain the
    /// slot this ticket claims.
    pub fn enqueue(&self, value: T) {
        let ticket = self.tail.fetch_add(1, Ordering::SeqCst);
        let slot = self.slot(ticket);
        Self::wait_tail(slot, ticket);
        unsafe { (*slot.value.get()).write(value) };
        slot.wait.store_and_wake((ticket as u32).wrapping_add(1));
    }

    /// Blocking enqueue that spins through `backoff` before parking.
    pub fn enqueue_with<B: Backoff>(&self, value: T, mut backoff: B) {
        let ticket = self.tail.fetch_add(1, Ordering::SeqCst);
        let slot = self.slot(ticket);
        Self::wait_tail_backoff(slot, ticket, &mut backoff);
        unsafe { (*slot.value.get()).write(value) };
        slot.wait.store_and_wake((ticket as u32).wrapping_add(1));
    }

    /// Blocking dequeue; parks on the slot as soon as it is not ready.
    ///
    /// Fails only when the queue is finished and this caller's ticket is
    /// beyond the last produced element.
    pub fn dequeue(&self) -> Result<T, Closed> {
        let ticket = self.head.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot(ticket);
        if !self.wait_head(slot, ticket) {
            return Err(Closed);
        }
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.wait
            .store_and_wake((ticket as u32).wrapping_add(self.mask).wrapping_add(1));
        Ok(value)
    }

    /// Blocking dequeue that spins through `backoff` before parking.
    pub fn dequeue_with<B: Backoff>(&self, mut backoff: B) -> Result<T, Closed> {
        let ticket = self.head.fetch_add(1, Ordering::Relaxed);
        let slot = self.slot(ticket);
        if !self.wait_head_backoff(slot, ticket, &mut backoff) {
            return Err(Closed);
        }
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.wait
            .store_and_wake((ticket as u32).wrapping_add(self.mask).wrapping_add(1));
        Ok(value)
    }

    /// Mark the queue closed and wake every parked consumer.
    ///
    /// Values produced before the close remain dequeueable; consumers
    /// whose tickets land past the final tail observe [`Closed`].
    /// Producers are not woken: an enqueue already in flight completes.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
        for slot in self.ring.iter() {
            slot.wait.wake();
        }
    }

    /// Advisory: has `finish` been called.
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Advisory: a concurrent enqueue may flip the answer immediately.
    pub fn empty(&self) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        tail <= head
    }

    fn wait_tail(slot: &Slot<T, W>, ticket: u64) {
        let expected = ticket as u32;
        let mut current = slot.wait.load();
        while current != expected {
            current = slot.wait.wait_and_load(current);
        }
    }

    fn wait_tail_backoff<B: Backoff>(slot: &Slot<T, W>, ticket: u64, backoff: &mut B) {
        let expected = ticket as u32;
        let mut parked = false;
        let mut current = slot.wait.load();
        while current != expected {
            if parked {
                current = slot.wait.wait_and_load(current);
            } else {
                parked = backoff.backoff();
                current = slot.wait.load();
            }
        }
    }

    fn wait_head(&self, slot: &Slot<T, W>, ticket: u64) -> bool {
        let expected = (ticket as u32).wrapping_add(1);
        let mut current = slot.wait.load();
        while current != expected {
            if self.finished() {
                // Seq-cst pairs with the ticket claim in enqueue: any
                // producer that claimed before the close shows up here.
                let tail = self.tail.load(Ordering::SeqCst);
                if ticket >= tail {
                    return false;
                }
            }
            current = slot.wait.wait_and_load(current);
        }
        true
    }

    fn wait_head_backoff<B: Backoff>(&self, slot: &Slot<T, W>, ticket: u64, backoff: &mut B) -> bool {
        let expected = (ticket as u32).wrapping_add(1);
        let mut parked = false;
        let mut current = slot.wait.load();
        while current != expected {
            if self.finished() {
                let tail = self.tail.load(Ordering::SeqCst);
                if ticket >= tail {
                    return false;
                }
            }
            if parked {
                current = slot.wait.wait_and_load(current);
            } else {
                parked = backoff.backoff();
                current = slot.wait.load();
            }
        }
        true
    }
}

impl<T, W: WaitStrategy> Drop for BoundedQueue<T, W> {
    fn drop(&mut self) {
        // Exclusive access: destruct the payloads still published between
        // the counters. Failed dequeues can leave head past tail, hence
        // the `<` walk, and the sequence check skips any ticket a closed
        // consumer abandoned.
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);

        let mut ticket = head;
        while ticket < tail {
            let slot = self.slot(ticket);
            if slot.wait.load() == (ticket as u32).wrapping_add(1) {
                unsafe { (*slot.value.get()).assume_init_drop() };
            }
            ticket += 1;
        }
    }
}
