//! Bounded multi-producer/multi-consumer queue built on a ring of
//! ticket-sequenced slots.
//!
//! Producers and consumers claim monotonically increasing tickets from two
//! shared counters and rendezvous on the slot the ticket maps to, so threads
//! only ever contend on the counters and on their own slot. How a thread
//! waits for its slot is pluggable per queue: busy-spin, yield, futex sleep,
//! or mutex/condvar parking.

pub mod mpmc;

pub use mpmc::{BoundedQueue, Closed, QueueError};

pub use mpmc::{
    Backoff, CompositeBackoff, CpuCycle, CpuRelax, ExponentialBackoff, LinearBackoff, NanoSleep,
    NoBackoff, Pause, YieldBackoff,
};

pub use mpmc::{DefaultWait, NoWait, SyncWait, WaitStrategy, YieldWait};

#[cfg(target_os = "linux")]
pub use mpmc::FutexWait;
