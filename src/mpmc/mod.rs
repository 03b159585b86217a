mod backoff;
mod bounded;
mod wait;

pub use backoff::{
    Backoff, CompositeBackoff, CpuCycle, CpuRelax, ExponentialBackoff, LinearBackoff, NanoSleep,
    NoBackoff, Pause, YieldBackoff,
};
pub use bounded::{BoundedQueue, Closed, QueueError};
pub use wait::{DefaultWait, NoWait, SyncWait, WaitStrategy, YieldWait};

#[cfg(target_os = "linux")]
pub use wait::FutexWait;
