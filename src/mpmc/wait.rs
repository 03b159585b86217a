// Per-slot wait strategies.
//
// Every strategy owns its slot's 32-bit sequence word and decides how a
// thread blocks while the word has the wrong value. The queue picks one
// strategy per ring at construction time through the type parameter, so
// dispatch is static on the hot path.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;

#[cfg(target_os = "linux")]
use std::sync::atomic::fence;

/// Slot sequence word plus the primitive used to sleep on it.
///
/// `wait_and_load` may return spuriously; callers re-check the sequence
/// in a loop.
pub trait WaitStrategy: Send + Sync {
    fn new(sequence: u32) -> Self;

    /// Acquire-load the sequence.
    fn load(&self) -> u32;

    /// Release-store the sequence.
    fn store(&self, sequence: u32);

    /// Block while the sequence still equals `observed`, then reload.
    fn wait_and_load(&self, observed: u32) -> u32;

    /// Release-store the sequence, then wake any parked waiters.
    fn store_and_wake(&self, sequence: u32);

    /// Wake all parked waiters without changing the sequence.
    fn wake(&self);
}

/// Pure busy-wait slot: `wait_and_load` is a plain reload.
///
/// Callers are expected to pass a spinning backoff; there is nothing to
/// park on.
#[derive(Debug)]
pub struct NoWait {
    seq: AtomicU32,
}

impl WaitStrategy for NoWait {
    fn new(sequence: u32) -> Self {
        NoWait {
            seq: AtomicU32::new(sequence),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, sequence: u32) {
        self.seq.store(sequence, Ordering::Release);
    }

    #[inline]
    fn wait_and_load(&self, _observed: u32) -> u32 {
        self.load()
    }

    #[inline]
    fn store_and_wake(&self, sequence: u32) {
        self.store(sequence);
    }

    fn wake(&self) {}
}

/// Like [`NoWait`] but relinquishes the CPU once per retry.
#[derive(Debug)]
pub struct YieldWait {
    seq: AtomicU32,
}

impl WaitStrategy for YieldWait {
    fn new(sequence: u32) -> Self {
        YieldWait {
            seq: AtomicU32::new(sequence),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, sequence: u32) {
        self.seq.store(sequence, Ordering::Release);
    }

    fn wait_and_load(&self, _observed: u32) -> u32 {
        thread::yield_now();
        self.load()
    }

    #[inline]
    fn store_and_wake(&self, sequence: u32) {
        self.store(sequence);
    }

    fn wake(&self) {}
}

#[cfg(target_os = "linux")]
mod futex {
    use std::ptr;
    use std::sync::atomic::AtomicU32;

    use nix::libc;

    // Returns on wake, on EAGAIN when the word no longer holds `expected`,
    // or on EINTR; the caller reloads in all cases.
    pub fn wait(word: &AtomicU32, expected: u32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                expected,
                ptr::null::<libc::timespec>(),
            );
        }
    }

    pub fn wake_all(word: &AtomicU32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                word.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                libc::INT_MAX,
            );
        }
    }
}

/// Sleeps in the kernel on the sequence word itself.
///
/// `waiters` keeps `store_and_wake` from paying the wake syscall when
/// nobody sleeps. The seq-cst fence in `store_and_wake` pairs with the
/// futex syscall on the waiter side: without it a waker could publish the
/// sequence, read a stale zero `waiters`, and skip the wake while the
/// waiter is already committed to sleeping.
#[cfg(target_os = "linux")]
#[derive(Debug)]
pub struct FutexWait {
    seq: AtomicU32,
    waiters: AtomicU32,
}

#[cfg(target_os = "linux")]
impl WaitStrategy for FutexWait {
    fn new(sequence: u32) -> Self {
        FutexWait {
            seq: AtomicU32::new(sequence),
            waiters: AtomicU32::new(0),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, sequence: u32) {
        self.seq.store(sequence, Ordering::Release);
    }

    fn wait_and_load(&self, observed: u32) -> u32 {
        self.waiters.fetch_add(1, Ordering::Relaxed);
        futex::wait(&self.seq, observed);
        self.waiters.fetch_sub(1, Ordering::Relaxed);
        self.load()
    }

    fn store_and_wake(&self, sequence: u32) {
        self.seq.store(sequence, Ordering::Release);
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::Relaxed) != 0 {
            self.wake();
        }
    }

    fn wake(&self) {
        futex::wake_all(&self.seq);
    }
}

/// Parks on a per-slot mutex and condition variable.
///
/// The lock, not the atomic's ordering, carries the synchronization edge,
/// so the sequence accesses under it are relaxed.
#[derive(Debug)]
pub struct SyncWait {
    seq: AtomicU32,
    lock: Mutex<()>,
    ready: Condvar,
}

impl WaitStrategy for SyncWait {
    fn new(sequence: u32) -> Self {
        SyncWait {
            seq: AtomicU32::new(sequence),
            lock: Mutex::new(()),
            ready: Condvar::new(),
        }
    }

    #[inline]
    fn load(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }

    #[inline]
    fn store(&self, sequence: u32) {
        self.seq.store(sequence, Ordering::Release);
    }

    fn wait_and_load(&self, observed: u32) -> u32 {
        let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.seq.load(Ordering::Relaxed);
        if current == observed {
            let _guard = self.ready.wait(guard).unwrap_or_else(PoisonError::into_inner);
            return self.seq.load(Ordering::Relaxed);
        }
        current
    }

    fn store_and_wake(&self, sequence: u32) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.seq.store(sequence, Ordering::Relaxed);
        self.ready.notify_all();
    }

    fn wake(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.ready.notify_all();
    }
}

/// Platform default: futex where the kernel offers wait-on-address,
/// mutex/condvar parking elsewhere.
#[cfg(target_os = "linux")]
pub type DefaultWait = FutexWait;

#[cfg(not(target_os = "linux"))]
pub type DefaultWait = SyncWait;
