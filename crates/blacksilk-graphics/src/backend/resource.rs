//! Single-owner acquire/release primitive for pooled backend objects.
//!
//! A [`Resource`] records the id of the thread holding it, or 0 when free.
//! Every transition is a compare-and-swap. [`Resource::acquire`] spins on
//! [`Resource::try_acquire`] with no timeout: a holder that never releases
//! blocks later acquirers forever. Callers that need to give up use
//! [`Resource::acquire_with_retries`].

use std::sync::atomic::{AtomicU64, Ordering};

#[allow(unused_imports)]
use tracing::{error, trace};

static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Ordering::Relaxed);
}

/// Non-zero id of the calling thread.
pub fn current_thread_token() -> u64 {
    THREAD_TOKEN.with(|t| *t)
}

/// Acquire/release guard word.
#[derive(Debug, Default)]
pub struct Resource {
    used_by: AtomicU64,
}

impl Resource {
    /// Free resource.
    pub const fn new() -> Self {
        Self {
            used_by: AtomicU64::new(0),
        }
    }

    /// Takes ownership if free. Re-acquiring from the holder fails.
    pub fn try_acquire(&self) -> bool {
        self.used_by
            .compare_exchange(0, current_thread_token(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Spins until ownership is obtained.
    pub fn acquire(&self) {
        while !self.try_acquire() {
            std::hint::spin_loop();
        }
    }

    /// Spins at most `attempts` times.
    pub fn acquire_with_retries(&self, attempts: usize) -> bool {
        for _ in 0..attempts {
            if self.try_acquire() {
                return true;
            }
            std::hint::spin_loop();
        }
        false
    }

    /// Releases if held by the calling thread.
    pub fn release(&self) -> bool {
        self.used_by
            .compare_exchange(current_thread_token(), 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases regardless of owner.
    pub fn force_release(&self) {
        let prev = self.used_by.swap(0, Ordering::AcqRel);
        trace!(prev, "resource force-released");
    }

    /// True while any thread holds the resource.
    pub fn is_acquired(&self) -> bool {
        self.used_by.load(Ordering::Acquire) != 0
    }

    /// Holder's thread token, 0 when free.
    pub fn owner(&self) -> u64 {
        self.used_by.load(Ordering::Acquire)
    }

    /// True if the calling thread holds the resource.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.owner() == current_thread_token()
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        let owner = *self.used_by.get_mut();
        if owner != 0 {
            error!(owner, "resource destroyed while held");
            debug_assert!(owner == 0, "resource destroyed while held by thread {owner}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release() {
        let res = Resource::new();
        assert!(res.try_acquire());
        assert!(!res.try_acquire());
        assert!(res.is_held_by_current_thread());
        assert!(res.release());
        assert!(!res.release());
        assert!(res.acquire_with_retries(3));
        res.force_release();
        assert!(!res.is_acquired());
    }

    #[test]
    fn test_release_from_other_thread_fails() {
        let res = Resource::new();
        res.acquire();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!res.release());
                assert!(!res.acquire_with_retries(16));
            });
        });
        assert!(res.release());
    }
}
