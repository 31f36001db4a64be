/*!
 * Adaptive Backoff
 *
 * Exponential backoff for CAS retry loops and short waits on another
 * thread's in-flight write:
 *
 * 1. **Spin phase**: `spin_loop()` hints, doubling per step
 * 2. **Yield phase**: `yield_now()` once spinning stops paying off
 *
 * Backoff never parks or sleeps; every caller is waiting on a step another
 * thread is already executing.
 */

use std::hint;
use std::thread;

const SPIN_LIMIT: u32 = 6;
const YIELD_LIMIT: u32 = 10;

/// Per-call-site backoff state
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    #[inline]
    pub const fn new() -> Self {
        Self { step: 0 }
    }

    /// Back off after a failed CAS
    ///
    /// Only spins. Contention on a CAS clears as soon as the winner moves on,
    /// so yielding here would just add latency.
    #[inline]
    pub fn spin(&mut self) {
        for _ in 0..1u32 << self.step.min(SPIN_LIMIT) {
            hint::spin_loop();
        }
        if self.step <= SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Back off while waiting for another thread to finish a step
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= SPIN_LIMIT {
            for _ in 0..1u32 << self.step {
                hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }
        if self.step <= YIELD_LIMIT {
            self.step += 1;
        }
    }
}
