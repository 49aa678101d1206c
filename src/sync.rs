use core::{future::poll_fn, task::Poll};

use portable_atomic::{AtomicBool, Ordering};

use atomic_waker::AtomicWaker;

/// A latch, which can be armed any number of times, but only fires once per wait.
///
/// This backs the RPU inactivity timer. Every access arms it, and the timer task restarts its
/// countdown, whenever it observes the latch.
pub struct RearmSignal {
    waker: AtomicWaker,
    armed: AtomicBool,
}
impl RearmSignal {
    pub const fn new() -> Self {
        Self {
            waker: AtomicWaker::new(),
            armed: AtomicBool::new(false),
        }
    }
    /// Arm the latch and wake the waiting task.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::Release);
        self.waker.wake();
    }
    /// Disarm the latch without waking anyone.
    pub fn reset(&self) {
        self.armed.store(false, Ordering::Relaxed);
    }
    /// Check if the latch is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
    /// Asynchronously wait for the latch to be armed and disarm it again.
    pub async fn wait(&self) {
        poll_fn(|cx| {
            if self.armed.swap(false, Ordering::AcqRel) {
                Poll::Ready(())
            } else {
                self.waker.register(cx.waker());
                // We might have been armed in between.
                if self.armed.swap(false, Ordering::AcqRel) {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            }
        })
        .await
    }
}
impl Default for RearmSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::{block_on, poll_once};

    #[test]
    fn wait_consumes_arm() {
        let signal = RearmSignal::new();
        assert!(poll_once(signal.wait()).is_pending());
        signal.arm();
        signal.arm();
        assert!(signal.is_armed());
        block_on(signal.wait());
        assert!(!signal.is_armed());
        assert!(poll_once(signal.wait()).is_pending());
    }
    #[test]
    fn reset_disarms() {
        let signal = RearmSignal::new();
        signal.arm();
        signal.reset();
        assert!(poll_once(signal.wait()).is_pending());
    }
}
