//! Cooperative cancellation for long-running waits.

use core::{
    cell::RefCell,
    future::poll_fn,
    sync::atomic::{AtomicBool, Ordering},
    task::Poll,
};

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex},
    waitqueue::MultiWakerRegistration,
};

/// Tasks that can park on one token before extra waiters start evicting
/// (and waking) earlier ones.
pub const MAX_WAITERS: usize = 8;

/// A one-shot cancel flag that async waits can race against.
///
/// Once [`cancel`](Self::cancel) is called the token stays cancelled. Up to
/// [`MAX_WAITERS`] tasks may await [`cancelled`](Self::cancelled) at once
/// without waking each other.
pub struct CancelToken {
    cancelled: AtomicBool,
    wakers: Mutex<CriticalSectionRawMutex, RefCell<MultiWakerRegistration<MAX_WAITERS>>>,
}

impl CancelToken {
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            wakers: Mutex::new(RefCell::new(MultiWakerRegistration::new())),
        }
    }

    /// Fire the token, waking every waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wakers.lock(|w| w.borrow_mut().wake());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolve once the token has been fired.
    pub async fn cancelled(&self) {
        poll_fn(|cx| {
            if self.is_cancelled() {
                return Poll::Ready(());
            }
            self.wakers.lock(|w| w.borrow_mut().register(cx.waker()));
            // `cancel` may have run between the check and the registration.
            if self.is_cancelled() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
        .await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
