//! One-shot stop signal shared by the planner, the workers and the aggregator.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Advisory stop flag.
///
/// `trigger` never blocks and may be called any number of times, from any
/// task, whether or not anyone is still listening.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every waiter. Returns true only for the call
    /// that actually flipped it.
    pub fn trigger(&self) -> bool {
        let first = !self.stopped.swap(true, Ordering::AcqRel);
        if first {
            self.notify.notify_waiters();
        }
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Resolves once the flag is raised
    pub async fn triggered(&self) {
        loop {
            // Register before checking the flag so a concurrent trigger is not missed.
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
