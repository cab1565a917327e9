//! Ctrl+C handling for streamed responses.
//!
//! A signal only means something while a response is streaming. Outside a
//! response [`Interrupt::trigger`] reports that nothing was waiting, and the
//! caller decides what to do (the binary exits). No request outlives the
//! response it was aimed at.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Shared between the signal handler and the session.
#[derive(Debug, Default)]
pub struct Interrupt {
    in_flight: AtomicBool,
    requested: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    /// Creates an idle interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests that the in-flight response stop.
    ///
    /// Returns false, and records nothing, if no response is streaming.
    pub fn trigger(&self) -> bool {
        if !self.in_flight.load(Ordering::SeqCst) {
            return false;
        }
        self.requested.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        true
    }

    /// Returns true while a response is streaming.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Marks a response as streaming until the guard drops.
    pub(crate) fn begin(&self) -> InFlight<'_> {
        self.requested.store(false, Ordering::SeqCst);
        self.in_flight.store(true, Ordering::SeqCst);
        InFlight { interrupt: self }
    }

    /// Resolves once the in-flight response has been interrupted.
    pub(crate) async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a trigger between the two is not lost.
            notified.as_mut().enable();
            if self.requested.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

/// Clears the in-flight state of an [`Interrupt`] when dropped.
pub(crate) struct InFlight<'a> {
    interrupt: &'a Interrupt,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.interrupt.in_flight.store(false, Ordering::SeqCst);
        self.interrupt.requested.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_while_idle_is_ignored() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.trigger());
        assert!(!interrupt.is_in_flight());
        assert!(!interrupt.requested.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn trigger_while_in_flight_wakes_waiter() {
        let interrupt = Interrupt::new();
        let guard = interrupt.begin();
        assert!(interrupt.is_in_flight());
        assert!(interrupt.trigger());
        interrupt.wait().await;
        drop(guard);
        assert!(!interrupt.is_in_flight());
        assert!(!interrupt.requested.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stale_request_does_not_carry_over() {
        let interrupt = Interrupt::new();
        {
            let _guard = interrupt.begin();
            assert!(interrupt.trigger());
        }
        let _guard = interrupt.begin();
        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), interrupt.wait());
        assert!(waited.await.is_err());
    }
}
