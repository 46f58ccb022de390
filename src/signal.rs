use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Manual-reset shutdown signal.
///
/// `signal()` is sticky: once fired, every subsequent `wait()` returns
/// immediately. A single blocked waiter is woken through the channel;
/// waiters arriving after the fact observe the flag without touching the
/// channel. At most one thread may block in `wait()` at a time, which
/// matches the single `run()` per adapter lifetime.
pub struct QuitSignal {
    signaled: AtomicBool,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl QuitSignal {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            signaled: AtomicBool::new(false),
            tx,
            rx,
        }
    }

    /// Request shutdown. Idempotent; only the first call posts the wakeup.
    pub fn signal(&self) {
        if !self.signaled.swap(true, Ordering::SeqCst) {
            let _ = self.tx.try_send(());
        }
    }

    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Block until the signal fires. Returns immediately if it already has.
    pub fn wait(&self) {
        if self.is_signaled() {
            return;
        }
        let _ = self.rx.recv();
    }

    /// Like `wait()`, but gives up after `timeout`. Returns whether the
    /// signal has fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_signaled() {
            return true;
        }
        let _ = self.rx.recv_timeout(timeout);
        self.is_signaled()
    }
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}
