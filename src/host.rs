//! Glue towards the host view: redraw requests.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Marks the host frame dirty. Called from worker threads.
pub trait RedrawHandle: Send + Sync {
    fn request_redraw(&self);
}

impl<F> RedrawHandle for F
where
    F: Fn() + Send + Sync,
{
    fn request_redraw(&self) {
        self()
    }
}

/// Coalescing dirty flag. Any number of requests between two waits collapse
/// into one wakeup.
#[derive(Debug, Default)]
pub struct RedrawSignal {
    dirty: Mutex<bool>,
    cond: Condvar,
}

impl RedrawSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the flag and reports whether it was set.
    pub fn take(&self) -> bool {
        let mut dirty = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *dirty, false)
    }

    /// Blocks until a redraw is requested or `timeout` passes. Returns whether
    /// a redraw was pending; the flag is cleared either way.
    pub fn wait(&self, timeout: Duration) -> bool {
        let dirty = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut dirty, _) = self
            .cond
            .wait_timeout_while(dirty, timeout, |dirty| !*dirty)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *dirty, false)
    }
}

impl RedrawHandle for RedrawSignal {
    fn request_redraw(&self) {
        let mut dirty = self.dirty.lock().unwrap_or_else(PoisonError::into_inner);
        *dirty = true;
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn requests_coalesce_until_taken() {
        let signal = RedrawSignal::new();
        signal.request_redraw();
        signal.request_redraw();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn wait_wakes_on_request_from_other_thread() {
        let signal = Arc::new(RedrawSignal::new());
        let remote = Arc::clone(&signal);
        let handle = thread::spawn(move || remote.request_redraw());
        assert!(signal.wait(Duration::from_secs(5)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_when_clean() {
        let signal = RedrawSignal::new();
        assert!(!signal.wait(Duration::from_millis(10)));
    }
}
