//! Hides an overlay while the map is moving and brings it back once the map
//! has been still for a while.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{Error, Result};
use crate::host::RedrawHandle;

pub trait Disableable: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

#[derive(Debug)]
struct ActivationState {
    running: bool,
    last_change: Option<Instant>,
}

struct ActivationShared {
    state: Mutex<ActivationState>,
    cond: Condvar,
    timeout: Duration,
    target: Arc<dyn Disableable>,
    redraw: Arc<dyn RedrawHandle>,
}

impl ActivationShared {
    fn lock(&self) -> MutexGuard<'_, ActivationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct OverlayActivation {
    shared: Arc<ActivationShared>,
    handle: Option<JoinHandle<()>>,
}

impl OverlayActivation {
    pub fn spawn(
        target: Arc<dyn Disableable>,
        redraw: Arc<dyn RedrawHandle>,
        timeout: Duration,
    ) -> Result<Self> {
        let shared = Arc::new(ActivationShared {
            state: Mutex::new(ActivationState {
                running: true,
                last_change: None,
            }),
            cond: Condvar::new(),
            timeout,
            target,
            redraw,
        });
        let worker = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("overlay-activation".to_string())
            .spawn(move || run(&worker))
            .map_err(|source| Error::Spawn {
                name: "overlay-activation",
                source,
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// The map window changed: hide the overlay and restart the timer.
    pub fn map_changed(&self) {
        self.shared.target.set_enabled(false);
        let mut state = self.shared.lock();
        state.last_change = Some(Instant::now());
        self.shared.cond.notify_one();
    }

    pub fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn stop(&self) {
        let mut state = self.shared.lock();
        state.running = false;
        self.shared.cond.notify_all();
    }
}

impl Drop for OverlayActivation {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(shared: &ActivationShared) {
    let mut state = shared.lock();
    loop {
        if !state.running {
            return;
        }
        match state.last_change {
            None => {
                state = shared.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
            Some(changed) => {
                let elapsed = changed.elapsed();
                if elapsed >= shared.timeout {
                    state.last_change = None;
                    drop(state);
                    trace!(target: "labels", "map settled, enabling overlay");
                    shared.target.set_enabled(true);
                    shared.redraw.request_redraw();
                    state = shared.lock();
                } else {
                    let (guard, _) = shared
                        .cond
                        .wait_timeout(state, shared.timeout - elapsed)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        }
    }
}
