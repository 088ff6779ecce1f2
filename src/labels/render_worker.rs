use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use super::{Rasterizer, RenderJob};
use crate::bitmap::Bitmap;
use crate::error::{Error, Result};

#[derive(Debug)]
struct RenderState {
    running: bool,
    jobs: Vec<RenderJob>,
    queued: HashSet<RenderJob>,
    in_flight: Option<RenderJob>,
}

#[derive(Debug)]
struct RenderShared {
    state: Mutex<RenderState>,
    cond: Condvar,
}

impl RenderShared {
    fn lock(&self) -> MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background worker rasterizing label text.
///
/// Jobs are taken newest first so labels requested by the latest frame are
/// rendered before older ones. A job equal to one queued or being rasterized
/// is ignored.
#[derive(Debug)]
pub struct RenderWorker {
    shared: Arc<RenderShared>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    pub fn spawn<R, F>(rasterizer: R, report: F) -> Result<Self>
    where
        R: Rasterizer + 'static,
        F: FnMut(RenderJob, Bitmap) + Send + 'static,
    {
        let shared = Arc::new(RenderShared {
            state: Mutex::new(RenderState {
                running: true,
                jobs: Vec::new(),
                queued: HashSet::new(),
                in_flight: None,
            }),
            cond: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("label-render".to_string())
            .spawn(move || run(&worker_shared, rasterizer, report))
            .map_err(|source| Error::Spawn {
                name: "label-render",
                source,
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Queues `job`. Returns `false` when an equal job is already waiting or
    /// being rasterized.
    pub fn post(&self, job: RenderJob) -> bool {
        let mut state = self.shared.lock();
        if state.queued.contains(&job) || state.in_flight.as_ref() == Some(&job) {
            trace!(target: "labels", text = %job.text, "render job already queued");
            return false;
        }
        state.queued.insert(job.clone());
        state.jobs.push(job);
        if state.in_flight.is_none() {
            self.shared.cond.notify_one();
        }
        true
    }

    /// Drops every queued job. The job being rasterized, if any, still
    /// reports.
    pub fn cancel_jobs(&self) {
        let mut state = self.shared.lock();
        let dropped = state.jobs.len();
        state.jobs.clear();
        state.queued.clear();
        if dropped > 0 {
            debug!(target: "labels", dropped, "cancelled render jobs");
        }
    }

    pub fn pending(&self) -> usize {
        self.shared.lock().jobs.len()
    }

    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.jobs.is_empty() && state.in_flight.is_none()
    }

    pub fn destroy(&self) {
        let mut state = self.shared.lock();
        state.running = false;
        state.jobs.clear();
        state.queued.clear();
        self.shared.cond.notify_all();
    }

    /// Stops the worker and waits for its thread to exit.
    pub fn join(mut self) {
        self.destroy();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run<R, F>(shared: &RenderShared, rasterizer: R, mut report: F)
where
    R: Rasterizer,
    F: FnMut(RenderJob, Bitmap),
{
    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if !state.running {
                    debug!(target: "labels", "render worker stopped");
                    return;
                }
                if let Some(job) = state.jobs.pop() {
                    state.queued.remove(&job);
                    state.in_flight = Some(job.clone());
                    break job;
                }
                trace!(target: "labels", "render worker idle, waiting");
                state = shared.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        match rasterizer.rasterize(&job.class, &job.text) {
            Some(bitmap) => report(job, bitmap),
            None => warn!(
                target: "labels",
                class_id = job.class_id,
                text = %job.text,
                "rasterizer produced no bitmap"
            ),
        }

        shared.lock().in_flight = None;
    }
}
