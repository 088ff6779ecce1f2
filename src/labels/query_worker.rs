use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::{CandidateBatch, LabelSource, SpatialQuery};
use crate::error::{Error, Result};

#[derive(Debug)]
struct QueryState {
    running: bool,
    pending: Option<SpatialQuery>,
    in_progress: bool,
}

#[derive(Debug)]
struct QueryShared {
    state: Mutex<QueryState>,
    cond: Condvar,
}

impl QueryShared {
    fn lock(&self) -> MutexGuard<'_, QueryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background worker answering candidate lookups.
///
/// At most one query is pending: posting replaces whatever was waiting, so
/// once the worker is free it always runs the most recent request.
#[derive(Debug)]
pub struct QueryWorker {
    shared: Arc<QueryShared>,
    handle: Option<JoinHandle<()>>,
}

impl QueryWorker {
    pub fn spawn<S, F>(source: S, report: F) -> Result<Self>
    where
        S: LabelSource + 'static,
        F: FnMut(SpatialQuery, CandidateBatch) + Send + 'static,
    {
        let shared = Arc::new(QueryShared {
            state: Mutex::new(QueryState {
                running: true,
                pending: None,
                in_progress: false,
            }),
            cond: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("label-query".to_string())
            .spawn(move || run(&worker_shared, source, report))
            .map_err(|source| Error::Spawn {
                name: "label-query",
                source,
            })?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn post(&self, query: SpatialQuery) {
        let mut state = self.shared.lock();
        if state.pending.replace(query).is_some() {
            trace!(target: "labels", "query superseded before it ran");
        }
        if !state.in_progress {
            self.shared.cond.notify_one();
        }
    }

    /// No query pending and none executing.
    pub fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.pending.is_none() && !state.in_progress
    }

    /// Asks the worker to stop. A lookup already running is allowed to
    /// finish and report; nothing pending is executed afterwards.
    pub fn destroy(&self) {
        let mut state = self.shared.lock();
        state.running = false;
        state.pending = None;
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

impl Drop for QueryWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run<S, F>(shared: &QueryShared, source: S, mut report: F)
where
    S: LabelSource,
    F: FnMut(SpatialQuery, CandidateBatch),
{
    loop {
        let query = {
            let mut state = shared.lock();
            loop {
                if !state.running {
                    debug!(target: "labels", "query worker stopped");
                    return;
                }
                if let Some(query) = state.pending.take() {
                    state.in_progress = true;
                    break query;
                }
                trace!(target: "labels", "query worker idle, waiting");
                state = shared.cond.wait(state).unwrap_or_else(PoisonError::into_inner);
            }
        };

        trace!(
            target: "labels",
            generation = query.generation.value(),
            zoom = query.zoom,
            "executing candidate query"
        );
        let batch = source.lookup_candidates(&query.bbox, query.zoom);
        report(query, batch);

        shared.lock().in_progress = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BBox;
    use crate::labels::Generation;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::time::Duration;

    /// Blocks every lookup until the test releases it.
    struct GatedSource {
        started: Sender<i32>,
        release: Mutex<Receiver<()>>,
    }

    impl LabelSource for GatedSource {
        fn lookup_candidates(&self, _bbox: &BBox, zoom: i32) -> CandidateBatch {
            let _ = self.started.send(zoom);
            let _ = self.release.lock().unwrap().recv();
            CandidateBatch::new()
        }
    }

    fn query(zoom: i32) -> SpatialQuery {
        SpatialQuery::new(Generation::INITIAL, BBox::new(0.0, 0.0, 1.0, 1.0), zoom)
    }

    #[test]
    fn only_latest_pending_query_runs() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let source = GatedSource {
            started: started_tx,
            release: Mutex::new(release_rx),
        };
        let worker = QueryWorker::spawn(source, move |q: SpatialQuery, _| {
            let _ = done_tx.send(q.zoom);
        })
        .unwrap();

        worker.post(query(1));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(1));

        worker.post(query(2));
        worker.post(query(3));
        worker.post(query(4));

        release_tx.send(()).unwrap();
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(4));
        release_tx.send(()).unwrap();

        let executed: Vec<i32> = (0..2)
            .map(|_| done_rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(executed, vec![1, 4]);
        assert!(started_rx.recv_timeout(Duration::from_millis(50)).is_err());
        worker.join();
    }

    #[test]
    fn destroy_drops_pending_query() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let source = GatedSource {
            started: started_tx,
            release: Mutex::new(release_rx),
        };
        let worker = QueryWorker::spawn(source, |_, _| {}).unwrap();

        worker.post(query(7));
        assert_eq!(started_rx.recv_timeout(Duration::from_secs(5)), Ok(7));
        worker.post(query(8));
        worker.destroy();
        release_tx.send(()).unwrap();
        worker.join();
        assert!(started_rx.try_recv().is_err());
    }
}
