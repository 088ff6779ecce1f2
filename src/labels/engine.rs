use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, trace};

use super::placement::{BitmapCache, CandidateSets, LabelSink, PlacementContext};
use super::query_worker::QueryWorker;
use super::render_worker::RenderWorker;
use super::request::AtomicGeneration;
use super::{
    CandidateBatch, CenteredPlacement, ClassId, Generation, LabelCandidate, LabelClassRegistry, LabelSource,
    PlacedLabel, PlacementStrategy, Rasterizer, RenderJob, SpatialQuery,
};
use crate::activation::Disableable;
use crate::bitmap::Bitmap;
use crate::canvas::Canvas;
use crate::config::LabelSettings;
use crate::error::Result;
use crate::geometry::Rect;
use crate::host::RedrawHandle;
use crate::theme::DebugStyle;
use crate::viewport::Viewport;

/// What happened to an asynchronous result handed back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied,
    /// Computed for an older generation and dropped.
    Stale,
}

/// Enable flag that can be flipped from any thread.
#[derive(Debug, Clone)]
pub struct EnableSwitch(Arc<AtomicBool>);

impl EnableSwitch {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl Disableable for EnableSwitch {
    fn set_enabled(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct CandidateState {
    sets: CandidateSets,
    last_finished: Option<SpatialQuery>,
}

/// State reachable from the worker threads.
///
/// Lock order: `bitmaps` before `candidates` whenever both are held.
struct Shared {
    bitmaps: Mutex<BitmapCache>,
    candidates: Mutex<CandidateState>,
    generation: AtomicGeneration,
    redraw: Arc<dyn RedrawHandle>,
}

impl Shared {
    fn lock_bitmaps(&self) -> MutexGuard<'_, BitmapCache> {
        self.bitmaps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_candidates(&self) -> MutexGuard<'_, CandidateState> {
        self.candidates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report_candidates(&self, query: SpatialQuery, batch: CandidateBatch) -> ReportOutcome {
        {
            let mut state = self.lock_candidates();
            let current = self.generation.get();
            if query.generation != current {
                debug!(
                    target: "labels",
                    generation = query.generation.value(),
                    current = current.value(),
                    "dismissing outdated candidates"
                );
                return ReportOutcome::Stale;
            }
            state.last_finished = Some(query);
            for (class_id, candidates) in batch {
                let set = state.sets.entry(class_id).or_default();
                let received = candidates.len();
                set.extend(candidates);
                trace!(target: "labels", class_id, received, total = set.len(), "merged candidates");
            }
        }
        self.redraw.request_redraw();
        ReportOutcome::Applied
    }

    fn report_bitmap(&self, job: RenderJob, bitmap: Bitmap) -> ReportOutcome {
        {
            let mut bitmaps = self.lock_bitmaps();
            if job.generation != self.generation.get() {
                trace!(target: "labels", text = %job.text, "releasing outdated label bitmap");
                return ReportOutcome::Stale;
            }
            trace!(target: "labels", class_id = job.class_id, text = %job.text, "received label bitmap");
            bitmaps.entry(job.class_id).or_default().insert(job.text, bitmap);
        }
        self.redraw.request_redraw();
        ReportOutcome::Applied
    }

    /// Bumps the generation and empties the bitmap cache. Caller holds the
    /// bitmap lock.
    fn invalidate_bitmaps(&self, bitmaps: &mut BitmapCache) -> Generation {
        let generation = self.generation.bump();
        let released: usize = bitmaps.values().map(|texts| texts.len()).sum();
        bitmaps.clear();
        debug!(target: "labels", generation = generation.value(), released, "cleared label bitmaps");
        generation
    }
}

/// Handle for feeding results into the engine from outside its own workers.
#[derive(Clone)]
pub struct Reporter(Arc<Shared>);

impl Reporter {
    pub fn report_candidates(&self, query: SpatialQuery, batch: CandidateBatch) -> ReportOutcome {
        self.0.report_candidates(query, batch)
    }

    pub fn report_bitmap(&self, job: RenderJob, bitmap: Bitmap) -> ReportOutcome {
        self.0.report_bitmap(job, bitmap)
    }
}

/// Per-frame summary of the label pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelFrameStats {
    pub placed: usize,
    pub requested: usize,
    pub query_posted: bool,
}

/// Places labels for each frame from the candidates and bitmaps gathered so
/// far, and keeps the two background workers fed.
pub struct LabelEngine {
    shared: Arc<Shared>,
    classes: LabelClassRegistry,
    strategy: Box<dyn PlacementStrategy + Send>,
    query_worker: QueryWorker,
    render_worker: RenderWorker,
    enabled: EnableSwitch,
    active: bool,
    draw_debug_frame: bool,
    draw_label_boxes: bool,
    debug_style: DebugStyle,
    last_issued: Option<SpatialQuery>,
    rendered: Vec<PlacedLabel>,
}

impl LabelEngine {
    /// Starts both workers. Labels are placed with [`CenteredPlacement`] until
    /// another strategy is set.
    pub fn start<S, R>(
        classes: LabelClassRegistry,
        source: S,
        rasterizer: R,
        redraw: Arc<dyn RedrawHandle>,
    ) -> Result<Self>
    where
        S: LabelSource + 'static,
        R: Rasterizer + 'static,
    {
        let shared = Arc::new(Shared {
            bitmaps: Mutex::new(BitmapCache::new()),
            candidates: Mutex::new(CandidateState::default()),
            generation: AtomicGeneration::default(),
            redraw,
        });

        let query_shared = Arc::clone(&shared);
        let query_worker = QueryWorker::spawn(source, move |query, batch| {
            query_shared.report_candidates(query, batch);
        })?;
        let render_shared = Arc::clone(&shared);
        let render_worker = RenderWorker::spawn(rasterizer, move |job, bitmap| {
            render_shared.report_bitmap(job, bitmap);
        })?;

        info!(target: "labels", classes = classes.len(), "label engine started");
        Ok(Self {
            shared,
            classes,
            strategy: Box::new(CenteredPlacement),
            query_worker,
            render_worker,
            enabled: EnableSwitch::new(true),
            active: true,
            draw_debug_frame: false,
            draw_label_boxes: false,
            debug_style: DebugStyle::default(),
            last_issued: None,
            rendered: Vec::new(),
        })
    }

    pub fn set_strategy(&mut self, strategy: impl PlacementStrategy + Send + 'static) {
        self.strategy = Box::new(strategy);
    }

    /// Applies the switches of `settings`. Magnification is left alone; use
    /// [`LabelEngine::set_magnification`].
    pub fn configure(&mut self, settings: &LabelSettings) {
        self.enabled.set_enabled(settings.enabled);
        self.draw_debug_frame = settings.draw_debug_frame;
        self.draw_label_boxes = settings.draw_label_boxes;
    }

    pub fn enable_switch(&self) -> EnableSwitch {
        self.enabled.clone()
    }

    pub fn set_draw_debug_frame(&mut self, draw: bool) {
        self.draw_debug_frame = draw;
    }

    pub fn set_draw_label_boxes(&mut self, draw: bool) {
        self.draw_label_boxes = draw;
    }

    pub fn set_debug_style(&mut self, style: DebugStyle) {
        self.debug_style = style;
    }

    pub fn reporter(&self) -> Reporter {
        Reporter(Arc::clone(&self.shared))
    }

    pub fn classes(&self) -> &LabelClassRegistry {
        &self.classes
    }

    pub fn generation(&self) -> Generation {
        self.shared.generation.get()
    }

    pub fn magnification(&self) -> f32 {
        self.classes.magnification()
    }

    /// Labels accepted by the most recent frame.
    pub fn rendered_labels(&self) -> &[PlacedLabel] {
        &self.rendered
    }

    pub fn label_at(&self, x: f32, y: f32) -> Option<&PlacedLabel> {
        self.rendered.iter().rev().find(|label| label.contains(x, y))
    }

    pub fn bitmap_count(&self) -> usize {
        self.shared.lock_bitmaps().values().map(|texts| texts.len()).sum()
    }

    pub fn candidate_count(&self) -> usize {
        self.shared.lock_candidates().sets.values().map(|set| set.len()).sum()
    }

    /// Copies of the candidates currently known for `class_id`.
    pub fn candidates(&self, class_id: ClassId) -> Vec<LabelCandidate> {
        self.shared
            .lock_candidates()
            .sets
            .get(&class_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Both workers have nothing queued or running.
    pub fn is_idle(&self) -> bool {
        self.query_worker.is_idle() && self.render_worker.is_idle()
    }

    pub fn draw_frame(&mut self, viewport: &Viewport, canvas: &mut dyn Canvas) -> LabelFrameStats {
        let mut stats = LabelFrameStats::default();
        if !self.active || !self.enabled.is_enabled() {
            return stats;
        }

        if self.draw_debug_frame {
            let (width, height) = canvas.size();
            let frame = Rect::new(0.0, 0.0, width as f32, height as f32).inset(self.debug_style.frame_inset);
            canvas.stroke_rect(frame, self.debug_style.frame, 1.0);
        }

        let query = SpatialQuery::new(self.shared.generation.get(), viewport.bbox(), viewport.rounded_zoom());
        stats.query_posted = self.issue_query(query);

        let bitmaps = self.shared.lock_bitmaps();
        let candidates = self.shared.lock_candidates();
        let ctx = PlacementContext {
            viewport,
            classes: &self.classes,
            candidates: &candidates.sets,
        };
        let mut sink = LabelSink::new(
            canvas,
            &bitmaps,
            &self.render_worker,
            self.shared.generation.get(),
            self.draw_label_boxes.then_some(self.debug_style),
        );
        self.strategy.place(&ctx, &mut sink);
        let (placed, requested) = sink.finish();
        let cached: usize = bitmaps.values().map(|texts| texts.len()).sum();
        drop(candidates);
        drop(bitmaps);

        trace!(target: "labels", placed = placed.len(), requested, cached, "label pass done");
        stats.placed = placed.len();
        stats.requested = requested;
        self.rendered = placed;
        stats
    }

    fn issue_query(&mut self, query: SpatialQuery) -> bool {
        if self.last_issued == Some(query) {
            trace!(target: "labels", "same as the last issued query, not posting");
            return false;
        }
        if self.shared.lock_candidates().last_finished == Some(query) {
            trace!(target: "labels", "same as the last finished query, not posting");
            return false;
        }
        debug!(target: "labels", zoom = query.zoom, generation = query.generation.value(), "posting query");
        self.last_issued = Some(query);
        self.query_worker.post(query);
        true
    }

    /// Rescales every label class. Returns `false` when `magnification` is
    /// already current. Otherwise every cached width and bitmap is dropped and
    /// the generation moves on, so nothing requested earlier is applied.
    pub fn set_magnification(&mut self, magnification: f32) -> bool {
        if self.classes.magnification() == magnification {
            return false;
        }
        self.classes.set_magnification(magnification);

        {
            let state = self.shared.lock_candidates();
            for candidate in state.sets.values().flatten() {
                candidate.invalidate_width();
            }
        }

        self.render_worker.cancel_jobs();

        let mut bitmaps = self.shared.lock_bitmaps();
        let generation = self.shared.invalidate_bitmaps(&mut bitmaps);
        info!(target: "labels", magnification, generation = generation.value(), "label magnification changed");
        true
    }

    /// Drops rendered bitmaps but keeps the candidates.
    pub fn clear_bitmaps(&mut self) {
        let mut bitmaps = self.shared.lock_bitmaps();
        self.shared.invalidate_bitmaps(&mut bitmaps);
    }

    /// Drops rendered bitmaps and every known candidate.
    pub fn clear_bitmaps_and_candidates(&mut self) {
        let mut bitmaps = self.shared.lock_bitmaps();
        let mut candidates = self.shared.lock_candidates();
        self.shared.invalidate_bitmaps(&mut bitmaps);
        candidates.sets.clear();
    }

    /// Makes the next frame query again even if the viewport is unchanged.
    pub fn force_new_query(&mut self) {
        self.last_issued = None;
        self.shared.lock_candidates().last_finished = None;
    }

    /// Stops drawing, drops all caches and tells both workers to exit.
    pub fn destroy(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.clear_bitmaps_and_candidates();
        self.query_worker.destroy();
        self.render_worker.destroy();
        info!(target: "labels", "label engine destroyed");
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for LabelEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawOp, RecordingCanvas};
    use crate::config::LabelClassConfig;
    use crate::geometry::BBox;
    use crate::host::RedrawSignal;
    use crate::labels::LabelClass;
    use std::time::Duration;

    struct NoSource;

    impl LabelSource for NoSource {
        fn lookup_candidates(&self, _bbox: &BBox, _zoom: i32) -> CandidateBatch {
            CandidateBatch::new()
        }
    }

    struct NoRaster;

    impl Rasterizer for NoRaster {
        fn rasterize(&self, _class: &LabelClass, _text: &str) -> Option<Bitmap> {
            None
        }
    }

    fn engine() -> (LabelEngine, Arc<RedrawSignal>) {
        let mut classes = LabelClassRegistry::new();
        classes
            .register(LabelClass::new(
                &LabelClassConfig {
                    id: 1,
                    name: "city".to_string(),
                    has_dot: false,
                    ..LabelClassConfig::default()
                },
                1.0,
                true,
            ))
            .unwrap();
        let signal = Arc::new(RedrawSignal::new());
        let engine = LabelEngine::start(classes, NoSource, NoRaster, signal.clone()).unwrap();
        (engine, signal)
    }

    #[test]
    fn merged_candidates_deduplicate_by_position_and_text() {
        let (engine, signal) = engine();
        let reporter = engine.reporter();
        let query = SpatialQuery::new(engine.generation(), BBox::new(0.0, 0.0, 1.0, 1.0), 5);

        let first = CandidateBatch::from([(1, vec![LabelCandidate::new(10, 20, "A", 0, 1)])]);
        let second = CandidateBatch::from([(
            1,
            vec![LabelCandidate::new(10, 20, "A", 0, 2), LabelCandidate::new(11, 20, "A", 0, 3)],
        )]);
        assert_eq!(reporter.report_candidates(query, first), ReportOutcome::Applied);
        assert_eq!(reporter.report_candidates(query, second), ReportOutcome::Applied);
        assert_eq!(engine.candidate_count(), 2);
        assert!(signal.wait(Duration::from_secs(1)));
    }

    #[test]
    fn stale_reports_leave_caches_untouched() {
        let (mut engine, signal) = engine();
        let reporter = engine.reporter();
        let old = engine.generation();
        let class = Arc::clone(engine.classes().get(1).unwrap());

        engine.clear_bitmaps();
        assert!(engine.generation() > old);
        signal.take();

        let query = SpatialQuery::new(old, BBox::new(0.0, 0.0, 1.0, 1.0), 5);
        let batch = CandidateBatch::from([(1, vec![LabelCandidate::new(1, 1, "x", 0, 0)])]);
        assert_eq!(reporter.report_candidates(query, batch), ReportOutcome::Stale);
        let job = RenderJob::new(old, class, "x");
        assert_eq!(reporter.report_bitmap(job, Bitmap::new(2, 2)), ReportOutcome::Stale);

        assert_eq!(engine.candidate_count(), 0);
        assert_eq!(engine.bitmap_count(), 0);
        assert!(!signal.take());
    }

    #[test]
    fn debug_frame_is_inset_by_ten_pixels() {
        let (mut engine, _signal) = engine();
        engine.set_draw_debug_frame(true);
        let mut canvas = RecordingCanvas::new(200, 100);
        engine.draw_frame(&Viewport::new(0.5, 0.5, 3.0, 200, 100), &mut canvas);
        assert_eq!(
            canvas.ops().first(),
            Some(&DrawOp::StrokeRect {
                rect: Rect::new(10.0, 10.0, 190.0, 90.0),
                color: crate::canvas::Color::RED,
            })
        );
    }

    #[test]
    fn disabled_engine_draws_nothing() {
        let (mut engine, _signal) = engine();
        engine.set_draw_debug_frame(true);
        engine.enable_switch().set_enabled(false);
        let mut canvas = RecordingCanvas::new(200, 100);
        let stats = engine.draw_frame(&Viewport::new(0.5, 0.5, 3.0, 200, 100), &mut canvas);
        assert!(canvas.ops().is_empty());
        assert!(!stats.query_posted);
    }

    #[test]
    fn destroy_clears_and_deactivates() {
        let (mut engine, _signal) = engine();
        let reporter = engine.reporter();
        let query = SpatialQuery::new(engine.generation(), BBox::new(0.0, 0.0, 1.0, 1.0), 5);
        let batch = CandidateBatch::from([(1, vec![LabelCandidate::new(1, 1, "x", 0, 0)])]);
        reporter.report_candidates(query, batch);
        assert_eq!(engine.candidate_count(), 1);

        engine.destroy();
        assert!(!engine.is_active());
        assert_eq!(engine.candidate_count(), 0);
        let mut canvas = RecordingCanvas::new(10, 10);
        let stats = engine.draw_frame(&Viewport::new(0.5, 0.5, 3.0, 10, 10), &mut canvas);
        assert_eq!(stats, LabelFrameStats::default());
    }
}
