use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;

use super::render_worker::RenderWorker;
use super::{ClassId, Generation, LabelCandidate, LabelClass, LabelClassRegistry, OccupancyIndex, RenderJob};
use crate::bitmap::Bitmap;
use crate::canvas::Canvas;
use crate::geometry::Rect;
use crate::theme::DebugStyle;
use crate::viewport::Viewport;

pub(crate) type CandidateSets = BTreeMap<ClassId, BTreeSet<LabelCandidate>>;
pub(crate) type BitmapCache = HashMap<ClassId, HashMap<String, Bitmap>>;

/// A label accepted by the placement pass of one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedLabel {
    pub class_id: ClassId,
    pub id: i64,
    pub text: String,
    pub place_type: i32,
    pub rect: Rect,
}

impl PlacedLabel {
    fn new(class_id: ClassId, candidate: &LabelCandidate, rect: Rect) -> Self {
        Self {
            class_id,
            id: candidate.id,
            text: candidate.text.clone(),
            place_type: candidate.place_type,
            rect,
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.rect.left && x <= self.rect.right && y >= self.rect.top && y <= self.rect.bottom
    }
}

/// Read-only state a strategy places labels from.
pub struct PlacementContext<'a> {
    pub viewport: &'a Viewport,
    pub classes: &'a LabelClassRegistry,
    pub(crate) candidates: &'a CandidateSets,
}

impl<'a> PlacementContext<'a> {
    /// Candidates of one class in their set order.
    pub fn candidates(&self, class_id: ClassId) -> impl Iterator<Item = &'a LabelCandidate> + 'a {
        self.candidates.get(&class_id).into_iter().flatten()
    }

    pub fn candidate_count(&self) -> usize {
        self.candidates.values().map(BTreeSet::len).sum()
    }

    pub fn screen_position(&self, candidate: &LabelCandidate) -> (f32, f32) {
        self.viewport.world_to_screen(candidate.x, candidate.y)
    }

    pub fn screen_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.viewport.width as f32, self.viewport.height as f32)
    }
}

/// Mutable side of one placement pass: the canvas, the occupancy index and
/// everything needed to draw or request label bitmaps.
pub struct LabelSink<'a> {
    canvas: &'a mut dyn Canvas,
    index: OccupancyIndex,
    bitmaps: &'a BitmapCache,
    render: &'a RenderWorker,
    generation: Generation,
    debug_boxes: Option<DebugStyle>,
    placed: Vec<PlacedLabel>,
    requested: usize,
}

impl<'a> LabelSink<'a> {
    pub(crate) fn new(
        canvas: &'a mut dyn Canvas,
        bitmaps: &'a BitmapCache,
        render: &'a RenderWorker,
        generation: Generation,
        debug_boxes: Option<DebugStyle>,
    ) -> Self {
        Self {
            canvas,
            index: OccupancyIndex::new(),
            bitmaps,
            render,
            generation,
            debug_boxes,
            placed: Vec::new(),
            requested: 0,
        }
    }

    pub fn is_free(&self, rect: &Rect) -> bool {
        self.index.is_free(rect)
    }

    /// Marks `rect` occupied without producing a label, e.g. for a marker dot.
    pub fn occupy(&mut self, rect: Rect) {
        self.index.add(rect);
    }

    pub fn canvas(&mut self) -> &mut dyn Canvas {
        &mut *self.canvas
    }

    pub fn has_bitmap(&self, class_id: ClassId, text: &str) -> bool {
        self.bitmaps
            .get(&class_id)
            .is_some_and(|bitmaps| bitmaps.contains_key(text))
    }

    /// Accepts `candidate` at `rect`: the area becomes occupied and the label
    /// is reported as placed. The bitmap is drawn if cached, otherwise it is
    /// requested and the label shows up in a later frame.
    pub fn use_label(&mut self, class: &Arc<LabelClass>, candidate: &LabelCandidate, rect: Rect) {
        self.index.add(rect);
        self.placed.push(PlacedLabel::new(class.id(), candidate, rect));

        let cached = self
            .bitmaps
            .get(&class.id())
            .and_then(|bitmaps| bitmaps.get(&candidate.text));
        match cached {
            Some(bitmap) => {
                self.canvas.draw_bitmap(bitmap, rect.left, rect.top);
                if let Some(debug) = self.debug_boxes {
                    self.canvas.stroke_rect(rect, debug.label_box, 1.0);
                }
            }
            None => {
                let job = RenderJob::new(self.generation, Arc::clone(class), candidate.text.clone());
                if self.render.post(job) {
                    self.requested += 1;
                }
            }
        }
    }

    pub fn placed(&self) -> &[PlacedLabel] {
        &self.placed
    }

    pub(crate) fn finish(self) -> (Vec<PlacedLabel>, usize) {
        (self.placed, self.requested)
    }
}

/// Decides which candidates become labels and where their boxes go.
pub trait PlacementStrategy {
    fn place(&mut self, ctx: &PlacementContext<'_>, sink: &mut LabelSink<'_>);
}

impl<F> PlacementStrategy for F
where
    F: FnMut(&PlacementContext<'_>, &mut LabelSink<'_>),
{
    fn place(&mut self, ctx: &PlacementContext<'_>, sink: &mut LabelSink<'_>) {
        self(ctx, sink)
    }
}

/// Classes in id order, candidates in set order. A label is centred above
/// its anchor when the class has a dot and centred on it otherwise; the first
/// candidate to claim an area wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenteredPlacement;

impl PlacementStrategy for CenteredPlacement {
    fn place(&mut self, ctx: &PlacementContext<'_>, sink: &mut LabelSink<'_>) {
        let screen = ctx.screen_rect();
        for class in ctx.classes.iter() {
            let box_config = class.box_config();
            let height = box_config.height as f32;
            let half_dot = class.dot_size() as f32 / 2.0;
            for candidate in ctx.candidates(class.id()) {
                let (sx, sy) = ctx.screen_position(candidate);
                let width = candidate.width(class) as f32;

                let (rect, dot_rect) = if class.has_dot {
                    let dot_rect = Rect::new(sx - half_dot, sy - half_dot, sx + half_dot, sy + half_dot);
                    let rect = Rect::from_origin(sx - width / 2.0, sy - half_dot - height, width, height);
                    (rect, Some(dot_rect))
                } else {
                    let rect = Rect::from_origin(sx - width / 2.0, sy - height / 2.0, width, height);
                    (rect, None)
                };

                if !rect.intersects(&screen) || !sink.is_free(&rect) {
                    continue;
                }
                if let Some(dot_rect) = dot_rect {
                    if !sink.is_free(&dot_rect) {
                        continue;
                    }
                    sink.occupy(dot_rect);
                    sink.canvas().fill_circle(sx, sy, half_dot, class.style.dot_color());
                }
                sink.use_label(class, candidate, rect);
            }
        }
    }
}
