use serde::Serialize;
use tracing::{debug, info, trace};

use super::{TileCache, TileCell, TileWindow};
use crate::canvas::{Canvas, Color};
use crate::config::TileSettings;
use crate::geometry::PixelRect;
use crate::magnification::{DisplayMetrics, TileScale};
use crate::theme::DebugStyle;

/// How each visible cell was filled in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TileFrameStats {
    pub exact: usize,
    pub parent: usize,
    pub child_cells: usize,
    pub child_tiles: usize,
    pub blank: usize,
}

/// Tile cache capacity for a window and a display: the larger of the tile
/// counts needed to cover either, with one tile of margin per axis and 50%
/// headroom for prefetching.
pub fn cache_capacity(window: &TileWindow, display: &DisplayMetrics) -> usize {
    let tw = window.tile_size.max(1) as f64;
    let wt_x = (window.width as f64 / tw).ceil();
    let wt_y = (window.height as f64 / tw).ceil();

    let scaled = tw * window.scale;
    let dt_x = (display.width as f64 / scaled).ceil();
    let dt_y = (display.height as f64 / scaled).ceil();

    let for_window = ((wt_x + 1.0) * (wt_y + 1.0) * 1.5).ceil() as usize;
    let for_display = ((dt_x + 1.0) * (dt_y + 1.0) * 1.5).ceil() as usize;
    debug!(
        target: "display",
        wt_x,
        wt_y,
        dt_x,
        dt_y,
        for_window,
        for_display,
        "tile cache size estimates"
    );
    for_window.max(for_display)
}

/// Draws the tile window, substituting parent or child tiles for tiles that
/// are not loaded yet.
pub struct TileRenderer<C: TileCache> {
    cache: C,
    display: DisplayMetrics,
    scale: TileScale,
    max_tile_scale: f32,
    base_tile_size: u32,
    draw_grid: bool,
    grid_color: Color,
    capacity: usize,
}

impl<C: TileCache> TileRenderer<C> {
    pub fn new(cache: C, settings: &TileSettings, display: DisplayMetrics) -> Self {
        Self {
            cache,
            display,
            scale: TileScale::for_magnification(1.0, settings.max_tile_scale, settings.base_tile_size),
            max_tile_scale: settings.max_tile_scale,
            base_tile_size: settings.base_tile_size,
            draw_grid: settings.draw_grid,
            grid_color: DebugStyle::default().grid,
            capacity: 0,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn tile_scale(&self) -> TileScale {
        self.scale
    }

    /// Edge length of a tile in window pixels at the current magnification.
    pub fn tile_size(&self) -> u32 {
        self.scale.tile_size
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_draw_grid(&mut self, draw: bool) {
        self.draw_grid = draw;
    }

    pub fn set_display(&mut self, display: DisplayMetrics) {
        self.display = display;
    }

    /// Returns `false` when `magnification` is already current.
    pub fn set_magnification(&mut self, magnification: f32) -> bool {
        if self.scale.magnification == magnification {
            return false;
        }
        self.scale = TileScale::for_magnification(magnification, self.max_tile_scale, self.base_tile_size);
        info!(
            target: "tiles",
            magnification,
            tile_size = self.scale.tile_size,
            user_scale = self.scale.user_scale,
            "tile magnification changed"
        );
        true
    }

    /// Resizes the cache for a new window geometry.
    pub fn on_geometry_changed(&mut self, window: &TileWindow) -> usize {
        let capacity = cache_capacity(window, &self.display);
        if capacity != self.capacity {
            self.capacity = capacity;
            self.cache.set_capacity(capacity);
            info!(target: "display", capacity, "tile cache capacity");
        }
        capacity
    }

    pub fn render(&self, window: &TileWindow, canvas: &mut dyn Canvas) -> TileFrameStats {
        self.cache.cancel_pending_jobs();
        for cell in &window.cells {
            self.cache.prefetch_hint(cell.key);
        }

        let (width, height) = canvas.size();
        let center = (width as i64 / 2, height as i64 / 2);
        let mut stats = TileFrameStats::default();

        for cell in &window.cells {
            let dst = cell_rect(cell, window);
            let priority = priority(&dst, center);

            if let Some(tile) = self.cache.get_with_priority(cell.key, priority) {
                canvas.draw_bitmap_rect(&tile, None, dst);
                stats.exact += 1;
            } else if self.draw_parent(cell, dst, canvas) {
                stats.parent += 1;
            } else {
                match self.draw_children(cell, window, canvas) {
                    0 => stats.blank += 1,
                    drawn => {
                        stats.child_cells += 1;
                        stats.child_tiles += drawn;
                    }
                }
            }
        }

        if self.draw_grid {
            for cell in &window.cells {
                canvas.stroke_rect(cell_rect(cell, window).to_rect(), self.grid_color, 1.0);
            }
        }

        trace!(
            target: "tiles",
            exact = stats.exact,
            parent = stats.parent,
            child_cells = stats.child_cells,
            blank = stats.blank,
            "tile pass done"
        );
        stats
    }

    fn draw_parent(&self, cell: &TileCell, dst: PixelRect, canvas: &mut dyn Canvas) -> bool {
        let Some(parent) = cell.key.parent() else {
            return false;
        };
        let Some(tile) = self.cache.get_if_present(parent) else {
            return false;
        };
        let (qx, qy) = cell.key.quadrant_in_parent();
        let half_w = tile.width() as i32 / 2;
        let half_h = tile.height() as i32 / 2;
        let src = PixelRect::new(qx * half_w, qy * half_h, half_w, half_h);
        canvas.draw_bitmap_rect(&tile, Some(src), dst);
        true
    }

    fn draw_children(&self, cell: &TileCell, window: &TileWindow, canvas: &mut dyn Canvas) -> usize {
        let scale = window.scale;
        let tw = window.tile_size as f64;
        let ddx = cell.dx as f64 * scale;
        let ddy = cell.dy as f64 * scale;

        let mut drawn = 0;
        for (child, (i, k)) in cell.key.children() {
            let Some(tile) = self.cache.get_if_present(child) else {
                continue;
            };
            let left = ddx + i as f64 * tw * scale / 2.0;
            let top = ddy + k as f64 * tw * scale / 2.0;
            let dst = round_rect(left, top, left + scale / 2.0 * tw, top + scale / 2.0 * tw);
            canvas.draw_bitmap_rect(&tile, None, dst);
            drawn += 1;
        }
        drawn
    }
}

fn cell_rect(cell: &TileCell, window: &TileWindow) -> PixelRect {
    let scale = window.scale;
    let tw = window.tile_size as f64;
    let ddx = cell.dx as f64 * scale;
    let ddy = cell.dy as f64 * scale;
    round_rect(ddx, ddy, ddx + scale * tw, ddy + scale * tw)
}

fn round_rect(left: f64, top: f64, right: f64, bottom: f64) -> PixelRect {
    let left = left.round() as i32;
    let top = top.round() as i32;
    PixelRect::new(left, top, right.round() as i32 - left, bottom.round() as i32 - top)
}

/// Squared screen distance from the tile centre to the screen centre.
fn priority(dst: &PixelRect, center: (i64, i64)) -> i64 {
    let dx = dst.x as i64 + dst.width as i64 / 2 - center.0;
    let dy = dst.y as i64 + dst.height as i64 / 2 - center.1;
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::canvas::{DrawOp, RecordingCanvas};
    use crate::tiles::{MemoryTileCache, TileKey};
    use crate::viewport::Viewport;
    use std::sync::Arc;

    fn renderer() -> TileRenderer<Arc<MemoryTileCache>> {
        TileRenderer::new(
            Arc::new(MemoryTileCache::new(64)),
            &TileSettings::default(),
            DisplayMetrics::default(),
        )
    }

    fn single_cell_window(key: TileKey) -> TileWindow {
        TileWindow {
            zoom: key.zoom,
            scale: 1.0,
            tile_size: 256,
            width: 256,
            height: 256,
            cells: vec![TileCell { key, dx: 0, dy: 0 }],
        }
    }

    #[test]
    fn exact_tile_fills_cell() {
        let r = renderer();
        let key = TileKey::new(4, 3, 5);
        r.cache().insert(key, Bitmap::filled(256, 256, [0, 255, 0, 255]));
        let mut canvas = RecordingCanvas::new(256, 256);
        let stats = r.render(&single_cell_window(key), &mut canvas);
        assert_eq!(stats.exact, 1);
        assert_eq!(
            canvas.ops(),
            &[DrawOp::BitmapRect {
                src: None,
                dst: PixelRect::new(0, 0, 256, 256),
                size: (256, 256),
                first_pixel: Some([0, 255, 0, 255]),
            }]
        );
    }

    #[test]
    fn missing_tile_uses_parent_quadrant() {
        let r = renderer();
        let key = TileKey::new(4, 3, 4);
        r.cache().insert(TileKey::new(3, 1, 2), Bitmap::filled(256, 256, [255, 0, 0, 255]));
        let mut canvas = RecordingCanvas::new(256, 256);
        let stats = r.render(&single_cell_window(key), &mut canvas);
        assert_eq!(stats.parent, 1);
        match &canvas.ops()[0] {
            DrawOp::BitmapRect { src, dst, .. } => {
                assert_eq!(*src, Some(PixelRect::new(128, 0, 128, 128)));
                assert_eq!(*dst, PixelRect::new(0, 0, 256, 256));
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert_eq!(r.cache().take_pending(), vec![(key, 0)]);
    }

    #[test]
    fn parent_crop_follows_the_parent_bitmap_size() {
        let mut r = renderer();
        r.set_magnification(1.5);
        let key = TileKey::new(4, 3, 5);
        let window = TileWindow {
            tile_size: r.tile_size(),
            width: 384,
            height: 384,
            ..single_cell_window(key)
        };
        let crop = |r: &TileRenderer<Arc<MemoryTileCache>>| {
            let mut canvas = RecordingCanvas::new(384, 384);
            assert_eq!(r.render(&window, &mut canvas).parent, 1);
            match canvas.take_ops().remove(0) {
                DrawOp::BitmapRect { src, dst, .. } => (src, dst),
                other => panic!("unexpected op {other:?}"),
            }
        };

        r.cache().insert(TileKey::new(3, 1, 2), Bitmap::new(384, 384));
        assert_eq!(
            crop(&r),
            (Some(PixelRect::new(192, 192, 192, 192)), PixelRect::new(0, 0, 384, 384))
        );

        // a parent loaded before the magnification change is still cropped to its own quadrant
        r.cache().insert(TileKey::new(3, 1, 2), Bitmap::new(256, 256));
        assert_eq!(
            crop(&r),
            (Some(PixelRect::new(128, 128, 128, 128)), PixelRect::new(0, 0, 384, 384))
        );
    }

    #[test]
    fn no_parent_below_zoom_one() {
        let r = renderer();
        let key = TileKey::new(1, 1, 0);
        r.cache().insert(TileKey::new(0, 0, 0), Bitmap::new(256, 256));
        let mut canvas = RecordingCanvas::new(256, 256);
        let stats = r.render(&single_cell_window(key), &mut canvas);
        assert_eq!(stats.parent, 0);
        assert_eq!(stats.blank, 1);
    }

    #[test]
    fn children_fill_their_quadrants() {
        let r = renderer();
        let key = TileKey::new(4, 3, 4);
        r.cache().insert(TileKey::new(5, 6, 8), Bitmap::new(256, 256));
        r.cache().insert(TileKey::new(5, 7, 9), Bitmap::new(256, 256));
        let mut canvas = RecordingCanvas::new(256, 256);
        let stats = r.render(&single_cell_window(key), &mut canvas);
        assert_eq!(stats.child_cells, 1);
        assert_eq!(stats.child_tiles, 2);
        let dsts: Vec<PixelRect> = canvas
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::BitmapRect { dst, .. } => Some(*dst),
                _ => None,
            })
            .collect();
        assert_eq!(dsts, vec![PixelRect::new(0, 0, 128, 128), PixelRect::new(128, 128, 128, 128)]);
    }

    #[test]
    fn center_tiles_get_best_priority() {
        let r = renderer();
        let viewport = Viewport::new(0.5, 0.5, 3.0, 512, 512);
        let window = viewport.tile_window();
        let mut canvas = RecordingCanvas::new(512, 512);
        let stats = r.render(&window, &mut canvas);
        assert_eq!(stats.blank, window.cells.len());

        let pending = r.cache().take_pending();
        assert_eq!(pending.len(), 4);
        assert!(pending.iter().all(|(_, priority)| *priority == 128 * 128 * 2));

        let offset = Viewport::new(0.5 + 64.0 / 2048.0, 0.5, 3.0, 512, 512);
        r.render(&offset.tile_window(), &mut canvas);
        let pending = r.cache().take_pending();
        assert!(pending[0].1 < pending[pending.len() - 1].1);
    }

    #[test]
    fn each_frame_cancels_previous_requests() {
        let r = renderer();
        let mut canvas = RecordingCanvas::new(256, 256);
        r.render(&single_cell_window(TileKey::new(4, 0, 0)), &mut canvas);
        r.render(&single_cell_window(TileKey::new(4, 1, 0)), &mut canvas);
        assert_eq!(r.cache().take_pending(), vec![(TileKey::new(4, 1, 0), 0)]);
    }

    #[test]
    fn capacity_takes_larger_estimate() {
        let window = Viewport::new(0.5, 0.5, 5.0, 1000, 600).tile_window();
        let display = DisplayMetrics {
            width: 1080,
            height: 1920,
            density: 2.0,
        };
        // window: 4x3 tiles -> 5*4*1.5 = 30; display: 5x8 tiles -> 6*9*1.5 = 81
        assert_eq!(cache_capacity(&window, &display), 81);

        let small = DisplayMetrics {
            width: 320,
            height: 240,
            density: 1.0,
        };
        assert_eq!(cache_capacity(&window, &small), 30);
    }

    #[test]
    fn magnification_updates_tile_size() {
        let mut r = renderer();
        assert!(r.set_magnification(1.5));
        assert!(!r.set_magnification(1.5));
        assert_eq!(r.tile_size(), 384);
    }
}
