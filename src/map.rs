use serde::Serialize;
use tracing::{debug, info};

use crate::canvas::Canvas;
use crate::labels::{LabelEngine, LabelFrameStats};
use crate::scale_bar::ScaleBarDrawer;
use crate::tiles::{TileCache, TileFrameStats, TileRenderer, TileWindow};
use crate::viewport::Viewport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub tiles: TileFrameStats,
    pub labels: LabelFrameStats,
}

/// Everything the tile cache size is derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct WindowGeometry {
    zoom: i32,
    scale: f64,
    tile_size: u32,
    width: u32,
    height: u32,
}

impl WindowGeometry {
    fn of(window: &TileWindow) -> Self {
        Self {
            zoom: window.zoom,
            scale: window.scale,
            tile_size: window.tile_size,
            width: window.width,
            height: window.height,
        }
    }
}

/// Tiles underneath, labels on top, the scale bar over both.
pub struct MapRenderer<C: TileCache> {
    tiles: TileRenderer<C>,
    labels: LabelEngine,
    scale_bar: Option<ScaleBarDrawer>,
    geometry: Option<WindowGeometry>,
}

impl<C: TileCache> MapRenderer<C> {
    pub fn new(tiles: TileRenderer<C>, labels: LabelEngine) -> Self {
        Self {
            tiles,
            labels,
            scale_bar: None,
            geometry: None,
        }
    }

    pub fn set_scale_bar(&mut self, scale_bar: Option<ScaleBarDrawer>) {
        self.scale_bar = scale_bar;
    }

    pub fn scale_bar_mut(&mut self) -> Option<&mut ScaleBarDrawer> {
        self.scale_bar.as_mut()
    }

    pub fn tiles(&self) -> &TileRenderer<C> {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileRenderer<C> {
        &mut self.tiles
    }

    pub fn labels(&self) -> &LabelEngine {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelEngine {
        &mut self.labels
    }

    /// The viewport as the renderer draws it, with the current magnified tile
    /// size.
    pub fn effective_viewport(&self, viewport: &Viewport) -> Viewport {
        viewport.with_tile_size(self.tiles.tile_size())
    }

    /// Applies a new magnification to tiles and labels. Returns `true` when
    /// either changed.
    pub fn set_magnification(&mut self, magnification: f32) -> bool {
        let tiles = self.tiles.set_magnification(magnification);
        let labels = self.labels.set_magnification(magnification);
        if tiles || labels {
            // cache sizing depends on the tile size
            self.geometry = None;
        }
        tiles || labels
    }

    /// Resizes the tile cache for the window. Returns the new capacity.
    pub fn on_geometry_changed(&mut self, viewport: &Viewport) -> usize {
        let viewport = self.effective_viewport(viewport);
        self.resize_for(&viewport.tile_window())
    }

    fn resize_for(&mut self, window: &TileWindow) -> usize {
        let capacity = self.tiles.on_geometry_changed(window);
        self.geometry = Some(WindowGeometry::of(window));
        info!(
            target: "display",
            zoom = window.zoom,
            width = window.width,
            height = window.height,
            capacity,
            "map geometry changed"
        );
        capacity
    }

    pub fn paint(&mut self, viewport: &Viewport, canvas: &mut dyn Canvas) -> FrameStats {
        let viewport = self.effective_viewport(viewport);
        let window = viewport.tile_window();
        // window size and scale follow fractional zoom, not only the screen
        if self.geometry != Some(WindowGeometry::of(&window)) {
            self.resize_for(&window);
        }
        let tiles = self.tiles.render(&window, canvas);
        let labels = self.labels.draw_frame(&viewport, canvas);
        if let Some(scale_bar) = &self.scale_bar {
            scale_bar.draw(&viewport, canvas);
        }
        debug!(
            target: "display",
            exact = tiles.exact,
            blank = tiles.blank,
            placed = labels.placed,
            "frame painted"
        );
        FrameStats { tiles, labels }
    }
}
