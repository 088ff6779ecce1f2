//! Raster tile pyramid: keys, the visible tile window, the cache interface
//! and the renderer with parent/child fallback.

use serde::{Deserialize, Serialize};

pub mod cache;
pub mod renderer;

pub use cache::{MemoryTileCache, TileCache};
pub use renderer::{TileFrameStats, TileRenderer, cache_capacity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKey {
    pub zoom: i32,
    pub x: i32,
    pub y: i32,
}

impl TileKey {
    pub fn new(zoom: i32, x: i32, y: i32) -> Self {
        Self { zoom, x, y }
    }

    /// The tile one level up covering this one, or `None` below zoom 1.
    pub fn parent(&self) -> Option<TileKey> {
        let zoom = self.zoom - 1;
        if zoom < 1 {
            return None;
        }
        Some(TileKey::new(zoom, self.x.div_euclid(2), self.y.div_euclid(2)))
    }

    /// Which quadrant of the parent this tile occupies, `(0|1, 0|1)`.
    pub fn quadrant_in_parent(&self) -> (i32, i32) {
        (self.x.rem_euclid(2), self.y.rem_euclid(2))
    }

    /// The four tiles one level down, with the quadrant each one fills.
    pub fn children(&self) -> [(TileKey, (i32, i32)); 4] {
        let zoom = self.zoom + 1;
        let mut children = [(*self, (0, 0)); 4];
        for i in 0..2 {
            for k in 0..2 {
                children[(i * 2 + k) as usize] = (TileKey::new(zoom, self.x * 2 + i, self.y * 2 + k), (i, k));
            }
        }
        children
    }
}

/// A visible tile with its offset from the window origin, in unscaled
/// window pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCell {
    pub key: TileKey,
    pub dx: i32,
    pub dy: i32,
}

/// Tiles covering the viewport at an integer zoom, in raster order.
#[derive(Debug, Clone, PartialEq)]
pub struct TileWindow {
    pub zoom: i32,
    /// Factor from window pixels to screen pixels.
    pub scale: f64,
    pub tile_size: u32,
    pub width: u32,
    pub height: u32,
    pub cells: Vec<TileCell>,
}
