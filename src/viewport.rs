use serde::{Deserialize, Serialize};

use crate::geometry::{self, BBox, from_world};
use crate::tiles::{TileCell, TileKey, TileWindow};

const MAX_TILE_ZOOM: i32 = 30;

/// Camera over the Mercator world: a normalized centre, a fractional zoom and
/// the screen size in pixels. At zoom `z` the world is `tile_size * 2^z`
/// pixels wide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center_x: f64,
    pub center_y: f64,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
}

impl Viewport {
    pub fn new(center_x: f64, center_y: f64, zoom: f64, width: u32, height: u32) -> Self {
        Self {
            center_x,
            center_y,
            zoom,
            width,
            height,
            tile_size: 256,
        }
    }

    pub fn from_lon_lat(lon: f64, lat: f64, zoom: f64, width: u32, height: u32) -> Self {
        Self::new(geometry::lon_to_x(lon), geometry::lat_to_y(lat), zoom, width, height)
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn world_pixels(&self) -> f64 {
        self.tile_size as f64 * 2f64.powf(self.zoom)
    }

    pub fn rounded_zoom(&self) -> i32 {
        self.zoom.round() as i32
    }

    pub fn center_lat(&self) -> f64 {
        geometry::y_to_lat(self.center_y)
    }

    pub fn bbox(&self) -> BBox {
        let wp = self.world_pixels();
        let half_w = self.width as f64 / 2.0 / wp;
        let half_h = self.height as f64 / 2.0 / wp;
        BBox::new(
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        )
    }

    pub fn normalized_to_screen(&self, x: f64, y: f64) -> (f32, f32) {
        let wp = self.world_pixels();
        let sx = (x - self.center_x) * wp + self.width as f64 / 2.0;
        let sy = (y - self.center_y) * wp + self.height as f64 / 2.0;
        (sx as f32, sy as f32)
    }

    /// Projects integer world units to screen pixels.
    pub fn world_to_screen(&self, x: i32, y: i32) -> (f32, f32) {
        self.normalized_to_screen(from_world(x), from_world(y))
    }

    pub fn screen_to_normalized(&self, sx: f32, sy: f32) -> (f64, f64) {
        let wp = self.world_pixels();
        (
            self.center_x + (sx as f64 - self.width as f64 / 2.0) / wp,
            self.center_y + (sy as f64 - self.height as f64 / 2.0) / wp,
        )
    }

    pub fn pan_pixels(&mut self, dx: f32, dy: f32) {
        let wp = self.world_pixels();
        self.center_x += dx as f64 / wp;
        self.center_y = (self.center_y + dy as f64 / wp).clamp(0.0, 1.0);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// Tiles covering the screen at the nearest integer zoom. Tiles are drawn
    /// scaled by `2^(zoom - tile_zoom)`; cell offsets are in unscaled window
    /// pixels.
    pub fn tile_window(&self) -> TileWindow {
        let tile_zoom = self.rounded_zoom().clamp(0, MAX_TILE_ZOOM);
        let scale = 2f64.powf(self.zoom - tile_zoom as f64);
        let width = (self.width as f64 / scale).ceil() as i64;
        let height = (self.height as f64 / scale).ceil() as i64;
        let tile = self.tile_size as i64;
        let world = tile * (1i64 << tile_zoom);

        let left = (self.center_x * world as f64 - width as f64 / 2.0).floor() as i64;
        let top = (self.center_y * world as f64 - height as f64 / 2.0).floor() as i64;
        let tx0 = left.div_euclid(tile);
        let ty0 = top.div_euclid(tile);
        let tx1 = (left + width - 1).div_euclid(tile);
        let ty1 = (top + height - 1).div_euclid(tile);
        let tiles_per_axis = 1i64 << tile_zoom;

        let mut cells = Vec::new();
        for ty in ty0..=ty1 {
            if ty < 0 || ty >= tiles_per_axis {
                continue;
            }
            for tx in tx0..=tx1 {
                cells.push(TileCell {
                    key: TileKey::new(tile_zoom, tx.rem_euclid(tiles_per_axis) as i32, ty as i32),
                    dx: (tx * tile - left) as i32,
                    dy: (ty * tile - top) as i32,
                });
            }
        }

        TileWindow {
            zoom: tile_zoom,
            scale,
            tile_size: self.tile_size,
            width: width as u32,
            height: height as u32,
            cells,
        }
    }
}
