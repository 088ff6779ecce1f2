//! Screen rectangles and the normalized Web Mercator world the map lives in.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Integer world units across the whole Mercator square. Label candidates are
/// positioned in this space so results of different queries stay comparable.
pub const WORLD_UNITS: i32 = 1 << 28;

const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Float rectangle in screen pixels. Edges are inclusive: two rects that
/// merely touch intersect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_origin(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    pub fn inset(&self, by: f32) -> Rect {
        Rect::new(
            self.left + by,
            self.top + by,
            self.right - by,
            self.bottom - by,
        )
    }
}

/// Integer rectangle used as a blit source or destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PixelRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One of the four quadrants, `qx`/`qy` in `0..=1`.
    pub fn quadrant(&self, qx: i32, qy: i32) -> PixelRect {
        let half_w = self.width / 2;
        let half_h = self.height / 2;
        let x = self.x + qx * half_w;
        let y = self.y + qy * half_h;
        // the right/bottom quadrant absorbs odd remainders
        let w = if qx == 0 { half_w } else { self.width - half_w };
        let h = if qy == 0 { half_h } else { self.height - half_h };
        PixelRect::new(x, y, w, h)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::from_origin(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

/// Area of the world in normalized Mercator coordinates (`0..1` on both axes,
/// y growing southwards). Compared exactly so an unchanged viewport yields an
/// equal box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

pub fn lon_to_x(lon: f64) -> f64 {
    (lon + 180.0) / 360.0
}

pub fn x_to_lon(x: f64) -> f64 {
    x * 360.0 - 180.0
}

pub fn lat_to_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0
}

pub fn y_to_lat(y: f64) -> f64 {
    let n = PI * (1.0 - 2.0 * y);
    n.sinh().atan().to_degrees()
}

/// Normalized coordinate to integer world units.
pub fn to_world(normalized: f64) -> i32 {
    (normalized * WORLD_UNITS as f64).round() as i32
}

pub fn from_world(units: i32) -> f64 {
    units as f64 / WORLD_UNITS as f64
}
