//! Drawing surface the renderers paint onto.

use serde::{Deserialize, Serialize};

use crate::bitmap::Bitmap;
use crate::geometry::{PixelRect, Rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(value: &str) -> Option<Color> {
        let hex = value.trim().strip_prefix('#')?;
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut it = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
                Some(Color::rgb(it.next()??, it.next()??, it.next()??))
            }
            6 => Some(Color::rgb(
                byte(hex.get(0..2)?)?,
                byte(hex.get(2..4)?)?,
                byte(hex.get(4..6)?)?,
            )),
            8 => Some(Color {
                r: byte(hex.get(0..2)?)?,
                g: byte(hex.get(2..4)?)?,
                b: byte(hex.get(4..6)?)?,
                a: byte(hex.get(6..8)?)?,
            }),
            _ => None,
        }
    }

    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAlign {
    #[default]
    Left,
    Right,
}

/// Paint for one pass over a run of text: an outline when `stroke_width` is
/// set, a fill otherwise. Outlined text uses round joins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextPaint {
    pub size: f32,
    pub color: Color,
    pub stroke_width: Option<f32>,
    pub align: TextAlign,
}

impl TextPaint {
    pub fn fill(size: f32, color: Color) -> Self {
        Self {
            size,
            color,
            stroke_width: None,
            align: TextAlign::Left,
        }
    }

    pub fn outline(size: f32, color: Color, stroke_width: f32) -> Self {
        Self {
            stroke_width: Some(stroke_width),
            ..Self::fill(size, color)
        }
    }

    pub fn aligned(self, align: TextAlign) -> Self {
        Self { align, ..self }
    }
}

pub trait Canvas {
    fn size(&self) -> (u32, u32);

    /// Blits `bitmap` unscaled with its top-left corner at `(x, y)`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: f32, y: f32);

    /// Stretches `src` (the whole bitmap when `None`) into `dst`.
    fn draw_bitmap_rect(&mut self, bitmap: &Bitmap, src: Option<PixelRect>, dst: PixelRect);

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32);

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color);

    /// Straight line with square caps.
    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32);

    /// Draws `text` with its baseline at `y`. `x` is the left or right end
    /// depending on `paint.align`.
    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &TextPaint);
}

/// A draw call captured by [`RecordingCanvas`]. Bitmaps are identified by
/// their size and top-left pixel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawOp {
    Bitmap {
        x: f32,
        y: f32,
        size: (u32, u32),
        first_pixel: Option<[u8; 4]>,
    },
    BitmapRect {
        src: Option<PixelRect>,
        dst: PixelRect,
        size: (u32, u32),
        first_pixel: Option<[u8; 4]>,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
    },
    Circle {
        cx: f32,
        cy: f32,
        radius: f32,
        color: Color,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        color: Color,
        width: f32,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        paint: TextPaint,
    },
}

/// Canvas that only remembers what was drawn on it.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<DrawOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn bitmap_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Bitmap { .. } | DrawOp::BitmapRect { .. }))
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: f32, y: f32) {
        self.ops.push(DrawOp::Bitmap {
            x,
            y,
            size: (bitmap.width(), bitmap.height()),
            first_pixel: bitmap.pixel(0, 0),
        });
    }

    fn draw_bitmap_rect(&mut self, bitmap: &Bitmap, src: Option<PixelRect>, dst: PixelRect) {
        self.ops.push(DrawOp::BitmapRect {
            src,
            dst,
            size: (bitmap.width(), bitmap.height()),
            first_pixel: bitmap.pixel(0, 0),
        });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, _width: f32) {
        self.ops.push(DrawOp::StrokeRect { rect, color });
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        self.ops.push(DrawOp::Circle {
            cx,
            cy,
            radius,
            color,
        });
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        self.ops.push(DrawOp::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &TextPaint) {
        self.ops.push(DrawOp::Text {
            text: text.to_string(),
            x,
            y,
            paint: *paint,
        });
    }
}
