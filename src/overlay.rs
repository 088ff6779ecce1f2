//! Outlined text pinned to a corner of the map.

use crate::canvas::{Canvas, Color, TextAlign, TextPaint};
use crate::config::TextOverlaySettings;
use crate::text_metrics::{FontMetrics, FontStyle, font_metrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Draws corner text as a round-joined background outline with the
/// foreground fill on top. Sizes and margins are given in density
/// independent units and scaled by the display density. Each instance owns
/// its paints.
#[derive(Debug, Clone)]
pub struct TextOverlayDrawer {
    density: f32,
    font_family: String,
    fast_metrics: bool,
    text_size: f32,
    stroke_width: f32,
    foreground: Color,
    background: Color,
    metrics: FontMetrics,
}

impl TextOverlayDrawer {
    pub fn new(settings: &TextOverlaySettings, density: f32, fast_metrics: bool) -> Self {
        let text_size = settings.text_size * density;
        Self {
            density,
            font_family: settings.font_family.clone(),
            fast_metrics,
            text_size,
            stroke_width: settings.stroke_width * density,
            foreground: Color::from_hex(&settings.foreground).unwrap_or(Color::BLACK),
            background: Color::from_hex(&settings.background).unwrap_or(Color::WHITE),
            metrics: font_metrics(text_size, &settings.font_family, FontStyle::Normal, fast_metrics),
        }
    }

    pub fn set_foreground(&mut self, color: Color) {
        self.foreground = color;
    }

    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    pub fn set_text_size(&mut self, text_size: f32) {
        self.text_size = text_size * self.density;
        self.metrics = font_metrics(self.text_size, &self.font_family, FontStyle::Normal, self.fast_metrics);
    }

    pub fn set_stroke_width(&mut self, stroke_width: f32) {
        self.stroke_width = stroke_width * self.density;
    }

    /// Text size in pixels.
    pub fn text_size(&self) -> f32 {
        self.text_size
    }

    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    /// Draws `text` on line `line` counted from the corner, `margin` units
    /// away from both edges.
    pub fn draw(&self, canvas: &mut dyn Canvas, corner: Corner, text: &str, margin: f32, line: u32) {
        let (width, height) = canvas.size();
        let margin = margin * self.density;
        let line_offset = line as f32 * self.metrics.line_height;

        let (x, align) = match corner {
            Corner::TopLeft | Corner::BottomLeft => (margin, TextAlign::Left),
            Corner::TopRight | Corner::BottomRight => (width as f32 - margin, TextAlign::Right),
        };
        let y = match corner {
            Corner::TopLeft | Corner::TopRight => margin - self.metrics.ascent + line_offset,
            Corner::BottomLeft | Corner::BottomRight => {
                height as f32 - (self.metrics.descent + margin) - line_offset
            }
        };

        let halo = TextPaint::outline(self.text_size, self.background, self.stroke_width).aligned(align);
        let fill = TextPaint::fill(self.text_size, self.foreground).aligned(align);
        canvas.draw_text(text, x, y, &halo);
        canvas.draw_text(text, x, y, &fill);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawOp, RecordingCanvas};

    fn drawer() -> TextOverlayDrawer {
        TextOverlayDrawer::new(&TextOverlaySettings::default(), 2.0, true)
    }

    fn positions(canvas: &RecordingCanvas) -> Vec<(f32, f32, TextPaint)> {
        canvas
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { x, y, paint, .. } => Some((*x, *y, *paint)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn top_left_sits_below_the_margin() {
        let drawer = drawer();
        let mut canvas = RecordingCanvas::new(400, 300);
        drawer.draw(&mut canvas, Corner::TopLeft, "zoom 4", 4.0, 0);

        let ops = positions(&canvas);
        assert_eq!(ops.len(), 2);
        let (x, y, halo) = ops[0];
        assert_eq!(x, 8.0);
        assert!((y - (8.0 + 0.928 * 24.0)).abs() < 1e-3);
        assert_eq!(halo.stroke_width, Some(6.0));
        assert_eq!(halo.color, Color::WHITE);
        assert_eq!(halo.align, TextAlign::Left);
        assert_eq!(ops[1].2, TextPaint::fill(24.0, Color::BLACK));
    }

    #[test]
    fn bottom_right_lines_stack_upwards() {
        let drawer = drawer();
        let metrics = drawer.metrics();
        let mut canvas = RecordingCanvas::new(400, 300);
        drawer.draw(&mut canvas, Corner::BottomRight, "first", 4.0, 0);
        drawer.draw(&mut canvas, Corner::BottomRight, "second", 4.0, 1);

        let ops = positions(&canvas);
        let (x, y0, paint) = ops[0];
        assert_eq!(x, 392.0);
        assert_eq!(paint.align, TextAlign::Right);
        assert!((y0 - (300.0 - metrics.descent - 8.0)).abs() < 1e-3);
        let (_, y1, _) = ops[2];
        assert!((y0 - y1 - metrics.line_height).abs() < 1e-3);
    }

    #[test]
    fn setters_scale_by_density() {
        let mut drawer = drawer();
        drawer.set_text_size(10.0);
        drawer.set_stroke_width(1.5);
        drawer.set_foreground(Color::RED);
        assert_eq!(drawer.text_size(), 20.0);
        assert_eq!(drawer.metrics(), FontMetrics::approximate(20.0));

        let mut canvas = RecordingCanvas::new(100, 100);
        drawer.draw(&mut canvas, Corner::BottomLeft, "x", 0.0, 0);
        let ops = positions(&canvas);
        assert_eq!(ops[0].2.stroke_width, Some(3.0));
        assert_eq!(ops[1].2.color, Color::RED);
    }
}
