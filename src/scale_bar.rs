use serde::Serialize;
use tracing::trace;

use crate::canvas::{Canvas, Color, TextPaint};
use crate::config::ScaleBarSettings;
use crate::text_metrics::{FontStyle, font_metrics};
use crate::viewport::Viewport;

const EARTH_CIRCUMFERENCE_M: f64 = 2.0 * std::f64::consts::PI * 6_378_137.0;

/// A round ground distance and its length on screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleBar {
    pub metres: u64,
    pub width_px: f32,
    pub text: String,
}

impl ScaleBar {
    /// Picks the longest `1, 2, 5 x 10^k` metre distance that fits in
    /// `max_width` pixels at latitude `lat` for a world `world_pixels` wide.
    pub fn compute(lat: f64, world_pixels: f64, max_width: f32) -> Option<ScaleBar> {
        if world_pixels <= 0.0 || max_width <= 0.0 {
            return None;
        }
        let metres_per_pixel = lat.to_radians().cos() * EARTH_CIRCUMFERENCE_M / world_pixels;
        if !metres_per_pixel.is_finite() || metres_per_pixel <= 0.0 {
            return None;
        }
        let max_metres = metres_per_pixel * max_width as f64;
        if max_metres < 1.0 {
            return None;
        }

        let magnitude = 10f64.powi(max_metres.log10().floor() as i32);
        let metres = [5.0, 2.0, 1.0]
            .into_iter()
            .map(|step| step * magnitude)
            .find(|candidate| *candidate <= max_metres)
            .unwrap_or(magnitude) as u64;

        let text = if metres > 1000 {
            format!("{} km", metres / 1000)
        } else {
            format!("{metres} m")
        };
        Some(ScaleBar {
            metres,
            width_px: (metres as f64 / metres_per_pixel) as f32,
            text,
        })
    }
}

/// Draws the scale bar into the bottom-left corner: every line once as a
/// wide background halo and once in the foreground, then the outlined
/// distance text above the bar.
#[derive(Debug, Clone)]
pub struct ScaleBarDrawer {
    enabled: bool,
    max_width: f32,
    offset_x: f32,
    offset_y: f32,
    inner_line_width: f32,
    outer_line_width: f32,
    bar_height: f32,
    font_size: f32,
    descent: f32,
    foreground: Color,
    background: Color,
}

impl ScaleBarDrawer {
    pub fn new(settings: &ScaleBarSettings, fast_metrics: bool) -> Self {
        Self {
            enabled: settings.enabled,
            max_width: settings.max_width,
            offset_x: settings.offset_x,
            offset_y: settings.offset_y,
            inner_line_width: settings.inner_line_width,
            outer_line_width: settings.outer_line_width,
            bar_height: settings.bar_height,
            font_size: settings.font_size,
            descent: font_metrics(settings.font_size, "sans-serif", FontStyle::Normal, fast_metrics).descent,
            foreground: Color::from_hex(&settings.foreground).unwrap_or(Color::BLACK),
            background: Color::from_hex(&settings.background).unwrap_or(Color::WHITE),
        }
    }

    pub fn set_colors(&mut self, foreground: Color, background: Color) {
        self.foreground = foreground;
        self.background = background;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the bar that was drawn, if any.
    pub fn draw(&self, viewport: &Viewport, canvas: &mut dyn Canvas) -> Option<ScaleBar> {
        if !self.enabled {
            return None;
        }
        let bar = ScaleBar::compute(viewport.center_lat(), viewport.world_pixels(), self.max_width)?;

        let height = canvas.size().1 as f32;
        let y0 = height - self.offset_y - self.bar_height;
        let ym = height - self.offset_y - self.bar_height / 2.0;
        let y1 = height - self.offset_y;
        let x0 = self.offset_x;
        let x1 = self.offset_x + bar.width_px.round();

        let lines = [((x0, ym), (x1, ym)), ((x0, y0), (x0, y1)), ((x1, y0), (x1, y1))];
        for (color, width) in [
            (self.background, self.outer_line_width),
            (self.foreground, self.inner_line_width),
        ] {
            for (from, to) in lines {
                canvas.draw_line(from, to, color, width);
            }
        }

        let x = self.offset_x + self.font_size;
        let y = ym - self.inner_line_width - self.descent;
        let halo = TextPaint::outline(self.font_size, self.background, self.outer_line_width);
        canvas.draw_text(&bar.text, x, y, &halo);
        canvas.draw_text(&bar.text, x, y, &TextPaint::fill(self.font_size, self.foreground));

        trace!(target: "display", metres = bar.metres, width = bar.width_px, "scale bar drawn");
        Some(bar)
    }
}
