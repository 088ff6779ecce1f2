//! Label rasterization through resvg and a pixmap backed [`Canvas`].

use std::path::Path;
use std::sync::Arc;

use resvg::tiny_skia::{
    self, FillRule, FilterQuality, LineCap, Paint, PathBuilder, Pattern, Pixmap, PixmapPaint, PixmapRef, SpreadMode,
    Stroke, Transform,
};
use tracing::warn;

use crate::bitmap::Bitmap;
use crate::canvas::{Canvas, Color, TextAlign, TextPaint};
use crate::error::{Error, Result};
use crate::geometry::{PixelRect, Rect};
use crate::labels::{LabelClass, Rasterizer};

/// Draws label text as an SVG: a round-joined halo stroke first, then the
/// fill, both at the class baseline.
pub struct SvgRasterizer {
    fontdb: Arc<usvg::fontdb::Database>,
}

impl SvgRasterizer {
    pub fn new() -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Self::with_fontdb(Arc::new(db))
    }

    pub fn with_fontdb(fontdb: Arc<usvg::fontdb::Database>) -> Self {
        Self { fontdb }
    }

    pub fn label_svg(class: &LabelClass, text: &str) -> String {
        let box_config = class.box_config();
        let width = class.box_width(text).max(1);
        let height = box_config.height.max(1);
        let x = box_config.border;
        let y = box_config.baseline();
        let font = format!(
            "font-family=\"{}\" font-size=\"{}\" font-weight=\"{}\" font-style=\"{}\"",
            escape_xml(&class.font_family),
            box_config.text_size,
            class.font_style.svg_weight(),
            class.font_style.svg_style(),
        );
        let text = escape_xml(text);

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
        );
        if class.stroke_width() > 0 {
            svg.push_str(&format!(
                "<text x=\"{x}\" y=\"{y}\" {font} fill=\"none\" {} stroke-width=\"{}\" stroke-linejoin=\"round\">{text}</text>",
                paint_attr("stroke", &class.style.stroke_caption),
                class.stroke_width(),
            ));
        }
        svg.push_str(&format!(
            "<text x=\"{x}\" y=\"{y}\" {font} {}>{text}</text>",
            paint_attr("fill", &class.style.fill_caption),
        ));
        svg.push_str("</svg>");
        svg
    }

    fn render(&self, class: &LabelClass, text: &str) -> Result<Bitmap> {
        let svg = Self::label_svg(class, text);
        let opt = usvg::Options {
            font_family: class.font_family.clone(),
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opt)?;
        let size = tree.size().to_int_size();
        let mut pixmap = Pixmap::new(size.width(), size.height()).ok_or(Error::Pixmap {
            width: size.width(),
            height: size.height(),
        })?;
        resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
        let (width, height) = (pixmap.width(), pixmap.height());
        Bitmap::from_rgba(width, height, pixmap.take()).ok_or(Error::Pixmap { width, height })
    }
}

impl Default for SvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Rasterizer for SvgRasterizer {
    fn rasterize(&self, class: &LabelClass, text: &str) -> Option<Bitmap> {
        match self.render(class, text) {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                warn!(target: "labels", class_id = class.id(), text, error = %err, "label rasterization failed");
                None
            }
        }
    }
}

/// [`Canvas`] drawing into a tiny-skia pixmap. Text goes through usvg with
/// the canvas font database, which is empty unless one is supplied.
pub struct PixmapCanvas {
    pixmap: Pixmap,
    fontdb: Arc<usvg::fontdb::Database>,
}

impl PixmapCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(Error::Pixmap { width, height })?;
        Ok(Self {
            pixmap,
            fontdb: Arc::new(usvg::fontdb::Database::new()),
        })
    }

    pub fn with_fontdb(mut self, fontdb: Arc<usvg::fontdb::Database>) -> Self {
        self.fontdb = fontdb;
        self
    }

    pub fn fill(&mut self, color: Color) {
        self.pixmap
            .fill(tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.a));
    }

    pub fn to_bitmap(&self) -> Option<Bitmap> {
        Bitmap::from_rgba(self.pixmap.width(), self.pixmap.height(), self.pixmap.data().to_vec())
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.pixmap.save_png(path).map_err(|err| Error::Png(err.to_string()))
    }

    fn render_text(&mut self, text: &str, x: f32, y: f32, paint: &TextPaint) -> Result<()> {
        let svg = text_svg(self.pixmap.width(), self.pixmap.height(), text, x, y, paint);
        let opt = usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..usvg::Options::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opt)?;
        resvg::render(&tree, Transform::identity(), &mut self.pixmap.as_mut());
        Ok(())
    }
}

/// A canvas sized SVG holding one text pass.
fn text_svg(width: u32, height: u32, text: &str, x: f32, y: f32, paint: &TextPaint) -> String {
    let anchor = match paint.align {
        TextAlign::Left => "start",
        TextAlign::Right => "end",
    };
    let paint_attrs = match paint.stroke_width {
        Some(stroke_width) => format!(
            "fill=\"none\" {} stroke-width=\"{stroke_width}\" stroke-linejoin=\"round\" stroke-linecap=\"round\"",
            paint_attr("stroke", &paint.color.to_hex()),
        ),
        None => paint_attr("fill", &paint.color.to_hex()),
    };
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\
         <text x=\"{x}\" y=\"{y}\" font-family=\"sans-serif\" font-size=\"{}\" text-anchor=\"{anchor}\" {paint_attrs}>{}</text></svg>",
        paint.size,
        escape_xml(text),
    )
}

fn solid(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn pixmap_ref(bitmap: &Bitmap) -> Option<PixmapRef<'_>> {
    PixmapRef::from_bytes(bitmap.data(), bitmap.width(), bitmap.height())
}

impl Canvas for PixmapCanvas {
    fn size(&self) -> (u32, u32) {
        (self.pixmap.width(), self.pixmap.height())
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, x: f32, y: f32) {
        let Some(src) = pixmap_ref(bitmap) else {
            return;
        };
        self.pixmap.draw_pixmap(
            x.round() as i32,
            y.round() as i32,
            src,
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    fn draw_bitmap_rect(&mut self, bitmap: &Bitmap, src: Option<PixelRect>, dst: PixelRect) {
        let Some(pixmap) = pixmap_ref(bitmap) else {
            return;
        };
        let src = src.unwrap_or(PixelRect::new(0, 0, bitmap.width() as i32, bitmap.height() as i32));
        if src.width <= 0 || src.height <= 0 {
            return;
        }
        let Some(target) =
            tiny_skia::Rect::from_xywh(dst.x as f32, dst.y as f32, dst.width as f32, dst.height as f32)
        else {
            return;
        };
        let sx = dst.width as f32 / src.width as f32;
        let sy = dst.height as f32 / src.height as f32;
        let transform = Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            dst.x as f32 - src.x as f32 * sx,
            dst.y as f32 - src.y as f32 * sy,
        );
        let paint = Paint {
            shader: Pattern::new(pixmap, SpreadMode::Pad, FilterQuality::Bilinear, 1.0, transform),
            anti_alias: false,
            ..Paint::default()
        };
        self.pixmap.fill_rect(target, &paint, Transform::identity(), None);
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, width: f32) {
        let Some(rect) = tiny_skia::Rect::from_ltrb(rect.left, rect.top, rect.right, rect.bottom) else {
            return;
        };
        let path = PathBuilder::from_rect(rect);
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Color) {
        let Some(path) = PathBuilder::from_circle(cx, cy, radius) else {
            return;
        };
        self.pixmap
            .fill_path(&path, &solid(color), FillRule::Winding, Transform::identity(), None);
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        let mut builder = PathBuilder::new();
        builder.move_to(from.0, from.1);
        builder.line_to(to.0, to.1);
        let Some(path) = builder.finish() else {
            return;
        };
        let stroke = Stroke {
            width,
            line_cap: LineCap::Square,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &solid(color), &stroke, Transform::identity(), None);
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &TextPaint) {
        if text.is_empty() {
            return;
        }
        if let Err(err) = self.render_text(text, x, y, paint) {
            warn!(target: "display", text, error = %err, "overlay text failed");
        }
    }
}

/// Splits `#rrggbbaa` into a colour and an opacity attribute.
fn paint_attr(name: &str, hex: &str) -> String {
    match Color::from_hex(hex) {
        Some(color) if color.a < 255 => format!(
            "{name}=\"{}\" {name}-opacity=\"{:.3}\"",
            Color::rgb(color.r, color.g, color.b).to_hex(),
            color.a as f32 / 255.0
        ),
        Some(color) => format!("{name}=\"{}\"", color.to_hex()),
        None => format!("{name}=\"{}\"", escape_xml(hex)),
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
