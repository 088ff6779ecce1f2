use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::{Face, GlyphId};

static TEXT_MEASURER: Lazy<Mutex<TextMeasurer>> = Lazy::new(|| Mutex::new(TextMeasurer::new()));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FontStyle {
    #[default]
    Normal,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    fn weight(self) -> Weight {
        match self {
            FontStyle::Bold | FontStyle::BoldItalic => Weight::BOLD,
            _ => Weight::NORMAL,
        }
    }

    fn style(self) -> Style {
        match self {
            FontStyle::Italic | FontStyle::BoldItalic => Style::Italic,
            _ => Style::Normal,
        }
    }

    pub fn svg_weight(self) -> &'static str {
        match self {
            FontStyle::Bold | FontStyle::BoldItalic => "bold",
            _ => "normal",
        }
    }

    pub fn svg_style(self) -> &'static str {
        match self {
            FontStyle::Italic | FontStyle::BoldItalic => "italic",
            _ => "normal",
        }
    }
}

/// Width of `text` in pixels. With `fast_metrics` ASCII text is measured from a
/// per-character table instead of the font.
pub fn text_width(text: &str, font_size: f32, font_family: &str, style: FontStyle, fast_metrics: bool) -> f32 {
    if fast_metrics && text.is_ascii() {
        return fallback_text_width(text, font_size);
    }
    measure_text_width(text, font_size, font_family, style)
        .unwrap_or_else(|| fallback_text_width(text, font_size))
}

pub fn measure_text_width(text: &str, font_size: f32, font_family: &str, style: FontStyle) -> Option<f32> {
    if text.is_empty() || font_size <= 0.0 {
        return Some(0.0);
    }
    let mut guard = TEXT_MEASURER.lock().ok()?;
    guard.measure(text, font_size, font_family, style)
}

/// Vertical font metrics in pixels. `ascent` is negative (above the baseline)
/// as on a y-down canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
    pub line_height: f32,
}

impl FontMetrics {
    /// Proportions of a typical sans-serif face.
    pub fn approximate(font_size: f32) -> Self {
        Self {
            ascent: -0.928 * font_size,
            descent: 0.244 * font_size,
            line_height: 1.172 * font_size,
        }
    }
}

pub fn font_metrics(font_size: f32, font_family: &str, style: FontStyle, fast_metrics: bool) -> FontMetrics {
    if fast_metrics || font_size <= 0.0 {
        return FontMetrics::approximate(font_size);
    }
    TEXT_MEASURER
        .lock()
        .ok()
        .and_then(|mut guard| guard.metrics(font_size, font_family, style))
        .unwrap_or_else(|| FontMetrics::approximate(font_size))
}

pub fn fallback_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

fn char_width_factor(ch: char) -> f32 {
    // Widths relative to the font size for a typical sans-serif face.
    match ch {
        ' ' => 0.306,
        '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '\'' => 0.321,
        '-' => 0.360,
        'A' => 0.652,
        'B' => 0.648,
        'C' => 0.734,
        'D' => 0.723,
        'E' => 0.594,
        'F' => 0.575,
        'G' | 'H' => 0.742,
        'I' => 0.272,
        'J' => 0.557,
        'K' => 0.648,
        'L' => 0.559,
        'M' => 0.903,
        'N' => 0.763,
        'O' => 0.754,
        'P' => 0.623,
        'Q' => 0.755,
        'R' => 0.637,
        'S' => 0.633,
        'T' => 0.599,
        'U' => 0.746,
        'V' => 0.661,
        'W' => 0.958,
        'X' => 0.655,
        'Y' => 0.646,
        'Z' => 0.621,
        'a' => 0.550,
        'b' => 0.603,
        'c' => 0.547,
        'd' => 0.609,
        'e' => 0.570,
        'f' => 0.340,
        'g' | 'h' => 0.600,
        'i' => 0.235,
        'j' => 0.227,
        'k' => 0.522,
        'l' => 0.239,
        'm' => 0.867,
        'n' => 0.585,
        'o' => 0.574,
        'p' => 0.595,
        'q' => 0.585,
        'r' => 0.364,
        's' => 0.523,
        't' => 0.305,
        'u' => 0.585,
        'v' => 0.545,
        'w' => 0.811,
        'x' => 0.538,
        'y' => 0.556,
        'z' => 0.550,
        '0'..='9' => 0.600,
        'ä' | 'ö' | 'ü' => 0.575,
        'Ä' | 'Ö' | 'Ü' => 0.745,
        'ß' => 0.610,
        _ => 0.568,
    }
}

struct TextMeasurer {
    db: Database,
    loaded_system_fonts: bool,
    cache: HashMap<(String, FontStyle), Option<FontFace>>,
}

impl TextMeasurer {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            cache: HashMap::new(),
        }
    }

    fn measure(&mut self, text: &str, font_size: f32, font_family: &str, style: FontStyle) -> Option<f32> {
        self.face(font_family, style)?.measure_width(text, font_size)
    }

    fn metrics(&mut self, font_size: f32, font_family: &str, style: FontStyle) -> Option<FontMetrics> {
        Some(self.face(font_family, style)?.metrics(font_size))
    }

    fn face(&mut self, font_family: &str, style: FontStyle) -> Option<&mut FontFace> {
        let key = (normalize_family_key(font_family), style);
        if !self.cache.contains_key(&key) {
            let face = self.load_face(font_family, style);
            self.cache.insert(key.clone(), face);
        }
        self.cache.get_mut(&key).and_then(|face| face.as_mut())
    }

    fn load_face(&mut self, font_family: &str, style: FontStyle) -> Option<FontFace> {
        #[derive(Clone, Copy)]
        enum FamilyToken {
            Generic(Family<'static>),
            Name(usize),
        }

        let mut names: Vec<String> = Vec::new();
        let mut order: Vec<FamilyToken> = Vec::new();
        for part in font_family.split(',') {
            let raw = part.trim().trim_matches('"').trim_matches('\'');
            if raw.is_empty() {
                continue;
            }
            match raw.to_ascii_lowercase().as_str() {
                "serif" => order.push(FamilyToken::Generic(Family::Serif)),
                "sans-serif" | "system-ui" => order.push(FamilyToken::Generic(Family::SansSerif)),
                "monospace" => order.push(FamilyToken::Generic(Family::Monospace)),
                "cursive" => order.push(FamilyToken::Generic(Family::Cursive)),
                "fantasy" => order.push(FamilyToken::Generic(Family::Fantasy)),
                _ => {
                    order.push(FamilyToken::Name(names.len()));
                    names.push(raw.to_string());
                }
            }
        }
        if order.is_empty() {
            order.push(FamilyToken::Generic(Family::SansSerif));
        }

        let families: Vec<Family<'_>> = order
            .into_iter()
            .map(|token| match token {
                FamilyToken::Generic(family) => family,
                FamilyToken::Name(idx) => Family::Name(names[idx].as_str()),
            })
            .collect();

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
            tracing::debug!(target: "labels", faces = self.db.len(), "loaded system fonts");
        }

        let query = Query {
            families: &families,
            weight: style.weight(),
            stretch: Stretch::Normal,
            style: style.style(),
        };
        let id = self.db.query(&query)?;
        self.db
            .with_face_data(id, |data, index| FontFace::parse(data.to_vec(), index))
            .flatten()
    }
}

/// Font bytes plus the metrics needed for measuring. The face is re-parsed on
/// demand for non-ASCII text; ASCII advances are tabulated up front.
struct FontFace {
    data: Vec<u8>,
    index: u32,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    ascii_advances: [u16; 128],
    advance_cache: HashMap<char, Option<u16>>,
}

impl FontFace {
    fn parse(data: Vec<u8>, index: u32) -> Option<Self> {
        let face = Face::parse(&data, index).ok()?;
        let units_per_em = face.units_per_em().max(1);
        let (ascender, descender, line_gap) = (face.ascender(), face.descender(), face.line_gap());
        let mut ascii_advances = [0u16; 128];
        for byte in 0u8..=127 {
            if let Some(glyph_id) = face.glyph_index(byte as char) {
                ascii_advances[byte as usize] = face.glyph_hor_advance(glyph_id).unwrap_or(0);
            }
        }
        Some(Self {
            data,
            index,
            units_per_em,
            ascender,
            descender,
            line_gap,
            ascii_advances,
            advance_cache: HashMap::new(),
        })
    }

    fn metrics(&self, font_size: f32) -> FontMetrics {
        let scale = font_size / self.units_per_em as f32;
        // descender is negative in font units
        FontMetrics {
            ascent: -(self.ascender as f32) * scale,
            descent: -(self.descender as f32) * scale,
            line_height: (self.ascender as f32 - self.descender as f32 + self.line_gap as f32) * scale,
        }
    }

    fn measure_width(&mut self, text: &str, font_size: f32) -> Option<f32> {
        let scale = font_size / self.units_per_em as f32;
        let fallback = font_size * 0.56;

        if text.is_ascii() {
            let width = text
                .bytes()
                .filter(|b| *b != b'\n')
                .map(|b| match self.ascii_advances[b as usize] {
                    0 => fallback,
                    advance => advance as f32 * scale,
                })
                .sum::<f32>();
            return Some(width.max(0.0));
        }

        let missing: Vec<char> = text
            .chars()
            .filter(|ch| !self.advance_cache.contains_key(ch))
            .collect();
        if !missing.is_empty() {
            let face = Face::parse(&self.data, self.index).ok()?;
            for ch in missing {
                let advance = face
                    .glyph_index(ch)
                    .map(|GlyphId(id)| face.glyph_hor_advance(GlyphId(id)).unwrap_or(0));
                self.advance_cache.insert(ch, advance);
            }
        }

        let width = text
            .chars()
            .filter(|ch| *ch != '\n')
            .map(|ch| match self.advance_cache.get(&ch).copied().flatten() {
                Some(advance) => advance as f32 * scale,
                None => fallback,
            })
            .sum::<f32>();
        Some(width.max(0.0))
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_text_width_scales_with_font_size() {
        let w16 = fallback_text_width("Berlin", 16.0);
        let w32 = fallback_text_width("Berlin", 32.0);
        assert!((w32 - w16 * 2.0).abs() < 0.01, "width should double with font size");
    }

    #[test]
    fn fast_metrics_use_the_table() {
        let fast = text_width("Hamburg", 20.0, "sans-serif", FontStyle::Normal, true);
        assert_eq!(fast, fallback_text_width("Hamburg", 20.0));
    }

    #[test]
    fn font_metrics_straddle_the_baseline() {
        let fast = font_metrics(20.0, "sans-serif", FontStyle::Normal, true);
        assert_eq!(fast, FontMetrics::approximate(20.0));
        let loaded = font_metrics(20.0, "sans-serif", FontStyle::Normal, false);
        assert!(loaded.ascent < 0.0 && loaded.descent > 0.0);
        assert!(loaded.line_height >= loaded.descent - loaded.ascent);
    }

    #[test]
    fn empty_text_measures_zero() {
        assert_eq!(measure_text_width("", 12.0, "sans-serif", FontStyle::Bold), Some(0.0));
    }

    #[test]
    fn measured_width_is_positive_when_fonts_exist() {
        let width = text_width("München", 14.0, "sans-serif", FontStyle::Normal, false);
        assert!(width > 0.0);
    }
}
