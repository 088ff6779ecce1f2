use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::labels::ClassId;
use crate::magnification::DisplayMetrics;
use crate::text_metrics::FontStyle;
use crate::theme::PlaceStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSettings {
    pub enabled: bool,
    pub draw_debug_frame: bool,
    pub draw_label_boxes: bool,
    /// Overrides the density derived magnification.
    pub magnification: Option<f32>,
    /// Measure text with the per-character table instead of loaded fonts.
    pub fast_text_metrics: bool,
    pub activation_timeout_ms: u64,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            draw_debug_frame: false,
            draw_label_boxes: false,
            magnification: None,
            fast_text_metrics: false,
            activation_timeout_ms: 300,
        }
    }
}

/// Unscaled style parameters of one label class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelClassConfig {
    pub id: ClassId,
    pub name: String,
    pub text_size: f32,
    pub stroke_width: f32,
    pub has_dot: bool,
    pub dot_size: f32,
    pub font_family: String,
    pub font_style: FontStyle,
    pub style: PlaceStyle,
    pub try_secondary: bool,
    pub try_really_hard: bool,
}

impl Default for LabelClassConfig {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            text_size: 14.0,
            stroke_width: 3.0,
            has_dot: false,
            dot_size: 6.0,
            font_family: "sans-serif".to_string(),
            font_style: FontStyle::Normal,
            style: PlaceStyle::default(),
            try_secondary: false,
            try_really_hard: false,
        }
    }
}

fn default_classes() -> Vec<LabelClassConfig> {
    vec![
        LabelClassConfig {
            id: 1,
            name: "city".to_string(),
            text_size: 16.0,
            has_dot: true,
            font_style: FontStyle::Bold,
            style: PlaceStyle::city(),
            try_secondary: true,
            try_really_hard: true,
            ..LabelClassConfig::default()
        },
        LabelClassConfig {
            id: 2,
            name: "village".to_string(),
            text_size: 12.0,
            stroke_width: 2.0,
            has_dot: true,
            dot_size: 4.0,
            style: PlaceStyle::village(),
            ..LabelClassConfig::default()
        },
        LabelClassConfig {
            id: 3,
            name: "water".to_string(),
            text_size: 13.0,
            font_style: FontStyle::Italic,
            style: PlaceStyle::water(),
            ..LabelClassConfig::default()
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TileSettings {
    pub base_tile_size: u32,
    pub max_tile_scale: f32,
    pub draw_grid: bool,
}

impl Default for TileSettings {
    fn default() -> Self {
        Self {
            base_tile_size: 256,
            max_tile_scale: 2.0,
            draw_grid: false,
        }
    }
}

/// Scale bar in the bottom-left corner. Lengths are screen pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScaleBarSettings {
    pub enabled: bool,
    pub max_width: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub inner_line_width: f32,
    pub outer_line_width: f32,
    pub bar_height: f32,
    pub font_size: f32,
    pub foreground: String,
    pub background: String,
}

impl Default for ScaleBarSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_width: 150.0,
            offset_x: 10.0,
            offset_y: 10.0,
            inner_line_width: 2.0,
            outer_line_width: 5.0,
            bar_height: 10.0,
            font_size: 13.0,
            foreground: "#000000".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

/// Outlined corner text. Sizes are density independent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextOverlaySettings {
    pub text_size: f32,
    pub stroke_width: f32,
    pub margin: f32,
    pub font_family: String,
    pub foreground: String,
    pub background: String,
}

impl Default for TextOverlaySettings {
    fn default() -> Self {
        Self {
            text_size: 12.0,
            stroke_width: 3.0,
            margin: 4.0,
            font_family: "sans-serif".to_string(),
            foreground: "#000000".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub background: String,
    /// Drawn in the bottom-right corner.
    pub attribution: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            background: "#F2EFE9".to_string(),
            attribution: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub labels: LabelSettings,
    pub classes: Vec<LabelClassConfig>,
    pub tiles: TileSettings,
    pub display: DisplayMetrics,
    pub render: RenderConfig,
    pub scale_bar: ScaleBarSettings,
    pub text_overlay: TextOverlaySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            labels: LabelSettings::default(),
            classes: default_classes(),
            tiles: TileSettings::default(),
            display: DisplayMetrics::default(),
            render: RenderConfig::default(),
            scale_bar: ScaleBarSettings::default(),
            text_overlay: TextOverlaySettings::default(),
        }
    }
}

impl Config {
    pub fn from_json5(contents: &str) -> Result<Self> {
        Ok(json5::from_str(contents)?)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_json5(&contents)
}
