use serde::{Deserialize, Serialize};

use crate::canvas::Color;

/// Colours of one label class. Held per class instance; there is no shared
/// paint state between renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceStyle {
    pub fill_dot: String,
    pub fill_caption: String,
    pub stroke_caption: String,
}

impl PlaceStyle {
    pub fn city() -> Self {
        Self {
            fill_dot: "#333333".to_string(),
            fill_caption: "#1C2430".to_string(),
            stroke_caption: "#FFFFFF".to_string(),
        }
    }

    pub fn village() -> Self {
        Self {
            fill_dot: "#555555".to_string(),
            fill_caption: "#3A4656".to_string(),
            stroke_caption: "#FFFFFFCC".to_string(),
        }
    }

    pub fn water() -> Self {
        Self {
            fill_dot: "#2B5C9E".to_string(),
            fill_caption: "#2B5C9E".to_string(),
            stroke_caption: "#E6F0FF".to_string(),
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "city" => Some(Self::city()),
            "village" => Some(Self::village()),
            "water" => Some(Self::water()),
            _ => None,
        }
    }

    pub fn dot_color(&self) -> Color {
        Color::from_hex(&self.fill_dot).unwrap_or(Color::BLACK)
    }
}

impl Default for PlaceStyle {
    fn default() -> Self {
        Self::city()
    }
}

/// Colours of the debug overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugStyle {
    pub frame: Color,
    pub label_box: Color,
    pub grid: Color,
    pub frame_inset: f32,
}

impl Default for DebugStyle {
    fn default() -> Self {
        Self {
            frame: Color::RED,
            label_box: Color::rgb(0, 0, 255),
            grid: Color::BLACK,
            frame_inset: 10.0,
        }
    }
}
