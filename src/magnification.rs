//! Display-density aware magnification.

use serde::{Deserialize, Serialize};

/// Physical display geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    pub density: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            width: 1080,
            height: 1920,
            density: 1.0,
        }
    }
}

/// Magnification bounds in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnificationConfig {
    pub base: i32,
    pub min: i32,
    pub max: i32,
}

impl MagnificationConfig {
    pub const MIN_PERCENT: i32 = 75;
    pub const MAX_PERCENT: i32 = 150;

    pub fn for_density(density: f32) -> Self {
        let density = density.max(1.0);
        let factor = 1.0 + (density - 1.0) * 0.75;
        Self {
            base: (factor * 100.0).round() as i32,
            min: Self::MIN_PERCENT,
            max: Self::MAX_PERCENT,
        }
    }

    pub fn for_display(metrics: &DisplayMetrics) -> Self {
        Self::for_density(metrics.density)
    }

    pub fn base_factor(&self) -> f32 {
        self.base as f32 / 100.0
    }
}

/// Split of a magnification into tile upscaling and the rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileScale {
    pub magnification: f32,
    /// Applied by drawing tiles larger, capped at the maximum tile scale.
    pub tile_scale_factor: f32,
    /// What remains for the host to apply itself.
    pub user_scale: f32,
    pub tile_size: u32,
}

impl TileScale {
    pub fn for_magnification(magnification: f32, max_tile_scale: f32, base_tile_size: u32) -> Self {
        let (tile_scale_factor, user_scale) = if magnification <= max_tile_scale {
            (magnification, 1.0)
        } else {
            (max_tile_scale, magnification / max_tile_scale)
        };
        Self {
            magnification,
            tile_scale_factor,
            user_scale,
            tile_size: (tile_scale_factor * base_tile_size as f32).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_two_gives_175_percent() {
        let config = MagnificationConfig::for_density(2.0);
        assert_eq!(config, MagnificationConfig { base: 175, min: 75, max: 150 });
    }

    #[test]
    fn low_density_is_clamped() {
        assert_eq!(MagnificationConfig::for_density(0.5).base, 100);
        assert_eq!(MagnificationConfig::for_density(1.5).base, 138);
    }

    #[test]
    fn large_magnification_spills_into_user_scale() {
        let small = TileScale::for_magnification(1.5, 2.0, 256);
        assert_eq!(small.tile_size, 384);
        assert_eq!(small.user_scale, 1.0);

        let large = TileScale::for_magnification(3.0, 2.0, 256);
        assert_eq!(large.tile_scale_factor, 2.0);
        assert_eq!(large.tile_size, 512);
        assert!((large.user_scale - 1.5).abs() < 1e-6);
    }
}
