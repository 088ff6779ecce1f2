use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::geometry::{self, Rect};
use crate::labels::{Generation, LabelEngine};
use crate::map::FrameStats;
use crate::scale_bar::ScaleBar;
use crate::viewport::Viewport;

#[derive(Debug, Serialize)]
pub struct FrameDump {
    pub generation: Generation,
    pub magnification: f32,
    pub viewport: ViewportDump,
    pub stats: FrameStats,
    pub labels: Vec<LabelDump>,
    pub scale_bar: Option<ScaleBar>,
}

#[derive(Debug, Serialize)]
pub struct ViewportDump {
    pub lon: f64,
    pub lat: f64,
    pub zoom: f64,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
}

#[derive(Debug, Serialize)]
pub struct LabelDump {
    pub class: String,
    pub id: i64,
    pub text: String,
    pub rect: Rect,
}

impl FrameDump {
    pub fn capture(engine: &LabelEngine, viewport: &Viewport, stats: FrameStats) -> Self {
        let labels = engine
            .rendered_labels()
            .iter()
            .map(|label| LabelDump {
                class: engine
                    .classes()
                    .name_of(label.class_id)
                    .map(str::to_string)
                    .unwrap_or_else(|| label.class_id.to_string()),
                id: label.id,
                text: label.text.clone(),
                rect: label.rect,
            })
            .collect();

        Self {
            generation: engine.generation(),
            magnification: engine.magnification(),
            viewport: ViewportDump {
                lon: geometry::x_to_lon(viewport.center_x),
                lat: viewport.center_lat(),
                zoom: viewport.zoom,
                width: viewport.width,
                height: viewport.height,
                tile_size: viewport.tile_size,
            },
            stats,
            labels,
            scale_bar: ScaleBar::compute(viewport.center_lat(), viewport.world_pixels(), viewport.width as f32 / 4.0),
        }
    }
}

pub fn write_frame_dump(path: &Path, dump: &FrameDump) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, dump)?;
    Ok(())
}
