use serde::{Deserialize, Serialize};

use super::{CandidateBatch, ClassId, LabelCandidate, LabelSource};
use crate::geometry::{self, BBox};

/// One named place, as stored in a feature file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceFeature {
    pub class_id: ClassId,
    pub lon: f64,
    pub lat: f64,
    pub text: String,
    #[serde(default)]
    pub place_type: i32,
    #[serde(default)]
    pub id: i64,
    /// Lowest zoom at which the place is labelled.
    #[serde(default)]
    pub min_zoom: i32,
}

#[derive(Debug, Clone)]
struct Entry {
    class_id: ClassId,
    x: f64,
    y: f64,
    min_zoom: i32,
    candidate: LabelCandidate,
}

/// In-memory label source answering bbox queries by a linear scan.
#[derive(Debug, Clone, Default)]
pub struct StaticLabelSource {
    entries: Vec<Entry>,
}

impl StaticLabelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_features(features: impl IntoIterator<Item = PlaceFeature>) -> Self {
        let mut source = Self::new();
        for feature in features {
            source.insert(feature);
        }
        source
    }

    pub fn insert(&mut self, feature: PlaceFeature) {
        let x = geometry::lon_to_x(feature.lon);
        let y = geometry::lat_to_y(feature.lat);
        let candidate = LabelCandidate::new(
            geometry::to_world(x),
            geometry::to_world(y),
            feature.text,
            feature.place_type,
            feature.id,
        );
        self.entries.push(Entry {
            class_id: feature.class_id,
            x,
            y,
            min_zoom: feature.min_zoom,
            candidate,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LabelSource for StaticLabelSource {
    fn lookup_candidates(&self, bbox: &BBox, zoom: i32) -> CandidateBatch {
        let mut batch = CandidateBatch::new();
        for entry in &self.entries {
            if zoom < entry.min_zoom || !bbox.contains(entry.x, entry.y) {
                continue;
            }
            batch
                .entry(entry.class_id)
                .or_default()
                .push(entry.candidate.clone());
        }
        batch
    }
}
