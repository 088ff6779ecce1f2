//! Asynchronous, collision-free label placement.
//!
//! Candidates are fetched by a query worker, approved labels are rasterized by
//! a render worker, and the [`LabelEngine`] reconciles both against a
//! generation counter so results computed for an outdated configuration are
//! never applied.

use std::collections::BTreeMap;

use crate::bitmap::Bitmap;
use crate::geometry::BBox;

pub mod candidate;
pub mod class;
pub mod engine;
pub mod occupancy;
pub mod placement;
pub mod query_worker;
pub mod render_worker;
pub mod request;
pub mod source;

pub use candidate::LabelCandidate;
pub use class::{LabelBoxConfig, LabelClass, LabelClassRegistry};
pub use engine::{EnableSwitch, LabelEngine, LabelFrameStats, ReportOutcome, Reporter};
pub use occupancy::OccupancyIndex;
pub use placement::{CenteredPlacement, LabelSink, PlacedLabel, PlacementContext, PlacementStrategy};
pub use request::{Generation, RenderJob, SpatialQuery};
pub use source::{PlaceFeature, StaticLabelSource};

pub type ClassId = u32;

/// Query results, grouped by label class.
pub type CandidateBatch = BTreeMap<ClassId, Vec<LabelCandidate>>;

/// Backing data for label candidates. Only called from the query worker.
pub trait LabelSource: Send {
    fn lookup_candidates(&self, bbox: &BBox, zoom: i32) -> CandidateBatch;
}

/// Turns label text into a bitmap. Only called from the render worker.
/// Returning `None` means rasterization failed; the job is then dropped.
pub trait Rasterizer: Send {
    fn rasterize(&self, class: &LabelClass, text: &str) -> Option<Bitmap>;
}
