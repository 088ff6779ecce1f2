use std::cmp::Ordering as CmpOrdering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::{ClassId, LabelClass};
use crate::geometry::BBox;

/// Token identifying one configuration of the label caches. Results tagged
/// with an older generation are stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const INITIAL: Self = Generation(0);

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// Generation shared between the host thread and worker reports. Bumped only
/// while the bitmap lock is held.
#[derive(Debug, Default)]
pub(crate) struct AtomicGeneration(AtomicU64);

impl AtomicGeneration {
    pub(crate) fn get(&self) -> Generation {
        Generation(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn bump(&self) -> Generation {
        Generation(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

/// "Candidates for this area at this zoom", as seen by one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialQuery {
    pub generation: Generation,
    pub bbox: BBox,
    pub zoom: i32,
}

impl SpatialQuery {
    pub fn new(generation: Generation, bbox: BBox, zoom: i32) -> Self {
        Self {
            generation,
            bbox,
            zoom,
        }
    }
}

/// Request to rasterize `text` in the style of `class`.
///
/// Equality, ordering and hashing use `(generation, class_id, text)` only, so
/// two requests holding different snapshots of the same class are the same job.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub generation: Generation,
    pub class_id: ClassId,
    pub class: Arc<LabelClass>,
    pub text: String,
}

impl RenderJob {
    pub fn new(generation: Generation, class: Arc<LabelClass>, text: impl Into<String>) -> Self {
        Self {
            generation,
            class_id: class.id(),
            class,
            text: text.into(),
        }
    }

    fn key(&self) -> (Generation, ClassId, &str) {
        (self.generation, self.class_id, &self.text)
    }
}

impl PartialEq for RenderJob {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RenderJob {}

impl Hash for RenderJob {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for RenderJob {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for RenderJob {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key().cmp(&other.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LabelClassConfig;
    use std::collections::HashSet;

    #[test]
    fn queries_compare_all_fields() {
        let bbox = BBox::new(0.1, 0.2, 0.3, 0.4);
        let q = SpatialQuery::new(Generation::INITIAL, bbox, 12);
        assert_eq!(q, SpatialQuery::new(Generation::INITIAL, bbox, 12));
        assert_ne!(q, SpatialQuery::new(Generation::INITIAL.next(), bbox, 12));
        assert_ne!(q, SpatialQuery::new(Generation::INITIAL, bbox, 13));
    }

    #[test]
    fn job_identity_ignores_class_snapshot() {
        let cfg = LabelClassConfig::default();
        let a = Arc::new(LabelClass::new(&cfg, 1.0, true));
        let b = Arc::new(LabelClass::new(&cfg, 2.0, true));
        let j1 = RenderJob::new(Generation::INITIAL, a, "Dresden");
        let j2 = RenderJob::new(Generation::INITIAL, b, "Dresden");
        assert_eq!(j1, j2);

        let mut set = HashSet::new();
        set.insert(j1);
        assert!(!set.insert(j2));
    }

    #[test]
    fn atomic_generation_is_monotonic() {
        let generation = AtomicGeneration::default();
        let first = generation.get();
        let bumped = generation.bump();
        assert!(bumped > first);
        assert_eq!(generation.get(), bumped);
    }
}
