use rstar::{AABB, RTree, RTreeObject};

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy)]
struct Occupied(Rect);

impl RTreeObject for Occupied {
    type Envelope = AABB<[f32; 2]>;

    fn envelope(&self) -> Self::Envelope {
        envelope(&self.0)
    }
}

fn envelope(rect: &Rect) -> AABB<[f32; 2]> {
    AABB::from_corners([rect.left, rect.top], [rect.right, rect.bottom])
}

/// Screen rectangles accepted during one placement pass. Built fresh every
/// frame and only touched by the thread drawing that frame.
///
/// Rectangles are stored by value, so callers can keep reusing a scratch
/// rect after adding it.
#[derive(Debug, Default)]
pub struct OccupancyIndex {
    tree: RTree<Occupied>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rect: Rect) {
        self.tree.insert(Occupied(rect));
    }

    /// Whether `rect` overlaps nothing added so far. Touching edges count as
    /// overlap.
    pub fn is_free(&self, rect: &Rect) -> bool {
        self.tree
            .locate_in_envelope_intersecting(&envelope(rect))
            .next()
            .is_none()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
