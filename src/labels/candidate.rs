use std::cell::Cell;
use std::cmp::Ordering;

use super::LabelClass;

/// A label that could be drawn at a world position.
///
/// Identity is `(x, y, text)`: the same text at the same position coming from
/// two different queries is one candidate, whatever its source id. The measured
/// box width is cached and reset whenever label metrics change.
#[derive(Debug, Clone)]
pub struct LabelCandidate {
    pub x: i32,
    pub y: i32,
    pub text: String,
    pub place_type: i32,
    pub id: i64,
    width: Cell<Option<i32>>,
}

impl LabelCandidate {
    pub fn new(x: i32, y: i32, text: impl Into<String>, place_type: i32, id: i64) -> Self {
        Self {
            x,
            y,
            text: text.into(),
            place_type,
            id,
            width: Cell::new(None),
        }
    }

    /// Box width for `class`, measured on first use after an invalidation.
    pub fn width(&self, class: &LabelClass) -> i32 {
        if let Some(width) = self.width.get() {
            return width;
        }
        let width = class.box_width(&self.text);
        self.width.set(Some(width));
        width
    }

    pub fn cached_width(&self) -> Option<i32> {
        self.width.get()
    }

    pub fn invalidate_width(&self) {
        self.width.set(None);
    }
}

impl PartialEq for LabelCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.text == other.text
    }
}

impl Eq for LabelCandidate {}

impl PartialOrd for LabelCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LabelCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .cmp(&other.x)
            .then(self.y.cmp(&other.y))
            .then_with(|| self.text.cmp(&other.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn identity_ignores_source_id() {
        let a = LabelCandidate::new(10, 20, "A", 1, 100);
        let b = LabelCandidate::new(10, 20, "A", 2, 200);
        assert_eq!(a, b);

        let mut set = BTreeSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn orders_by_position_then_text() {
        let mut set = BTreeSet::new();
        set.insert(LabelCandidate::new(5, 1, "b", 0, 0));
        set.insert(LabelCandidate::new(5, 1, "a", 0, 0));
        set.insert(LabelCandidate::new(5, 0, "z", 0, 0));
        set.insert(LabelCandidate::new(1, 9, "z", 0, 0));
        let order: Vec<_> = set.iter().map(|c| (c.x, c.y, c.text.as_str())).collect();
        assert_eq!(order, vec![(1, 9, "z"), (5, 0, "z"), (5, 1, "a"), (5, 1, "b")]);
    }
}
