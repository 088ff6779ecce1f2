use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::ClassId;
use crate::config::LabelClassConfig;
use crate::error::{Error, Result};
use crate::text_metrics::{self, FontStyle};
use crate::theme::PlaceStyle;

/// Derived box geometry of one label class at the current magnification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelBoxConfig {
    pub text_size: i32,
    pub border: i32,
    /// Room below the baseline for descenders.
    pub low_extra: i32,
    pub height: i32,
}

impl LabelBoxConfig {
    pub fn new(text_size: i32, border: i32) -> Self {
        let low_extra = (text_size as f32 * 0.25).ceil() as i32;
        Self {
            text_size,
            border,
            low_extra,
            height: text_size + low_extra + 2 * border,
        }
    }

    pub fn baseline(&self) -> i32 {
        self.height - self.low_extra - self.border
    }
}

/// Style of a group of labels, scaled by magnification.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelClass {
    id: ClassId,
    name: String,
    base_text_size: f32,
    base_stroke_width: f32,
    base_dot_size: f32,
    magnification: f32,
    pub has_dot: bool,
    pub font_family: String,
    pub font_style: FontStyle,
    pub style: PlaceStyle,
    pub try_secondary: bool,
    pub try_really_hard: bool,
    pub fast_metrics: bool,
    box_config: LabelBoxConfig,
    stroke_width: i32,
    dot_size: i32,
}

impl LabelClass {
    pub fn new(config: &LabelClassConfig, magnification: f32, fast_metrics: bool) -> Self {
        let mut class = Self {
            id: config.id,
            name: config.name.clone(),
            base_text_size: config.text_size,
            base_stroke_width: config.stroke_width,
            base_dot_size: config.dot_size,
            magnification,
            has_dot: config.has_dot,
            font_family: config.font_family.clone(),
            font_style: config.font_style,
            style: config.style.clone(),
            try_secondary: config.try_secondary,
            try_really_hard: config.try_really_hard,
            fast_metrics,
            box_config: LabelBoxConfig::new(0, 0),
            stroke_width: 0,
            dot_size: 0,
        };
        class.update();
        class
    }

    pub fn set_magnification(&mut self, magnification: f32) {
        self.magnification = magnification;
        self.update();
    }

    fn update(&mut self) {
        let m = self.magnification;
        let text_size = (self.base_text_size * m).ceil() as i32;
        let border = (self.base_stroke_width * m / 2.0).ceil() as i32;
        self.stroke_width = (self.base_stroke_width * m).ceil() as i32;
        self.dot_size = (self.base_dot_size * m).ceil() as i32;
        self.box_config = LabelBoxConfig::new(text_size, border);
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn magnification(&self) -> f32 {
        self.magnification
    }

    pub fn box_config(&self) -> LabelBoxConfig {
        self.box_config
    }

    pub fn text_size(&self) -> i32 {
        self.box_config.text_size
    }

    pub fn stroke_width(&self) -> i32 {
        self.stroke_width
    }

    pub fn dot_size(&self) -> i32 {
        self.dot_size
    }

    pub fn text_width(&self, text: &str) -> f32 {
        text_metrics::text_width(
            text,
            self.box_config.text_size as f32,
            &self.font_family,
            self.font_style,
            self.fast_metrics,
        )
    }

    pub fn box_width(&self, text: &str) -> i32 {
        (self.text_width(text) + 2.0 * self.box_config.border as f32).ceil() as i32
    }
}

/// Label classes by id, with a reverse lookup by name. The set of classes is
/// fixed once the engine starts; only their magnification changes.
///
/// Classes are shared as `Arc` snapshots. Changing the magnification replaces
/// each snapshot, so render jobs queued earlier keep the metrics they were
/// created with.
#[derive(Debug, Clone)]
pub struct LabelClassRegistry {
    classes: BTreeMap<ClassId, Arc<LabelClass>>,
    by_name: HashMap<String, ClassId>,
    magnification: f32,
}

impl Default for LabelClassRegistry {
    fn default() -> Self {
        Self {
            classes: BTreeMap::new(),
            by_name: HashMap::new(),
            magnification: 1.0,
        }
    }
}

impl LabelClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_configs(configs: &[LabelClassConfig], magnification: f32, fast_metrics: bool) -> Result<Self> {
        let mut registry = Self {
            magnification,
            ..Self::default()
        };
        for config in configs {
            registry.register(LabelClass::new(config, magnification, fast_metrics))?;
        }
        Ok(registry)
    }

    /// Adds `class`, rescaled to the registry's magnification.
    pub fn register(&mut self, mut class: LabelClass) -> Result<()> {
        if self.classes.contains_key(&class.id) {
            return Err(Error::DuplicateClassId(class.id));
        }
        if self.by_name.contains_key(&class.name) {
            return Err(Error::DuplicateClassName(class.name));
        }
        if class.magnification != self.magnification {
            class.set_magnification(self.magnification);
        }
        self.by_name.insert(class.name.clone(), class.id);
        self.classes.insert(class.id, Arc::new(class));
        Ok(())
    }

    pub fn get(&self, id: ClassId) -> Option<&Arc<LabelClass>> {
        self.classes.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Arc<LabelClass>> {
        self.by_name.get(name).and_then(|id| self.classes.get(id))
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, id: ClassId) -> Option<&str> {
        self.classes.get(&id).map(|class| class.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LabelClass>> {
        self.classes.values()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn magnification(&self) -> f32 {
        self.magnification
    }

    pub fn set_magnification(&mut self, magnification: f32) {
        self.magnification = magnification;
        for class in self.classes.values_mut() {
            Arc::make_mut(class).set_magnification(magnification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: ClassId, name: &str) -> LabelClassConfig {
        LabelClassConfig {
            id,
            name: name.to_string(),
            text_size: 14.0,
            stroke_width: 3.0,
            has_dot: true,
            dot_size: 4.0,
            ..LabelClassConfig::default()
        }
    }

    #[test]
    fn metrics_scale_with_magnification() {
        let mut class = LabelClass::new(&config(1, "city"), 1.0, true);
        assert_eq!(class.text_size(), 14);
        assert_eq!(class.stroke_width(), 3);
        assert_eq!(class.box_config().border, 2);
        assert_eq!(class.dot_size(), 4);

        class.set_magnification(1.75);
        assert_eq!(class.text_size(), 25);
        assert_eq!(class.stroke_width(), 6);
        assert_eq!(class.box_config().border, 3);
        assert_eq!(class.dot_size(), 7);
    }

    #[test]
    fn box_height_covers_text_descender_and_border() {
        let cfg = LabelBoxConfig::new(16, 2);
        assert_eq!(cfg.low_extra, 4);
        assert_eq!(cfg.height, 24);
        assert_eq!(cfg.baseline(), 18);
    }

    #[test]
    fn box_width_adds_border_on_both_sides() {
        let class = LabelClass::new(&config(1, "city"), 1.0, true);
        let text = class.text_width("Leipzig");
        assert_eq!(class.box_width("Leipzig"), (text + 4.0).ceil() as i32);
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = LabelClassRegistry::new();
        registry.register(LabelClass::new(&config(1, "city"), 1.0, true)).unwrap();
        assert!(matches!(
            registry.register(LabelClass::new(&config(1, "town"), 1.0, true)),
            Err(Error::DuplicateClassId(1))
        ));
        assert!(matches!(
            registry.register(LabelClass::new(&config(2, "city"), 1.0, true)),
            Err(Error::DuplicateClassName(_))
        ));
        assert_eq!(registry.id_of("city"), Some(1));
        assert_eq!(registry.name_of(1), Some("city"));
    }

    #[test]
    fn magnification_change_leaves_old_snapshots_alone() {
        let mut registry = LabelClassRegistry::new();
        registry.register(LabelClass::new(&config(1, "city"), 1.0, true)).unwrap();
        let before = Arc::clone(registry.get(1).unwrap());
        registry.set_magnification(2.0);
        assert_eq!(before.text_size(), 14);
        assert_eq!(registry.get(1).unwrap().text_size(), 28);
    }
}
