//! Named filter sets.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, warn};

use crate::backend::{AsAny, BackendDevice};
use crate::filter::Filter;
use crate::filters::{FILTER_NAMES, create_filter};
use crate::preset::FilterPreset;

/// Filters addressed by name; at most one per name.
#[derive(Debug, Clone, Default)]
pub struct FilterCollection {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// One default instance of every built-in filter.
    pub fn with_builtin_filters(device: &Arc<dyn BackendDevice>) -> Self {
        let mut collection = Self::new();
        for name in FILTER_NAMES {
            if let Some(filter) = create_filter(name, device.clone()) {
                collection.add(filter);
            }
        }
        collection
    }

    /// Adds `filter`, replacing one with the same name. Returns the
    /// replaced filter.
    pub fn add(&mut self, filter: Box<dyn Filter>) -> Option<Box<dyn Filter>> {
        match self.filters.iter().position(|f| f.name() == filter.name()) {
            Some(index) => Some(std::mem::replace(&mut self.filters[index], filter)),
            None => {
                self.filters.push(filter);
                None
            }
        }
    }

    /// Removes the filter called `name`.
    pub fn remove_by_name(&mut self, name: &str) -> Option<Box<dyn Filter>> {
        let index = self.filters.iter().position(|f| f.name() == name)?;
        Some(self.filters.remove(index))
    }

    /// Filter called `name`.
    pub fn by_name(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.iter().find(|f| f.name() == name).map(|f| f.as_ref())
    }

    /// Mutable filter called `name`.
    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut Box<dyn Filter>> {
        self.filters.iter_mut().find(|f| f.name() == name)
    }

    /// Typed access to the filter called `name`.
    pub fn get_mut<T: Filter>(&mut self, name: &str) -> Option<&mut T> {
        self.by_name_mut(name)?.as_any_mut().downcast_mut::<T>()
    }

    /// True if a filter is called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True without filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Applies `preset` to the filter named by its `filter_name`.
    pub fn apply_preset(&mut self, preset: &FilterPreset) -> bool {
        let Some(filter) = self.by_name_mut(preset.filter_name()) else {
            warn!(filter = preset.filter_name(), preset = preset.name(), "no filter for preset");
            return false;
        };
        let applied = filter.from_preset(preset);
        debug!(filter = preset.filter_name(), preset = preset.name(), applied, "preset applied");
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use crate::filters::{BWMixer, Vignette};

    #[test]
    fn test_add_replaces_same_name() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let mut c = FilterCollection::new();
        assert!(c.add(Box::new(BWMixer::new(device.clone()))).is_none());
        assert!(c.add(Box::new(BWMixer::new(device.clone()))).is_some());
        c.add(Box::new(Vignette::new(device)));
        assert_eq!(c.names(), ["BWMixer", "Vignette"]);
        assert!(c.remove_by_name("BWMixer").is_some());
        assert!(!c.contains("BWMixer"));
    }

    #[test]
    fn test_apply_preset_routes_by_filter_name() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        let mut c = FilterCollection::with_builtin_filters(&device);
        assert_eq!(c.len(), FILTER_NAMES.len());

        let mut preset = FilterPreset::for_filter("Red", BWMixer::NAME);
        preset.set_float("RedSensitivity", 0.5);
        assert!(c.apply_preset(&preset));
        assert_eq!(c.get_mut::<BWMixer>(BWMixer::NAME).unwrap().sensitivities()[0], 0.5);

        assert!(!c.apply_preset(&FilterPreset::for_filter("x", "Sepia")));
        assert!(c.get_mut::<Vignette>(BWMixer::NAME).is_none());
    }
}
