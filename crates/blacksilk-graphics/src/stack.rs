//! Ordered filter pipelines.

use std::sync::Arc;

#[allow(unused_imports)]
use tracing::{debug, error, trace};

use crate::backend::BackendDevice;
use crate::filter::Filter;
use crate::layer::ImageLayer;
use crate::preset::FilterPresetCollection;

/// Filters applied in order, each output feeding the next.
#[derive(Debug, Clone, Default)]
pub struct FilterStack {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter.
    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, filter: Box<dyn Filter>) -> Self {
        self.push(filter);
        self
    }

    /// Inserts at `index`; false if out of range.
    pub fn insert(&mut self, index: usize, filter: Box<dyn Filter>) -> bool {
        if index > self.filters.len() {
            return false;
        }
        self.filters.insert(index, filter);
        true
    }

    /// Removes the filter at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Filter>> {
        (index < self.filters.len()).then(|| self.filters.remove(index))
    }

    /// Removes every filter.
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Number of filters.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// True without filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Filter at `index`.
    pub fn get(&self, index: usize) -> Option<&dyn Filter> {
        self.filters.get(index).map(|f| f.as_ref())
    }

    /// Mutable filter at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn Filter>> {
        self.filters.get_mut(index)
    }

    /// Filters in order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Filter> {
        self.filters.iter().map(|f| f.as_ref())
    }

    /// Rebinds every filter.
    pub fn set_device(&mut self, device: &Arc<dyn BackendDevice>) {
        for filter in &mut self.filters {
            filter.set_device(device.clone());
        }
    }

    /// Current parameters of every filter.
    pub fn to_presets(&self) -> FilterPresetCollection {
        let mut presets = FilterPresetCollection::new();
        for filter in &self.filters {
            presets.add(filter.to_preset());
        }
        presets
    }

    /// Runs the pipeline from `src` into `dst`.
    ///
    /// An empty stack copies `src`. The first failing filter aborts.
    pub fn process(&mut self, dst: &mut ImageLayer, src: &ImageLayer) -> bool {
        let count = self.filters.len();
        let Some((last, rest)) = self.filters.split_last_mut() else {
            return copy_through(dst, src);
        };

        let mut current: Option<ImageLayer> = None;
        for (index, filter) in rest.iter_mut().enumerate() {
            let input = current.as_ref().unwrap_or(src);
            let mut output = ImageLayer::empty(input.format(), input.width(), input.height());
            if !filter.process(&mut output, input) {
                error!(index, filter = filter.name(), "filter stack aborted");
                return false;
            }
            trace!(index, filter = filter.name(), "stage done");
            current = Some(output);
        }

        let input = current.as_ref().unwrap_or(src);
        let ok = last.process(dst, input);
        if !ok {
            error!(index = count - 1, filter = last.name(), "filter stack aborted");
        }
        ok
    }
}

fn copy_through(dst: &mut ImageLayer, src: &ImageLayer) -> bool {
    let Some(device) = src.representations().iter().find(|r| r.is_valid()).map(|r| r.device().clone()) else {
        error!(layer = src.name(), "filter stack input holds no data");
        return false;
    };
    dst.reset(&device, src.format(), src.width(), src.height()) && dst.copy(src, src.rect(), 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;
    use crate::filters::{BWMixer, Vignette};
    use blacksilk_core::PixelFormat;

    fn device() -> Arc<dyn BackendDevice> {
        Arc::new(CpuDevice::new())
    }

    #[test]
    fn test_empty_stack_copies() {
        let device = device();
        let src = ImageLayer::from_data(&device, PixelFormat::Mono8, 2, 1, &[1, 2]).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Rgb8, 1, 1);
        assert!(FilterStack::new().process(&mut dst, &src));
        assert_eq!(dst.retrieve_bitmap().unwrap().buffer(), &[1, 2]);
    }

    #[test]
    fn test_failure_aborts() {
        let device = device();
        let src = ImageLayer::new(&device, PixelFormat::Mono8, 2, 2).unwrap();
        let mut dst = ImageLayer::empty(PixelFormat::Mono8, 2, 2);
        let mut stack = FilterStack::new()
            .with(Box::new(BWMixer::new(device.clone())))
            .with(Box::new(Vignette::new(device)));
        assert!(!stack.process(&mut dst, &src));
    }

    #[test]
    fn test_presets_in_order() {
        let device = device();
        let stack = FilterStack::new()
            .with(Box::new(Vignette::new(device.clone())))
            .with(Box::new(BWMixer::new(device)));
        let presets = stack.to_presets();
        let names: Vec<_> = presets.iter().map(|p| p.filter_name().to_string()).collect();
        assert_eq!(names, ["Vignette", "BWMixer"]);
        assert_eq!(stack.clone().len(), 2);
    }
}
