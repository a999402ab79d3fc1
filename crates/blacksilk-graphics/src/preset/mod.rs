//! Filter presets.
//!
//! A [`FilterPreset`] is a named bag of typed values plus the name of the
//! filter it belongs to. Filters write their parameters with
//! [`Filter::to_preset`](crate::Filter::to_preset) and read them back with
//! [`Filter::from_preset`](crate::Filter::from_preset); unknown keys are
//! ignored.
//!
//! On disk a preset is either the line-based text format of the [`text`]
//! module or YAML (`.yaml` / `.yml`).
//!
//! ```rust
//! use blacksilk_graphics::FilterPreset;
//!
//! let mut preset = FilterPreset::new("Warm");
//! preset.set_filter_name("SplitTone");
//! preset.floats_mut().insert("Balance".into(), 0.25);
//!
//! let text = preset.to_string();
//! let parsed: FilterPreset = text.parse().unwrap();
//! assert_eq!(parsed, preset);
//! ```

pub mod collection;
pub mod text;

use std::collections::BTreeMap;
use std::path::Path;

use blacksilk_core::{Argb8, Argb16, Line32F, Mono8, Mono16, Point32F, Point32I, Rect32I, Rgb8, Rgb16};
use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::PresetResult;

pub use collection::{FilterPresetCollection, FilterPresetEntry};
pub use text::{points_from_string, points_to_string};

/// Generates the shared and mutable accessor of one value map.
macro_rules! value_maps {
    ($($field:ident, $field_mut:ident: $ty:ty;)*) => {
        $(
            #[doc = concat!("`", stringify!($field), "` values by key.")]
            pub fn $field(&self) -> &BTreeMap<String, $ty> {
                &self.$field
            }

            #[doc = concat!("Mutable `", stringify!($field), "` values.")]
            pub fn $field_mut(&mut self) -> &mut BTreeMap<String, $ty> {
                &mut self.$field
            }
        )*

        /// True if any map holds `key`.
        pub fn contains_value_with_name(&self, key: &str) -> bool {
            $(self.$field.contains_key(key))||*
        }

        /// Number of stored values over all maps.
        pub fn value_count(&self) -> usize {
            0 $(+ self.$field.len())*
        }

        fn clear_values(&mut self) {
            $(self.$field.clear();)*
        }
    };
}

/// Named set of typed filter parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPreset {
    name: String,
    category: String,
    filter_name: String,
    positions: BTreeMap<String, Point32I>,
    points: BTreeMap<String, Point32F>,
    lines: BTreeMap<String, Line32F>,
    rects: BTreeMap<String, Rect32I>,
    floats: BTreeMap<String, f32>,
    ints: BTreeMap<String, i32>,
    uints: BTreeMap<String, u32>,
    chars: BTreeMap<String, char>,
    switches: BTreeMap<String, bool>,
    strings: BTreeMap<String, String>,
    curves: BTreeMap<String, Vec<Point32F>>,
    rgb8s: BTreeMap<String, Rgb8>,
    rgb16s: BTreeMap<String, Rgb16>,
    argb8s: BTreeMap<String, Argb8>,
    argb16s: BTreeMap<String, Argb16>,
    mono8s: BTreeMap<String, Mono8>,
    mono16s: BTreeMap<String, Mono16>,
}

impl FilterPreset {
    /// Empty preset called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Empty preset called `name` for `filter_name`.
    pub fn for_filter(name: impl Into<String>, filter_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filter_name: filter_name.into(),
            ..Default::default()
        }
    }

    /// Preset name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the preset.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Free-form category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Sets the category.
    pub fn set_category(&mut self, category: impl Into<String>) {
        self.category = category.into();
    }

    /// Name of the filter this preset configures.
    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    /// Sets the owning filter's name.
    pub fn set_filter_name(&mut self, filter_name: impl Into<String>) {
        self.filter_name = filter_name.into();
    }

    value_maps! {
        positions, positions_mut: Point32I;
        points, points_mut: Point32F;
        lines, lines_mut: Line32F;
        rects, rects_mut: Rect32I;
        floats, floats_mut: f32;
        ints, ints_mut: i32;
        uints, uints_mut: u32;
        chars, chars_mut: char;
        switches, switches_mut: bool;
        strings, strings_mut: String;
        curves, curves_mut: Vec<Point32F>;
        rgb8s, rgb8s_mut: Rgb8;
        rgb16s, rgb16s_mut: Rgb16;
        argb8s, argb8s_mut: Argb8;
        argb16s, argb16s_mut: Argb16;
        mono8s, mono8s_mut: Mono8;
        mono16s, mono16s_mut: Mono16;
    }

    /// Float value of `key`.
    pub fn float(&self, key: &str) -> Option<f32> {
        self.floats.get(key).copied()
    }

    /// Integer value of `key`.
    pub fn int(&self, key: &str) -> Option<i32> {
        self.ints.get(key).copied()
    }

    /// Stores a float.
    pub fn set_float(&mut self, key: impl Into<String>, value: f32) {
        self.floats.insert(key.into(), value);
    }

    /// Stores an integer.
    pub fn set_int(&mut self, key: impl Into<String>, value: i32) {
        self.ints.insert(key.into(), value);
    }

    /// Stores a point.
    pub fn set_point(&mut self, key: impl Into<String>, value: Point32F) {
        self.points.insert(key.into(), value);
    }

    /// Removes every value and all names.
    pub fn clear(&mut self) {
        self.name.clear();
        self.category.clear();
        self.filter_name.clear();
        self.clear_values();
    }

    /// True if the preset holds no values.
    pub fn is_empty(&self) -> bool {
        self.value_count() == 0
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Writes the preset; YAML for `.yaml`/`.yml` paths, text otherwise.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> PresetResult<()> {
        let path = path.as_ref();
        let contents = if is_yaml_path(path) {
            serde_yaml::to_string(self)?
        } else {
            self.to_string()
        };
        std::fs::write(path, contents)?;
        debug!(path = %path.display(), preset = %self.name, "preset written");
        Ok(())
    }

    /// Reads a preset written by [`write_to_file`](Self::write_to_file).
    pub fn read_from_file(path: impl AsRef<Path>) -> PresetResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let preset = if is_yaml_path(path) {
            serde_yaml::from_str(&contents)?
        } else {
            contents.parse()?
        };
        trace!(path = %path.display(), "preset read");
        Ok(preset)
    }
}

pub(crate) fn is_yaml_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_value_with_name_checks_every_map() {
        let mut preset = FilterPreset::new("p");
        assert!(!preset.contains_value_with_name("X"));
        preset.switches_mut().insert("X".into(), true);
        assert!(preset.contains_value_with_name("X"));
        preset.mono16s_mut().insert("Y".into(), Mono16(7));
        assert!(preset.contains_value_with_name("Y"));
        assert_eq!(preset.value_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut preset = FilterPreset::for_filter("p", "Vignette");
        preset.set_float("X", 1.0);
        preset.clear();
        assert!(preset.is_empty());
        assert_eq!(preset.filter_name(), "");
    }

    #[test]
    fn test_file_round_trip_text_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let mut preset = FilterPreset::for_filter("Film", "FilmGrain");
        preset.set_int("MonoGrain", 1);
        preset.set_float("GrainBlurRadius", 0.75);
        preset.set_point("Point0", Point32F::new(0.0, 0.1));
        preset.rgb8s_mut().insert("Tint".into(), Rgb8::new(10, 20, 30));

        for file in ["film.preset", "film.yaml"] {
            let path = dir.path().join(file);
            preset.write_to_file(&path).unwrap();
            assert_eq!(FilterPreset::read_from_file(&path).unwrap(), preset);
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FilterPreset::read_from_file("/nonexistent/blacksilk.preset").unwrap_err();
        assert!(matches!(err, crate::PresetError::Io(_)));
    }
}
