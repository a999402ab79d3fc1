//! Preset collections.
//!
//! A [`FilterPresetCollection`] keeps presets together with the file they
//! were loaded from, so they can be reloaded after an external edit.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use super::FilterPreset;
use crate::PresetResult;

/// One preset and its source file, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterPresetEntry {
    /// File the preset was loaded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// The preset.
    pub preset: FilterPreset,
}

/// Ordered list of presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPresetCollection {
    entries: Vec<FilterPresetEntry>,
}

impl FilterPresetCollection {
    /// Empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of presets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no presets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in order.
    pub fn entries(&self) -> &[FilterPresetEntry] {
        &self.entries
    }

    /// Presets in order.
    pub fn iter(&self) -> impl Iterator<Item = &FilterPreset> {
        self.entries.iter().map(|e| &e.preset)
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Re-reads every preset that has a source file.
    pub fn reload_all(&mut self) -> PresetResult<()> {
        for entry in &mut self.entries {
            if let Some(path) = &entry.path {
                entry.preset = FilterPreset::read_from_file(path)?;
            }
        }
        Ok(())
    }

    /// Re-reads the preset loaded from `path`; false if none was.
    pub fn reload_by_path(&mut self, path: impl AsRef<Path>) -> PresetResult<bool> {
        let path = path.as_ref();
        let Some(entry) = self.entries.iter_mut().find(|e| e.path.as_deref() == Some(path)) else {
            return Ok(false);
        };
        entry.preset = FilterPreset::read_from_file(path)?;
        Ok(true)
    }

    /// Re-reads the first file-backed preset called `name`.
    pub fn reload_by_name(&mut self, name: &str) -> PresetResult<bool> {
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.path.is_some() && e.preset.name() == name)
        else {
            return Ok(false);
        };
        if let Some(path) = &entry.path {
            entry.preset = FilterPreset::read_from_file(path)?;
        }
        Ok(true)
    }

    /// Loads a preset file unless it is already part of the collection.
    pub fn load_preset_from_file(&mut self, path: impl AsRef<Path>) -> PresetResult<()> {
        let path = path.as_ref();
        if self.contains_by_path(path) {
            trace!(path = %path.display(), "preset already loaded");
            return Ok(());
        }
        let preset = FilterPreset::read_from_file(path)?;
        debug!(path = %path.display(), preset = preset.name(), "preset loaded");
        self.entries.push(FilterPresetEntry {
            path: Some(path.to_path_buf()),
            preset,
        });
        Ok(())
    }

    /// Writes the whole collection as YAML.
    pub fn save_yaml(&self, path: impl AsRef<Path>) -> PresetResult<()> {
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Reads a collection written by [`save_yaml`](Self::save_yaml).
    pub fn load_yaml(path: impl AsRef<Path>) -> PresetResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// True if a preset is called `name`.
    pub fn contains_by_name(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.preset.name() == name)
    }

    /// True if a preset was loaded from `path`.
    pub fn contains_by_path(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.entries.iter().any(|e| e.path.as_deref() == Some(path))
    }

    /// First preset called `name`.
    pub fn by_name(&self, name: &str) -> Option<&FilterPreset> {
        self.get(|e| e.preset.name() == name)
    }

    /// First preset whose entry matches `pred`.
    pub fn get(&self, pred: impl Fn(&FilterPresetEntry) -> bool) -> Option<&FilterPreset> {
        self.entries.iter().find(|e| pred(e)).map(|e| &e.preset)
    }

    /// First preset.
    pub fn front(&self) -> Option<&FilterPreset> {
        self.entries.first().map(|e| &e.preset)
    }

    /// Last preset.
    pub fn back(&self) -> Option<&FilterPreset> {
        self.entries.last().map(|e| &e.preset)
    }

    /// Presets for the filter called `filter_name`, without source paths.
    pub fn collection_for_filter(&self, filter_name: &str) -> Self {
        let mut out = Self::new();
        for preset in self.iter().filter(|p| p.filter_name() == filter_name) {
            out.add(preset.clone());
        }
        out
    }

    // ========================================================================
    // Editing
    // ========================================================================

    /// Appends a preset without a source file.
    pub fn add(&mut self, preset: FilterPreset) {
        self.entries.push(FilterPresetEntry { path: None, preset });
    }

    /// Appends an empty preset and returns it.
    pub fn emplace_back(&mut self) -> &mut FilterPreset {
        self.entries.push(FilterPresetEntry::default());
        let last = self.entries.len() - 1;
        &mut self.entries[last].preset
    }

    /// Removes the first preset equal to `preset`.
    pub fn remove(&mut self, preset: &FilterPreset) -> bool {
        self.remove_first(|e| &e.preset == preset)
    }

    /// Removes the preset loaded from `path`.
    pub fn remove_by_path(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.remove_first(|e| e.path.as_deref() == Some(path))
    }

    /// Removes the first preset called `name`.
    pub fn remove_by_name(&mut self, name: &str) -> bool {
        self.remove_first(|e| e.preset.name() == name)
    }

    /// Removes every preset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn remove_first(&mut self, pred: impl Fn(&FilterPresetEntry) -> bool) -> bool {
        match self.entries.iter().position(pred) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(name: &str, filter: &str) -> FilterPreset {
        let mut p = FilterPreset::for_filter(name, filter);
        p.set_float("Strength", 1.0);
        p
    }

    #[test]
    fn test_collection_for_filter() {
        let mut c = FilterPresetCollection::new();
        c.add(preset("a", "Vignette"));
        c.add(preset("b", "BWMixer"));
        c.add(preset("c", "Vignette"));
        let v = c.collection_for_filter("Vignette");
        assert_eq!(v.len(), 2);
        assert_eq!(v.front().unwrap().name(), "a");
        assert_eq!(v.back().unwrap().name(), "c");
    }

    #[test]
    fn test_remove_variants() {
        let mut c = FilterPresetCollection::new();
        c.add(preset("a", "Vignette"));
        c.add(preset("b", "Vignette"));
        assert!(c.remove(&preset("a", "Vignette")));
        assert!(!c.remove_by_name("a"));
        assert!(c.remove_by_name("b"));
        assert!(c.is_empty());
    }

    #[test]
    fn test_load_and_reload_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soft.preset");
        preset("soft", "UnsharpMask").write_to_file(&path).unwrap();

        let mut c = FilterPresetCollection::new();
        c.load_preset_from_file(&path).unwrap();
        c.load_preset_from_file(&path).unwrap();
        assert_eq!(c.len(), 1);
        assert!(c.contains_by_path(&path));

        let mut edited = preset("soft", "UnsharpMask");
        edited.set_float("Strength", 3.0);
        edited.write_to_file(&path).unwrap();
        assert!(c.reload_by_name("soft").unwrap());
        assert_eq!(c.by_name("soft").unwrap().float("Strength"), Some(3.0));
        assert!(!c.reload_by_path(dir.path().join("other.preset")).unwrap());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all.yaml");
        let mut c = FilterPresetCollection::new();
        c.add(preset("a", "Vignette"));
        c.emplace_back().set_name("empty");
        c.save_yaml(&path).unwrap();
        assert_eq!(FilterPresetCollection::load_yaml(&path).unwrap(), c);
    }
}
