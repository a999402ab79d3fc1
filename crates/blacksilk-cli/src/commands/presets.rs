//! Preset listing command.

use anyhow::{Context, Result};
use blacksilk_graphics::FilterPresetCollection;
#[allow(unused_imports)]
use tracing::{debug, warn};

use crate::PresetsArgs;

pub fn run(args: PresetsArgs, verbose: bool) -> Result<()> {
    let pattern = args.dir.join("*.preset");
    let pattern = pattern.to_str().context("Preset directory is not valid UTF-8")?;

    let mut collection = FilterPresetCollection::new();
    for path in glob::glob(pattern)?.filter_map(|r| r.ok()) {
        if let Err(e) = collection.load_preset_from_file(&path) {
            warn!(path = %path.display(), error = %e, "skipping preset");
        }
    }
    if let Some(filter) = &args.filter {
        collection = collection.collection_for_filter(filter);
    }

    for entry in collection.entries() {
        let preset = &entry.preset;
        println!("{:<24} {}", preset.name(), preset.filter_name());
        if verbose {
            if let Some(path) = &entry.path {
                println!("    {}", path.display());
            }
        }
    }
    if verbose {
        println!("{} preset(s)", collection.len());
    }
    Ok(())
}
