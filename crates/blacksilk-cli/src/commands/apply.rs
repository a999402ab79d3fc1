//! Preset stack command.

use anyhow::{Context, Result, bail};
use blacksilk_graphics::filters::create_filter;
use blacksilk_graphics::{FilterPreset, FilterStack, ImageLayer};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

use crate::ApplyArgs;

pub fn run(args: ApplyArgs, backend: &str, verbose: bool) -> Result<()> {
    let device = super::open_device(backend)?;

    let mut stack = FilterStack::new();
    for path in &args.presets {
        let preset = FilterPreset::read_from_file(path)
            .with_context(|| format!("Failed to read preset: {}", path.display()))?;
        let Some(mut filter) = create_filter(preset.filter_name(), device.clone()) else {
            bail!("{}: unknown filter '{}'", path.display(), preset.filter_name());
        };
        if !filter.from_preset(&preset) {
            bail!("{}: no parameters for {}", path.display(), preset.filter_name());
        }
        debug!(preset = preset.name(), filter = preset.filter_name(), "stage added");
        if verbose {
            println!("+ {} ({})", preset.name(), preset.filter_name());
        }
        stack.push(filter);
    }

    let src = super::load_layer(&device, &args.input)?;
    let mut dst = ImageLayer::empty(src.format(), src.width(), src.height());
    if !stack.process(&mut dst, &src) {
        bail!("Filter stack failed on {}", args.input.display());
    }
    super::save_layer(&args.output, &dst)?;
    info!(stages = stack.len(), output = %args.output.display(), "stack applied");
    Ok(())
}
