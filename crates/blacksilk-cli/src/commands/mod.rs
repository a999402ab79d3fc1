//! CLI command implementations

pub mod apply;
pub mod grain;
pub mod info;
pub mod mono;
pub mod presets;
pub mod sharpen;
pub mod vignette;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use blacksilk_graphics::{BackendDevice, BackendKind, DeviceConfig, Filter, ImageLayer, apply_filter, create_device};
#[allow(unused_imports)]
use tracing::{debug, info, trace};

/// Opens the device named by `--backend`.
pub fn open_device(backend: &str) -> Result<Arc<dyn BackendDevice>> {
    let kind: BackendKind = backend.parse()?;
    let device = create_device(kind, DeviceConfig::default())
        .with_context(|| format!("Failed to open {} backend", kind.name()))?;
    debug!(device = device.name(), "device ready");
    Ok(device)
}

/// Loads a BSRAW image as a layer on `device`.
pub fn load_layer(device: &Arc<dyn BackendDevice>, path: &Path) -> Result<ImageLayer> {
    let bitmap = crate::raw::read(path)?;
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    Ok(ImageLayer::from_bitmap(device, &bitmap)?.with_name(name))
}

/// Saves a layer as BSRAW.
pub fn save_layer(path: &Path, layer: &ImageLayer) -> Result<()> {
    let bitmap = layer.retrieve_bitmap().context("Layer holds no pixel data")?;
    crate::raw::write(path, &bitmap)
}

/// Loads `input`, runs `filter` and writes `output`.
pub fn render(filter: &mut dyn Filter, input: &Path, output: &Path, verbose: bool) -> Result<()> {
    let device = filter.device().clone();
    let src = load_layer(&device, input)?;
    if verbose {
        println!(
            "{} {} ({}x{} {})",
            filter.name(),
            input.display(),
            src.width(),
            src.height(),
            src.format()
        );
    }
    let mut dst = ImageLayer::empty(src.format(), src.width(), src.height());
    ensure!(apply_filter(filter, &mut dst, &src), "{} failed on {}", filter.name(), input.display());
    save_layer(output, &dst)?;
    info!(filter = filter.name(), output = %output.display(), "image written");
    Ok(())
}
