//! Cascaded sharpen command.

use anyhow::{Result, ensure};
use blacksilk_graphics::filters::{Cascade, CascadedSharpen};
#[allow(unused_imports)]
use tracing::{debug, trace};

use crate::SharpenArgs;

pub fn run(args: SharpenArgs, backend: &str, verbose: bool) -> Result<()> {
    ensure!(
        args.radii.len() == args.strengths.len(),
        "{} radii given for {} strengths",
        args.radii.len(),
        args.strengths.len()
    );
    let cascades: Vec<Cascade> = args
        .radii
        .iter()
        .zip(&args.strengths)
        .map(|(&blur_radius, &strength)| Cascade { blur_radius, strength })
        .collect();
    debug!(cascades = cascades.len(), threshold = args.threshold, "sharpen");

    let mut sharpen = CascadedSharpen::with_cascades(super::open_device(backend)?, &cascades);
    sharpen.set_threshold(args.threshold);
    super::render(&mut sharpen, &args.input, &args.output, verbose)
}
