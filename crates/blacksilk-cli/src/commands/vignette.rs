//! Vignette command.

use anyhow::Result;
use blacksilk_core::Point32F;
use blacksilk_graphics::filters::Vignette;

use crate::VignetteArgs;

pub fn run(args: VignetteArgs, backend: &str, verbose: bool) -> Result<()> {
    let mut vignette = Vignette::new(super::open_device(backend)?);
    vignette.set_center(Point32F::new(args.x, args.y));
    vignette.set_radius(args.radius);
    vignette.set_strength(args.strength);
    super::render(&mut vignette, &args.input, &args.output, verbose)
}
