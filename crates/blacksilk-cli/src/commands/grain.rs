//! Film grain command.

use anyhow::Result;
use blacksilk_graphics::filters::FilmGrain;

use crate::GrainArgs;

pub fn run(args: GrainArgs, backend: &str, verbose: bool) -> Result<()> {
    let mut grain = FilmGrain::new(super::open_device(backend)?);
    grain.set_grain_blur_radius(args.radius);
    grain.set_mono_grain(!args.color);
    if let Some(seed) = args.seed {
        grain.set_seed(seed);
    }
    super::render(&mut grain, &args.input, &args.output, verbose)
}
