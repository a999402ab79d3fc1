//! Black and white conversion command.

use anyhow::Result;
use blacksilk_graphics::filters::BWMixer;

use crate::MonoArgs;

pub fn run(args: MonoArgs, backend: &str, verbose: bool) -> Result<()> {
    let mut mixer = BWMixer::new(super::open_device(backend)?);
    mixer.set_sensitivities(args.red, args.green, args.blue);
    super::render(&mut mixer, &args.input, &args.output, verbose)
}
