//! Image info command.

use anyhow::Result;

use crate::InfoArgs;

pub fn run(args: InfoArgs, verbose: bool) -> Result<()> {
    for path in &args.input {
        let bitmap = crate::raw::read(path)?;
        let format = bitmap.format();
        println!("{}", path.display());
        println!("  Resolution: {}x{}", bitmap.width(), bitmap.height());
        println!("  Format:     {format}");
        println!("  Channels:   {}", format.channel_count());
        if verbose {
            println!("  Bit depth:  {}", format.bytes_per_channel() * 8);
            println!("  Data size:  {} bytes", bitmap.buffer().len());
        }
        if args.input.len() > 1 {
            println!();
        }
    }
    Ok(())
}
