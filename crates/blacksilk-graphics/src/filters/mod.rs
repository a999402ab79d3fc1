//! Built-in filters.
//!
//! | Filter | Operation |
//! |--------|-----------|
//! | [`BWMixer`] | `convert_to_monochrome` |
//! | [`BWAdaptiveMixer`] | `adaptive_bw_mixer` |
//! | [`CascadedSharpen`] | `gaussian_blur` per cascade + `cascaded_sharpen` |
//! | [`Curves`] | `adjust_brightness` |
//! | [`FilmGrain`] | `gaussian_blur` of noise + `filmgrain` |
//! | [`SplitTone`] | `splittone` |
//! | [`UnsharpMask`] | `gaussian_blur`, `subtract`, `multiply_scalar` |
//! | [`Vignette`] | `apply_vignette` |

mod bw_adaptive_mixer;
mod bwmixer;
mod cascaded_sharpen;
mod curves;
mod film_grain;
mod split_tone;
mod unsharp_mask;
mod vignette;

use std::sync::Arc;

pub use bw_adaptive_mixer::BWAdaptiveMixer;
pub use bwmixer::BWMixer;
pub use cascaded_sharpen::{Cascade, CascadedSharpen};
pub use curves::Curves;
pub use film_grain::{FilmGrain, MIN_GRAIN_BLUR_RADIUS};
pub use split_tone::SplitTone;
pub use unsharp_mask::UnsharpMask;
pub use vignette::Vignette;

use crate::backend::BackendDevice;
use crate::filter::Filter;

/// Names of every built-in filter.
pub const FILTER_NAMES: [&str; 8] = [
    BWMixer::NAME,
    BWAdaptiveMixer::NAME,
    CascadedSharpen::NAME,
    Curves::NAME,
    FilmGrain::NAME,
    SplitTone::NAME,
    UnsharpMask::NAME,
    Vignette::NAME,
];

/// Creates the built-in filter called `name` with default parameters.
pub fn create_filter(name: &str, device: Arc<dyn BackendDevice>) -> Option<Box<dyn Filter>> {
    let filter: Box<dyn Filter> = match name {
        BWMixer::NAME => Box::new(BWMixer::new(device)),
        BWAdaptiveMixer::NAME => Box::new(BWAdaptiveMixer::new(device)),
        CascadedSharpen::NAME => Box::new(CascadedSharpen::new(device)),
        Curves::NAME => Box::new(Curves::new(device)),
        FilmGrain::NAME => Box::new(FilmGrain::new(device)),
        SplitTone::NAME => Box::new(SplitTone::new(device)),
        UnsharpMask::NAME => Box::new(UnsharpMask::new(device)),
        Vignette::NAME => Box::new(Vignette::new(device)),
        _ => return None,
    };
    Some(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuDevice;

    #[test]
    fn test_create_every_filter() {
        let device: Arc<dyn BackendDevice> = Arc::new(CpuDevice::new());
        for name in FILTER_NAMES {
            let filter = create_filter(name, device.clone()).unwrap();
            assert_eq!(filter.name(), name);
            assert_eq!(filter.to_preset().filter_name(), name);
        }
        assert!(create_filter("Sepia", device).is_none());
    }
}
