/*!
A lifting-based discrete wavelet transform engine for JPEG 2000.

`j2k-dwt` implements the resolution-pyramid DWT at the heart of a
JPEG 2000 codec: the reversible integer 5/3 filter (lossless) and the
irreversible single-precision 9/7 filter (lossy), forward and inverse,
over the sub-band geometry of ISO/IEC 15444-1 Annex F. It is meant to sit
between an entropy coder and a tile/codestream layer, which are out of
scope here: inputs are tile-component geometry plus entropy-decoded
code-block samples, outputs are reconstructed sample buffers and
quantization step-size tables.

Three capabilities beyond the textbook transform:

- **Windowed (partial) decoding.** When only a region of interest is
  needed, [`decode`] with `whole_tile = false` reconstructs just enough
  coefficients to cover the window, using a block-sparse intermediate
  store; the result is sample-identical to cropping a full decode.
- **Stripe parallelism.** The per-resolution passes fan out over worker
  threads in row/column stripes, joined between passes. Disable it with
  [`DwtSettings::disable_multithreading`] for strictly sequential
  operation with identical results.
- **Step-size derivation.** [`compute_stepsizes`] turns the wavelet band
  norms into the `(exponent, mantissa)` pairs signalled in quantization
  marker segments.

# Example

```
use j2k_dwt::{decode, encode, DwtSettings, IntRect, TileComponent, WaveletTransform};

let rect = IntRect::from_ltrb(0, 0, 16, 16);
let mut tilec = TileComponent::new(rect, 3, WaveletTransform::Reversible53).unwrap();
tilec.data.iter_mut().enumerate().for_each(|(i, v)| *v = i as i32 % 255);
let original = tilec.data.clone();

let settings = DwtSettings::default();
encode(&mut tilec, &settings).unwrap();
decode(&mut tilec, 3, true, &settings).unwrap();
assert_eq!(tilec.data, original);
```

For the 9/7 path the `i32` sample buffers carry `f32` bit patterns;
convert at the boundary with [`f32_from_sample`] and [`sample_from_f32`].
*/

#![forbid(unsafe_code)]
#![forbid(missing_docs)]

mod dwt53;
mod dwt97;
mod error;
mod geometry;
mod partial;
mod quantization;
mod rect;
mod simd;
mod sparse;
mod tile;
mod transform;
mod worker;

use error::bail;

pub use error::{DwtError, Result};
pub use quantization::{
    QuantizationParameters, QuantizationStyle, StepSize, compute_stepsizes,
};
pub use rect::IntRect;
pub use tile::{
    CodeBlock, Resolution, SubBand, SubBandType, TileComponent, WaveletTransform,
    f32_from_sample, sample_from_f32,
};

/// Settings applied to a transform invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DwtSettings {
    /// Force strictly sequential execution. The parallel and sequential
    /// paths produce identical samples.
    pub disable_multithreading: bool,
}

/// Inverse transform of a tile-component over its `num_res` lowest
/// resolutions.
///
/// With `whole_tile` set the transform runs in place over
/// `tilec.data`. Otherwise only the window of interest
/// (`tilec.window`) is reconstructed, from the per-band code-blocks
/// into `tilec.window_data`; see [`TileComponent::window_region`] for
/// the output geometry.
pub fn decode(
    tilec: &mut TileComponent,
    num_res: u32,
    whole_tile: bool,
    settings: &DwtSettings,
) -> Result<()> {
    if num_res == 0 || num_res > tilec.num_resolutions {
        bail!(DwtError::InvalidComponent);
    }
    if (tilec.rect.width() as usize) * (tilec.rect.height() as usize) > tilec.data.len() {
        bail!(DwtError::InvalidComponent);
    }

    if whole_tile {
        transform::decode_tile(tilec, num_res, settings)
    } else {
        partial::decode_partial(tilec, num_res)
    }
}

/// Forward transform of a tile-component, in place over `tilec.data`,
/// across all of its resolution levels.
pub fn encode(tilec: &mut TileComponent, settings: &DwtSettings) -> Result<()> {
    if (tilec.rect.width() as usize) * (tilec.rect.height() as usize) > tilec.data.len() {
        bail!(DwtError::InvalidComponent);
    }
    transform::encode_tile(tilec, settings)
}
