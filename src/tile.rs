//! The tile-component data model handed to the transform drivers.
//!
//! A tile-component is one color channel of one tile: a rectangle of
//! signed samples plus the resolution pyramid describing its sub-band
//! decomposition. The entropy decoder (out of scope here) fills the
//! per-band code-blocks; the inverse transform turns them back into
//! samples. For the irreversible 9/7 path the `i32` buffers carry `f32`
//! bit patterns; conversion happens only at the storage boundary.

use crate::error::{DwtError, Result, bail};
use crate::geometry;
use crate::rect::IntRect;

/// The wavelet filter family of a tile-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveletTransform {
    /// The reversible integer 5/3 filter (lossless).
    Reversible53,
    /// The irreversible floating-point 9/7 filter (lossy).
    Irreversible97,
}

/// Sub-band orientations. The discriminants are chosen so that
/// `band & 1` / `band >> 1` yield the horizontal/vertical band offsets of
/// the coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubBandType {
    /// Low-pass in both directions.
    LowLow = 0,
    /// High-pass horizontally, low-pass vertically.
    HighLow = 1,
    /// Low-pass horizontally, high-pass vertically.
    LowHigh = 2,
    /// High-pass in both directions.
    HighHigh = 3,
}

/// One entropy-decoded code-block of a sub-band.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    /// The code-block rectangle in band-absolute coordinates.
    pub rect: IntRect,
    /// Decoded samples, row-major, `rect`-sized. `None` when the block was
    /// not included in the codestream (all-zero).
    pub data: Option<Vec<i32>>,
}

/// One sub-band of one resolution level.
#[derive(Debug, Clone)]
pub struct SubBand {
    /// The orientation of the band.
    pub band_type: SubBandType,
    /// The band rectangle in band coordinates.
    pub rect: IntRect,
    /// The decoded code-blocks covering the band.
    pub code_blocks: Vec<CodeBlock>,
}

/// One tier of the resolution pyramid.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The resolution rectangle in tile coordinates.
    pub rect: IntRect,
    /// LL only at resolution 0, otherwise HL, LH, HH in that order.
    pub bands: Vec<SubBand>,
}

/// A tile-component: the unit of independent transform computation.
#[derive(Debug, Clone)]
pub struct TileComponent {
    /// The tile-component rectangle.
    pub rect: IntRect,
    /// Number of resolution levels R.
    pub num_resolutions: u32,
    /// The resolution pyramid, coarsest first.
    pub resolutions: Vec<Resolution>,
    /// The sample buffer, row-major with stride `rect.width()`.
    pub data: Vec<i32>,
    /// Window of interest for partial decoding, in tile coordinates.
    pub window: Option<IntRect>,
    /// Output buffer for the window of interest.
    pub window_data: Vec<i32>,
    /// The filter family of this component.
    pub transform: WaveletTransform,
}

impl TileComponent {
    /// Build a tile-component with its resolution pyramid and a zeroed
    /// sample buffer.
    pub fn new(rect: IntRect, num_resolutions: u32, transform: WaveletTransform) -> Result<Self> {
        if num_resolutions == 0 || num_resolutions > 32 || rect.x1 < rect.x0 || rect.y1 < rect.y0 {
            bail!(DwtError::InvalidComponent);
        }

        let mut resolutions = Vec::with_capacity(num_resolutions as usize);
        for resno in 0..num_resolutions {
            let res_rect = geometry::resolution_rect(rect, num_resolutions, resno);
            let bands = if resno == 0 {
                vec![SubBand {
                    band_type: SubBandType::LowLow,
                    rect: geometry::band_rect(rect, num_resolutions, 0, 0),
                    code_blocks: Vec::new(),
                }]
            } else {
                [
                    SubBandType::HighLow,
                    SubBandType::LowHigh,
                    SubBandType::HighHigh,
                ]
                .iter()
                .map(|&band_type| SubBand {
                    band_type,
                    rect: geometry::band_rect(rect, num_resolutions, resno, band_type as u32),
                    code_blocks: Vec::new(),
                })
                .collect()
            };

            resolutions.push(Resolution {
                rect: res_rect,
                bands,
            });
        }

        let len = rect.width() as usize * rect.height() as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| DwtError::OutOfMemory)?;
        data.resize(len, 0);

        Ok(TileComponent {
            rect,
            num_resolutions,
            resolutions,
            data,
            window: None,
            window_data: Vec::new(),
            transform,
        })
    }

    /// The tile-component width.
    pub fn width(&self) -> u32 {
        self.rect.width()
    }

    /// The tile-component height.
    pub fn height(&self) -> u32 {
        self.rect.height()
    }

    /// The window of interest mapped into the coordinates of resolution
    /// `num_res - 1` and clipped to it, origin-relative.
    pub fn window_region(&self, num_res: u32) -> Option<IntRect> {
        let window = self.window?;
        let tr_max = &self.resolutions[num_res as usize - 1].rect;
        let shift = self.num_resolutions - num_res;

        let mapped = IntRect::from_ltrb(
            geometry::ceil_div_pow2(window.x0, shift),
            geometry::ceil_div_pow2(window.y0, shift),
            geometry::ceil_div_pow2(window.x1, shift),
            geometry::ceil_div_pow2(window.y1, shift),
        )
        .intersect(*tr_max);

        Some(IntRect::from_ltrb(
            mapped.x0 - tr_max.x0,
            mapped.y0 - tr_max.y0,
            mapped.x1 - tr_max.x0,
            mapped.y1 - tr_max.y0,
        ))
    }
}

/// Reinterpret a stored sample as its `f32` bit pattern.
pub fn f32_from_sample(v: i32) -> f32 {
    f32::from_bits(v as u32)
}

/// Reinterpret an `f32` coefficient as a storable sample.
pub fn sample_from_f32(v: f32) -> i32 {
    v.to_bits() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_structure() {
        let tc = TileComponent::new(
            IntRect::from_ltrb(0, 0, 16, 16),
            3,
            WaveletTransform::Reversible53,
        )
        .unwrap();

        assert_eq!(tc.resolutions.len(), 3);
        assert_eq!(tc.resolutions[0].bands.len(), 1);
        assert_eq!(tc.resolutions[1].bands.len(), 3);
        assert_eq!(tc.resolutions[0].rect, IntRect::from_ltrb(0, 0, 4, 4));
        assert_eq!(tc.resolutions[1].rect, IntRect::from_ltrb(0, 0, 8, 8));
        assert_eq!(tc.resolutions[2].rect, IntRect::from_ltrb(0, 0, 16, 16));
        assert_eq!(tc.data.len(), 256);
    }

    #[test]
    fn rejects_zero_resolutions() {
        assert!(
            TileComponent::new(
                IntRect::from_ltrb(0, 0, 4, 4),
                0,
                WaveletTransform::Reversible53,
            )
            .is_err()
        );
    }

    #[test]
    fn sample_bit_cast_round_trips() {
        for v in [0.0f32, -1.5, 1234.25, f32::MIN_POSITIVE] {
            assert_eq!(f32_from_sample(sample_from_f32(v)), v);
        }
    }
}
