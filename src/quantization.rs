//! Quantization step-size derivation from the wavelet band norms.

use crate::tile::WaveletTransform;

/// The quantization signalling style of a tile-component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationStyle {
    /// No quantization; step sizes are derived from the band gain alone.
    NoQuantization,
    /// Scalar quantization with explicit per-band step sizes.
    ScalarExplicit,
}

/// Per-tile-component parameters driving the step-size computation.
#[derive(Debug, Clone, Copy)]
pub struct QuantizationParameters {
    /// Number of resolution levels R; the component has `3R - 2` bands.
    pub num_resolutions: u32,
    /// The quantization style.
    pub style: QuantizationStyle,
    /// The filter family, which selects the norm table and band gains.
    pub transform: WaveletTransform,
}

/// An encoded quantization step size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSize {
    /// The step-size exponent.
    pub exponent: i32,
    /// The 11-bit step-size mantissa.
    pub mantissa: u32,
}

/// L2 norms of the reversible 5/3 synthesis basis, `[orientation][level]`
/// with orientations LL, HL, LH, HH. The trailing zeros of the non-LL
/// rows sit behind the level clamp and are never read.
const NORMS_53: [[f64; 10]; 4] = [
    [
        1.000, 1.500, 2.750, 5.375, 10.68, 21.34, 42.67, 85.33, 170.7, 341.3,
    ],
    [
        1.038, 1.592, 2.919, 5.703, 11.33, 22.64, 45.25, 90.48, 180.9, 0.0,
    ],
    [
        1.038, 1.592, 2.919, 5.703, 11.33, 22.64, 45.25, 90.48, 180.9, 0.0,
    ],
    [
        0.7186, 0.9218, 1.586, 3.043, 6.019, 12.01, 24.00, 47.97, 95.93, 0.0,
    ],
];

/// L2 norms of the irreversible 9/7 synthesis basis, laid out like
/// [`NORMS_53`].
const NORMS_97: [[f64; 10]; 4] = [
    [
        1.000, 1.965, 4.177, 8.403, 16.90, 33.84, 67.69, 135.3, 270.6, 540.9,
    ],
    [
        2.022, 3.989, 8.355, 17.04, 34.27, 68.63, 137.3, 274.6, 549.0, 0.0,
    ],
    [
        2.022, 3.989, 8.355, 17.04, 34.27, 68.63, 137.3, 274.6, 549.0, 0.0,
    ],
    [
        2.080, 3.865, 8.307, 17.18, 34.71, 69.59, 139.3, 278.6, 557.2, 0.0,
    ],
];

/// The norm of band `orient` at decomposition `level`, with the level
/// clamped into the table.
pub(crate) fn band_norm(transform: WaveletTransform, level: u32, orient: u32) -> f64 {
    let level = if orient == 0 {
        level.min(9)
    } else {
        level.min(8)
    };
    match transform {
        WaveletTransform::Reversible53 => NORMS_53[orient as usize][level as usize],
        WaveletTransform::Irreversible97 => NORMS_97[orient as usize][level as usize],
    }
}

fn floor_log2(v: i32) -> i32 {
    debug_assert!(v > 0);
    31 - v.leading_zeros() as i32
}

/// Encode a step size into its `(exponent, mantissa)` representation.
/// `numbps` is the band's dynamic range, `precision + gain`.
fn encode_stepsize(stepsize: f64, numbps: i32) -> StepSize {
    let s = (stepsize * 8192.0).floor() as i32;
    let p = floor_log2(s) - 13;
    let n = 11 - floor_log2(s);
    let mantissa = (if n < 0 { s >> -n } else { s << n } as u32) & 0x7ff;
    StepSize {
        exponent: numbps - p,
        mantissa,
    }
}

/// Compute the step sizes of all `3R - 2` bands of a tile-component.
pub fn compute_stepsizes(params: &QuantizationParameters, precision: u32) -> Vec<StepSize> {
    let num_bands = 3 * params.num_resolutions - 2;
    let mut stepsizes = Vec::with_capacity(num_bands as usize);

    for band in 0..num_bands {
        let resno = if band == 0 { 0 } else { (band - 1) / 3 + 1 };
        let orient = if band == 0 { 0 } else { (band - 1) % 3 + 1 };
        let level = params.num_resolutions - 1 - resno;

        let gain = match params.transform {
            WaveletTransform::Reversible53 => 0,
            WaveletTransform::Irreversible97 => match orient {
                0 => 0,
                1 | 2 => 1,
                _ => 2,
            },
        };

        let stepsize = if params.style == QuantizationStyle::NoQuantization {
            1.0
        } else {
            (1u32 << gain) as f64 / band_norm(params.transform, level, orient)
        };

        stepsizes.push(encode_stepsize(stepsize, (precision + gain) as i32));
    }

    stepsizes
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reconstruct the step size a decoder derives from the encoded pair.
    fn reconstruct(s: StepSize, precision: u32, gain: u32) -> f64 {
        let r_b = (precision + gain) as i32;
        2f64.powi(r_b - s.exponent) * (1.0 + s.mantissa as f64 / 2048.0)
    }

    #[test]
    fn irreversible_ll_band() {
        // R = 3, precision 8: the LL band sits at level 2 with norm 4.177,
        // stepsize 1/4.177 = 0.23940.
        let params = QuantizationParameters {
            num_resolutions: 3,
            style: QuantizationStyle::ScalarExplicit,
            transform: WaveletTransform::Irreversible97,
        };
        let steps = compute_stepsizes(&params, 8);
        assert_eq!(steps.len(), 7);

        // floor(0.23940 * 8192) = 1961 = 2^10 * (1 + 1874/2048).
        assert_eq!(steps[0], StepSize { exponent: 11, mantissa: 1874 });

        let back = reconstruct(steps[0], 8, 0);
        let stepsize = 1.0 / 4.177;
        assert!((back - stepsize).abs() < stepsize / 1024.0);
    }

    #[test]
    fn mantissas_fit_and_reconstruct() {
        for transform in [WaveletTransform::Reversible53, WaveletTransform::Irreversible97] {
            for num_res in 1..=6 {
                let params = QuantizationParameters {
                    num_resolutions: num_res,
                    style: QuantizationStyle::ScalarExplicit,
                    transform,
                };
                let steps = compute_stepsizes(&params, 10);
                assert_eq!(steps.len() as u32, 3 * num_res - 2);

                for (band, step) in steps.iter().enumerate() {
                    assert!(step.mantissa <= 0x7ff);

                    let band = band as u32;
                    let resno = if band == 0 { 0 } else { (band - 1) / 3 + 1 };
                    let orient = if band == 0 { 0 } else { (band - 1) % 3 + 1 };
                    let level = num_res - 1 - resno;
                    let gain = match transform {
                        WaveletTransform::Reversible53 => 0,
                        WaveletTransform::Irreversible97 => [0u32, 1, 1, 2][orient as usize],
                    };
                    let stepsize = (1u32 << gain) as f64 / band_norm(transform, level, orient);
                    let back = reconstruct(*step, 10, gain);
                    assert!(
                        (back - stepsize).abs() <= stepsize / 1024.0,
                        "band {band}: {back} vs {stepsize}"
                    );
                }
            }
        }
    }

    #[test]
    fn no_quantization_yields_unit_steps() {
        let params = QuantizationParameters {
            num_resolutions: 2,
            style: QuantizationStyle::NoQuantization,
            transform: WaveletTransform::Reversible53,
        };
        let steps = compute_stepsizes(&params, 8);
        for step in steps {
            // stepsize 1.0: mantissa 0, exponent = precision + gain.
            assert_eq!(step.mantissa, 0);
            assert_eq!(step.exponent, 8);
        }
    }

    #[test]
    fn norm_level_clamp() {
        // Levels beyond the tables clamp to the last entry.
        assert_eq!(
            band_norm(WaveletTransform::Irreversible97, 12, 0),
            band_norm(WaveletTransform::Irreversible97, 9, 0)
        );
        assert_eq!(
            band_norm(WaveletTransform::Reversible53, 11, 3),
            band_norm(WaveletTransform::Reversible53, 8, 3)
        );
    }
}
