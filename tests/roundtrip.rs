//! End-to-end transform tests: multi-level round trips, windowed versus
//! whole-tile decoding, and parallel versus sequential execution.

use j2k_dwt::{
    CodeBlock, DwtSettings, IntRect, TileComponent, WaveletTransform, decode, encode,
    f32_from_sample, sample_from_f32,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn sequential() -> DwtSettings {
    DwtSettings {
        disable_multithreading: true,
    }
}

fn parallel() -> DwtSettings {
    DwtSettings {
        disable_multithreading: false,
    }
}

fn make_tile(rect: IntRect, num_res: u32, transform: WaveletTransform) -> TileComponent {
    TileComponent::new(rect, num_res, transform).unwrap()
}

fn fill_random_ints(tilec: &mut TileComponent, rng: &mut StdRng) {
    for v in tilec.data.iter_mut() {
        *v = rng.gen_range(-32768..32768);
    }
}

fn fill_random_floats(tilec: &mut TileComponent, rng: &mut StdRng) {
    for v in tilec.data.iter_mut() {
        *v = sample_from_f32(rng.gen_range(-1.0f32..1.0));
    }
}

#[test]
fn reversible_round_trip_constant_tile() {
    let mut tilec = make_tile(
        IntRect::from_ltrb(0, 0, 16, 16),
        3,
        WaveletTransform::Reversible53,
    );
    tilec.data.fill(1000);

    encode(&mut tilec, &sequential()).unwrap();
    decode(&mut tilec, 3, true, &sequential()).unwrap();
    assert!(tilec.data.iter().all(|&v| v == 1000));
}

#[test]
fn reversible_round_trips() {
    let mut rng = StdRng::seed_from_u64(0xDECADE);
    let cases = [
        (0, 0, 16, 16, 3),
        (0, 0, 13, 17, 4),
        (0, 0, 64, 64, 6),
        (3, 5, 37, 23, 3),
        (1, 1, 8, 8, 2),
        (0, 0, 1, 16, 2),
        (0, 0, 16, 1, 2),
        (7, 2, 5, 5, 3),
        // The lower level of the single row degenerates to zero height.
        (0, 1, 9, 1, 2),
    ];

    for &(x0, y0, w, h, num_res) in &cases {
        for settings in [sequential(), parallel()] {
            let rect = IntRect::from_ltrb(x0, y0, x0 + w, y0 + h);
            let mut tilec = make_tile(rect, num_res, WaveletTransform::Reversible53);
            fill_random_ints(&mut tilec, &mut rng);
            let original = tilec.data.clone();

            encode(&mut tilec, &settings).unwrap();
            decode(&mut tilec, num_res, true, &settings).unwrap();
            assert_eq!(
                tilec.data, original,
                "{w}x{h}+{x0}+{y0} R={num_res} mt={}",
                !settings.disable_multithreading
            );
        }
    }
}

#[test]
fn irreversible_round_trip_bounded_error() {
    let mut rng = StdRng::seed_from_u64(0x97_53);
    let cases = [
        (0, 0, 16, 16, 3),
        (0, 0, 64, 64, 3),
        (3, 5, 37, 23, 2),
        (1, 0, 33, 12, 3),
    ];

    for &(x0, y0, w, h, num_res) in &cases {
        let rect = IntRect::from_ltrb(x0, y0, x0 + w, y0 + h);
        let mut tilec = make_tile(rect, num_res, WaveletTransform::Irreversible97);
        fill_random_floats(&mut tilec, &mut rng);
        let original: Vec<f32> = tilec.data.iter().map(|&v| f32_from_sample(v)).collect();

        encode(&mut tilec, &sequential()).unwrap();
        decode(&mut tilec, num_res, true, &sequential()).unwrap();

        let mut max_err = 0f32;
        for (o, v) in original.iter().zip(tilec.data.iter()) {
            max_err = max_err.max((o - f32_from_sample(*v)).abs());
        }
        assert!(
            max_err < 1e-5,
            "{w}x{h}+{x0}+{y0} R={num_res}: max error {max_err}"
        );
    }
}

#[test]
fn ll_only_zero_tile_stays_zero() {
    let mut tilec = make_tile(
        IntRect::from_ltrb(0, 0, 16, 16),
        2,
        WaveletTransform::Irreversible97,
    );
    // All-zero coefficients: f32 zero and i32 zero share the bit pattern.
    decode(&mut tilec, 2, true, &sequential()).unwrap();
    assert!(tilec.data.iter().all(|&v| v == 0));
}

#[test]
fn single_resolution_is_identity() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut tilec = make_tile(
        IntRect::from_ltrb(0, 0, 9, 7),
        1,
        WaveletTransform::Reversible53,
    );
    fill_random_ints(&mut tilec, &mut rng);
    let original = tilec.data.clone();

    encode(&mut tilec, &sequential()).unwrap();
    assert_eq!(tilec.data, original);
    decode(&mut tilec, 1, true, &sequential()).unwrap();
    assert_eq!(tilec.data, original);
}

#[test]
fn parallel_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(0xBEEF);
    for transform in [
        WaveletTransform::Reversible53,
        WaveletTransform::Irreversible97,
    ] {
        let rect = IntRect::from_ltrb(0, 0, 75, 49);
        let mut a = make_tile(rect, 4, transform);
        match transform {
            WaveletTransform::Reversible53 => fill_random_ints(&mut a, &mut rng),
            WaveletTransform::Irreversible97 => fill_random_floats(&mut a, &mut rng),
        }
        let mut b = a.clone();

        encode(&mut a, &sequential()).unwrap();
        encode(&mut b, &parallel()).unwrap();
        assert_eq!(a.data, b.data, "{transform:?} forward");

        decode(&mut a, 4, true, &sequential()).unwrap();
        decode(&mut b, 4, true, &parallel()).unwrap();
        assert_eq!(a.data, b.data, "{transform:?} inverse");
    }
}

/// Split the sub-band pyramid of an encoded tile into per-band
/// code-blocks, the way the entropy decoder hands them over: band data at
/// its band-relative position plus the lower-resolution offset.
fn attach_code_blocks(tilec: &mut TileComponent) {
    let stride = tilec.rect.width() as usize;
    let data = tilec.data.clone();
    let num_res = tilec.num_resolutions as usize;

    for resno in 0..num_res {
        let (prev_w, prev_h) = if resno == 0 {
            (0, 0)
        } else {
            let r = tilec.resolutions[resno - 1].rect;
            (r.width(), r.height())
        };

        for band in tilec.resolutions[resno].bands.iter_mut() {
            let bw = band.rect.width();
            let bh = band.rect.height();
            if bw == 0 || bh == 0 {
                continue;
            }
            let off_x = if band.band_type as u32 & 1 != 0 { prev_w } else { 0 };
            let off_y = if band.band_type as u32 & 2 != 0 { prev_h } else { 0 };

            // Blocks of at most 16x16 in band coordinates, anchored at the
            // band rect origin.
            let step = 16u32;
            let mut blocks = Vec::new();
            let mut by = 0;
            while by < bh {
                let cb_h = step.min(bh - by);
                let mut bx = 0;
                while bx < bw {
                    let cb_w = step.min(bw - bx);
                    let mut cb_data = Vec::with_capacity((cb_w * cb_h) as usize);
                    for y in 0..cb_h {
                        for x in 0..cb_w {
                            let gx = (off_x + bx + x) as usize;
                            let gy = (off_y + by + y) as usize;
                            cb_data.push(data[gy * stride + gx]);
                        }
                    }
                    blocks.push(CodeBlock {
                        rect: IntRect::from_ltrb(
                            band.rect.x0 + bx,
                            band.rect.y0 + by,
                            band.rect.x0 + bx + cb_w,
                            band.rect.y0 + by + cb_h,
                        ),
                        data: Some(cb_data),
                    });
                    bx += cb_w;
                }
                by += cb_h;
            }
            band.code_blocks = blocks;
        }
    }
}

fn check_partial_matches_full(
    rect: IntRect,
    num_res_total: u32,
    num_res_decoded: u32,
    window: IntRect,
    transform: WaveletTransform,
    seed: u64,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tilec = make_tile(rect, num_res_total, transform);
    match transform {
        WaveletTransform::Reversible53 => fill_random_ints(&mut tilec, &mut rng),
        WaveletTransform::Irreversible97 => fill_random_floats(&mut tilec, &mut rng),
    }

    // Produce a valid sub-band pyramid, then hand it over as code-blocks.
    encode(&mut tilec, &sequential()).unwrap();
    attach_code_blocks(&mut tilec);

    let mut full = tilec.clone();
    decode(&mut full, num_res_decoded, true, &sequential()).unwrap();

    tilec.window = Some(window);
    decode(&mut tilec, num_res_decoded, false, &sequential()).unwrap();

    let region = tilec.window_region(num_res_decoded).unwrap();
    let rw = region.width() as usize;
    let rh = region.height() as usize;
    assert_eq!(tilec.window_data.len(), rw * rh);
    assert!(rw > 0 && rh > 0, "window must intersect the tile");

    let stride = rect.width() as usize;
    for y in 0..rh {
        for x in 0..rw {
            let expected = full.data[(region.y0 as usize + y) * stride + region.x0 as usize + x];
            let got = tilec.window_data[y * rw + x];
            assert_eq!(
                expected, got,
                "{transform:?} window sample ({x},{y}) of {region:?}"
            );
        }
    }
}

#[test]
fn partial_decode_matches_cropped_full_53() {
    check_partial_matches_full(
        IntRect::from_ltrb(0, 0, 64, 64),
        3,
        3,
        IntRect::from_ltrb(8, 8, 24, 24),
        WaveletTransform::Reversible53,
        1,
    );
}

#[test]
fn partial_decode_matches_cropped_full_97() {
    check_partial_matches_full(
        IntRect::from_ltrb(0, 0, 64, 64),
        3,
        3,
        IntRect::from_ltrb(8, 8, 24, 24),
        WaveletTransform::Irreversible97,
        2,
    );
}

#[test]
fn partial_decode_with_odd_origin() {
    for transform in [
        WaveletTransform::Reversible53,
        WaveletTransform::Irreversible97,
    ] {
        check_partial_matches_full(
            IntRect::from_ltrb(5, 3, 42, 32),
            3,
            3,
            IntRect::from_ltrb(13, 11, 29, 27),
            transform,
            3,
        );
    }
}

#[test]
fn partial_decode_of_whole_tile_window() {
    check_partial_matches_full(
        IntRect::from_ltrb(0, 0, 32, 24),
        3,
        3,
        IntRect::from_ltrb(0, 0, 32, 24),
        WaveletTransform::Reversible53,
        4,
    );
}

#[test]
fn partial_decode_at_reduced_resolution() {
    for transform in [
        WaveletTransform::Reversible53,
        WaveletTransform::Irreversible97,
    ] {
        check_partial_matches_full(
            IntRect::from_ltrb(0, 0, 64, 48),
            3,
            2,
            IntRect::from_ltrb(12, 8, 40, 36),
            transform,
            5,
        );
    }
}

#[test]
fn partial_decode_single_resolution_reads_window() {
    let rect = IntRect::from_ltrb(0, 0, 16, 16);
    let mut tilec = make_tile(rect, 1, WaveletTransform::Reversible53);
    for (i, v) in tilec.data.iter_mut().enumerate() {
        *v = i as i32;
    }
    attach_code_blocks(&mut tilec);

    tilec.window = Some(IntRect::from_ltrb(4, 4, 8, 8));
    decode(&mut tilec, 1, false, &sequential()).unwrap();

    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(tilec.window_data[y * 4 + x], ((y + 4) * 16 + x + 4) as i32);
        }
    }
}
