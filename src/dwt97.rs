//! 1-D lifting kernels for the irreversible 9/7 filter.
//!
//! One 8-lane kernel serves both axes: for the horizontal pass the lanes
//! are 8 consecutive rows, for the vertical pass 8 consecutive columns.
//! The scratch is an interleaved slot buffer, slot `i` lane `c` at
//! `i * 8 + c`; slot parity selects the low/high coefficient family
//! according to `cas`.
//!
//! Everything is single-precision. Intermediates must not be promoted to
//! double, and the scale constants are fixed literals.

use crate::simd::{Level, SIMD_WIDTH, Simd, dispatch, f32x8};
use crate::tile::{f32_from_sample, sample_from_f32};
use core::ops::Range;

pub(crate) const ALPHA: f32 = -1.586_134_342;
pub(crate) const BETA: f32 = -0.052_980_118;
pub(crate) const GAMMA: f32 = 0.882_911_075;
pub(crate) const DELTA: f32 = 0.443_506_852;
pub(crate) const KAPPA: f32 = 1.230_174_105;
pub(crate) const INV_KAPPA: f32 = 1.0 / KAPPA;
/// The inverse scales high-pass coefficients by 13318/8192 rather than a
/// derived 2/K; conformance vectors depend on this exact value.
pub(crate) const TWO_INV_KAPPA: f32 = 1.625_732_422;
/// Exact reciprocal of [`TWO_INV_KAPPA`], applied by the forward
/// transform so that analysis and synthesis compose to the identity.
pub(crate) const HALF_KAPPA: f32 = 1.0 / TWO_INV_KAPPA;

/// The interleaved 8-lane scratch together with the 1-D segment layout
/// and the lane windows it is valid over.
pub(crate) struct V8Buffer<'a> {
    pub(crate) data: &'a mut [f32],
    pub(crate) sn: usize,
    pub(crate) dn: usize,
    pub(crate) cas: u32,
    pub(crate) win_l: Range<usize>,
    pub(crate) win_h: Range<usize>,
}

/// Inverse lifting over the buffer's windows: scale by K and two/K, then
/// the four update steps with constants (-delta, -gamma, -beta, -alpha).
pub(crate) fn decode(buf: &mut V8Buffer<'_>) {
    let (a, b) = if buf.cas == 0 {
        if !(buf.dn > 0 || buf.sn > 1) {
            return;
        }
        (0usize, 1usize)
    } else {
        if !(buf.sn > 0 || buf.dn > 1) {
            return;
        }
        (1, 0)
    };

    dispatch!(Level::new(), simd => decode_impl(simd, buf, a, b));
}

#[inline(always)]
fn decode_impl<S: Simd>(simd: S, buf: &mut V8Buffer<'_>, a: usize, b: usize) {
    let m_l = buf.sn.min(buf.dn.saturating_sub(a));
    let m_h = buf.dn.min(buf.sn.saturating_sub(b));

    scale_step(simd, buf.data, a, buf.win_l.clone(), KAPPA);
    scale_step(simd, buf.data, b, buf.win_h.clone(), TWO_INV_KAPPA);
    lift_step(simd, buf.data, b, a + 1, buf.win_l.clone(), m_l, -DELTA);
    lift_step(simd, buf.data, a, b + 1, buf.win_h.clone(), m_h, -GAMMA);
    lift_step(simd, buf.data, b, a + 1, buf.win_l.clone(), m_l, -BETA);
    lift_step(simd, buf.data, a, b + 1, buf.win_h.clone(), m_h, -ALPHA);
}

/// Forward lifting over the full segment: the four prediction/update
/// steps with (alpha, beta, gamma, delta), then the (1/K, K/2) scaling.
pub(crate) fn encode(buf: &mut V8Buffer<'_>) {
    if buf.sn + buf.dn <= 1 {
        return;
    }
    let (a, b) = if buf.cas == 0 { (0usize, 1usize) } else { (1, 0) };

    dispatch!(Level::new(), simd => encode_impl(simd, buf, a, b));
}

#[inline(always)]
fn encode_impl<S: Simd>(simd: S, buf: &mut V8Buffer<'_>, a: usize, b: usize) {
    let m_l = buf.sn.min(buf.dn.saturating_sub(a));
    let m_h = buf.dn.min(buf.sn.saturating_sub(b));

    lift_step(simd, buf.data, a, b + 1, 0..buf.dn, m_h, ALPHA);
    lift_step(simd, buf.data, b, a + 1, 0..buf.sn, m_l, BETA);
    lift_step(simd, buf.data, a, b + 1, 0..buf.dn, m_h, GAMMA);
    lift_step(simd, buf.data, b, a + 1, 0..buf.sn, m_l, DELTA);
    scale_step(simd, buf.data, a, 0..buf.sn, INV_KAPPA);
    scale_step(simd, buf.data, b, 0..buf.dn, HALF_KAPPA);
}

#[inline(always)]
fn scale_step<S: Simd>(simd: S, data: &mut [f32], base: usize, win: Range<usize>, c: f32) {
    let cv = f32x8::splat(simd, c);
    for i in win {
        let slot = (base + 2 * i) * SIMD_WIDTH;
        let v = f32x8::from_slice(simd, &data[slot..]);
        (v * cv).store(&mut data[slot..]);
    }
}

/// One lifting step over slots `w - 1 + 2i` for `i` in the window,
/// sourcing the two neighbouring slots. `m` bounds the range where both
/// neighbours exist; the one sample past it doubles its single
/// neighbour.
#[inline(always)]
fn lift_step<S: Simd>(
    simd: S,
    data: &mut [f32],
    l: usize,
    w: usize,
    win: Range<usize>,
    m: usize,
    c: f32,
) {
    let start = win.start;
    let end = win.end;
    if start >= end {
        return;
    }

    let cv = f32x8::splat(simd, c);
    let imax = end.min(m);
    let (mut fl, mut fw) = if start > 0 {
        (w + 2 * start - 2, w + 2 * start)
    } else {
        (l, w)
    };

    for _ in start..imax {
        let vl = f32x8::from_slice(simd, &data[fl * SIMD_WIDTH..]);
        let vw = f32x8::from_slice(simd, &data[fw * SIMD_WIDTH..]);
        let dst = (fw - 1) * SIMD_WIDTH;
        let vt = f32x8::from_slice(simd, &data[dst..]);
        (vl + vw).mul_add(cv, vt).store(&mut data[dst..]);
        fl = fw;
        fw += 2;
    }

    if m < end {
        let vl = f32x8::from_slice(simd, &data[fl * SIMD_WIDTH..]);
        let dst = (fw - 1) * SIMD_WIDTH;
        let vt = f32x8::from_slice(simd, &data[dst..]);
        (vl + vl).mul_add(cv, vt).store(&mut data[dst..]);
    }
}

/// Gather up to 8 rows into the scratch: interleaved slot `cas + 2i`
/// takes low-pass column `i`, slot `1 - cas + 2i` high-pass column `i`,
/// over the buffer's windows. Lanes beyond `nb_rows` are zeroed.
pub(crate) fn interleave_h(buf: &mut V8Buffer<'_>, rows: &[i32], stride: usize, nb_rows: usize) {
    let cas = buf.cas as usize;
    let parts = [
        (cas, buf.win_l.clone(), 0usize),
        (1 - cas, buf.win_h.clone(), buf.sn),
    ];
    for (base, win, src_off) in parts {
        for i in win {
            let slot = (base + 2 * i) * SIMD_WIDTH;
            for r in 0..nb_rows {
                buf.data[slot + r] = f32_from_sample(rows[r * stride + src_off + i]);
            }
            for r in nb_rows..SIMD_WIDTH {
                buf.data[slot + r] = 0.0;
            }
        }
    }
}

/// Scatter the reconstructed slots back to up to 8 rows.
pub(crate) fn scatter_h(buf: &V8Buffer<'_>, rows: &mut [i32], stride: usize, nb_rows: usize, rw: usize) {
    for k in 0..rw {
        for r in 0..nb_rows {
            rows[r * stride + k] = sample_from_f32(buf.data[k * SIMD_WIDTH + r]);
        }
    }
}

/// Gather up to 8 columns into the scratch, low-pass rows then high-pass
/// rows, over the buffer's windows. Lanes beyond `nb_cols` are zeroed.
pub(crate) fn interleave_v(buf: &mut V8Buffer<'_>, rows: &[&mut [i32]], col0: usize, nb_cols: usize) {
    let cas = buf.cas as usize;
    let parts = [
        (cas, buf.win_l.clone(), 0usize),
        (1 - cas, buf.win_h.clone(), buf.sn),
    ];
    for (base, win, src_off) in parts {
        for i in win {
            let slot = (base + 2 * i) * SIMD_WIDTH;
            for c in 0..nb_cols {
                buf.data[slot + c] = f32_from_sample(rows[src_off + i][col0 + c]);
            }
            for c in nb_cols..SIMD_WIDTH {
                buf.data[slot + c] = 0.0;
            }
        }
    }
}

/// Scatter the reconstructed slots back to up to 8 columns.
pub(crate) fn scatter_v(buf: &V8Buffer<'_>, rows: &mut [&mut [i32]], col0: usize, nb_cols: usize) {
    for y in 0..buf.sn + buf.dn {
        for c in 0..nb_cols {
            rows[y][col0 + c] = sample_from_f32(buf.data[y * SIMD_WIDTH + c]);
        }
    }
}

/// Forward transform of one spatial row through a scalar interleaved
/// scratch, deinterleaving into `sn` low-pass then `dn` high-pass
/// samples.
pub(crate) fn fdwt97_row(row: &mut [i32], tmp: &mut [f32], even: bool) {
    let width = row.len();
    let sn = (width + usize::from(even)) / 2;
    let dn = width - sn;
    let cas = usize::from(!even);

    if width <= 1 {
        return;
    }

    for k in 0..width {
        tmp[k] = f32_from_sample(row[k]);
    }
    fdwt97_interleaved(&mut tmp[..width], sn, dn, cas as u32);
    for i in 0..sn {
        row[i] = sample_from_f32(tmp[cas + 2 * i]);
    }
    for i in 0..dn {
        row[sn + i] = sample_from_f32(tmp[1 - cas + 2 * i]);
    }
}

/// Forward transform of up to 8 adjacent columns through the 8-lane
/// scratch, deinterleaving `sn` low-pass rows then `dn` high-pass rows.
pub(crate) fn fdwt97_cols(
    rows: &mut [&mut [i32]],
    col0: usize,
    nb: usize,
    even: bool,
    tmp: &mut [f32],
) {
    let len = rows.len();
    if len <= 1 {
        return;
    }
    let cas = u32::from(!even);
    let sn = (len + usize::from(even)) / 2;
    let dn = len - sn;

    for (y, row) in rows.iter().enumerate() {
        let slot = y * SIMD_WIDTH;
        for c in 0..nb {
            tmp[slot + c] = f32_from_sample(row[col0 + c]);
        }
        for c in nb..SIMD_WIDTH {
            tmp[slot + c] = 0.0;
        }
    }

    let mut buf = V8Buffer {
        data: &mut tmp[..len * SIMD_WIDTH],
        sn,
        dn,
        cas,
        win_l: 0..sn,
        win_h: 0..dn,
    };
    encode(&mut buf);

    let a = cas as usize;
    let b = 1 - a;
    for i in 0..sn {
        let slot = (a + 2 * i) * SIMD_WIDTH;
        for c in 0..nb {
            rows[i][col0 + c] = sample_from_f32(tmp[slot + c]);
        }
    }
    for i in 0..dn {
        let slot = (b + 2 * i) * SIMD_WIDTH;
        for c in 0..nb {
            rows[sn + i][col0 + c] = sample_from_f32(tmp[slot + c]);
        }
    }
}

/// Scalar forward lifting on an interleaved buffer.
pub(crate) fn fdwt97_interleaved(w: &mut [f32], sn: usize, dn: usize, cas: u32) {
    if sn + dn <= 1 {
        return;
    }
    let (a, b) = if cas == 0 { (0usize, 1usize) } else { (1, 0) };
    let m_l = sn.min(dn.saturating_sub(a));
    let m_h = dn.min(sn.saturating_sub(b));

    scalar_lift(w, a, b + 1, dn, m_h, ALPHA);
    scalar_lift(w, b, a + 1, sn, m_l, BETA);
    scalar_lift(w, a, b + 1, dn, m_h, GAMMA);
    scalar_lift(w, b, a + 1, sn, m_l, DELTA);
    for i in 0..sn {
        w[a + 2 * i] *= INV_KAPPA;
    }
    for i in 0..dn {
        w[b + 2 * i] *= HALF_KAPPA;
    }
}

/// Scalar inverse lifting on an interleaved buffer, the mirror of
/// [`fdwt97_interleaved`].
pub(crate) fn idwt97_interleaved(w: &mut [f32], sn: usize, dn: usize, cas: u32) {
    let (a, b) = if cas == 0 {
        if !(dn > 0 || sn > 1) {
            return;
        }
        (0usize, 1usize)
    } else {
        if !(sn > 0 || dn > 1) {
            return;
        }
        (1, 0)
    };
    let m_l = sn.min(dn.saturating_sub(a));
    let m_h = dn.min(sn.saturating_sub(b));

    for i in 0..sn {
        w[a + 2 * i] *= KAPPA;
    }
    for i in 0..dn {
        w[b + 2 * i] *= TWO_INV_KAPPA;
    }
    scalar_lift(w, b, a + 1, sn, m_l, -DELTA);
    scalar_lift(w, a, b + 1, dn, m_h, -GAMMA);
    scalar_lift(w, b, a + 1, sn, m_l, -BETA);
    scalar_lift(w, a, b + 1, dn, m_h, -ALPHA);
}

fn scalar_lift(w: &mut [f32], l: usize, wbase: usize, end: usize, m: usize, c: f32) {
    if end == 0 {
        return;
    }
    let imax = end.min(m);
    let (mut fl, mut fw) = (l, wbase);
    for _ in 0..imax {
        w[fw - 1] += (w[fl] + w[fw]) * c;
        fl = fw;
        fw += 2;
    }
    if m < end {
        w[fw - 1] += (w[fl] + w[fl]) * c;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_constants_are_literal() {
        // 13318/8192, the fixed-point heritage value, not 2/K.
        assert_eq!(TWO_INV_KAPPA, 13318.0f32 / 8192.0);
        assert!((TWO_INV_KAPPA * HALF_KAPPA - 1.0).abs() < 1e-6);
        assert!((KAPPA * INV_KAPPA - 1.0).abs() < 1e-6);
        // Deliberately not the exact 2/K.
        assert!((TWO_INV_KAPPA - 2.0 / KAPPA).abs() > 1e-6);
    }

    #[test]
    fn scalar_round_trip() {
        for cas in [0u32, 1] {
            for len in 1..=17usize {
                let sn = (len + (1 - cas as usize)) / 2;
                let dn = len - sn;
                let original: Vec<f32> =
                    (0..len).map(|i| (i as f32 * 0.37 - 2.5).sin()).collect();

                let mut w = original.clone();
                fdwt97_interleaved(&mut w, sn, dn, cas);
                idwt97_interleaved(&mut w, sn, dn, cas);

                for (o, r) in original.iter().zip(w.iter()) {
                    assert!((o - r).abs() < 1e-5, "cas={cas} len={len}: {o} vs {r}");
                }
            }
        }
    }

    #[test]
    fn v8_round_trip_matches_scalar() {
        for cas in [0u32, 1] {
            for len in 2..=16usize {
                let sn = (len + (1 - cas as usize)) / 2;
                let dn = len - sn;
                let original: Vec<f32> =
                    (0..len).map(|i| (i as f32 * 0.71 + 0.3).cos()).collect();

                // All 8 lanes carry the same sequence.
                let mut data = vec![0f32; len * SIMD_WIDTH];
                for (i, &v) in original.iter().enumerate() {
                    data[i * SIMD_WIDTH..(i + 1) * SIMD_WIDTH].fill(v);
                }
                let mut buf = V8Buffer {
                    data: &mut data,
                    sn,
                    dn,
                    cas,
                    win_l: 0..sn,
                    win_h: 0..dn,
                };
                encode(&mut buf);
                decode(&mut buf);

                let mut scalar = original.clone();
                fdwt97_interleaved(&mut scalar, sn, dn, cas);
                idwt97_interleaved(&mut scalar, sn, dn, cas);

                for i in 0..len {
                    for c in 0..SIMD_WIDTH {
                        let v = data[i * SIMD_WIDTH + c];
                        assert!(
                            (v - original[i]).abs() < 1e-5,
                            "cas={cas} len={len} slot={i}: {v}"
                        );
                        assert!((v - scalar[i]).abs() < 1e-6);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_input_stays_zero() {
        let mut data = vec![0f32; 16 * SIMD_WIDTH];
        let mut buf = V8Buffer {
            data: &mut data,
            sn: 8,
            dn: 8,
            cas: 0,
            win_l: 0..8,
            win_h: 0..8,
        };
        decode(&mut buf);
        assert!(buf.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn lone_sample_passes_through() {
        for cas in [0u32, 1] {
            let mut data = vec![1.5f32; SIMD_WIDTH];
            let (sn, dn) = if cas == 0 { (1, 0) } else { (0, 1) };
            let mut buf = V8Buffer {
                data: &mut data,
                sn,
                dn,
                cas,
                win_l: 0..sn,
                win_h: 0..dn,
            };
            decode(&mut buf);
            assert!(buf.data.iter().all(|&v| v == 1.5));
        }
    }
}
