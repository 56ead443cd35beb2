//! Windowed inverse transform over the block-sparse coefficient store.
//!
//! Only the coefficients needed to reconstruct the window of interest are
//! touched: per resolution the tile window is mapped into each sub-band,
//! grown outward by the filter support, and the vertical/horizontal
//! passes run over those grown segments, reading and writing the sparse
//! array. The pass order matches the whole-tile driver so windowed output
//! is sample-identical to a crop of a full decode.

use crate::error::{DwtError, Result};
use crate::rect::IntRect;
use crate::simd::SIMD_WIDTH;
use crate::sparse::SparseArray;
use crate::tile::{TileComponent, WaveletTransform};
use crate::{dwt53, dwt97, geometry};
use log::{trace, warn};

const FILTER_WIDTH_53: u32 = 2;
const FILTER_WIDTH_97: u32 = 4;

/// Grow a sub-band segment outward by the filter support, clamped to the
/// sub-band extent.
fn segment_grow(filter_width: u32, max_size: u32, win: &mut (u32, u32)) {
    win.0 = win.0.saturating_sub(filter_width);
    win.1 = (win.1 + filter_width).min(max_size);
}

/// Combine grown low and high sub-band segments into the interleaved
/// tile-resolution window, respecting the pass parity.
fn combine(cas: u32, win_l: (u32, u32), win_h: (u32, u32), size: u32) -> (u32, u32) {
    if cas == 0 {
        (
            u32::min(2 * win_l.0, 2 * win_h.0 + 1),
            u32::min(u32::max(2 * win_l.1, 2 * win_h.1 + 1), size),
        )
    } else {
        (
            u32::min(2 * win_h.0, 2 * win_l.0 + 1),
            u32::min(u32::max(2 * win_h.1, 2 * win_l.1 + 1), size),
        )
    }
}

/// Build the sparse array for the deepest decoded resolution and populate
/// it with every decoded code-block at its band-relative position plus
/// the previous-resolution offset of its band.
pub(crate) fn init_sparse_array(tilec: &TileComponent, num_res: u32) -> Result<SparseArray> {
    let tr_max = tilec.resolutions[num_res as usize - 1].rect;
    let w = tr_max.width();
    let h = tr_max.height();
    let mut sa = SparseArray::new(w, h, w.min(64), h.min(64))?;

    for resno in 0..num_res as usize {
        let (prev_w, prev_h) = if resno == 0 {
            (0, 0)
        } else {
            let r = tilec.resolutions[resno - 1].rect;
            (r.width(), r.height())
        };

        for band in &tilec.resolutions[resno].bands {
            for cblk in &band.code_blocks {
                let Some(data) = &cblk.data else {
                    continue;
                };
                let (Some(mut x), Some(mut y)) = (
                    cblk.rect.x0.checked_sub(band.rect.x0),
                    cblk.rect.y0.checked_sub(band.rect.y0),
                ) else {
                    warn!("code-block outside its sub-band, skipping");
                    continue;
                };

                let cw = cblk.rect.width();
                let ch = cblk.rect.height();
                if data.len() < (cw as usize) * (ch as usize) {
                    warn!("short code-block buffer, skipping");
                    continue;
                }

                if band.band_type as u32 & 1 != 0 {
                    x += prev_w;
                }
                if band.band_type as u32 & 2 != 0 {
                    y += prev_h;
                }

                sa.write(x, y, x + cw, y + ch, data, 0, 1, cw as usize, true)?;
            }
        }
    }

    Ok(sa)
}

/// Windowed inverse transform; the reconstructed window lands in
/// `tilec.window_data`.
pub(crate) fn decode_partial(tilec: &mut TileComponent, num_res: u32) -> Result<()> {
    let Some(window) = tilec.window else {
        return Err(DwtError::InvalidComponent);
    };
    let Some(region) = tilec.window_region(num_res) else {
        return Err(DwtError::InvalidComponent);
    };

    let out_len = region.width() as usize * region.height() as usize;
    tilec.window_data.clear();
    tilec
        .window_data
        .try_reserve_exact(out_len)
        .map_err(|_| DwtError::OutOfMemory)?;
    tilec.window_data.resize(out_len, 0);

    let tr_max = tilec.resolutions[num_res as usize - 1].rect;
    if region.is_empty() || tr_max.is_empty() {
        return Ok(());
    }

    let mut sa = init_sparse_array(tilec, num_res)?;

    if num_res > 1 {
        match tilec.transform {
            WaveletTransform::Reversible53 => {
                decode_levels::<Partial53>(tilec, window, num_res, &mut sa)?;
            }
            WaveletTransform::Irreversible97 => {
                decode_levels::<Partial97>(tilec, window, num_res, &mut sa)?;
            }
        }
    }

    let line = region.width() as usize;
    sa.read(
        region.x0,
        region.y0,
        region.x1,
        region.y1,
        &mut tilec.window_data,
        0,
        1,
        line,
        true,
    )?;

    Ok(())
}

/// The per-filter pieces of the windowed pass: support width, scratch
/// element type and the two stripe kernels. Statically dispatched.
trait PartialFilter {
    const FILTER_WIDTH: u32;
    /// Rows lifted per horizontal call (the 9/7 kernel batches 8 rows as
    /// lanes, the 5/3 kernel works row by row).
    const H_BATCH: u32;
    type Elem: crate::sparse::Cell;

    #[allow(clippy::too_many_arguments)]
    fn v_stripe(
        sa: &mut SparseArray,
        scratch: &mut [Self::Elem],
        col: u32,
        nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()>;

    #[allow(clippy::too_many_arguments)]
    fn h_rows(
        sa: &mut SparseArray,
        scratch: &mut [Self::Elem],
        row: u32,
        nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()>;
}

fn decode_levels<F: PartialFilter>(
    tilec: &TileComponent,
    window: IntRect,
    num_res: u32,
    sa: &mut SparseArray,
) -> Result<()> {
    let r_full = tilec.num_resolutions;
    let rects: Vec<IntRect> = tilec.resolutions[..num_res as usize]
        .iter()
        .map(|r| r.rect)
        .collect();

    let max_res = geometry::max_resolution(&rects);
    let scratch_len = max_res
        .checked_mul(SIMD_WIDTH)
        .ok_or(DwtError::SizeOverflow)?;
    scratch_len
        .checked_mul(core::mem::size_of::<i32>())
        .ok_or(DwtError::SizeOverflow)?;
    let mut scratch = Vec::new();
    scratch
        .try_reserve_exact(scratch_len)
        .map_err(|_| DwtError::OutOfMemory)?;
    scratch.resize(scratch_len, F::Elem::default());

    let mut rw = rects[0].width();
    let mut rh = rects[0].height();

    for resno in 1..num_res as usize {
        let rect = rects[resno];
        let sn_h = rw;
        let sn_v = rh;
        rw = rect.width();
        rh = rect.height();
        if rw == 0 || rh == 0 {
            continue;
        }
        let dn_h = rw - sn_h;
        let dn_v = rh - sn_v;
        let cas_h = geometry::parity(rect.x0);
        let cas_v = geometry::parity(rect.y0);

        // The window of interest in each sub-band's coordinates, band
        // origins subtracted, grown by the filter support.
        let win_ll = geometry::band_rect(window, r_full, resno as u32, 0);
        let win_hl = geometry::band_rect(window, r_full, resno as u32, 1);
        let win_lh = geometry::band_rect(window, r_full, resno as u32, 2);

        let tr_ll = rects[resno - 1];
        let tr_hl = geometry::band_rect(tilec.rect, r_full, resno as u32, 1);
        let tr_lh = geometry::band_rect(tilec.rect, r_full, resno as u32, 2);

        let mut win_ll_x = (
            win_ll.x0.saturating_sub(tr_ll.x0),
            win_ll.x1.saturating_sub(tr_ll.x0),
        );
        let mut win_ll_y = (
            win_ll.y0.saturating_sub(tr_ll.y0),
            win_ll.y1.saturating_sub(tr_ll.y0),
        );
        let mut win_hl_x = (
            win_hl.x0.saturating_sub(tr_hl.x0),
            win_hl.x1.saturating_sub(tr_hl.x0),
        );
        let mut win_lh_y = (
            win_lh.y0.saturating_sub(tr_lh.y0),
            win_lh.y1.saturating_sub(tr_lh.y0),
        );

        segment_grow(F::FILTER_WIDTH, sn_h, &mut win_ll_x);
        segment_grow(F::FILTER_WIDTH, dn_h, &mut win_hl_x);
        segment_grow(F::FILTER_WIDTH, sn_v, &mut win_ll_y);
        segment_grow(F::FILTER_WIDTH, dn_v, &mut win_lh_y);

        let win_tr_x = combine(cas_h, win_ll_x, win_hl_x, rw);
        let win_tr_y = combine(cas_v, win_ll_y, win_lh_y, rh);

        trace!(
            "partial level {resno}: x [{},{}) y [{},{})",
            win_tr_x.0, win_tr_x.1, win_tr_y.0, win_tr_y.1
        );

        if (win_ll_x.0 >= win_ll_x.1 && win_hl_x.0 >= win_hl_x.1)
            || (win_ll_y.0 >= win_ll_y.1 && win_lh_y.0 >= win_lh_y.1)
        {
            continue;
        }

        // Vertical pass over the two deinterleaved column sets.
        for (set, offset) in [(win_ll_x, 0u32), (win_hl_x, sn_h)] {
            let mut col = set.0;
            while col < set.1 {
                let nb = (set.1 - col).min(SIMD_WIDTH as u32);
                F::v_stripe(
                    sa,
                    &mut scratch,
                    offset + col,
                    nb,
                    sn_v as usize,
                    dn_v as usize,
                    cas_v,
                    win_ll_y,
                    win_lh_y,
                    win_tr_y,
                )?;
                col += nb;
            }
        }

        // Horizontal pass over the interleaved row window.
        let mut row = win_tr_y.0;
        while row < win_tr_y.1 {
            let nb = (win_tr_y.1 - row).min(F::H_BATCH);
            F::h_rows(
                sa,
                &mut scratch,
                row,
                nb,
                sn_h as usize,
                dn_h as usize,
                cas_h,
                win_ll_x,
                win_hl_x,
                win_tr_x,
            )?;
            row += nb;
        }
    }

    Ok(())
}

struct Partial53;

impl PartialFilter for Partial53 {
    const FILTER_WIDTH: u32 = FILTER_WIDTH_53;
    const H_BATCH: u32 = 1;
    type Elem = i32;

    fn v_stripe(
        sa: &mut SparseArray,
        scratch: &mut [i32],
        col: u32,
        nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()> {
        if win_l.0 < win_l.1 {
            sa.read(
                col,
                win_l.0,
                col + nb,
                win_l.1,
                scratch,
                (cas as usize + 2 * win_l.0 as usize) * SIMD_WIDTH,
                1,
                2 * SIMD_WIDTH,
                true,
            )?;
        }
        if win_h.0 < win_h.1 {
            sa.read(
                col,
                sn as u32 + win_h.0,
                col + nb,
                sn as u32 + win_h.1,
                scratch,
                (1 - cas as usize + 2 * win_h.0 as usize) * SIMD_WIDTH,
                1,
                2 * SIMD_WIDTH,
                true,
            )?;
        }

        dwt53::idwt53_partial_cols(scratch, sn, dn, cas, win_l, win_h);

        sa.write(
            col,
            win_tr.0,
            col + nb,
            win_tr.1,
            scratch,
            win_tr.0 as usize * SIMD_WIDTH,
            1,
            SIMD_WIDTH,
            true,
        )
    }

    fn h_rows(
        sa: &mut SparseArray,
        scratch: &mut [i32],
        row: u32,
        _nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()> {
        if win_l.0 < win_l.1 {
            sa.read(
                win_l.0,
                row,
                win_l.1,
                row + 1,
                scratch,
                cas as usize + 2 * win_l.0 as usize,
                2,
                0,
                true,
            )?;
        }
        if win_h.0 < win_h.1 {
            sa.read(
                sn as u32 + win_h.0,
                row,
                sn as u32 + win_h.1,
                row + 1,
                scratch,
                1 - cas as usize + 2 * win_h.0 as usize,
                2,
                0,
                true,
            )?;
        }

        dwt53::idwt53_interleaved(scratch, sn, dn, cas, win_l, win_h);

        sa.write(
            win_tr.0,
            row,
            win_tr.1,
            row + 1,
            scratch,
            win_tr.0 as usize,
            1,
            0,
            true,
        )
    }
}

struct Partial97;

impl PartialFilter for Partial97 {
    const FILTER_WIDTH: u32 = FILTER_WIDTH_97;
    const H_BATCH: u32 = SIMD_WIDTH as u32;
    type Elem = f32;

    fn v_stripe(
        sa: &mut SparseArray,
        scratch: &mut [f32],
        col: u32,
        nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()> {
        if win_l.0 < win_l.1 {
            sa.read(
                col,
                win_l.0,
                col + nb,
                win_l.1,
                scratch,
                (cas as usize + 2 * win_l.0 as usize) * SIMD_WIDTH,
                1,
                2 * SIMD_WIDTH,
                true,
            )?;
        }
        if win_h.0 < win_h.1 {
            sa.read(
                col,
                sn as u32 + win_h.0,
                col + nb,
                sn as u32 + win_h.1,
                scratch,
                (1 - cas as usize + 2 * win_h.0 as usize) * SIMD_WIDTH,
                1,
                2 * SIMD_WIDTH,
                true,
            )?;
        }

        let mut buf = dwt97::V8Buffer {
            data: &mut *scratch,
            sn,
            dn,
            cas,
            win_l: win_l.0 as usize..win_l.1 as usize,
            win_h: win_h.0 as usize..win_h.1 as usize,
        };
        dwt97::decode(&mut buf);

        sa.write(
            col,
            win_tr.0,
            col + nb,
            win_tr.1,
            scratch,
            win_tr.0 as usize * SIMD_WIDTH,
            1,
            SIMD_WIDTH,
            true,
        )
    }

    fn h_rows(
        sa: &mut SparseArray,
        scratch: &mut [f32],
        row: u32,
        nb: u32,
        sn: usize,
        dn: usize,
        cas: u32,
        win_l: (u32, u32),
        win_h: (u32, u32),
        win_tr: (u32, u32),
    ) -> Result<()> {
        if win_l.0 < win_l.1 {
            sa.read(
                win_l.0,
                row,
                win_l.1,
                row + nb,
                scratch,
                (cas as usize + 2 * win_l.0 as usize) * SIMD_WIDTH,
                2 * SIMD_WIDTH,
                1,
                true,
            )?;
        }
        if win_h.0 < win_h.1 {
            sa.read(
                sn as u32 + win_h.0,
                row,
                sn as u32 + win_h.1,
                row + nb,
                scratch,
                (1 - cas as usize + 2 * win_h.0 as usize) * SIMD_WIDTH,
                2 * SIMD_WIDTH,
                1,
                true,
            )?;
        }

        let mut buf = dwt97::V8Buffer {
            data: &mut *scratch,
            sn,
            dn,
            cas,
            win_l: win_l.0 as usize..win_l.1 as usize,
            win_h: win_h.0 as usize..win_h.1 as usize,
        };
        dwt97::decode(&mut buf);

        sa.write(
            win_tr.0,
            row,
            win_tr.1,
            row + nb,
            scratch,
            win_tr.0 as usize * SIMD_WIDTH,
            SIMD_WIDTH,
            1,
            true,
        )
    }
}
