//! Whole-tile transform drivers.
//!
//! Per resolution level the inverse runs a vertical pass (8-column
//! stripes through the lane kernels) followed by a horizontal pass; the
//! forward mirrors it, horizontal first, from the finest level down. The
//! two filter families differ only in the kernels, which the forward
//! driver receives as a static capability set.

use crate::DwtSettings;
use crate::error::{DwtError, Result};
use crate::rect::IntRect;
use crate::simd::SIMD_WIDTH;
use crate::tile::{TileComponent, WaveletTransform};
use crate::worker::{self, HorizontalStripe};
use crate::{dwt53, dwt97, geometry};

/// Guard scratch sizing against address-space overflow.
fn scratch_len(max_res: usize, lanes: usize) -> Result<usize> {
    let len = max_res
        .checked_mul(lanes)
        .ok_or(DwtError::SizeOverflow)?;
    len.checked_mul(core::mem::size_of::<i32>())
        .ok_or(DwtError::SizeOverflow)?;
    Ok(len)
}

fn level_rects(tilec: &TileComponent, num_res: u32) -> Vec<IntRect> {
    tilec.resolutions[..num_res as usize]
        .iter()
        .map(|r| r.rect)
        .collect()
}

/// Full inverse transform of the tile-component, in place.
pub(crate) fn decode_tile(
    tilec: &mut TileComponent,
    num_res: u32,
    settings: &DwtSettings,
) -> Result<()> {
    match tilec.transform {
        WaveletTransform::Reversible53 => decode_tile_53(tilec, num_res, settings),
        WaveletTransform::Irreversible97 => decode_tile_97(tilec, num_res, settings),
    }
}

fn decode_tile_53(tilec: &mut TileComponent, num_res: u32, settings: &DwtSettings) -> Result<()> {
    let stride = tilec.rect.width() as usize;
    if num_res <= 1 || stride == 0 || tilec.rect.height() == 0 {
        return Ok(());
    }

    let rects = level_rects(tilec, num_res);
    let max_res = geometry::max_resolution(&rects);
    let v_len = scratch_len(max_res, SIMD_WIDTH)?;
    let h_len = scratch_len(max_res, 1)?;
    let mut scratch = worker::alloc_scratch::<i32>(v_len)?;

    let mut rw = rects[0].width() as usize;
    let mut rh = rects[0].height() as usize;

    for rect in rects.iter().skip(1) {
        let sn_h = rw;
        let sn_v = rh;
        rw = rect.width() as usize;
        rh = rect.height() as usize;
        if rw == 0 || rh == 0 {
            continue;
        }
        let cas_h = geometry::parity(rect.x0);
        let cas_v = geometry::parity(rect.y0);

        worker::run_cols::<i32, _>(
            &mut tilec.data,
            stride,
            rh,
            rw,
            &mut scratch[..v_len],
            settings,
            |mut job, scratch| {
                let mut col = 0;
                while col < job.nb_cols {
                    let nb = (job.nb_cols - col).min(SIMD_WIDTH);
                    dwt53::idwt53_v(&mut job.rows, col, nb, sn_v, cas_v, scratch);
                    col += nb;
                }
            },
        )?;

        worker::run_rows::<i32, _>(
            &mut tilec.data,
            stride,
            rh,
            &mut scratch[..h_len],
            settings,
            |job, scratch| {
                let HorizontalStripe { rows, nb_rows } = job;
                for row in rows.chunks_mut(stride).take(nb_rows) {
                    dwt53::idwt53_row(&mut row[..rw], scratch, sn_h, cas_h);
                }
            },
        )?;
    }

    Ok(())
}

fn decode_tile_97(tilec: &mut TileComponent, num_res: u32, settings: &DwtSettings) -> Result<()> {
    let stride = tilec.rect.width() as usize;
    if num_res <= 1 || stride == 0 || tilec.rect.height() == 0 {
        return Ok(());
    }

    let rects = level_rects(tilec, num_res);
    let max_res = geometry::max_resolution(&rects);
    let len = scratch_len(max_res, SIMD_WIDTH)?;
    let mut scratch = worker::alloc_scratch::<f32>(len)?;

    let mut rw = rects[0].width() as usize;
    let mut rh = rects[0].height() as usize;

    for rect in rects.iter().skip(1) {
        let sn_h = rw;
        let sn_v = rh;
        rw = rect.width() as usize;
        rh = rect.height() as usize;
        if rw == 0 || rh == 0 {
            continue;
        }
        let cas_h = geometry::parity(rect.x0);
        let cas_v = geometry::parity(rect.y0);
        let dn_h = rw - sn_h;
        let dn_v = rh - sn_v;

        worker::run_cols::<f32, _>(
            &mut tilec.data,
            stride,
            rh,
            rw,
            &mut scratch,
            settings,
            |mut job, tmp| {
                let mut col = 0;
                while col < job.nb_cols {
                    let nb = (job.nb_cols - col).min(SIMD_WIDTH);
                    let mut buf = dwt97::V8Buffer {
                        data: &mut tmp[..rh * SIMD_WIDTH],
                        sn: sn_v,
                        dn: dn_v,
                        cas: cas_v,
                        win_l: 0..sn_v,
                        win_h: 0..dn_v,
                    };
                    dwt97::interleave_v(&mut buf, &job.rows, col, nb);
                    dwt97::decode(&mut buf);
                    dwt97::scatter_v(&buf, &mut job.rows, col, nb);
                    col += nb;
                }
            },
        )?;

        worker::run_rows::<f32, _>(
            &mut tilec.data,
            stride,
            rh,
            &mut scratch,
            settings,
            |job, tmp| {
                let HorizontalStripe { rows, nb_rows } = job;
                let mut r = 0;
                while r < nb_rows {
                    let nb = (nb_rows - r).min(SIMD_WIDTH);
                    let base = r * stride;
                    let mut buf = dwt97::V8Buffer {
                        data: &mut tmp[..rw * SIMD_WIDTH],
                        sn: sn_h,
                        dn: dn_h,
                        cas: cas_h,
                        win_l: 0..sn_h,
                        win_h: 0..dn_h,
                    };
                    dwt97::interleave_h(&mut buf, &rows[base..], stride, nb);
                    dwt97::decode(&mut buf);
                    dwt97::scatter_h(&buf, &mut rows[base..], stride, nb, rw);
                    r += nb;
                }
            },
        )?;
    }

    Ok(())
}

/// The kernels the forward driver is parameterized over: a one-row
/// horizontal kernel and an up-to-8-column vertical kernel.
pub(crate) trait ForwardKernels {
    type Elem: Copy + Default;

    fn encode_row(row: &mut [i32], scratch: &mut [Self::Elem], even: bool);
    fn encode_cols(
        rows: &mut [&mut [i32]],
        col0: usize,
        nb: usize,
        even: bool,
        scratch: &mut [Self::Elem],
    );
}

pub(crate) struct Forward53;

impl ForwardKernels for Forward53 {
    type Elem = i32;

    fn encode_row(row: &mut [i32], scratch: &mut [i32], even: bool) {
        dwt53::fdwt53_row(row, scratch, even);
    }

    fn encode_cols(
        rows: &mut [&mut [i32]],
        col0: usize,
        nb: usize,
        even: bool,
        scratch: &mut [i32],
    ) {
        dwt53::fdwt53_v(rows, col0, nb, even, scratch);
    }
}

pub(crate) struct Forward97;

impl ForwardKernels for Forward97 {
    type Elem = f32;

    fn encode_row(row: &mut [i32], scratch: &mut [f32], even: bool) {
        dwt97::fdwt97_row(row, scratch, even);
    }

    fn encode_cols(
        rows: &mut [&mut [i32]],
        col0: usize,
        nb: usize,
        even: bool,
        scratch: &mut [f32],
    ) {
        dwt97::fdwt97_cols(rows, col0, nb, even, scratch);
    }
}

/// Full forward transform of the tile-component, in place: per level
/// (finest to coarsest) a horizontal pass then a vertical pass, each
/// writing sub-band deinterleaved output.
pub(crate) fn encode_tile(tilec: &mut TileComponent, settings: &DwtSettings) -> Result<()> {
    match tilec.transform {
        WaveletTransform::Reversible53 => encode_tile_with::<Forward53>(tilec, settings),
        WaveletTransform::Irreversible97 => encode_tile_with::<Forward97>(tilec, settings),
    }
}

fn encode_tile_with<K: ForwardKernels>(
    tilec: &mut TileComponent,
    settings: &DwtSettings,
) -> Result<()> {
    let num_res = tilec.num_resolutions;
    let stride = tilec.rect.width() as usize;
    if num_res <= 1 || stride == 0 || tilec.rect.height() == 0 {
        return Ok(());
    }

    let rects = level_rects(tilec, num_res);
    let max_res = geometry::max_resolution(&rects);
    let h_len = scratch_len(max_res, 1)?;
    let v_len = scratch_len(max_res, SIMD_WIDTH)?;
    let mut scratch = worker::alloc_scratch::<K::Elem>(v_len)?;

    for resno in (1..num_res as usize).rev() {
        let rect = rects[resno];
        let rw = rect.width() as usize;
        let rh = rect.height() as usize;
        if rw == 0 || rh == 0 {
            continue;
        }
        let even_h = geometry::parity(rect.x0) == 0;
        let even_v = geometry::parity(rect.y0) == 0;
        debug_assert_eq!(
            (rw + usize::from(even_h)) / 2,
            rects[resno - 1].width() as usize
        );
        debug_assert_eq!(
            (rh + usize::from(even_v)) / 2,
            rects[resno - 1].height() as usize
        );

        worker::run_rows::<K::Elem, _>(
            &mut tilec.data,
            stride,
            rh,
            &mut scratch[..h_len],
            settings,
            |job, scratch| {
                let HorizontalStripe { rows, nb_rows } = job;
                for row in rows.chunks_mut(stride).take(nb_rows) {
                    K::encode_row(&mut row[..rw], scratch, even_h);
                }
            },
        )?;

        worker::run_cols::<K::Elem, _>(
            &mut tilec.data,
            stride,
            rh,
            rw,
            &mut scratch[..v_len],
            settings,
            |mut job, scratch| {
                let mut col = 0;
                while col < job.nb_cols {
                    let nb = (job.nb_cols - col).min(SIMD_WIDTH);
                    K::encode_cols(&mut job.rows, col, nb, even_v, scratch);
                    col += nb;
                }
            },
        )?;
    }

    Ok(())
}
