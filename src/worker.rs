//! Row/column stripe parallelization for the per-resolution passes.
//!
//! Jobs are value objects owning disjoint mutable stripes of the tile
//! buffer: the horizontal pass splits by whole rows, the vertical pass
//! splits every row at the same column boundaries and regroups the
//! per-job column segments. Aliasing is impossible by construction, so
//! no unsafe is needed. On the sequential path the driver's per-tile
//! scratch is reused across resolutions; parallel jobs each allocate
//! their own. The driver joins at the end of the scope before the next
//! pass starts.

use crate::DwtSettings;
use crate::error::{DwtError, Result};
use std::sync::Mutex;

/// A contiguous range of whole rows, handed to a horizontal-pass job.
pub(crate) struct HorizontalStripe<'a> {
    pub(crate) rows: &'a mut [i32],
    pub(crate) nb_rows: usize,
}

/// A column band: for every processed row, the `&mut` segment covering
/// this job's columns. Handed to a vertical-pass job.
pub(crate) struct VerticalStripe<'a> {
    pub(crate) rows: Vec<&'a mut [i32]>,
    pub(crate) nb_cols: usize,
}

pub(crate) fn alloc_scratch<T: Copy + Default>(len: usize) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| DwtError::OutOfMemory)?;
    v.resize(len, T::default());
    Ok(v)
}

fn worker_count(settings: &DwtSettings) -> usize {
    if settings.disable_multithreading {
        1
    } else {
        rayon::current_num_threads()
    }
}

/// Run a horizontal pass over `rh` rows of `data`, parallelized in
/// stripes of whole rows (multiples of 8) when worthwhile.
pub(crate) fn run_rows<T, F>(
    data: &mut [i32],
    stride: usize,
    rh: usize,
    scratch: &mut [T],
    settings: &DwtSettings,
    f: F,
) -> Result<()>
where
    T: Copy + Default,
    F: Fn(HorizontalStripe<'_>, &mut [T]) + Sync,
{
    if rh == 0 || stride == 0 {
        return Ok(());
    }
    let region = &mut data[..rh * stride];

    let threads = worker_count(settings);
    if threads <= 1 || rh <= 1 {
        f(
            HorizontalStripe {
                rows: region,
                nb_rows: rh,
            },
            scratch,
        );
        return Ok(());
    }

    let scratch_len = scratch.len();
    let rows_per_job = rh.div_ceil(threads).next_multiple_of(8);
    let error = Mutex::new(None);
    let f = &f;
    let error_ref = &error;

    rayon::scope(|s| {
        for chunk in region.chunks_mut(rows_per_job * stride) {
            s.spawn(move |_| {
                let nb_rows = chunk.len() / stride;
                match alloc_scratch::<T>(scratch_len) {
                    Ok(mut scratch) => f(
                        HorizontalStripe {
                            rows: chunk,
                            nb_rows,
                        },
                        &mut scratch,
                    ),
                    Err(e) => {
                        if let Ok(mut slot) = error_ref.lock() {
                            *slot = Some(e);
                        }
                    }
                }
            });
        }
    });

    match error.into_inner().unwrap_or_else(|p| p.into_inner()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Run a vertical pass over the `rw` leading columns of `len` rows,
/// parallelized in column bands (multiples of 8) when worthwhile.
pub(crate) fn run_cols<T, F>(
    data: &mut [i32],
    stride: usize,
    len: usize,
    rw: usize,
    scratch: &mut [T],
    settings: &DwtSettings,
    f: F,
) -> Result<()>
where
    T: Copy + Default,
    F: Fn(VerticalStripe<'_>, &mut [T]) + Sync,
{
    if len == 0 || rw == 0 {
        return Ok(());
    }
    let region = &mut data[..len * stride];

    let threads = worker_count(settings);
    if threads <= 1 || rw < 2 * 8 {
        let rows: Vec<&mut [i32]> = region
            .chunks_mut(stride)
            .map(|r| {
                let (head, _) = r.split_at_mut(rw);
                head
            })
            .collect();
        f(
            VerticalStripe {
                rows,
                nb_cols: rw,
            },
            scratch,
        );
        return Ok(());
    }

    let scratch_len = scratch.len();
    let cols_per_job = rw.div_ceil(threads).next_multiple_of(8);
    let num_jobs = rw.div_ceil(cols_per_job);
    let mut bands: Vec<Vec<&mut [i32]>> = (0..num_jobs).map(|_| Vec::with_capacity(len)).collect();

    for row in region.chunks_mut(stride) {
        let (mut row, _) = row.split_at_mut(rw);
        let mut job = 0;
        while !row.is_empty() {
            let take = cols_per_job.min(row.len());
            let (head, tail) = row.split_at_mut(take);
            bands[job].push(head);
            row = tail;
            job += 1;
        }
    }

    let error = Mutex::new(None);
    let f = &f;
    let error_ref = &error;

    rayon::scope(|s| {
        for band in bands {
            s.spawn(move |_| {
                let nb_cols = band[0].len();
                match alloc_scratch::<T>(scratch_len) {
                    Ok(mut scratch) => f(
                        VerticalStripe {
                            rows: band,
                            nb_cols,
                        },
                        &mut scratch,
                    ),
                    Err(e) => {
                        if let Ok(mut slot) = error_ref.lock() {
                            *slot = Some(e);
                        }
                    }
                }
            });
        }
    });

    match error.into_inner().unwrap_or_else(|p| p.into_inner()) {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(parallel: bool) -> DwtSettings {
        DwtSettings {
            disable_multithreading: !parallel,
        }
    }

    #[test]
    fn row_stripes_cover_all_rows() {
        for parallel in [false, true] {
            let mut data = vec![0i32; 20 * 64];
            let mut scratch = vec![0i32; 4];
            run_rows::<i32, _>(&mut data, 20, 64, &mut scratch, &settings(parallel), |job, _| {
                for row in job.rows.chunks_mut(20).take(job.nb_rows) {
                    for v in row.iter_mut() {
                        *v += 1;
                    }
                }
            })
            .unwrap();
            assert!(data.iter().all(|&v| v == 1), "parallel={parallel}");
        }
    }

    #[test]
    fn col_bands_cover_requested_columns() {
        for parallel in [false, true] {
            let mut data = vec![0i32; 10 * 96];
            let mut scratch = vec![0i32; 4];
            run_cols::<i32, _>(
                &mut data,
                96,
                10,
                80,
                &mut scratch,
                &settings(parallel),
                |mut job, _| {
                    for row in job.rows.iter_mut() {
                        for v in row.iter_mut() {
                            *v += 1;
                        }
                    }
                },
            )
            .unwrap();
            for y in 0..10 {
                for x in 0..96 {
                    let expected = i32::from(x < 80);
                    assert_eq!(data[y * 96 + x], expected, "parallel={parallel} ({x},{y})");
                }
            }
        }
    }
}
