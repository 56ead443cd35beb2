//! Block-sparse 2-D sample storage backing the windowed inverse transform.
//!
//! The grid is tiled into fixed-size blocks that materialize lazily on
//! first write; reads from absent blocks yield zeros. Cells are stored as
//! `i32`; an `f32` view reinterprets the same bits at the call boundary so
//! the irreversible path shares the storage without a second allocation.

use crate::error::{DwtError, Result};

/// A storable cell value. `f32` round-trips through the `i32` backing
/// store bit-for-bit.
pub(crate) trait Cell: Copy + Default {
    fn from_stored(v: i32) -> Self;
    fn to_stored(self) -> i32;
}

impl Cell for i32 {
    fn from_stored(v: i32) -> Self {
        v
    }

    fn to_stored(self) -> i32 {
        self
    }
}

impl Cell for f32 {
    fn from_stored(v: i32) -> Self {
        f32::from_bits(v as u32)
    }

    fn to_stored(self) -> i32 {
        self.to_bits() as i32
    }
}

pub(crate) struct SparseArray {
    width: u32,
    height: u32,
    block_width: u32,
    block_height: u32,
    block_count_hor: u32,
    blocks: Vec<Option<Vec<i32>>>,
}

impl SparseArray {
    pub(crate) fn new(width: u32, height: u32, block_width: u32, block_height: u32) -> Result<Self> {
        if width == 0 || height == 0 || block_width == 0 || block_height == 0 {
            return Err(DwtError::InvalidComponent);
        }

        (block_width as usize)
            .checked_mul(block_height as usize)
            .and_then(|c| c.checked_mul(core::mem::size_of::<i32>()))
            .ok_or(DwtError::SizeOverflow)?;

        let block_count_hor = width.div_ceil(block_width);
        let block_count_ver = height.div_ceil(block_height);
        let count = (block_count_hor as usize)
            .checked_mul(block_count_ver as usize)
            .ok_or(DwtError::SizeOverflow)?;

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| DwtError::OutOfMemory)?;
        blocks.resize_with(count, || None);

        Ok(SparseArray {
            width,
            height,
            block_width,
            block_height,
            block_count_hor,
            blocks,
        })
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    fn region_valid(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> bool {
        !(x0 >= self.width
            || x1 <= x0
            || x1 > self.width
            || y0 >= self.height
            || y1 <= y0
            || y1 > self.height)
    }

    /// Copy the region `(x0, y0)..(x1, y1)` into `dst`, zero-filling cells
    /// not backed by a block. The destination index of cell `(x, y)` is
    /// `dst_off + (y - y0) * line_stride + (x - x0) * col_stride`.
    ///
    /// An out-of-bounds region is ignored under `forgiving`, an
    /// `InvalidRegion` error otherwise.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn read<T: Cell>(
        &self,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        dst: &mut [T],
        dst_off: usize,
        col_stride: usize,
        line_stride: usize,
        forgiving: bool,
    ) -> Result<()> {
        if !self.region_valid(x0, y0, x1, y1) {
            return if forgiving {
                Ok(())
            } else {
                Err(DwtError::InvalidRegion)
            };
        }

        let bw = self.block_width as usize;
        let mut block_y = y0 / self.block_height;
        let mut y = y0;

        while y < y1 {
            let span_y = if y == y0 {
                self.block_height - (y0 % self.block_height)
            } else {
                self.block_height
            };
            let block_y_offset = (self.block_height - span_y) as usize;
            let span_y = span_y.min(y1 - y) as usize;

            let mut block_x = x0 / self.block_width;
            let mut x = x0;

            while x < x1 {
                let span_x = if x == x0 {
                    self.block_width - (x0 % self.block_width)
                } else {
                    self.block_width
                };
                let block_x_offset = (self.block_width - span_x) as usize;
                let span_x = span_x.min(x1 - x) as usize;

                let block = &self.blocks
                    [block_y as usize * self.block_count_hor as usize + block_x as usize];

                for j in 0..span_y {
                    let dst_row = dst_off
                        + ((y - y0) as usize + j) * line_stride
                        + (x - x0) as usize * col_stride;

                    match block {
                        None => {
                            if col_stride == 1 {
                                dst[dst_row..dst_row + span_x].fill(T::default());
                            } else {
                                for i in 0..span_x {
                                    dst[dst_row + i * col_stride] = T::default();
                                }
                            }
                        }
                        Some(data) => {
                            let src_row = (block_y_offset + j) * bw + block_x_offset;
                            if col_stride == 1 {
                                for (d, s) in dst[dst_row..dst_row + span_x]
                                    .iter_mut()
                                    .zip(&data[src_row..src_row + span_x])
                                {
                                    *d = T::from_stored(*s);
                                }
                            } else {
                                for i in 0..span_x {
                                    dst[dst_row + i * col_stride] =
                                        T::from_stored(data[src_row + i]);
                                }
                            }
                        }
                    }
                }

                x += span_x as u32;
                block_x += 1;
            }

            y += span_y as u32;
            block_y += 1;
        }

        Ok(())
    }

    /// Copy `src` into the region `(x0, y0)..(x1, y1)`, materializing
    /// blocks on first touch. Source indexing mirrors [`Self::read`].
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn write<T: Cell>(
        &mut self,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        src: &[T],
        src_off: usize,
        col_stride: usize,
        line_stride: usize,
        forgiving: bool,
    ) -> Result<()> {
        if !self.region_valid(x0, y0, x1, y1) {
            return if forgiving {
                Ok(())
            } else {
                Err(DwtError::InvalidRegion)
            };
        }

        let bw = self.block_width as usize;
        let block_len = bw * self.block_height as usize;
        let mut block_y = y0 / self.block_height;
        let mut y = y0;

        while y < y1 {
            let span_y = if y == y0 {
                self.block_height - (y0 % self.block_height)
            } else {
                self.block_height
            };
            let block_y_offset = (self.block_height - span_y) as usize;
            let span_y = span_y.min(y1 - y) as usize;

            let mut block_x = x0 / self.block_width;
            let mut x = x0;

            while x < x1 {
                let span_x = if x == x0 {
                    self.block_width - (x0 % self.block_width)
                } else {
                    self.block_width
                };
                let block_x_offset = (self.block_width - span_x) as usize;
                let span_x = span_x.min(x1 - x) as usize;

                let slot = &mut self.blocks
                    [block_y as usize * self.block_count_hor as usize + block_x as usize];
                if slot.is_none() {
                    let mut fresh = Vec::new();
                    fresh
                        .try_reserve_exact(block_len)
                        .map_err(|_| DwtError::OutOfMemory)?;
                    fresh.resize(block_len, 0);
                    *slot = Some(fresh);
                }

                if let Some(data) = slot.as_mut() {
                    for j in 0..span_y {
                        let src_row = src_off
                            + ((y - y0) as usize + j) * line_stride
                            + (x - x0) as usize * col_stride;
                        let dst_row = (block_y_offset + j) * bw + block_x_offset;

                        if col_stride == 1 {
                            for (d, s) in data[dst_row..dst_row + span_x]
                                .iter_mut()
                                .zip(&src[src_row..src_row + span_x])
                            {
                                *d = s.to_stored();
                            }
                        } else {
                            for i in 0..span_x {
                                data[dst_row + i] = src[src_row + i * col_stride].to_stored();
                            }
                        }
                    }
                }

                x += span_x as u32;
                block_x += 1;
            }

            y += span_y as u32;
            block_y += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_shapes() {
        assert!(SparseArray::new(0, 4, 4, 4).is_err());
        assert!(SparseArray::new(4, 4, 0, 4).is_err());
    }

    #[test]
    fn unwritten_cells_read_zero() {
        let sa = SparseArray::new(100, 100, 64, 64).unwrap();
        let mut out = vec![7i32; 100];
        sa.read(0, 40, 100, 41, &mut out, 0, 1, 100, false).unwrap();
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn write_then_read_region() {
        // 100x100 grid, 64x64 blocks, a 70x70 one-filled region at (20, 20).
        let mut sa = SparseArray::new(100, 100, 64, 64).unwrap();
        let ones = vec![1i32; 70 * 70];
        sa.write(20, 20, 90, 90, &ones, 0, 1, 70, false).unwrap();

        let mut out = vec![-1i32; 100 * 100];
        sa.read(0, 0, 100, 100, &mut out, 0, 1, 100, false).unwrap();

        for y in 0..100u32 {
            for x in 0..100u32 {
                let expected = i32::from((20..90).contains(&x) && (20..90).contains(&y));
                assert_eq!(out[(y * 100 + x) as usize], expected, "at ({x}, {y})");
            }
        }
    }

    #[test]
    fn last_write_wins() {
        let mut sa = SparseArray::new(32, 32, 8, 8).unwrap();
        sa.write(4, 4, 12, 12, &vec![3i32; 64], 0, 1, 8, false).unwrap();
        sa.write(6, 6, 10, 10, &vec![9i32; 16], 0, 1, 4, false).unwrap();

        let mut out = vec![0i32; 4];
        sa.read(6, 7, 10, 8, &mut out, 0, 1, 4, false).unwrap();
        assert_eq!(out, [9, 9, 9, 9]);

        sa.read(4, 4, 8, 5, &mut out, 0, 1, 4, false).unwrap();
        assert_eq!(out, [3, 9, 9, 3]);
    }

    #[test]
    fn strided_access() {
        let mut sa = SparseArray::new(16, 16, 8, 8).unwrap();
        // Scatter one row from every second source element.
        let src: Vec<i32> = (0..16).collect();
        sa.write(0, 2, 8, 3, &src, 0, 2, 0, false).unwrap();

        // Gather it back into interleaved positions.
        let mut out = vec![0i32; 16];
        sa.read(0, 2, 8, 3, &mut out, 1, 2, 0, false).unwrap();
        for i in 0..8 {
            assert_eq!(out[1 + 2 * i], (2 * i) as i32);
        }
    }

    #[test]
    fn forgiving_bounds() {
        let mut sa = SparseArray::new(10, 10, 4, 4).unwrap();
        let buf = vec![1i32; 100];
        assert_eq!(
            sa.write(5, 5, 15, 6, &buf, 0, 1, 10, false),
            Err(DwtError::InvalidRegion)
        );
        assert!(sa.write(5, 5, 15, 6, &buf, 0, 1, 10, true).is_ok());

        let mut out = vec![0i32; 100];
        assert_eq!(
            sa.read(0, 9, 1, 12, &mut out, 0, 1, 1, false),
            Err(DwtError::InvalidRegion)
        );
        assert!(sa.read(0, 9, 1, 12, &mut out, 0, 1, 1, true).is_ok());
    }

    #[test]
    fn f32_view_shares_bits() {
        let mut sa = SparseArray::new(8, 8, 8, 8).unwrap();
        let values = [1.5f32, -0.25, 1e-20, 1234.0];
        sa.write(0, 0, 4, 1, &values[..], 0, 1, 4, false).unwrap();

        let mut raw = vec![0i32; 4];
        sa.read(0, 0, 4, 1, &mut raw, 0, 1, 4, false).unwrap();
        for (r, v) in raw.iter().zip(values.iter()) {
            assert_eq!(*r as u32, v.to_bits());
        }

        let mut back = vec![0f32; 4];
        sa.read(0, 0, 4, 1, &mut back, 0, 1, 4, false).unwrap();
        assert_eq!(back, values);
    }
}
