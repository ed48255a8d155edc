//! Batched, strided buffer addressing.
//!
//! A launch covers `batch × high_dimension` independent rows. Each row's input
//! is `N/2` contiguous complex values (the half-length FFT result) and its
//! output is `N/2 + 1` contiguous complex values. Row bases are
//!
//! ```text
//! input_offset  = batch_index * input_distance  + row_index * input_stride
//! output_offset = batch_index * output_distance + row_index * output_stride
//! ```
//!
//! For a pure 1-D transform `high_dimension == 1` and the stride terms vanish.

use alloc::vec::Vec;

use crate::fft::{check_len, FftError};

/// Describes where each (batch, row) window lives inside the input and
/// output buffers. All quantities are in complex elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLayout {
    pub batch: usize,
    pub high_dimension: usize,
    pub input_stride: usize,
    pub output_stride: usize,
    pub input_distance: usize,
    pub output_distance: usize,
}

/// Base offsets of a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOffsets {
    pub batch_index: usize,
    pub row_index: usize,
    pub input: usize,
    pub output: usize,
}

impl BatchLayout {
    /// Back-to-back 1-D transforms: input rows of `n/2`, output rows of `n/2 + 1`.
    pub fn contiguous(n: usize, batch: usize) -> Self {
        Self {
            batch,
            high_dimension: 1,
            input_stride: n / 2,
            output_stride: n / 2 + 1,
            input_distance: n / 2,
            output_distance: n / 2 + 1,
        }
    }

    /// Back-to-back 1-D transforms sharing one buffer, each entry padded to
    /// `n/2 + 1` complex values (`n + 2` reals).
    pub fn in_place(n: usize, batch: usize) -> Self {
        Self {
            batch,
            high_dimension: 1,
            input_stride: n / 2 + 1,
            output_stride: n / 2 + 1,
            input_distance: n / 2 + 1,
            output_distance: n / 2 + 1,
        }
    }

    /// `high_dimension` rows per batch entry, each row packed after the
    /// previous one, batch entries packed after the last row.
    pub fn rows(n: usize, high_dimension: usize, batch: usize) -> Self {
        Self {
            batch,
            high_dimension,
            input_stride: n / 2,
            output_stride: n / 2 + 1,
            input_distance: high_dimension * (n / 2),
            output_distance: high_dimension * (n / 2 + 1),
        }
    }

    pub fn with_strides(mut self, input_stride: usize, output_stride: usize) -> Self {
        self.input_stride = input_stride;
        self.output_stride = output_stride;
        self
    }

    pub fn with_distances(mut self, input_distance: usize, output_distance: usize) -> Self {
        self.input_distance = input_distance;
        self.output_distance = output_distance;
        self
    }

    #[inline]
    pub fn input_offset(&self, batch_index: usize, row_index: usize) -> usize {
        batch_index * self.input_distance + row_index * self.input_stride
    }

    #[inline]
    pub fn output_offset(&self, batch_index: usize, row_index: usize) -> usize {
        batch_index * self.output_distance + row_index * self.output_stride
    }

    #[inline]
    pub fn offsets(&self, batch_index: usize, row_index: usize) -> RowOffsets {
        RowOffsets {
            batch_index,
            row_index,
            input: self.input_offset(batch_index, row_index),
            output: self.output_offset(batch_index, row_index),
        }
    }

    /// Total number of rows in the launch, saturating at `usize::MAX`.
    pub fn row_count(&self) -> usize {
        self.batch.saturating_mul(self.high_dimension)
    }

    /// Every row in batch-major order.
    pub fn iter_rows(&self) -> impl Iterator<Item = RowOffsets> + '_ {
        (0..self.batch)
            .flat_map(move |b| (0..self.high_dimension).map(move |r| self.offsets(b, r)))
    }

    /// Row by flat index, `flat = batch_index * high_dimension + row_index`.
    #[inline]
    pub fn row(&self, flat: usize) -> RowOffsets {
        self.offsets(flat / self.high_dimension, flat % self.high_dimension)
    }

    /// Smallest input buffer that holds every row, or `usize::MAX` when the
    /// last row's end does not fit in `usize`.
    pub fn required_input_len(&self, n: usize) -> usize {
        self.checked_input_end(n).unwrap_or(usize::MAX)
    }

    /// Smallest output buffer that holds every row, or `usize::MAX` when the
    /// last row's end does not fit in `usize`.
    pub fn required_output_len(&self, n: usize) -> usize {
        self.checked_output_end(n).unwrap_or(usize::MAX)
    }

    fn checked_input_end(&self, n: usize) -> Option<usize> {
        self.last_end(n / 2, self.input_distance, self.input_stride)
    }

    fn checked_output_end(&self, n: usize) -> Option<usize> {
        self.last_end(n / 2 + 1, self.output_distance, self.output_stride)
    }

    fn last_end(&self, width: usize, distance: usize, stride: usize) -> Option<usize> {
        if self.batch == 0 || self.high_dimension == 0 {
            return Some(0);
        }
        // offsets grow monotonically in both indices, so if the last row fits
        // every other row does too
        let base = (self.batch - 1)
            .checked_mul(distance)?
            .checked_add((self.high_dimension - 1).checked_mul(stride)?)?;
        base.checked_add(width)
    }

    /// Check that every window fits and that no two rows write the same
    /// element. In place, a row's input must also not overlap any other
    /// row's output, otherwise a scatter could clobber data another row has
    /// not gathered yet.
    pub fn validate(
        &self,
        n: usize,
        input_len: usize,
        output_len: usize,
        in_place: bool,
    ) -> Result<(), FftError> {
        check_len(n)?;
        if self.batch == 0 || self.high_dimension == 0 {
            return Err(FftError::EmptyInput);
        }
        if (self.high_dimension > 1 && (self.input_stride == 0 || self.output_stride == 0))
            || (self.batch > 1 && (self.input_distance == 0 || self.output_distance == 0))
        {
            return Err(FftError::InvalidStride);
        }
        let half = n / 2;
        let fits = |end: Option<usize>, len: usize| end.map_or(false, |end| end <= len);
        if !fits(self.checked_input_end(n), input_len)
            || !fits(self.checked_output_end(n), output_len)
        {
            return Err(FftError::OutOfBounds);
        }

        let mut outputs: Vec<(usize, usize)> = self
            .iter_rows()
            .map(|o| (o.output, o.output + half + 1))
            .collect();
        outputs.sort_unstable();
        if outputs.windows(2).any(|w| w[1].0 < w[0].1) {
            return Err(FftError::OverlappingLayout);
        }

        if in_place {
            for o in self.iter_rows() {
                let (start, end) = (o.input, o.input + half);
                let own = (o.output, o.output + half + 1);
                // first output window ending after `start`
                let first = outputs.partition_point(|w| w.1 <= start);
                let clash = outputs[first..]
                    .iter()
                    .take_while(|w| w.0 < end)
                    .any(|w| *w != own);
                if clash {
                    return Err(FftError::OverlappingLayout);
                }
            }
        }
        Ok(())
    }
}
