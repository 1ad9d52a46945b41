use crate::distance::frobenius_norm;
use crate::error::{try_filled, Result};
use crate::matrix::column_major_slice;
use crate::real::Real;
use ndarray::{Array2, ArrayView2};
use std::mem;

/// Column-major training data with its raw storage.
///
/// Element `(i, j)` is `raw[i + j * n_samples]`.
pub(crate) struct Dataset<'a, T> {
    pub view: ArrayView2<'a, T>,
    pub raw: &'a [T],
    pub n_samples: usize,
    pub n_features: usize,
}

impl<'a, T: Real> Dataset<'a, T> {
    pub fn new(data: &'a Array2<T>) -> Result<Self> {
        let (n_samples, n_features) = data.dim();
        Ok(Self {
            view: data.view(),
            raw: column_major_slice(data)?,
            n_samples,
            n_features,
        })
    }

    /// Strided access to sample `i`: `(slice, stride)` such that feature `j`
    /// is `slice[j * stride]`.
    #[inline]
    pub fn sample(&self, i: usize) -> (&'a [T], usize) {
        (&self.raw[i..], self.n_samples)
    }

    /// Squared distance between sample `i` and a contiguous point.
    #[inline]
    pub fn squared_distance_to(&self, i: usize, point: &[T]) -> T {
        let mut acc = T::zero();
        for (j, &c) in point.iter().enumerate() {
            let d = self.raw[i + j * self.n_samples] - c;
            acc += d * d;
        }
        acc
    }
}

/// Double-buffered centres and labels of one run.
///
/// Centres are stored `n_clusters x n_features` in standard layout. At the
/// start of every iteration the buffers are swapped, so `previous_*` holds
/// the state the iteration starts from and `centres`/`labels` receive the
/// result.
pub(crate) struct IterationState<T> {
    pub centres: Array2<T>,
    pub previous_centres: Array2<T>,
    pub labels: Vec<usize>,
    pub previous_labels: Vec<usize>,
    pub counts: Vec<usize>,
    /// Frobenius norm of the centres before the last shift
    pub previous_norm: T,
}

impl<T: Real> IterationState<T> {
    pub fn new(n_samples: usize, n_clusters: usize, n_features: usize) -> Result<Self> {
        let centres = Array2::from_shape_vec(
            (n_clusters, n_features),
            try_filled(n_clusters * n_features, T::zero())?,
        )?;
        let previous_centres = centres.clone();
        Ok(Self {
            centres,
            previous_centres,
            labels: try_filled(n_samples, 0)?,
            previous_labels: try_filled(n_samples, 0)?,
            counts: try_filled(n_clusters, 0)?,
            previous_norm: T::zero(),
        })
    }

    pub fn n_clusters(&self) -> usize {
        self.centres.nrows()
    }

    pub fn swap(&mut self) {
        self.swap_centres();
        mem::swap(&mut self.labels, &mut self.previous_labels);
    }

    pub fn swap_centres(&mut self) {
        mem::swap(&mut self.centres, &mut self.previous_centres);
    }

    /// Turn accumulated sums into means. Empty clusters are divided by one,
    /// which leaves them at the origin.
    pub fn scale_centres(&mut self) {
        for (mut row, count) in self.centres.rows_mut().into_iter().zip(self.counts.iter_mut()) {
            if *count == 0 {
                *count = 1;
            }
            let c = T::from_usize(*count);
            row.mapv_inplace(|v| v / c);
        }
    }

    /// Overwrite `previous_centres` with `previous - current`, remembering
    /// the norm of the previous centres for the tolerance test.
    pub fn compute_shift(&mut self) {
        self.previous_norm = frobenius_norm(&self.previous_centres.view());
        self.previous_centres -= &self.centres;
    }

    /// Frobenius norm of the shift stored by [`Self::compute_shift`]
    pub fn shift_norm(&self) -> T {
        frobenius_norm(&self.previous_centres.view())
    }

    pub fn labels_unchanged(&self) -> bool {
        self.labels == self.previous_labels
    }
}
