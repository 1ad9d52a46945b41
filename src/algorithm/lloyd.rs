use super::state::{Dataset, IterationState};
use crate::blocking::{Blocking, KMEANS_LLOYD_BLOCK_SIZE};
use crate::distance::{gemm_cross_term, squared_norms};
use crate::error::Result;
use crate::kernels::{self, KernelWidth, Selected};
use crate::real::Real;
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};
use rayon::prelude::*;

/// Squared centre norms, followed by `+inf` up to `ldw` entries so padded
/// columns never win the minimum.
pub(crate) fn padded_norms<T: Real>(centres: &ArrayView2<T>, ldw: usize) -> Vec<T> {
    let mut norms = vec![T::infinity(); ldw];
    for (dst, &norm) in norms.iter_mut().zip(squared_norms(centres).iter()) {
        *dst = norm;
    }
    norms
}

/// Assign every row of `data` to its closest centre.
///
/// Rows are processed in blocks: `-2 * block * centresᵀ` is formed by GEMM in
/// a per-task work buffer of `norms.len()` columns, then the assignment
/// kernel adds the centre norms and picks the minimum. With `accumulate`
/// the per-cluster sums and counts of the new labelling are returned,
/// reduced over tasks; otherwise both are empty.
pub(crate) fn assign_blocks<T: Real>(
    data: &ArrayView2<T>,
    centres: &ArrayView2<T>,
    norms: &[T],
    kernel: Selected,
    blocking: &Blocking,
    labels: &mut [usize],
    accumulate: bool,
) -> Result<(Array2<T>, Vec<usize>)> {
    let (n_clusters, n_features) = centres.dim();
    let ldw = norms.len();
    let (sum_shape, n_counts) = if accumulate {
        ((n_clusters, n_features), n_clusters)
    } else {
        ((0, 0), 0)
    };

    labels
        .par_chunks_mut(blocking.block_size)
        .with_min_len(blocking.min_task_len())
        .enumerate()
        .try_fold(
            || {
                (
                    vec![T::zero(); blocking.block_size * ldw],
                    Array2::zeros(sum_shape),
                    vec![0usize; n_counts],
                )
            },
            |(mut work, mut sums, mut counts), (b, block_labels)| -> Result<_> {
                let block = data.slice(s![blocking.block(b), ..]);
                let len = block.nrows() * ldw;
                gemm_cross_term(
                    &block,
                    centres,
                    &mut ArrayViewMut2::from_shape((block.nrows(), ldw), &mut work[..len])?,
                );

                let block_counts = accumulate.then_some(&mut counts[..]);
                kernels::assign(kernel, &work[..len], ldw, norms, block_labels, block_counts, n_clusters);

                if accumulate {
                    for (row, &label) in block.rows().into_iter().zip(block_labels.iter()) {
                        let mut sum = sums.row_mut(label);
                        sum += &row;
                    }
                }
                Ok((work, sums, counts))
            },
        )
        .map(|partial| partial.map(|(_, sums, counts)| (sums, counts)))
        .try_reduce(
            || (Array2::zeros(sum_shape), vec![0usize; n_counts]),
            |(mut sums, mut counts), (other_sums, other_counts)| {
                sums += &other_sums;
                for (c, o) in counts.iter_mut().zip(other_counts) {
                    *c += o;
                }
                Ok((sums, counts))
            },
        )
}

/// Batch k-means: assign everything against the previous centres, then move
/// each centre to the mean of its members.
pub(crate) struct Lloyd {
    kernel: Selected,
    ldw: usize,
    blocking: Blocking,
}

impl Lloyd {
    pub fn new<T: Real>(n_samples: usize, n_clusters: usize, pinned: Option<KernelWidth>) -> Self {
        let kernel = kernels::select_lloyd::<T>(n_clusters, pinned);
        Self {
            kernel,
            ldw: n_clusters + kernel.padding::<T>(),
            blocking: Blocking::new(n_samples, KMEANS_LLOYD_BLOCK_SIZE),
        }
    }

    pub fn single_iteration<T: Real>(
        &self,
        data: &Dataset<T>,
        state: &mut IterationState<T>,
        update_centres: bool,
    ) -> Result<()> {
        let previous = state.previous_centres.view();
        let norms = padded_norms(&previous, self.ldw);
        let (sums, counts) = assign_blocks(
            &data.view,
            &previous,
            &norms,
            self.kernel,
            &self.blocking,
            &mut state.labels,
            update_centres,
        )?;

        if update_centres {
            state.centres.assign(&sums);
            state.counts = counts;
            state.scale_centres();
            state.compute_shift();
        }
        Ok(())
    }
}
