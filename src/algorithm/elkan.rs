use super::state::{Dataset, IterationState};
use crate::blocking::{Blocking, KMEANS_ELKAN_BLOCK_SIZE};
use crate::distance::euclidean_distances;
use crate::error::{try_filled, Result};
use crate::kernels::{self, KernelWidth, Selected};
use crate::matrix::row_major_slice;
use crate::real::Real;
use ndarray::Array2;
use rayon::prelude::*;

/// Lloyd's iteration accelerated with triangle-inequality bounds.
///
/// Per sample, `upper` bounds the distance to the assigned centre and row
/// `i` of `lower` bounds the distance to every centre. `half` holds half
/// the distance between each pair of centres and `next_half` the half
/// distance from each centre to its closest neighbour. A sample whose
/// upper bound is below `next_half[label]` cannot change cluster.
pub(crate) struct Elkan<T> {
    update_kernel: Selected,
    reduce_kernel: Selected,
    ldl: usize,
    blocking: Blocking,
    upper: Vec<T>,
    lower: Vec<T>,
    half: Array2<T>,
    next_half: Vec<T>,
    shift: Vec<T>,
}

impl<T: Real> Elkan<T> {
    pub fn new(
        n_samples: usize,
        n_clusters: usize,
        n_features: usize,
        pinned: Option<KernelWidth>,
    ) -> Result<Self> {
        let (update_kernel, reduce_kernel) =
            kernels::select_elkan::<T>(n_clusters, n_features, pinned);
        let ldl = n_clusters + update_kernel.padding::<T>();
        Ok(Self {
            update_kernel,
            reduce_kernel,
            ldl,
            blocking: Blocking::new(n_samples, KMEANS_ELKAN_BLOCK_SIZE),
            upper: try_filled(n_samples, T::zero())?,
            lower: try_filled(n_samples * ldl, T::zero())?,
            half: Array2::zeros((n_clusters, n_clusters)),
            next_half: try_filled(n_clusters, T::infinity())?,
            shift: try_filled(ldl, T::zero())?,
        })
    }

    /// Set exact upper bounds and the lower bounds that had to be computed
    /// while labelling every sample against the initial centres.
    pub fn initialize(&mut self, data: &Dataset<T>, state: &mut IterationState<T>) -> Result<()> {
        self.compute_half_distances(&state.centres);

        let n_features = data.n_features;
        let n_clusters = state.n_clusters();
        let centres = row_major_slice(&state.centres)?;
        let (reduce, half) = (self.reduce_kernel, &self.half);

        self.upper
            .par_iter_mut()
            .zip(self.lower.par_chunks_mut(self.ldl))
            .zip(state.labels.par_iter_mut())
            .enumerate()
            .with_min_len(KMEANS_ELKAN_BLOCK_SIZE)
            .for_each(|(i, ((upper, lower), label))| {
                let (x, incx) = data.sample(i);
                let centre = |j: usize| &centres[j * n_features..(j + 1) * n_features];

                let mut best = 0;
                let mut smallest = kernels::sq_diff_sum(reduce, x, incx, centre(0), 1, n_features).sqrt();
                lower.fill(T::zero());
                lower[0] = smallest;

                for j in 1..n_clusters {
                    if smallest > half[[best, j]] {
                        let dist = kernels::sq_diff_sum(reduce, x, incx, centre(j), 1, n_features).sqrt();
                        lower[j] = dist;
                        if dist < smallest {
                            best = j;
                            smallest = dist;
                        }
                    }
                }
                *label = best;
                *upper = smallest;
            });
        Ok(())
    }

    pub fn single_iteration(
        &mut self,
        data: &Dataset<T>,
        state: &mut IterationState<T>,
        update_centres: bool,
    ) -> Result<()> {
        let n_clusters = state.n_clusters();
        let n_features = data.n_features;
        let block_size = self.blocking.block_size;
        let ldl = self.ldl;
        let sum_shape = if update_centres {
            (n_clusters, n_features)
        } else {
            (0, 0)
        };
        let n_counts = if update_centres { n_clusters } else { 0 };

        let blocking = self.blocking;
        let ctx = AssignBlock {
            data,
            previous: row_major_slice(&state.previous_centres)?,
            half: &self.half,
            next_half: &self.next_half,
            reduce: self.reduce_kernel,
            ldl,
            n_clusters,
        };

        let (sums, counts) = state
            .labels
            .par_chunks_mut(block_size)
            .zip(state.previous_labels.par_chunks(block_size))
            .zip(self.upper.par_chunks_mut(block_size))
            .zip(self.lower.par_chunks_mut(block_size * ldl))
            .enumerate()
            .with_min_len(blocking.min_task_len())
            .fold(
                || (Array2::zeros(sum_shape), vec![0usize; n_counts]),
                |(mut sums, mut counts), (b, (((labels, old_labels), upper), lower))| {
                    let start = blocking.block(b).start;
                    for i in 0..labels.len() {
                        let label = ctx.assign_sample(
                            start + i,
                            old_labels[i],
                            &mut upper[i],
                            &mut lower[i * ldl..(i + 1) * ldl],
                        );
                        labels[i] = label;
                        if update_centres {
                            counts[label] += 1;
                            let mut sum = sums.row_mut(label);
                            sum += &data.view.row(start + i);
                        }
                    }
                    (sums, counts)
                },
            )
            .reduce(
                || (Array2::zeros(sum_shape), vec![0usize; n_counts]),
                |(mut sums, mut counts), (other_sums, other_counts)| {
                    sums += &other_sums;
                    for (c, o) in counts.iter_mut().zip(other_counts) {
                        *c += o;
                    }
                    (sums, counts)
                },
            );

        if update_centres {
            state.centres.assign(&sums);
            state.counts = counts;
            state.scale_centres();
            state.compute_shift();

            for (s, row) in self.shift.iter_mut().zip(state.previous_centres.rows()) {
                *s = row.dot(&row).sqrt();
            }

            let (kernel, shift) = (self.update_kernel, &self.shift);
            self.lower
                .par_chunks_mut(block_size * ldl)
                .zip(self.upper.par_chunks_mut(block_size))
                .zip(state.labels.par_chunks(block_size))
                .with_min_len(blocking.min_task_len())
                .for_each(|((lower, upper), labels)| {
                    kernels::elkan_update(kernel, lower, ldl, upper, shift, labels, n_clusters);
                });

            self.compute_half_distances(&state.centres);
        }
        Ok(())
    }

    fn compute_half_distances(&mut self, centres: &Array2<T>) {
        let view = centres.view();
        self.half = euclidean_distances(&view, &view, None, None, false);
        let half_factor = T::from_f64(0.5);
        self.half.mapv_inplace(|d| d * half_factor);

        let n_clusters = centres.nrows();
        let half = &self.half;
        for (j, next) in self.next_half.iter_mut().enumerate() {
            *next = (0..n_clusters)
                .filter(|&i| i != j)
                .map(|i| half[[i, j]])
                .fold(T::infinity(), T::min);
        }
    }
}

/// Read-only context for relabelling the samples of one block.
struct AssignBlock<'a, 'd, T> {
    data: &'a Dataset<'d, T>,
    previous: &'a [T],
    half: &'a Array2<T>,
    next_half: &'a [T],
    reduce: Selected,
    ldl: usize,
    n_clusters: usize,
}

impl<T: Real> AssignBlock<'_, '_, T> {
    #[inline]
    fn distance(&self, i: usize, j: usize) -> T {
        let f = self.data.n_features;
        let (x, incx) = self.data.sample(i);
        kernels::sq_diff_sum(self.reduce, x, incx, &self.previous[j * f..(j + 1) * f], 1, f).sqrt()
    }

    /// Relabel sample `i` against the previous centres, tightening its
    /// bounds on the way. Returns the new label.
    fn assign_sample(&self, i: usize, old_label: usize, upper: &mut T, lower: &mut [T]) -> usize {
        debug_assert_eq!(lower.len(), self.ldl);
        let mut label = old_label;
        let mut u = *upper;

        if u > self.next_half[label] {
            let mut tight = false;
            for j in 0..self.n_clusters {
                if j == label || u <= lower[j] || u <= self.half[[label, j]] {
                    continue;
                }
                if !tight {
                    u = self.distance(i, label);
                    lower[label] = u;
                    tight = true;
                }
                // the exact upper bound may already rule the candidate out
                if u > lower[j] && u > self.half[[label, j]] {
                    let dist = self.distance(i, j);
                    lower[j] = dist;
                    if dist < u {
                        u = dist;
                        label = j;
                    }
                }
            }
        }

        *upper = u;
        label
    }
}
