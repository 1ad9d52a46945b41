use super::lloyd::{assign_blocks, padded_norms};
use super::state::{Dataset, IterationState};
use crate::blocking::{Blocking, KMEANS_MACQUEEN_BLOCK_SIZE};
use crate::error::Result;
use crate::kernels::{self, KernelWidth, Selected};
use crate::matrix::row_major_slice;
use crate::real::Real;

/// Online k-means: a sample that changes cluster moves both affected
/// centres immediately, so later samples of the same pass see the update.
pub(crate) struct MacQueen {
    kernel: Selected,
    ldw: usize,
    blocking: Blocking,
}

impl MacQueen {
    pub fn new<T: Real>(n_samples: usize, n_clusters: usize, pinned: Option<KernelWidth>) -> Self {
        let kernel = kernels::select_lloyd::<T>(n_clusters, pinned);
        Self {
            kernel,
            ldw: n_clusters + kernel.padding::<T>(),
            blocking: Blocking::new(n_samples, KMEANS_MACQUEEN_BLOCK_SIZE),
        }
    }

    /// Label every sample against the initial centres and replace them by
    /// the means of their members. Cluster counts are kept up to date from
    /// here on; an empty cluster keeps a zero centre.
    pub fn initialize<T: Real>(&self, data: &Dataset<T>, state: &mut IterationState<T>) -> Result<()> {
        let initial = state.centres.view();
        let norms = padded_norms(&initial, self.ldw);
        let (sums, counts) = assign_blocks(
            &data.view,
            &initial,
            &norms,
            self.kernel,
            &self.blocking,
            &mut state.labels,
            true,
        )?;

        state.centres.assign(&sums);
        for (mut row, &count) in state.centres.rows_mut().into_iter().zip(counts.iter()) {
            if count > 0 {
                let c = T::from_usize(count);
                row.mapv_inplace(|v| v / c);
            }
        }
        state.counts = counts;
        Ok(())
    }

    pub fn single_iteration<T: Real>(
        &self,
        data: &Dataset<T>,
        state: &mut IterationState<T>,
        update_centres: bool,
    ) -> Result<()> {
        state.centres.assign(&state.previous_centres);
        state.labels.copy_from_slice(&state.previous_labels);

        let n_features = data.n_features;

        for i in 0..data.n_samples {
            let (x, incx) = data.sample(i);
            let centres = row_major_slice(&state.centres)?;
            let mut closest = 0;
            let mut smallest = T::infinity();
            for (j, centre) in centres.chunks_exact(n_features).enumerate() {
                let dist = kernels::sq_diff_sum(self.kernel, x, incx, centre, 1, n_features);
                if dist < smallest {
                    smallest = dist;
                    closest = j;
                }
            }

            let old = state.labels[i];
            if old == closest {
                continue;
            }
            state.labels[i] = closest;

            if update_centres {
                state.counts[closest] += 1;
                state.counts[old] -= 1;
                // full rescan of both memberships, O(n_samples) per move
                recompute_mean(data, state, closest);
                recompute_mean(data, state, old);
            }
        }

        if update_centres {
            state.compute_shift();
        }
        Ok(())
    }
}

/// Recompute the mean of `cluster` from the current labels. An empty
/// cluster is left at the origin.
fn recompute_mean<T: Real>(data: &Dataset<T>, state: &mut IterationState<T>, cluster: usize) {
    let mut centre = state.centres.row_mut(cluster);
    centre.fill(T::zero());
    for (row, _) in data
        .view
        .rows()
        .into_iter()
        .zip(state.labels.iter())
        .filter(|(_, &label)| label == cluster)
    {
        centre += &row;
    }
    let count = state.counts[cluster];
    if count > 0 {
        let c = T::from_usize(count);
        centre.mapv_inplace(|v| v / c);
    }
}
