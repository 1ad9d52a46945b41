//! The k-means engine: initialisation, the per-algorithm iteration step,
//! convergence testing and best-of-`n_init` selection.

pub(crate) mod elkan;
pub(crate) mod hartigan_wong;
pub(crate) mod init;
pub(crate) mod lloyd;
pub(crate) mod macqueen;
pub(crate) mod state;

use crate::config::{Algorithm, KMeansConfig};
use crate::error::{Error, Result};
use crate::kernels::KernelWidth;
use crate::matrix::row_major_slice;
use crate::real::Real;
use elkan::Elkan;
use hartigan_wong::hartigan_wong;
use lloyd::Lloyd;
use macqueen::MacQueen;
use ndarray::Array2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use state::{Dataset, IterationState};
use tracing::{debug, trace};

/// Outcome of the convergence test run after every updating iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Convergence {
    NotConverged,
    /// The centre shift fell below `tol` relative to the centre norm
    Tolerance,
    /// No sample changed cluster
    LabelsUnchanged,
}

impl Convergence {
    fn code(self) -> u8 {
        match self {
            Convergence::NotConverged => 0,
            Convergence::Tolerance => 1,
            Convergence::LabelsUnchanged => 2,
        }
    }
}

/// Iteration step of the batch and online algorithms. Hartigan-Wong runs
/// as a single routine and has no variant here.
pub(crate) enum Iteration<T> {
    Lloyd(Lloyd),
    Elkan(Elkan<T>),
    MacQueen(MacQueen),
}

impl<T: Real> Iteration<T> {
    fn new(
        algorithm: Algorithm,
        n_samples: usize,
        n_clusters: usize,
        n_features: usize,
        pinned: Option<KernelWidth>,
    ) -> Result<Option<Self>> {
        Ok(match algorithm {
            Algorithm::Lloyd => Some(Iteration::Lloyd(Lloyd::new::<T>(n_samples, n_clusters, pinned))),
            Algorithm::Elkan => Some(Iteration::Elkan(Elkan::new(
                n_samples, n_clusters, n_features, pinned,
            )?)),
            Algorithm::MacQueen => Some(Iteration::MacQueen(MacQueen::new::<T>(
                n_samples, n_clusters, pinned,
            ))),
            Algorithm::HartiganWong => None,
        })
    }

    fn initialize(&mut self, data: &Dataset<T>, state: &mut IterationState<T>) -> Result<()> {
        match self {
            Iteration::Lloyd(_) => Ok(()),
            Iteration::Elkan(elkan) => elkan.initialize(data, state),
            Iteration::MacQueen(macqueen) => macqueen.initialize(data, state),
        }
    }

    fn single_iteration(
        &mut self,
        data: &Dataset<T>,
        state: &mut IterationState<T>,
        update_centres: bool,
    ) -> Result<()> {
        match self {
            Iteration::Lloyd(lloyd) => lloyd.single_iteration(data, state, update_centres),
            Iteration::Elkan(elkan) => elkan.single_iteration(data, state, update_centres),
            Iteration::MacQueen(macqueen) => macqueen.single_iteration(data, state, update_centres),
        }
    }
}

/// Result of one run, or of the best run of a fit.
#[derive(Debug, Clone)]
pub(crate) struct Run<T> {
    pub centres: Array2<T>,
    pub labels: Vec<usize>,
    pub n_iter: usize,
    pub inertia: T,
    pub converged: bool,
}

/// Test an iteration that has just updated the centres.
///
/// `iteration` is the 0-based loop index; unchanged labels only count from
/// the third iteration on.
pub(crate) fn test_convergence<T: Real>(
    state: &IterationState<T>,
    iteration: usize,
    tol: T,
) -> Convergence {
    if iteration > 1 && state.labels_unchanged() {
        return Convergence::LabelsUnchanged;
    }
    let shift = state.shift_norm();
    trace!(iteration, shift = shift.as_f64(), "centre shift");
    if shift < tol * state.previous_norm {
        Convergence::Tolerance
    } else {
        Convergence::NotConverged
    }
}

/// Sum of squared distances from every sample to its assigned centre.
pub(crate) fn compute_inertia<T: Real>(
    data: &Dataset<T>,
    centres: &Array2<T>,
    labels: &[usize],
) -> Result<T> {
    let n_features = data.n_features;
    let centres = row_major_slice(centres)?;
    Ok(labels
        .par_iter()
        .enumerate()
        .map(|(i, &label)| {
            data.squared_distance_to(i, &centres[label * n_features..(label + 1) * n_features])
        })
        .sum())
}

/// Run k-means `n_init` times and keep the run with the lowest inertia.
///
/// `data` must be column-major and `config` already reconciled with it
/// (`n_clusters <= n_samples`). The random generator is seeded once and
/// carries over from one run to the next.
pub(crate) fn fit<T: Real>(
    data: &Array2<T>,
    config: &KMeansConfig,
    n_init: usize,
    supplied: Option<&Array2<T>>,
) -> Result<Run<T>> {
    let dataset = Dataset::new(data)?;
    let (n_samples, n_features) = (dataset.n_samples, dataset.n_features);
    let n_clusters = config.n_clusters;

    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let mut iteration = Iteration::new(
        config.algorithm,
        n_samples,
        n_clusters,
        n_features,
        config.kernel_width,
    )?;

    let mut best: Option<Run<T>> = None;
    for run_index in 0..n_init {
        let mut state = IterationState::new(n_samples, n_clusters, n_features)?;
        init::initialize_centres(config.init_method, &dataset, supplied, &mut state, &mut rng)?;

        let run = match iteration.as_mut() {
            Some(iteration) => run_iterations(&dataset, config, iteration, state)?,
            None => {
                let outcome = hartigan_wong(
                    &dataset,
                    &mut state.centres,
                    &mut state.labels,
                    config.max_iter,
                )?;
                Run {
                    centres: state.centres,
                    labels: state.labels,
                    n_iter: outcome.n_iter,
                    inertia: outcome.inertia,
                    converged: outcome.converged,
                }
            }
        };

        debug!(
            run = run_index,
            n_iter = run.n_iter,
            inertia = run.inertia.as_f64(),
            converged = run.converged,
            "k-means run finished"
        );

        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    best.ok_or_else(|| Error::InvalidInput("n_init must be at least 1".to_string()))
}

fn run_iterations<T: Real>(
    data: &Dataset<T>,
    config: &KMeansConfig,
    iteration: &mut Iteration<T>,
    mut state: IterationState<T>,
) -> Result<Run<T>> {
    let tol = T::from_f64(config.tol);
    iteration.initialize(data, &mut state)?;

    let mut n_iter = config.max_iter;
    let mut convergence = Convergence::NotConverged;
    for it in 0..config.max_iter {
        state.swap();
        iteration.single_iteration(data, &mut state, true)?;
        convergence = test_convergence(&state, it, tol);
        if convergence != Convergence::NotConverged {
            n_iter = it;
            break;
        }
    }

    if convergence == Convergence::Tolerance {
        // relabel against the converged centres
        state.swap();
        iteration.single_iteration(data, &mut state, false)?;
        state.swap_centres();
    }

    trace!(code = convergence.code(), "convergence");
    let inertia = compute_inertia(data, &state.centres, &state.labels)?;
    Ok(Run {
        centres: state.centres,
        labels: state.labels,
        n_iter,
        inertia,
        converged: convergence != Convergence::NotConverged,
    })
}
