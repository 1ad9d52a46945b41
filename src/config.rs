use crate::error::{Error, Result};
use crate::kernels::KernelWidth;
use crate::matrix::MatrixOrder;

/// Iteration scheme used by [`crate::KMeans::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// Batch assignment then mean update
    #[default]
    Lloyd,
    /// Lloyd with triangle-inequality bounds that skip most distance evaluations
    Elkan,
    /// Online update: centres move as soon as one sample changes cluster
    MacQueen,
    /// Optimal-transfer / quick-transfer local search (AS136)
    HartiganWong,
}

/// How the initial centres of each run are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitMethod {
    /// `n_clusters` distinct samples drawn uniformly
    #[default]
    RandomSamples,
    /// Means of a uniformly random labelling
    RandomPartitions,
    /// Greedy k-means++ seeding
    KMeansPlusPlus,
    /// Centres given through `set_init_centres`
    Supplied,
}

/// Configuration for the k-means engine
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Number of clusters
    pub n_clusters: usize,

    /// Iteration scheme
    pub algorithm: Algorithm,

    /// Initialisation of each run
    pub init_method: InitMethod,

    /// Number of independent runs; the one with the lowest inertia is kept
    pub n_init: usize,

    /// Maximum number of iterations per run
    pub max_iter: usize,

    /// Relative tolerance on the Frobenius norm of the centre shift
    pub tol: f64,

    /// Random seed. `None` seeds from the operating system.
    pub seed: Option<u64>,

    /// Storage order of the raw slices passed to the `*_slice` methods and
    /// filled by `get_result`
    pub order: MatrixOrder,

    /// Pin the SIMD kernel width instead of selecting it from the problem
    /// size. The choice is still capped by what the CPU supports.
    pub kernel_width: Option<KernelWidth>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 1,
            algorithm: Algorithm::Lloyd,
            init_method: InitMethod::RandomSamples,
            n_init: 1,
            max_iter: 300,
            tol: 1e-4,
            seed: None,
            order: MatrixOrder::ColumnMajor,
            kernel_width: None,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified number of clusters
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            ..Default::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_init_method(mut self, init_method: InitMethod) -> Self {
        self.init_method = init_method;
        self
    }

    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the maximum number of iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_order(mut self, order: MatrixOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_kernel_width(mut self, width: KernelWidth) -> Self {
        self.kernel_width = Some(width);
        self
    }

    /// Reject values no run could be made with.
    pub fn validate(&self) -> Result<()> {
        if self.n_clusters == 0 {
            return Err(Error::InvalidInput(
                "n_clusters must be greater than 0".to_string(),
            ));
        }
        if self.n_init == 0 {
            return Err(Error::InvalidInput(
                "n_init must be greater than 0".to_string(),
            ));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidInput(
                "max_iter must be greater than 0".to_string(),
            ));
        }
        if !(self.tol >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "tol must be a non-negative number, got {}",
                self.tol
            )));
        }
        Ok(())
    }
}
