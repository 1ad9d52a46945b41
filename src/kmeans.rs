use crate::algorithm::lloyd::{assign_blocks, padded_norms};
use crate::algorithm::{self, Run};
use crate::blocking::{Blocking, KMEANS_LLOYD_BLOCK_SIZE};
use crate::config::{Algorithm, InitMethod, KMeansConfig};
use crate::distance::euclidean_distances;
use crate::error::{Error, KMeansWarning, Result};
use crate::kernels;
use crate::matrix::{copy_out, to_column_major, view_from_slice};
use crate::real::Real;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use tracing::warn;

/// Results that can be read back after [`KMeans::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KMeansResult {
    /// `[n_samples, n_features, n_clusters, n_iter, inertia]`
    Info,
    /// The `n_clusters x n_features` centres, written in the configured order
    ClusterCentres,
    /// Cluster index of every training sample
    Labels,
}

/// Summary of the best run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansInfo<T> {
    pub n_samples: usize,
    pub n_features: usize,
    pub n_clusters: usize,
    /// 0-based iteration at which convergence was detected, or `max_iter`
    pub n_iter: usize,
    pub inertia: T,
}

/// Multi-algorithm k-means clustering.
///
/// Data is copied into internal column-major storage by [`KMeans::set_data`];
/// [`KMeans::compute`] then runs `n_init` restarts of the configured algorithm
/// and keeps the one with the lowest inertia. Results are only replaced once
/// a computation has fully succeeded.
///
/// # Example
///
/// ```
/// use blockmeans_rs::{Algorithm, KMeans, KMeansConfig};
/// use ndarray::Array2;
/// use ndarray_rand::RandomExt;
/// use ndarray_rand::rand_distr::Uniform;
///
/// let data = Array2::random((1000, 16), Uniform::new(-1.0f64, 1.0));
///
/// let config = KMeansConfig::new(10).with_algorithm(Algorithm::Elkan).with_seed(42);
/// let mut kmeans = KMeans::new(config);
/// kmeans.set_data(&data.view()).unwrap();
/// kmeans.compute().unwrap();
///
/// let labels = kmeans.predict(&data.view()).unwrap();
/// assert_eq!(labels.len(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans<T: Real> {
    config: KMeansConfig,

    /// Column-major copy of the training data
    data: Option<Array2<T>>,

    /// Centres given through `set_init_centres`
    init_centres: Option<Array2<T>>,

    /// Best run of the last successful `compute()`
    model: Option<Run<T>>,
}

impl<T: Real> KMeans<T> {
    pub fn new(config: KMeansConfig) -> Self {
        Self {
            config,
            data: None,
            init_centres: None,
            model: None,
        }
    }

    /// Same as [`KMeans::new`].
    pub fn with_config(config: KMeansConfig) -> Self {
        Self::new(config)
    }

    /// Store a column-major copy of `data` and forget any earlier result.
    ///
    /// `n_clusters` is reduced to the number of samples when it exceeds it.
    pub fn set_data(&mut self, data: &ArrayView2<T>) -> Result<Vec<KMeansWarning>> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(Error::InvalidInput(format!(
                "data must have at least one sample and one feature, got {} x {}",
                n_samples, n_features
            )));
        }

        self.data = Some(to_column_major(data)?);
        self.model = None;
        Ok(self.clamp_clusters().into_iter().collect())
    }

    /// [`KMeans::set_data`] from a raw slice with leading dimension `lda`,
    /// read in the configured [`crate::MatrixOrder`].
    pub fn set_data_slice(
        &mut self,
        n_samples: usize,
        n_features: usize,
        data: &[T],
        lda: usize,
    ) -> Result<Vec<KMeansWarning>> {
        let view = view_from_slice(data, n_samples, n_features, lda, self.config.order)?;
        self.set_data(&view)
    }

    /// Supply the initial centres used with [`InitMethod::Supplied`].
    /// Must follow `set_data`.
    pub fn set_init_centres(&mut self, centres: &ArrayView2<T>) -> Result<()> {
        let (_, n_features) = self.data()?.dim();
        let expected = (self.config.n_clusters, n_features);
        if centres.dim() != expected {
            return Err(Error::InvalidInput(format!(
                "initial centres must be {} x {}, got {} x {}",
                expected.0,
                expected.1,
                centres.nrows(),
                centres.ncols()
            )));
        }
        self.init_centres = Some(centres.to_owned());
        Ok(())
    }

    /// [`KMeans::set_init_centres`] from a raw `n_clusters x n_features`
    /// slice with leading dimension `ldc`.
    pub fn set_init_centres_slice(&mut self, centres: &[T], ldc: usize) -> Result<()> {
        let (_, n_features) = self.data()?.dim();
        let view = view_from_slice(
            centres,
            self.config.n_clusters,
            n_features,
            ldc,
            self.config.order,
        )?;
        self.set_init_centres(&view)
    }

    /// Cluster the data given to `set_data`.
    ///
    /// Returns the non-fatal conditions met on the way; on error the result
    /// of an earlier `compute()` is left in place.
    pub fn compute(&mut self) -> Result<Vec<KMeansWarning>> {
        self.config.validate()?;
        let mut warnings: Vec<KMeansWarning> = self.clamp_clusters().into_iter().collect();

        let data = self.data()?;
        let (n_samples, n_features) = data.dim();
        let n_clusters = self.config.n_clusters;

        let supplied = match self.config.init_method {
            InitMethod::Supplied => {
                let centres = self.init_centres.as_ref().ok_or_else(|| {
                    Error::NoData("initial centres have not been supplied".to_string())
                })?;
                if centres.nrows() != n_clusters {
                    return Err(Error::InvalidInput(format!(
                        "{} initial centres were supplied for {} clusters",
                        centres.nrows(),
                        n_clusters
                    )));
                }
                if centres.ncols() != n_features {
                    return Err(Error::InvalidInput(format!(
                        "initial centres have {} features but the data has {}",
                        centres.ncols(),
                        n_features
                    )));
                }
                Some(centres)
            }
            _ => None,
        };

        if self.config.algorithm == Algorithm::HartiganWong
            && (n_clusters == 1 || n_clusters >= n_samples)
        {
            return Err(Error::IncompatibleOptions(format!(
                "Hartigan-Wong needs 1 < n_clusters < n_samples, got n_clusters = {} and n_samples = {}",
                n_clusters, n_samples
            )));
        }

        let mut n_init = self.config.n_init;
        if supplied.is_some() && n_init > 1 {
            let warning = KMeansWarning::NInitIgnored { requested: n_init };
            warn!("{}", warning);
            warnings.push(warning);
            n_init = 1;
        }

        let best = algorithm::fit(data, &self.config, n_init, supplied)?;

        if !best.converged {
            let warning = KMeansWarning::MaxIterReached {
                max_iter: self.config.max_iter,
            };
            warn!("{}", warning);
            warnings.push(warning);
        }

        self.model = Some(best);
        Ok(warnings)
    }

    /// Set the data, compute and return the labels of the training samples.
    pub fn fit_predict(&mut self, data: &ArrayView2<T>) -> Result<Array1<usize>> {
        self.set_data(data)?;
        self.compute()?;
        Ok(self.labels()?.to_owned())
    }

    /// Copy a floating point result into `out`.
    ///
    /// Fails with [`Error::InvalidArrayDimension`] carrying the required
    /// length when `out` is too small, without writing anything.
    pub fn get_result(&self, query: KMeansResult, out: &mut [T]) -> Result<()> {
        match query {
            KMeansResult::Info => {
                let info = self.info()?;
                let values = [
                    T::from_usize(info.n_samples),
                    T::from_usize(info.n_features),
                    T::from_usize(info.n_clusters),
                    T::from_usize(info.n_iter),
                    info.inertia,
                ];
                if out.len() < values.len() {
                    return Err(Error::InvalidArrayDimension {
                        required: values.len(),
                        message: format!("info buffer holds {} elements", out.len()),
                    });
                }
                out[..values.len()].copy_from_slice(&values);
                Ok(())
            }
            KMeansResult::ClusterCentres => {
                copy_out(&self.cluster_centres()?, out, self.config.order)
            }
            KMeansResult::Labels => Err(Error::UnknownQuery(
                "labels are integers, use get_int_result".to_string(),
            )),
        }
    }

    /// Copy an integer result into `out`.
    pub fn get_int_result(&self, query: KMeansResult, out: &mut [usize]) -> Result<()> {
        match query {
            KMeansResult::Labels => {
                let labels = self.labels()?;
                if out.len() < labels.len() {
                    return Err(Error::InvalidArrayDimension {
                        required: labels.len(),
                        message: format!("label buffer holds {} elements", out.len()),
                    });
                }
                for (dst, &label) in out.iter_mut().zip(labels.iter()) {
                    *dst = label;
                }
                Ok(())
            }
            other => Err(Error::UnknownQuery(format!(
                "{:?} is not an integer result, use get_result",
                other
            ))),
        }
    }

    pub fn info(&self) -> Result<KMeansInfo<T>> {
        let model = self.model()?;
        let (n_samples, n_features) = self.data()?.dim();
        Ok(KMeansInfo {
            n_samples,
            n_features,
            n_clusters: model.centres.nrows(),
            n_iter: model.n_iter,
            inertia: model.inertia,
        })
    }

    pub fn cluster_centres(&self) -> Result<ArrayView2<'_, T>> {
        Ok(self.model()?.centres.view())
    }

    pub fn labels(&self) -> Result<ArrayView1<'_, usize>> {
        Ok(ArrayView1::from(&self.model()?.labels[..]))
    }

    /// Label each row of `data` with its closest trained centre.
    pub fn predict(&self, data: &ArrayView2<T>) -> Result<Array1<usize>> {
        let centres = self.checked_centres(data)?;
        let (n_clusters, _) = centres.dim();

        let kernel = kernels::select_lloyd::<T>(n_clusters, self.config.kernel_width);
        let norms = padded_norms(&centres.view(), n_clusters + kernel.padding::<T>());
        let blocking = Blocking::new(data.nrows(), KMEANS_LLOYD_BLOCK_SIZE);
        let mut labels = vec![0; data.nrows()];
        assign_blocks(
            data,
            &centres.view(),
            &norms,
            kernel,
            &blocking,
            &mut labels,
            false,
        )?;
        Ok(Array1::from_vec(labels))
    }

    /// [`KMeans::predict`] on a raw slice with leading dimension `ldy`.
    pub fn predict_slice(&self, n_samples: usize, data: &[T], ldy: usize) -> Result<Array1<usize>> {
        let n_features = self.cluster_centres()?.ncols();
        let view = view_from_slice(data, n_samples, n_features, ldy, self.config.order)?;
        self.predict(&view)
    }

    /// Euclidean distance from each row of `data` to every trained centre,
    /// as an `n_rows x n_clusters` matrix.
    pub fn transform(&self, data: &ArrayView2<T>) -> Result<Array2<T>> {
        let centres = self.checked_centres(data)?;
        Ok(euclidean_distances(data, &centres.view(), None, None, false))
    }

    /// [`KMeans::transform`] on a raw slice with leading dimension `ldx`.
    pub fn transform_slice(&self, n_samples: usize, data: &[T], ldx: usize) -> Result<Array2<T>> {
        let n_features = self.cluster_centres()?.ncols();
        let view = view_from_slice(data, n_samples, n_features, ldx, self.config.order)?;
        self.transform(&view)
    }

    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Mutable access to the configuration. Changes apply from the next
    /// `compute()`.
    pub fn config_mut(&mut self) -> &mut KMeansConfig {
        &mut self.config
    }

    pub fn is_computed(&self) -> bool {
        self.model.is_some()
    }

    fn data(&self) -> Result<&Array2<T>> {
        self.data
            .as_ref()
            .ok_or_else(|| Error::NoData("set_data has not been called".to_string()))
    }

    fn model(&self) -> Result<&Run<T>> {
        self.model
            .as_ref()
            .ok_or_else(|| Error::NoData("compute has not been called".to_string()))
    }

    fn checked_centres(&self, data: &ArrayView2<T>) -> Result<&Array2<T>> {
        let centres = &self.model()?.centres;
        if data.nrows() == 0 {
            return Err(Error::InvalidInput("no rows to process".to_string()));
        }
        if data.ncols() != centres.ncols() {
            return Err(Error::InvalidInput(format!(
                "expected {} features, got {}",
                centres.ncols(),
                data.ncols()
            )));
        }
        Ok(centres)
    }

    fn clamp_clusters(&mut self) -> Option<KMeansWarning> {
        let n_samples = self.data.as_ref()?.nrows();
        let requested = self.config.n_clusters;
        if requested <= n_samples {
            return None;
        }
        self.config.n_clusters = n_samples;
        let warning = KMeansWarning::ClustersClamped {
            requested,
            used: n_samples,
        };
        warn!("{}", warning);
        Some(warning)
    }
}
