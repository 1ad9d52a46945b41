use crate::error::{Error, Result};
use crate::real::Real;
use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut2, Zip};

/// Distance metrics understood by the neighbour searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    /// Squared Euclidean distance (not a metric, but cheaper to evaluate)
    SqEuclidean,
    Manhattan,
    /// Minkowski distance of order `p`
    Minkowski,
    /// `1 - cos(angle)`; only supported by the brute-force searches
    Cosine,
}

impl Metric {
    /// Check the metric parameter `p` (only read for [`Metric::Minkowski`]).
    pub fn validate<T: Real>(self, p: T) -> Result<()> {
        if self == Metric::Minkowski && !(p > T::zero()) {
            return Err(Error::InvalidInput(format!(
                "Minkowski order p must be positive, got {}",
                p
            )));
        }
        Ok(())
    }

    /// Metric used internally: Euclidean searches run on squared distances.
    pub(crate) fn internal<T: Real>(self, p: T) -> Metric {
        match self {
            Metric::Euclidean => Metric::SqEuclidean,
            Metric::Minkowski if p == T::from_f64(2.0) => Metric::SqEuclidean,
            other => other,
        }
    }
}

/// Compute squared L2 norms for each row of a 2D array, in parallel.
#[inline]
pub fn squared_norms<T: Real>(data: &ArrayView2<T>) -> Array1<T> {
    let mut norms = Array1::zeros(data.nrows());
    Zip::from(&mut norms)
        .and(data.rows())
        .par_for_each(|norm, row| *norm = row.dot(&row));
    norms
}

/// Write the cross term `-2 * block * centresᵀ` into the leading
/// `centres.nrows()` columns of `work`.
///
/// The squared norms are not added here; consumers add the centre norms
/// lazily, and the sample norm is irrelevant for an `argmin` over centres.
///
/// # Arguments
/// * `block` - Rows of data (n_block, n_features), any strides
/// * `centres` - Centres (n_clusters, n_features)
/// * `work` - Destination (n_block, n_clusters + padding)
pub fn gemm_cross_term<T: Real>(
    block: &ArrayView2<T>,
    centres: &ArrayView2<T>,
    work: &mut ArrayViewMut2<T>,
) {
    let k = centres.nrows();
    let mut dest = work.slice_mut(s![..block.nrows(), ..k]);
    general_mat_mul(
        T::from_f64(-2.0),
        block,
        &centres.t(),
        T::zero(),
        &mut dest,
    );
}

/// Squared Euclidean distance matrix `D_ij = ||a_i||² + ||c_j||² - 2 a_i·c_j`.
///
/// Entries can be slightly negative for coincident points because of round-off;
/// callers that need non-negative values must clamp.
pub fn squared_distance_matrix<T: Real>(
    a: &ArrayView2<T>,
    c: &ArrayView2<T>,
    a_norms: &ArrayView1<T>,
    c_norms: &ArrayView1<T>,
) -> Array2<T> {
    let mut d = Array2::zeros((a.nrows(), c.nrows()));
    gemm_cross_term(a, c, &mut d.view_mut());
    Zip::from(d.rows_mut())
        .and(a_norms)
        .par_for_each(|mut row, &an| {
            Zip::from(&mut row)
                .and(c_norms)
                .for_each(|v, &cn| *v = *v + an + cn);
        });
    d
}

/// Euclidean distance matrix between the rows of `x` and `y`, clamped at zero.
///
/// Norms are computed when not supplied. With `squared` the square root is skipped.
pub fn euclidean_distances<T: Real>(
    x: &ArrayView2<T>,
    y: &ArrayView2<T>,
    x_norms: Option<&ArrayView1<T>>,
    y_norms: Option<&ArrayView1<T>>,
    squared: bool,
) -> Array2<T> {
    let x_owned;
    let x_norms = match x_norms {
        Some(n) => n.view(),
        None => {
            x_owned = squared_norms(x);
            x_owned.view()
        }
    };
    let y_owned;
    let y_norms = match y_norms {
        Some(n) => n.view(),
        None => {
            y_owned = squared_norms(y);
            y_owned.view()
        }
    };

    let mut d = squared_distance_matrix(x, y, &x_norms, &y_norms);
    d.par_mapv_inplace(|v| {
        let v = v.max(T::zero());
        if squared {
            v
        } else {
            v.sqrt()
        }
    });
    d
}

/// Distance between two vectors.
///
/// For [`Metric::Euclidean`] the true distance is returned, for
/// [`Metric::SqEuclidean`] its square.
#[inline]
pub fn distance<T: Real>(x: &ArrayView1<T>, y: &ArrayView1<T>, metric: Metric, p: T) -> T {
    match metric {
        Metric::SqEuclidean => sum_zip(x, y, |a, b| (a - b) * (a - b)),
        Metric::Euclidean => sum_zip(x, y, |a, b| (a - b) * (a - b)).sqrt(),
        Metric::Manhattan => sum_zip(x, y, |a, b| (a - b).abs()),
        Metric::Minkowski => sum_zip(x, y, |a, b| (a - b).abs().powf(p)).powf(p.recip()),
        Metric::Cosine => {
            let mut nx = x.dot(x).sqrt();
            let mut ny = y.dot(y).sqrt();
            if nx == T::zero() {
                nx = T::one();
            }
            if ny == T::zero() {
                ny = T::one();
            }
            (T::one() - x.dot(y) / (nx * ny)).max(T::zero())
        }
    }
}

#[inline]
fn sum_zip<T: Real>(x: &ArrayView1<T>, y: &ArrayView1<T>, f: impl Fn(T, T) -> T) -> T {
    let mut acc = T::zero();
    Zip::from(x).and(y).for_each(|&a, &b| acc += f(a, b));
    acc
}

/// Pairwise distance matrix between the rows of `x` and the rows of `y`.
///
/// Euclidean metrics go through the GEMM formulation, everything else is
/// evaluated pair by pair in parallel over the rows of `x`.
pub fn pairwise_distances<T: Real>(
    x: &ArrayView2<T>,
    y: &ArrayView2<T>,
    metric: Metric,
    p: T,
) -> Result<Array2<T>> {
    metric.validate(p)?;
    if x.ncols() != y.ncols() {
        return Err(Error::InvalidInput(format!(
            "feature counts differ: {} and {}",
            x.ncols(),
            y.ncols()
        )));
    }

    match metric.internal(p) {
        Metric::SqEuclidean => {
            let squared = metric == Metric::SqEuclidean;
            Ok(euclidean_distances(x, y, None, None, squared))
        }
        internal => {
            let mut d = Array2::zeros((x.nrows(), y.nrows()));
            Zip::from(d.rows_mut())
                .and(x.rows())
                .par_for_each(|mut out, xr| {
                    for (j, yr) in y.rows().into_iter().enumerate() {
                        out[j] = distance(&xr, &yr, internal, p);
                    }
                });
            Ok(d)
        }
    }
}

/// Frobenius norm of a matrix
pub fn frobenius_norm<T: Real>(a: &ArrayView2<T>) -> T {
    a.iter().fold(T::zero(), |acc, &v| acc + v * v).sqrt()
}
