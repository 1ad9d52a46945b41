//! Exact nearest-neighbour and radius searches, through a k-d tree or by
//! brute force.

mod brute;
mod kdtree;
mod max_heap;

pub use brute::{k_neighbors_brute, radius_neighbors_brute};
pub use kdtree::KdTree;

use crate::distance::Metric;
use crate::error::{Error, Result};
use crate::real::Real;
use ndarray::ArrayView2;

/// Leaf size used when none is given
pub const DEFAULT_LEAF_SIZE: usize = 30;
/// Rows per task when computing the root bounding box
pub(crate) const KDTREE_BLOCK_SIZE: usize = 512;
/// Subtrees with more points than this are built as separate tasks
pub(crate) const KDTREE_MIN_TASK_SIZE: usize = 2048;
/// Tile size of the brute-force radius search
pub(crate) const RADIUS_NEIGHBORS_BLOCK_SIZE: usize = 512;
/// Queries handed to one task by the tree searches
pub(crate) const QUERY_CHUNK_SIZE: usize = 128;

/// Radius expressed in the units of the internal metric: Euclidean
/// searches compare squared distances against `eps²`.
pub(crate) fn internal_radius<T: Real>(eps: T, metric: Metric, p: T) -> Result<T> {
    if !(eps >= T::zero()) {
        return Err(Error::InvalidInput(format!(
            "radius must be non-negative, got {}",
            eps
        )));
    }
    if metric != Metric::SqEuclidean && metric.internal(p) == Metric::SqEuclidean {
        Ok(eps * eps)
    } else {
        Ok(eps)
    }
}

/// Distances produced by a search on the internal metric, converted back
/// to the requested one.
pub(crate) fn external_distance<T: Real>(d: T, metric: Metric, p: T) -> T {
    if metric != Metric::SqEuclidean && metric.internal(p) == Metric::SqEuclidean {
        d.sqrt()
    } else {
        d
    }
}

/// Radius neighbours of every sample of `data` (itself excluded), found
/// through a k-d tree built for the occasion.
pub fn radius_neighbors_kdtree<T: Real>(
    data: ArrayView2<'_, T>,
    eps: T,
    metric: Metric,
    p: T,
    leaf_size: usize,
) -> Result<Vec<Vec<usize>>> {
    KdTree::build(data, leaf_size)?.radius_neighbors(None, eps, metric, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_radius() {
        assert_eq!(internal_radius(3.0f64, Metric::Euclidean, 2.0).unwrap(), 9.0);
        assert_eq!(internal_radius(3.0f64, Metric::Minkowski, 2.0).unwrap(), 9.0);
        assert_eq!(internal_radius(3.0f64, Metric::SqEuclidean, 2.0).unwrap(), 3.0);
        assert_eq!(internal_radius(3.0f64, Metric::Manhattan, 2.0).unwrap(), 3.0);
        assert!(internal_radius(-1.0f64, Metric::Euclidean, 2.0).is_err());
        assert!(internal_radius(f64::NAN, Metric::Euclidean, 2.0).is_err());
    }

    #[test]
    fn test_external_distance() {
        assert_eq!(external_distance(9.0f64, Metric::Euclidean, 2.0), 3.0);
        assert_eq!(external_distance(9.0f64, Metric::SqEuclidean, 2.0), 9.0);
        assert_eq!(external_distance(9.0f64, Metric::Minkowski, 3.0), 9.0);
    }
}
