use super::max_heap::MaxHeap;
use super::{
    external_distance, internal_radius, KDTREE_BLOCK_SIZE, KDTREE_MIN_TASK_SIZE,
    QUERY_CHUNK_SIZE,
};
use crate::distance::{distance, squared_norms, Metric};
use crate::error::{try_filled, Error, Result};
use crate::real::Real;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    Leaf,
    /// `point` is the median sample; children are arena indices
    Inner {
        point: usize,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Node<T> {
    dim: usize,
    depth: usize,
    /// Range `start..start + len` of the tree's index permutation
    start: usize,
    len: usize,
    split: Split,
    min_bounds: Vec<T>,
    max_bounds: Vec<T>,
}

impl<T> Node<T> {
    fn shifted(mut self, offset: usize) -> Self {
        if let Split::Inner { left, right, .. } = &mut self.split {
            *left += offset;
            *right += offset;
        }
        self
    }
}

/// Position of a node's bounding box relative to a query ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoxOverlap {
    Outside,
    Partial,
    Inside,
}

/// Distance settings of one search call
struct Search<T> {
    metric: Metric,
    p: T,
    p_inv: T,
    /// Squared row norms of the tree data, for squared Euclidean searches
    norms: Option<Array1<T>>,
}

/// One query point
struct Probe<T> {
    x: Vec<T>,
    norm: T,
    /// Sample of the tree data the query point is, when querying the tree's own data
    exclude: Option<usize>,
}

/// k-d tree over the rows of a borrowed matrix.
///
/// Nodes live in an arena with the root at index 0. Every node owns a
/// contiguous range of the index permutation and the bounding box of the
/// samples in it; inner nodes split on dimension `depth % n_features` at
/// the lower median, which becomes the node's point.
pub struct KdTree<'a, T> {
    data: ArrayView2<'a, T>,
    leaf_size: usize,
    indices: Vec<usize>,
    nodes: Vec<Node<T>>,
}

impl<'a, T: Real> KdTree<'a, T> {
    /// Build the tree. Subtrees above a size threshold are built in parallel.
    pub fn build(data: ArrayView2<'a, T>, leaf_size: usize) -> Result<Self> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(Error::InvalidInput(format!(
                "cannot build a k-d tree over a {} x {} matrix",
                n_samples, n_features
            )));
        }
        if leaf_size == 0 {
            return Err(Error::InvalidInput(
                "leaf_size must be greater than 0".to_string(),
            ));
        }

        let mut indices = try_filled(n_samples, 0)?;
        for (i, index) in indices.iter_mut().enumerate() {
            *index = i;
        }

        let root_bounds = bounding_box(&data);
        let builder = Builder {
            data: data.clone(),
            leaf_size,
        };
        let nodes = builder.build(0, &mut indices, 0, Some(root_bounds));
        debug!(
            n_samples,
            n_features,
            leaf_size,
            n_nodes = nodes.len(),
            "k-d tree built"
        );

        Ok(Self {
            data,
            leaf_size,
            indices,
            nodes,
        })
    }

    /// The permutation of sample indices the tree is laid over.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn leaf_size(&self) -> usize {
        self.leaf_size
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Depth of the deepest node, the root being at depth 0
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// The `k` nearest neighbours of each query row, by ascending distance.
    ///
    /// With `query = None` the tree's own samples are queried and each one
    /// is excluded from its own neighbours. Returns `(indices, distances)`,
    /// both `n_queries x k`.
    pub fn k_neighbors(
        &self,
        query: Option<&ArrayView2<T>>,
        k: usize,
        metric: Metric,
        p: T,
    ) -> Result<(Array2<usize>, Array2<T>)> {
        let search = self.search_settings(query, metric, p)?;
        let n_candidates = match query {
            Some(_) => self.data.nrows(),
            None => self.data.nrows() - 1,
        };
        if k == 0 || k > n_candidates {
            return Err(Error::InvalidInput(format!(
                "k must be between 1 and {}, got {}",
                n_candidates, k
            )));
        }

        let queries = match query {
            Some(q) => q.view(),
            None => self.data.view(),
        };
        let self_query = query.is_none();
        let mut indices = Array2::zeros((queries.nrows(), k));
        let mut distances = Array2::zeros((queries.nrows(), k));

        indices
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(distances.axis_iter_mut(Axis(0)))
            .enumerate()
            .with_min_len(QUERY_CHUNK_SIZE)
            .for_each(|(i, (mut index_row, mut distance_row))| {
                let probe = probe(&queries, i, &search, self_query);
                let mut heap = MaxHeap::new(k);
                self.k_neighbors_recursive(0, &search, &probe, &mut heap);
                for (j, (index, d)) in heap.into_sorted().into_iter().enumerate() {
                    index_row[j] = index;
                    distance_row[j] = external_distance(d, metric, p);
                }
            });

        Ok((indices, distances))
    }

    /// Indices of the samples within `eps` of each query row, unordered.
    ///
    /// With `query = None` the tree's own samples are queried and each one
    /// is excluded from its own neighbours. For [`Metric::SqEuclidean`],
    /// `eps` is a squared radius.
    pub fn radius_neighbors(
        &self,
        query: Option<&ArrayView2<T>>,
        eps: T,
        metric: Metric,
        p: T,
    ) -> Result<Vec<Vec<usize>>> {
        let search = self.search_settings(query, metric, p)?;
        let eps_internal = internal_radius(eps, metric, p)?;
        // coordinate differences are compared against a true distance
        let plane_eps = if search.metric == Metric::SqEuclidean {
            eps_internal.sqrt()
        } else {
            eps_internal
        };

        let queries = match query {
            Some(q) => q.view(),
            None => self.data.view(),
        };
        let self_query = query.is_none();

        Ok((0..queries.nrows())
            .into_par_iter()
            .with_min_len(QUERY_CHUNK_SIZE)
            .map(|i| {
                let probe = probe(&queries, i, &search, self_query);
                let mut found = Vec::new();
                self.radius_neighbors_recursive(0, &search, &probe, eps_internal, plane_eps, &mut found);
                found
            })
            .collect())
    }

    fn search_settings(
        &self,
        query: Option<&ArrayView2<T>>,
        metric: Metric,
        p: T,
    ) -> Result<Search<T>> {
        metric.validate(p)?;
        match metric {
            Metric::Cosine => {
                return Err(Error::InvalidInput(
                    "cosine distance is not supported by the k-d tree".to_string(),
                ))
            }
            Metric::Minkowski if p < T::one() => {
                return Err(Error::InvalidInput(format!(
                    "the k-d tree needs a Minkowski order p >= 1, got {}",
                    p
                )))
            }
            _ => {}
        }
        if let Some(q) = query {
            if q.nrows() == 0 || q.ncols() != self.data.ncols() {
                return Err(Error::InvalidInput(format!(
                    "query must be a non-empty matrix with {} features, got {} x {}",
                    self.data.ncols(),
                    q.nrows(),
                    q.ncols()
                )));
            }
        }

        let internal = metric.internal(p);
        let (p, p_inv) = match internal {
            Metric::Manhattan => (T::one(), T::one()),
            _ => (p, p.recip()),
        };
        let norms = (internal == Metric::SqEuclidean).then(|| squared_norms(&self.data));
        Ok(Search {
            metric: internal,
            p,
            p_inv,
            norms,
        })
    }

    fn points(&self, node: &Node<T>) -> &[usize] {
        &self.indices[node.start..node.start + node.len]
    }

    fn distance_to(&self, search: &Search<T>, probe: &Probe<T>, index: usize) -> T {
        let row = self.data.row(index);
        match &search.norms {
            Some(norms) => {
                let dot = row
                    .iter()
                    .zip(probe.x.iter())
                    .fold(T::zero(), |acc, (&a, &x)| acc + a * x);
                (probe.norm + norms[index] - T::from_f64(2.0) * dot).max(T::zero())
            }
            None => distance(&ArrayView1::from(&probe.x[..]), &row, search.metric, search.p),
        }
    }

    /// Compare the ball of radius `eps` (internal units) around the probe
    /// with the node's bounding box.
    fn check_bounding_box(&self, search: &Search<T>, x: &[T], eps: T, node: &Node<T>) -> BoxOverlap {
        let mut min_dist = T::zero();
        let mut max_dist = T::zero();

        for ((&xi, &lo), &hi) in x.iter().zip(&node.min_bounds).zip(&node.max_bounds) {
            let (mut near, mut far) = if xi < lo {
                (lo - xi, hi - xi)
            } else if xi > hi {
                (xi - hi, xi - lo)
            } else {
                (T::zero(), (hi - xi).max(xi - lo))
            };
            if search.metric == Metric::SqEuclidean {
                near = near * near;
                far = far * far;
            }
            if near > eps {
                return BoxOverlap::Outside;
            }
            match search.metric {
                Metric::SqEuclidean | Metric::Manhattan => {
                    min_dist += near;
                    max_dist += far;
                }
                _ => {
                    min_dist += near.powf(search.p);
                    max_dist += far.powf(search.p);
                }
            }
        }
        if !matches!(search.metric, Metric::SqEuclidean | Metric::Manhattan) {
            min_dist = min_dist.powf(search.p_inv);
            max_dist = max_dist.powf(search.p_inv);
        }

        if max_dist <= eps {
            BoxOverlap::Inside
        } else if min_dist <= eps {
            BoxOverlap::Partial
        } else {
            BoxOverlap::Outside
        }
    }

    fn radius_neighbors_recursive(
        &self,
        node_id: usize,
        search: &Search<T>,
        probe: &Probe<T>,
        eps: T,
        plane_eps: T,
        found: &mut Vec<usize>,
    ) {
        let node = &self.nodes[node_id];
        match self.check_bounding_box(search, &probe.x, eps, node) {
            BoxOverlap::Outside => return,
            BoxOverlap::Inside => {
                found.extend(self.points(node).iter().filter(|&&i| Some(i) != probe.exclude));
                return;
            }
            BoxOverlap::Partial => {}
        }

        match node.split {
            Split::Leaf => {
                for &i in self.points(node) {
                    if Some(i) != probe.exclude && self.distance_to(search, probe, i) <= eps {
                        found.push(i);
                    }
                }
            }
            Split::Inner { point, left, right } => {
                if Some(point) != probe.exclude && self.distance_to(search, probe, point) <= eps {
                    found.push(point);
                }
                let diff = probe.x[node.dim] - self.data[[point, node.dim]];
                if diff <= plane_eps {
                    self.radius_neighbors_recursive(left, search, probe, eps, plane_eps, found);
                }
                if diff >= -plane_eps {
                    self.radius_neighbors_recursive(right, search, probe, eps, plane_eps, found);
                }
            }
        }
    }

    fn k_neighbors_recursive(
        &self,
        node_id: usize,
        search: &Search<T>,
        probe: &Probe<T>,
        heap: &mut MaxHeap<T>,
    ) {
        let node = &self.nodes[node_id];
        if heap.is_full()
            && self.check_bounding_box(search, &probe.x, heap.max_dist(), node) == BoxOverlap::Outside
        {
            return;
        }

        match node.split {
            Split::Leaf => {
                for &i in self.points(node) {
                    if Some(i) != probe.exclude {
                        heap.insert(i, self.distance_to(search, probe, i));
                    }
                }
            }
            Split::Inner { point, left, right } => {
                if Some(point) != probe.exclude {
                    heap.insert(point, self.distance_to(search, probe, point));
                }

                let diff = probe.x[node.dim] - self.data[[point, node.dim]];
                // same units as the heap distances
                let plane = if search.metric == Metric::SqEuclidean {
                    diff * diff.abs()
                } else {
                    diff
                };

                if diff < T::zero() {
                    self.k_neighbors_recursive(left, search, probe, heap);
                    if plane >= -heap.max_dist() {
                        self.k_neighbors_recursive(right, search, probe, heap);
                    }
                } else {
                    self.k_neighbors_recursive(right, search, probe, heap);
                    if plane <= heap.max_dist() {
                        self.k_neighbors_recursive(left, search, probe, heap);
                    }
                }
            }
        }
    }
}

fn probe<T: Real>(queries: &ArrayView2<T>, i: usize, search: &Search<T>, self_query: bool) -> Probe<T> {
    let x = queries.row(i).to_vec();
    let norm = match &search.norms {
        Some(norms) if self_query => norms[i],
        Some(_) => x.iter().map(|&v| v * v).sum(),
        None => T::zero(),
    };
    Probe {
        x,
        norm,
        exclude: self_query.then_some(i),
    }
}

/// Per-feature minimum and maximum over all rows, computed in parallel blocks.
fn bounding_box<T: Real>(data: &ArrayView2<T>) -> (Vec<T>, Vec<T>) {
    let n_features = data.ncols();
    let empty = || (vec![T::max_value(); n_features], vec![T::min_value(); n_features]);

    data.axis_chunks_iter(Axis(0), KDTREE_BLOCK_SIZE)
        .into_par_iter()
        .fold(empty, |(mut lo, mut hi), block| {
            for row in block.rows() {
                for (j, &v) in row.iter().enumerate() {
                    lo[j] = lo[j].min(v);
                    hi[j] = hi[j].max(v);
                }
            }
            (lo, hi)
        })
        .reduce(empty, |(mut lo, mut hi), (other_lo, other_hi)| {
            for j in 0..n_features {
                lo[j] = lo[j].min(other_lo[j]);
                hi[j] = hi[j].max(other_hi[j]);
            }
            (lo, hi)
        })
}

struct Builder<'a, T> {
    data: ArrayView2<'a, T>,
    leaf_size: usize,
}

impl<T: Real> Builder<'_, T> {
    /// Build the subtree over `indices`, which start at `start` in the full
    /// permutation. Returns the subtree's nodes with its root first and
    /// child links relative to that root.
    fn build(
        &self,
        depth: usize,
        indices: &mut [usize],
        start: usize,
        bounds: Option<(Vec<T>, Vec<T>)>,
    ) -> Vec<Node<T>> {
        let n = indices.len();
        if n == 0 {
            return Vec::new();
        }

        let dim = depth % self.data.ncols();
        let (min_bounds, max_bounds) = bounds.unwrap_or_else(|| self.bounds_of(indices));
        let mut node = Node {
            dim,
            depth,
            start,
            len: n,
            split: Split::Leaf,
            min_bounds,
            max_bounds,
        };

        if n < 2 * self.leaf_size || n == 2 {
            return vec![node];
        }

        // lower median; both halves are non-empty since n >= 3
        let mid = (n - 1) / 2;
        let data = &self.data;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            data[[a, dim]]
                .partial_cmp(&data[[b, dim]])
                .unwrap_or(Ordering::Equal)
        });
        let point = indices[mid];

        let (left, rest) = indices.split_at_mut(mid);
        let right = &mut rest[1..];
        let right_start = start + mid + 1;
        let (left_nodes, right_nodes) = if mid > KDTREE_MIN_TASK_SIZE {
            rayon::join(
                || self.build(depth + 1, left, start, None),
                || self.build(depth + 1, right, right_start, None),
            )
        } else {
            (
                self.build(depth + 1, left, start, None),
                self.build(depth + 1, right, right_start, None),
            )
        };

        let right_offset = 1 + left_nodes.len();
        node.split = Split::Inner {
            point,
            left: 1,
            right: right_offset,
        };

        let mut nodes = Vec::with_capacity(right_offset + right_nodes.len());
        nodes.push(node);
        nodes.extend(left_nodes.into_iter().map(|n| n.shifted(1)));
        nodes.extend(right_nodes.into_iter().map(|n| n.shifted(right_offset)));
        nodes
    }

    fn bounds_of(&self, indices: &[usize]) -> (Vec<T>, Vec<T>) {
        let n_features = self.data.ncols();
        let mut lo = vec![T::max_value(); n_features];
        let mut hi = vec![T::min_value(); n_features];
        for &i in indices {
            for (j, &v) in self.data.row(i).iter().enumerate() {
                lo[j] = lo[j].min(v);
                hi[j] = hi[j].max(v);
            }
        }
        (lo, hi)
    }
}
