use super::{external_distance, internal_radius, RADIUS_NEIGHBORS_BLOCK_SIZE};
use crate::blocking::Blocking;
use crate::distance::{euclidean_distances, pairwise_distances, squared_norms, Metric};
use crate::error::{Error, Result};
use crate::real::Real;
use ndarray::{s, Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::cmp::Ordering;

/// Radius neighbours of every sample of `data` (itself excluded), by
/// exhaustive comparison.
///
/// The symmetric problem is tiled into blocks of rows and only the upper
/// triangle of block pairs is evaluated; each pair found is recorded in
/// both directions. Tasks collect pairs locally and they are merged once
/// at the end. For [`Metric::SqEuclidean`], `eps` is a squared radius.
pub fn radius_neighbors_brute<T: Real>(
    data: &ArrayView2<T>,
    eps: T,
    metric: Metric,
    p: T,
) -> Result<Vec<Vec<usize>>> {
    metric.validate(p)?;
    let (n_samples, n_features) = data.dim();
    if n_samples == 0 || n_features == 0 {
        return Err(Error::InvalidInput(format!(
            "data must be a non-empty matrix, got {} x {}",
            n_samples, n_features
        )));
    }

    let eps_internal = internal_radius(eps, metric, p)?;
    let internal = metric.internal(p);
    let norms = (internal == Metric::SqEuclidean).then(|| squared_norms(data));

    let blocking = Blocking::new(n_samples, RADIUS_NEIGHBORS_BLOCK_SIZE);
    let block_pairs: Vec<(usize, usize)> = (0..blocking.n_blocks)
        .flat_map(|j| (0..=j).map(move |i| (i, j)))
        .collect();

    let pairs = block_pairs
        .par_iter()
        .try_fold(Vec::new, |mut found, &(block_i, block_j)| -> Result<_> {
            let rows_i = blocking.block(block_i);
            let rows_j = blocking.block(block_j);
            let a_i = data.slice(s![rows_i.clone(), ..]);
            let a_j = data.slice(s![rows_j.clone(), ..]);

            let d = match &norms {
                Some(norms) => euclidean_distances(
                    &a_i,
                    &a_j,
                    Some(&norms.slice(s![rows_i.clone()])),
                    Some(&norms.slice(s![rows_j.clone()])),
                    true,
                ),
                None => pairwise_distances(&a_i, &a_j, metric, p)?,
            };

            let diagonal = block_i == block_j;
            for (jj, column) in d.axis_iter(Axis(1)).enumerate() {
                let last = if diagonal { jj } else { column.len() };
                for (ii, &dist) in column.iter().take(last).enumerate() {
                    if dist <= eps_internal {
                        found.push((rows_i.start + ii, rows_j.start + jj));
                    }
                }
            }
            Ok(found)
        })
        .try_reduce(Vec::new, |mut a, mut b| {
            a.append(&mut b);
            Ok(a)
        })?;

    let mut neighbors = vec![Vec::new(); n_samples];
    for (i, j) in pairs {
        neighbors[i].push(j);
        neighbors[j].push(i);
    }
    Ok(neighbors)
}

/// The `k` nearest samples of `data` for each row of `query`, by exhaustive
/// comparison and ascending distance.
///
/// With `query = None` the samples of `data` are queried and each one is
/// excluded from its own neighbours. Supports every [`Metric`].
pub fn k_neighbors_brute<T: Real>(
    data: &ArrayView2<T>,
    query: Option<&ArrayView2<T>>,
    k: usize,
    metric: Metric,
    p: T,
) -> Result<(Array2<usize>, Array2<T>)> {
    let self_query = query.is_none();
    let queries = query.map_or_else(|| data.view(), |q| q.view());
    let n_candidates = if self_query {
        data.nrows().saturating_sub(1)
    } else {
        data.nrows()
    };
    if k == 0 || k > n_candidates {
        return Err(Error::InvalidInput(format!(
            "k must be between 1 and {}, got {}",
            n_candidates, k
        )));
    }

    let internal = metric.internal(p);
    let distances = if internal == Metric::SqEuclidean {
        euclidean_distances(&queries, data, None, None, true)
    } else {
        pairwise_distances(&queries, data, metric, p)?
    };

    let mut indices = Array2::zeros((queries.nrows(), k));
    let mut nearest = Array2::zeros((queries.nrows(), k));
    indices
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(nearest.axis_iter_mut(Axis(0)))
        .zip(distances.axis_iter(Axis(0)))
        .enumerate()
        .for_each(|(i, ((mut index_row, mut nearest_row), row))| {
            let mut order: Vec<usize> = (0..row.len()).filter(|&j| !(self_query && j == i)).collect();
            order.sort_by(|&a, &b| row[a].partial_cmp(&row[b]).unwrap_or(Ordering::Equal));
            for (slot, &j) in order.iter().take(k).enumerate() {
                index_row[slot] = j;
                nearest_row[slot] = external_distance(row[j], metric, p);
            }
        });

    Ok((indices, nearest))
}
