use super::state::{Dataset, IterationState};
use crate::config::InitMethod;
use crate::distance::{euclidean_distances, squared_norms};
use crate::error::{Error, Result};
use crate::real::Real;
use ndarray::{Array1, Array2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// Fill `state.centres` with the initial centres of one run.
pub(crate) fn initialize_centres<T: Real>(
    method: InitMethod,
    data: &Dataset<T>,
    supplied: Option<&Array2<T>>,
    state: &mut IterationState<T>,
    rng: &mut ChaCha8Rng,
) -> Result<()> {
    state.previous_centres.fill(T::zero());
    match method {
        InitMethod::RandomSamples => random_samples(data, state, rng),
        InitMethod::RandomPartitions => random_partitions(data, state, rng),
        InitMethod::KMeansPlusPlus => kmeans_plusplus(data, state, rng),
        InitMethod::Supplied => {
            let centres = supplied.ok_or_else(|| {
                Error::NoData("initial centres have not been supplied".to_string())
            })?;
            state.centres.assign(centres);
        }
    }
    Ok(())
}

/// Distinct samples drawn uniformly without replacement.
fn random_samples<T: Real>(data: &Dataset<T>, state: &mut IterationState<T>, rng: &mut ChaCha8Rng) {
    let chosen = index::sample(rng, data.n_samples, state.n_clusters());
    for (mut centre, i) in state.centres.rows_mut().into_iter().zip(chosen.iter()) {
        centre.assign(&data.view.row(i));
    }
}

/// Means of a uniformly random labelling; empty clusters stay at the origin.
fn random_partitions<T: Real>(
    data: &Dataset<T>,
    state: &mut IterationState<T>,
    rng: &mut ChaCha8Rng,
) {
    let n_clusters = state.n_clusters();
    state.centres.fill(T::zero());
    state.counts.fill(0);
    for (i, label) in state.labels.iter_mut().enumerate() {
        *label = rng.gen_range(0..n_clusters);
        state.counts[*label] += 1;
        let mut centre = state.centres.row_mut(*label);
        centre += &data.view.row(i);
    }
    state.scale_centres();
}

/// Greedy k-means++.
///
/// Each new centre is the best of `2 + ln(k)` candidates drawn with
/// probability proportional to the squared distance to the closest centre
/// chosen so far, "best" meaning the lowest total potential.
fn kmeans_plusplus<T: Real>(data: &Dataset<T>, state: &mut IterationState<T>, rng: &mut ChaCha8Rng) {
    let n_samples = data.n_samples;
    let n_clusters = state.n_clusters();
    let n_trials = 2 + (n_clusters as f64).ln() as usize;
    let norms = squared_norms(&data.view);

    let distances_to = |i: usize| -> Array1<T> {
        let point = data.view.row(i).insert_axis(Axis(0));
        let point_norm = norms.slice(ndarray::s![i..i + 1]);
        euclidean_distances(&data.view, &point, Some(&norms.view()), Some(&point_norm), true)
            .remove_axis(Axis(1))
    };

    let first = rng.gen_range(0..n_samples);
    state.centres.row_mut(0).assign(&data.view.row(first));

    let mut closest = distances_to(first);
    closest[first] = T::zero();

    if closest.iter().all(|&w| w <= T::zero()) {
        // every point coincides with the first one
        for (mut centre, row) in state.centres.rows_mut().into_iter().zip(data.view.rows()) {
            centre.assign(&row);
        }
        return;
    }

    for k in 1..n_clusters {
        let weights: Vec<f64> = closest.iter().map(|w| w.as_f64().max(0.0)).collect();
        let candidates: Vec<usize> = match WeightedIndex::new(&weights) {
            Ok(dist) => (0..n_trials).map(|_| dist.sample(rng)).collect(),
            // fewer distinct points than clusters: every weight is zero
            Err(_) => vec![rng.gen_range(0..n_samples)],
        };

        let mut best: Option<(usize, T, Array1<T>)> = None;
        for (t, &candidate) in candidates.iter().enumerate() {
            if candidates[..t].contains(&candidate) {
                break;
            }
            let potential = distances_to(candidate);
            let merged = Array1::from_iter(
                closest
                    .iter()
                    .zip(potential.iter())
                    .map(|(&old, &new)| if new < old { new } else { old }),
            );
            let cost: T = merged.iter().copied().sum();
            if best.as_ref().map_or(true, |(_, best_cost, _)| cost < *best_cost) {
                best = Some((candidate, cost, merged));
            }
        }

        if let Some((candidate, _, merged)) = best {
            state.centres.row_mut(k).assign(&data.view.row(candidate));
            closest = merged;
            closest[candidate] = T::zero();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::to_column_major;
    use ndarray::array;
    use rand::SeedableRng;

    fn state_for(n: usize, k: usize, f: usize) -> IterationState<f64> {
        IterationState::new(n, k, f).unwrap()
    }

    #[test]
    fn test_random_samples_are_distinct_rows() {
        let raw = array![[0.0f64, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let data = to_column_major(&raw.view()).unwrap();
        let dataset = Dataset::new(&data).unwrap();
        let mut state = state_for(4, 3, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        initialize_centres(InitMethod::RandomSamples, &dataset, None, &mut state, &mut rng).unwrap();

        let mut firsts: Vec<f64> = state.centres.column(0).to_vec();
        firsts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        firsts.dedup();
        assert_eq!(firsts.len(), 3);
        for row in state.centres.rows() {
            assert_eq!(row[0], row[1]);
        }
    }

    #[test]
    fn test_random_partitions_counts_every_sample() {
        let raw = array![[0.0f64], [1.0], [2.0], [3.0], [4.0], [5.0]];
        let data = to_column_major(&raw.view()).unwrap();
        let dataset = Dataset::new(&data).unwrap();
        let mut state = state_for(6, 2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        initialize_centres(InitMethod::RandomPartitions, &dataset, None, &mut state, &mut rng).unwrap();

        for (l, &count) in state.counts.iter().enumerate() {
            assert_eq!(count, state.labels.iter().filter(|&&label| label == l).count());
        }
        assert_eq!(state.counts.iter().sum::<usize>(), 6);
        for (l, centre) in state.centres.rows().into_iter().enumerate() {
            let members: Vec<f64> = (0..6).filter(|&i| state.labels[i] == l).map(|i| i as f64).collect();
            if !members.is_empty() {
                let mean = members.iter().sum::<f64>() / members.len() as f64;
                assert!((centre[0] - mean).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_kmeans_plusplus_coincident_points_take_first_rows() {
        let data = to_column_major(&Array2::<f64>::from_elem((5, 2), 3.0).view()).unwrap();
        let dataset = Dataset::new(&data).unwrap();
        let mut state = state_for(5, 3, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        initialize_centres(InitMethod::KMeansPlusPlus, &dataset, None, &mut state, &mut rng).unwrap();

        assert_eq!(state.centres, Array2::from_elem((3, 2), 3.0));
    }

    #[test]
    fn test_kmeans_plusplus_spreads_centres() {
        let raw = array![[0.0f64, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0], [-10.0, 10.0], [-10.0, 10.1]];
        let data = to_column_major(&raw.view()).unwrap();
        let dataset = Dataset::new(&data).unwrap();
        let mut state = state_for(6, 3, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        initialize_centres(InitMethod::KMeansPlusPlus, &dataset, None, &mut state, &mut rng).unwrap();

        // one centre per group
        let mut groups: Vec<usize> = state
            .centres
            .rows()
            .into_iter()
            .map(|c| if c[1] < 5.0 { 0 } else if c[0] > 0.0 { 1 } else { 2 })
            .collect();
        groups.sort();
        assert_eq!(groups, vec![0, 1, 2]);
    }

    #[test]
    fn test_supplied_without_centres() {
        let data = to_column_major(&array![[1.0f64]].view()).unwrap();
        let dataset = Dataset::new(&data).unwrap();
        let mut state = state_for(1, 1, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = initialize_centres(InitMethod::Supplied, &dataset, None, &mut state, &mut rng);
        assert!(matches!(err, Err(Error::NoData(_))));
    }
}
