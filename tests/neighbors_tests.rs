use approx::assert_relative_eq;
use blockmeans_rs::{
    k_neighbors_brute, radius_neighbors_brute, radius_neighbors_kdtree, Error, KdTree, Metric,
    DEFAULT_LEAF_SIZE,
};
use ndarray::{s, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn random_points(n_samples: usize, n_features: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Array2::random_using((n_samples, n_features), Uniform::new(-5.0, 5.0), &mut rng)
}

fn sorted(mut lists: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    for list in lists.iter_mut() {
        list.sort_unstable();
    }
    lists
}

#[test]
fn test_tree_knn_matches_brute_force() {
    let data = random_points(700, 3, 1);
    let (expected_indices, expected_distances) =
        k_neighbors_brute(&data.view(), None, 5, Metric::Euclidean, 2.0).unwrap();

    for leaf_size in [1, 2, 7, DEFAULT_LEAF_SIZE, 1000] {
        let tree = KdTree::build(data.view(), leaf_size).unwrap();
        let (indices, distances) = tree.k_neighbors(None, 5, Metric::Euclidean, 2.0).unwrap();
        assert_eq!(indices, expected_indices, "leaf size {}", leaf_size);
        for (a, b) in distances.iter().zip(expected_distances.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_tree_knn_external_queries() {
    let data = random_points(400, 4, 2);
    let queries = random_points(50, 4, 3);
    let tree = KdTree::build(data.view(), 16).unwrap();

    for (metric, p) in [
        (Metric::Euclidean, 2.0),
        (Metric::SqEuclidean, 2.0),
        (Metric::Manhattan, 1.0),
        (Metric::Minkowski, 3.0),
    ] {
        let (indices, distances) = tree
            .k_neighbors(Some(&queries.view()), 4, metric, p)
            .unwrap();
        let (expected_indices, expected_distances) =
            k_neighbors_brute(&data.view(), Some(&queries.view()), 4, metric, p).unwrap();
        assert_eq!(indices, expected_indices, "{:?}", metric);
        for (a, b) in distances.iter().zip(expected_distances.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_tree_radius_matches_brute_force() {
    let data = random_points(900, 2, 4);

    for (metric, p, eps) in [
        (Metric::Euclidean, 2.0, 0.4),
        (Metric::SqEuclidean, 2.0, 0.16),
        (Metric::Minkowski, 2.0, 0.4),
        (Metric::Manhattan, 1.0, 0.5),
        (Metric::Minkowski, 1.5, 0.45),
    ] {
        let expected = sorted(radius_neighbors_brute(&data.view(), eps, metric, p).unwrap());
        for leaf_size in [1, 5, DEFAULT_LEAF_SIZE] {
            let found =
                sorted(radius_neighbors_kdtree(data.view(), eps, metric, p, leaf_size).unwrap());
            assert_eq!(found, expected, "{:?} p = {} leaf size {}", metric, p, leaf_size);
        }
    }
}

#[test]
fn test_large_tree_matches_brute_force() {
    // big enough for the subtrees to be built as parallel tasks
    let data = random_points(12_000, 3, 9);
    let tree = KdTree::build(data.view(), DEFAULT_LEAF_SIZE).unwrap();

    let mut indices = tree.indices().to_vec();
    indices.sort_unstable();
    assert_eq!(indices, (0..12_000).collect::<Vec<_>>());

    let expected = sorted(radius_neighbors_brute(&data.view(), 0.25, Metric::Euclidean, 2.0).unwrap());
    let found = sorted(tree.radius_neighbors(None, 0.25, Metric::Euclidean, 2.0).unwrap());
    assert_eq!(found, expected);

    let queries = data.slice(s![..200, ..]);
    let (indices, _) = tree
        .k_neighbors(Some(&queries), 3, Metric::Euclidean, 2.0)
        .unwrap();
    let (expected_indices, _) =
        k_neighbors_brute(&data.view(), Some(&queries), 3, Metric::Euclidean, 2.0).unwrap();
    assert_eq!(indices, expected_indices);
}

#[test]
fn test_radius_neighbours_are_symmetric() {
    let data = random_points(300, 5, 5);
    let found = radius_neighbors_brute(&data.view(), 3.0, Metric::Euclidean, 2.0).unwrap();
    for (i, list) in found.iter().enumerate() {
        assert!(!list.contains(&i));
        for &j in list {
            assert!(found[j].contains(&i), "{} -> {} has no reverse edge", i, j);
        }
    }
}

#[test]
fn test_radius_brute_spans_several_blocks() {
    // more rows than one tile so off-diagonal block pairs are exercised
    let n = 1300;
    let mut data = Array2::zeros((n, 1));
    for (i, mut row) in data.axis_iter_mut(Axis(0)).enumerate() {
        row[0] = i as f64;
    }
    let found = sorted(radius_neighbors_brute(&data.view(), 1.0, Metric::Euclidean, 2.0).unwrap());
    assert_eq!(found[0], vec![1]);
    assert_eq!(found[511], vec![510, 512]);
    assert_eq!(found[512], vec![511, 513]);
    assert_eq!(found[n - 1], vec![n - 2]);
}

#[test]
fn test_tree_structure() {
    let data = random_points(1000, 3, 6);
    let tree = KdTree::build(data.view(), 10).unwrap();
    assert_eq!(tree.leaf_size(), 10);

    let mut indices = tree.indices().to_vec();
    indices.sort_unstable();
    assert_eq!(indices, (0..1000).collect::<Vec<_>>());
    assert!(tree.n_nodes() > 1);
    assert!(tree.depth() >= 5);
}

#[test]
fn test_invalid_requests() {
    let data = random_points(20, 2, 7);
    let tree = KdTree::build(data.view(), 4).unwrap();

    assert!(matches!(
        tree.k_neighbors(None, 20, Metric::Euclidean, 2.0),
        Err(Error::InvalidInput(_))
    ));
    assert!(tree.radius_neighbors(None, 1.0, Metric::Cosine, 2.0).is_err());
    assert!(tree.radius_neighbors(None, -1.0, Metric::Euclidean, 2.0).is_err());
    assert!(radius_neighbors_brute(&data.view(), 1.0, Metric::Minkowski, 0.0).is_err());

    let wrong_width = random_points(3, 3, 8);
    assert!(tree
        .k_neighbors(Some(&wrong_width.view()), 1, Metric::Euclidean, 2.0)
        .is_err());
    assert!(KdTree::build(data.view(), 0).is_err());
}
