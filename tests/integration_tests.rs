use approx::assert_relative_eq;
use blockmeans_rs::{
    Algorithm, Error, InitMethod, KMeans, KMeansConfig, KMeansResult, KMeansWarning, KernelWidth,
    MatrixOrder,
};
use ndarray::{array, Array2, ArrayView2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const ALGORITHMS: [Algorithm; 4] = [
    Algorithm::Lloyd,
    Algorithm::Elkan,
    Algorithm::MacQueen,
    Algorithm::HartiganWong,
];

/// Generate synthetic clustered data with known centers
fn generate_clustered_data(
    n_samples: usize,
    n_features: usize,
    n_clusters: usize,
    seed: u64,
) -> (Array2<f64>, Array2<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let centers = Array2::random_using(
        (n_clusters, n_features),
        Uniform::new(-10.0, 10.0),
        &mut rng,
    );

    let noise = Array2::random_using((n_samples, n_features), Uniform::new(-0.5, 0.5), &mut rng);
    let mut data = Array2::zeros((n_samples, n_features));
    for (i, (mut row, noise_row)) in data
        .axis_iter_mut(Axis(0))
        .zip(noise.axis_iter(Axis(0)))
        .enumerate()
    {
        let center = centers.row(i % n_clusters);
        row.assign(&(&center + &noise_row));
    }

    (data, centers)
}

/// Ten points in three clusters, with the starting centres used by the
/// tests that need a deterministic run.
fn three_clusters() -> (Array2<f64>, Array2<f64>) {
    let data = array![
        [1.0, 1.0],
        [1.1, 1.2],
        [0.5, -2.0],
        [0.49, -1.9],
        [-2.0, 0.5],
        [-2.0, 0.51],
        [0.53, -2.1],
        [0.9, 0.95],
        [1.2, 0.8],
        [-1.8, 0.6],
    ];
    let centres = array![[0.5, 0.5], [0.7, -1.7], [-1.3, 0.2]];
    (data, centres)
}

fn supplied_config(algorithm: Algorithm) -> KMeansConfig {
    KMeansConfig::new(3)
        .with_algorithm(algorithm)
        .with_init_method(InitMethod::Supplied)
        .with_max_iter(50)
        .with_tol(1e-4)
}

/// Sum of squared distances from each sample to the centre of its cluster
fn inertia_of(data: &ArrayView2<f64>, centres: &ArrayView2<f64>, labels: &[usize]) -> f64 {
    data.axis_iter(Axis(0))
        .zip(labels)
        .map(|(row, &label)| {
            row.iter()
                .zip(centres.row(label).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
        })
        .sum()
}

/// True when two labellings describe the same partition
fn same_partition(a: &[usize], b: &[usize]) -> bool {
    let mut forward = std::collections::HashMap::new();
    let mut backward = std::collections::HashMap::new();
    a.iter().zip(b).all(|(&x, &y)| {
        *forward.entry(x).or_insert(y) == y && *backward.entry(y).or_insert(x) == x
    })
}

#[test]
fn test_three_clusters_supplied_centres() {
    let (data, centres) = three_clusters();
    let expected_centres = array![[1.05, 0.9875], [0.506667, -2.0], [-1.933333, 0.536667]];
    let expected_labels = vec![0, 0, 1, 1, 2, 2, 1, 0, 0, 2];

    for algorithm in ALGORITHMS {
        let mut kmeans = KMeans::new(supplied_config(algorithm));
        kmeans.set_data(&data.view()).unwrap();
        kmeans.set_init_centres(&centres.view()).unwrap();
        let warnings = kmeans.compute().unwrap();
        assert!(warnings.is_empty(), "{:?}: {:?}", algorithm, warnings);

        let info = kmeans.info().unwrap();
        assert_eq!((info.n_samples, info.n_features, info.n_clusters), (10, 2, 3));
        assert!(info.n_iter <= 2, "{:?} took {} iterations", algorithm, info.n_iter);
        assert_relative_eq!(info.inertia, 0.185475, epsilon = 1e-5);

        assert_eq!(kmeans.labels().unwrap().to_vec(), expected_labels);
        let fitted = kmeans.cluster_centres().unwrap();
        for (a, b) in fitted.iter().zip(expected_centres.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_three_clusters_transform_and_predict() {
    let (data, centres) = three_clusters();
    let mut kmeans = KMeans::new(supplied_config(Algorithm::Lloyd));
    kmeans.set_data(&data.view()).unwrap();
    kmeans.set_init_centres(&centres.view()).unwrap();
    kmeans.compute().unwrap();

    let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, -1.0]];
    let expected = array![
        [1.4414077320453085, 2.0631798542810347, 2.0064368639179446],
        [1.0500744021258683, 3.042484364973978, 1.9880783574989047],
        [0.9887650125282548, 2.0599460618612757, 2.9820220581939925],
        [2.2478114355968564, 1.1210312712458608, 2.469640099735629],
    ];
    let transformed = kmeans.transform(&x.view()).unwrap();
    assert_eq!(transformed.dim(), (4, 3));
    for (a, b) in transformed.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-5);
    }

    let y = array![[0.5, 0.5], [0.5, -1.0], [-1.0, 0.0]];
    assert_eq!(kmeans.predict(&y.view()).unwrap().to_vec(), vec![0, 1, 2]);
}

#[test]
fn test_row_major_slices_match_views() {
    let (data, centres) = three_clusters();
    let row_major: Vec<f64> = data.iter().copied().collect();
    let centres_row_major: Vec<f64> = centres.iter().copied().collect();

    let config = supplied_config(Algorithm::HartiganWong).with_order(MatrixOrder::RowMajor);
    let mut kmeans = KMeans::<f64>::new(config);
    kmeans.set_data_slice(10, 2, &row_major, 2).unwrap();
    kmeans.set_init_centres_slice(&centres_row_major, 2).unwrap();
    kmeans.compute().unwrap();

    let mut info = [0.0; 5];
    kmeans.get_result(KMeansResult::Info, &mut info).unwrap();
    assert_eq!(&info[..3], &[10.0, 2.0, 3.0]);
    assert_relative_eq!(info[4], 0.185475, epsilon = 1e-5);

    let mut out = [0.0; 6];
    kmeans.get_result(KMeansResult::ClusterCentres, &mut out).unwrap();
    let expected = [1.05, 0.9875, 0.506667, -2.0, -1.933333, 0.536667];
    for (a, b) in out.iter().zip(expected.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-5);
    }

    let mut labels = [0usize; 10];
    kmeans.get_int_result(KMeansResult::Labels, &mut labels).unwrap();
    assert_eq!(labels, [0, 0, 1, 1, 2, 2, 1, 0, 0, 2]);

    let x = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, -1.0];
    let transformed = kmeans.transform_slice(4, &x, 2).unwrap();
    assert_relative_eq!(transformed[[1, 0]], 1.0500744021258683, epsilon = 1e-5);
    assert_relative_eq!(transformed[[3, 1]], 1.1210312712458608, epsilon = 1e-5);
}

#[test]
fn test_column_major_with_padding() {
    let (data, _) = three_clusters();
    // two padding rows at the bottom of every column
    let mut padded = vec![0.0; 12 * 2];
    for j in 0..2 {
        for i in 0..10 {
            padded[i + j * 12] = data[[i, j]];
        }
    }
    let centres = [0.5, 0.7, -1.3, 0.0, 0.5, -1.7, 0.2, 0.0];

    let mut kmeans = KMeans::<f64>::new(supplied_config(Algorithm::Elkan));
    kmeans.set_data_slice(10, 2, &padded, 12).unwrap();
    kmeans.set_init_centres_slice(&centres, 4).unwrap();
    kmeans.compute().unwrap();
    assert_relative_eq!(kmeans.info().unwrap().inertia, 0.185475, epsilon = 1e-5);

    let err = kmeans.set_data_slice(10, 2, &padded, 9).unwrap_err();
    assert!(matches!(err, Error::InvalidArrayDimension { .. }));
}

#[test]
fn test_single_point() {
    let data = array![[2.1f64]];
    let config = KMeansConfig::new(1)
        .with_algorithm(Algorithm::Elkan)
        .with_init_method(InitMethod::KMeansPlusPlus)
        .with_max_iter(30)
        .with_seed(78);
    let mut kmeans = KMeans::new(config);
    kmeans.set_data(&data.view()).unwrap();
    kmeans.compute().unwrap();

    let info = kmeans.info().unwrap();
    assert_eq!(info.n_iter, 0);
    assert_eq!(info.inertia, 0.0);
    assert_relative_eq!(kmeans.cluster_centres().unwrap()[[0, 0]], 2.1);

    let transformed = kmeans.transform(&array![[0.9f64]].view()).unwrap();
    assert_relative_eq!(transformed[[0, 0]], 1.2, epsilon = 1e-12);
    assert_eq!(kmeans.predict(&array![[1.3f64]].view()).unwrap().to_vec(), vec![0]);
}

#[test]
fn test_all_zero_data() {
    let data = Array2::<f64>::zeros((5, 3));
    for algorithm in ALGORITHMS {
        for init in [
            InitMethod::RandomSamples,
            InitMethod::RandomPartitions,
            InitMethod::KMeansPlusPlus,
        ] {
            let config = KMeansConfig::new(2)
                .with_algorithm(algorithm)
                .with_init_method(init)
                .with_max_iter(3)
                .with_seed(7);
            let mut kmeans = KMeans::new(config);
            kmeans.set_data(&data.view()).unwrap();
            kmeans.compute().unwrap();

            let info = kmeans.info().unwrap();
            assert_eq!(info.inertia, 0.0, "{:?} / {:?}", algorithm, init);
            assert!(info.n_iter <= 3);
            assert!(kmeans.cluster_centres().unwrap().iter().all(|&c| c == 0.0));
            assert!(kmeans.labels().unwrap().iter().all(|&l| l < 2));
        }
    }
}

#[test]
fn test_random_inits_find_three_clusters() {
    let (data, _) = three_clusters();
    let expected_labels = [0, 0, 1, 1, 2, 2, 1, 0, 0, 2];

    for algorithm in ALGORITHMS {
        for init in [
            InitMethod::RandomSamples,
            InitMethod::RandomPartitions,
            InitMethod::KMeansPlusPlus,
        ] {
            let config = KMeansConfig::new(3)
                .with_algorithm(algorithm)
                .with_init_method(init)
                .with_n_init(10)
                .with_max_iter(30)
                .with_seed(78);
            let mut kmeans = KMeans::new(config);
            let labels = kmeans.fit_predict(&data.view()).unwrap();
            assert!(
                same_partition(labels.as_slice().unwrap(), &expected_labels),
                "{:?} / {:?}: {:?}",
                algorithm,
                init,
                labels
            );
            assert!(kmeans.info().unwrap().inertia <= 0.185475 + 1e-5);
        }
    }
}

#[test]
fn test_one_and_n_clusters() {
    let (data, _) = three_clusters();

    let mut single = KMeans::new(
        KMeansConfig::new(1)
            .with_init_method(InitMethod::KMeansPlusPlus)
            .with_seed(78),
    );
    single.fit_predict(&data.view()).unwrap();
    assert_relative_eq!(single.info().unwrap().inertia, 33.3236, epsilon = 1e-4);

    let mut every = KMeans::new(
        KMeansConfig::new(10)
            .with_init_method(InitMethod::KMeansPlusPlus)
            .with_seed(78),
    );
    every.fit_predict(&data.view()).unwrap();
    assert!(every.info().unwrap().inertia <= 0.11);
}

#[test]
fn test_too_many_clusters_are_clamped() {
    let (data, _) = three_clusters();
    let mut kmeans = KMeans::new(KMeansConfig::new(25).with_seed(1));
    let warnings = kmeans.set_data(&data.view()).unwrap();
    assert_eq!(
        warnings,
        vec![KMeansWarning::ClustersClamped {
            requested: 25,
            used: 10
        }]
    );
    kmeans.compute().unwrap();
    assert_eq!(kmeans.info().unwrap().n_clusters, 10);
}

#[test]
fn test_hartigan_wong_rejects_degenerate_cluster_counts() {
    let (data, _) = three_clusters();
    for n_clusters in [1, 10] {
        let config = KMeansConfig::new(n_clusters)
            .with_algorithm(Algorithm::HartiganWong)
            .with_seed(3);
        let mut kmeans = KMeans::new(config);
        kmeans.set_data(&data.view()).unwrap();
        assert!(matches!(
            kmeans.compute(),
            Err(Error::IncompatibleOptions(_))
        ));
        assert!(!kmeans.is_computed());
    }
}

#[test]
fn test_n_init_ignored_with_supplied_centres() {
    let (data, centres) = three_clusters();
    let mut kmeans = KMeans::new(supplied_config(Algorithm::Lloyd).with_n_init(5));
    kmeans.set_data(&data.view()).unwrap();
    kmeans.set_init_centres(&centres.view()).unwrap();
    let warnings = kmeans.compute().unwrap();
    assert_eq!(warnings, vec![KMeansWarning::NInitIgnored { requested: 5 }]);
}

#[test]
fn test_failed_compute_keeps_previous_result() {
    let (data, centres) = three_clusters();
    let mut kmeans = KMeans::new(supplied_config(Algorithm::Lloyd));
    kmeans.set_data(&data.view()).unwrap();
    kmeans.set_init_centres(&centres.view()).unwrap();
    kmeans.compute().unwrap();
    let before = kmeans.labels().unwrap().to_vec();

    kmeans.config_mut().tol = -1.0;
    assert!(kmeans.compute().is_err());
    assert_eq!(kmeans.labels().unwrap().to_vec(), before);
}

#[test]
fn test_results_before_compute() {
    let kmeans = KMeans::<f64>::new(KMeansConfig::new(2));
    assert!(matches!(kmeans.info(), Err(Error::NoData(_))));
    let mut out = [0.0; 5];
    assert!(matches!(
        kmeans.get_result(KMeansResult::Info, &mut out),
        Err(Error::NoData(_))
    ));
    assert!(matches!(
        kmeans.predict(&array![[1.0, 2.0]].view()),
        Err(Error::NoData(_))
    ));
}

#[test]
fn test_elkan_matches_lloyd() {
    let (data, _) = generate_clustered_data(2000, 16, 12, 42);

    let fit = |algorithm| {
        let config = KMeansConfig::new(12)
            .with_algorithm(algorithm)
            .with_init_method(InitMethod::KMeansPlusPlus)
            .with_seed(42);
        let mut kmeans = KMeans::new(config);
        let labels = kmeans.fit_predict(&data.view()).unwrap();
        (labels, kmeans.info().unwrap().inertia)
    };

    let (lloyd_labels, lloyd_inertia) = fit(Algorithm::Lloyd);
    let (elkan_labels, elkan_inertia) = fit(Algorithm::Elkan);
    assert_eq!(lloyd_labels, elkan_labels);
    assert_relative_eq!(lloyd_inertia, elkan_inertia, max_relative = 1e-8);
}

#[test]
fn test_kernel_widths_agree() {
    let (data, _) = generate_clustered_data(1500, 9, 20, 7);

    let mut reference = None;
    for width in [
        KernelWidth::Scalar,
        KernelWidth::Avx,
        KernelWidth::Avx2,
        KernelWidth::Avx512,
    ] {
        for algorithm in [Algorithm::Lloyd, Algorithm::Elkan] {
            let config = KMeansConfig::new(20)
                .with_algorithm(algorithm)
                .with_init_method(InitMethod::KMeansPlusPlus)
                .with_kernel_width(width)
                .with_seed(11);
            let mut kmeans = KMeans::new(config);
            kmeans.fit_predict(&data.view()).unwrap();
            let inertia = kmeans.info().unwrap().inertia;
            match reference {
                None => reference = Some(inertia),
                Some(expected) => {
                    assert_relative_eq!(inertia, expected, max_relative = 1e-6)
                }
            }
        }
    }
}

#[test]
fn test_recovers_generated_centres() {
    let (data, centers) = generate_clustered_data(3000, 4, 5, 123);
    let config = KMeansConfig::new(5)
        .with_init_method(InitMethod::KMeansPlusPlus)
        .with_n_init(5)
        .with_seed(5);
    let mut kmeans = KMeans::new(config);
    let labels = kmeans.fit_predict(&data.view()).unwrap();

    let fitted = kmeans.cluster_centres().unwrap();
    for center in centers.axis_iter(Axis(0)) {
        let closest = fitted
            .axis_iter(Axis(0))
            .map(|c| {
                c.iter()
                    .zip(center.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
            })
            .fold(f64::INFINITY, f64::min);
        assert!(closest < 0.05, "generated centre not recovered: {}", closest);
    }

    let inertia = inertia_of(&data.view(), &fitted, labels.as_slice().unwrap());
    assert_relative_eq!(inertia, kmeans.info().unwrap().inertia, max_relative = 1e-6);
}

#[test]
fn test_f32_precision() {
    let (data, _) = generate_clustered_data(500, 3, 4, 9);
    let data = data.mapv(|x| x as f32);
    let config = KMeansConfig::new(4)
        .with_algorithm(Algorithm::MacQueen)
        .with_init_method(InitMethod::KMeansPlusPlus)
        .with_n_init(3)
        .with_seed(9);
    let mut kmeans = KMeans::<f32>::new(config);
    let labels = kmeans.fit_predict(&data.view()).unwrap();
    assert_eq!(labels.len(), 500);
    assert!(labels.iter().all(|&l| l < 4));

    let predicted = kmeans.predict(&data.view()).unwrap();
    let agreeing = predicted.iter().zip(labels.iter()).filter(|(a, b)| a == b).count();
    assert!(agreeing >= 495, "only {} of 500 labels agree", agreeing);
}

#[test]
fn test_reproducible_with_seed() {
    let (data, _) = generate_clustered_data(800, 5, 6, 99);
    let run = || {
        let config = KMeansConfig::new(6)
            .with_init_method(InitMethod::RandomSamples)
            .with_n_init(3)
            .with_seed(1234);
        let mut kmeans = KMeans::new(config);
        kmeans.fit_predict(&data.view()).unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_get_result_is_repeatable() {
    let (data, centres) = three_clusters();
    let mut kmeans = KMeans::new(supplied_config(Algorithm::Elkan));
    kmeans.set_data(&data.view()).unwrap();
    kmeans.set_init_centres(&centres.view()).unwrap();
    kmeans.compute().unwrap();

    let mut first = [0.0; 6];
    let mut second = [0.0; 6];
    kmeans.get_result(KMeansResult::ClusterCentres, &mut first).unwrap();
    kmeans.get_result(KMeansResult::ClusterCentres, &mut second).unwrap();
    assert_eq!(first, second);

    let mut short = [0.0; 4];
    match kmeans.get_result(KMeansResult::ClusterCentres, &mut short) {
        Err(Error::InvalidArrayDimension { required, .. }) => assert_eq!(required, 6),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(short, [0.0; 4]);
}
