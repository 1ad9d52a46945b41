//! Basic example demonstrating blockmeans-rs usage
//!
//! Run with: cargo run --example basic --release
//! Set RUST_LOG=blockmeans_rs=debug to follow the runs.

use blockmeans_rs::{Algorithm, InitMethod, KMeans, KMeansConfig, KdTree, Metric, DEFAULT_LEAF_SIZE};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== blockmeans-rs example ===\n");

    // 3 clusters in 2D for easy visualization
    let n_samples = 300;
    let n_features = 2;
    let n_clusters = 3;

    println!("Generating {} samples with {} features...", n_samples, n_features);

    let centers = [[-5.0f64, -5.0], [0.0, 5.0], [5.0, -5.0]];
    let noise = Array2::random((n_samples, n_features), Uniform::new(-1.0f64, 1.0));
    let mut data = Array2::<f64>::zeros((n_samples, n_features));
    for i in 0..n_samples {
        let center = centers[i % n_clusters];
        data[[i, 0]] = center[0] + noise[[i, 0]];
        data[[i, 1]] = center[1] + noise[[i, 1]];
    }

    println!("True cluster centers:");
    for (i, center) in centers.iter().enumerate() {
        println!("  Cluster {}: ({:.2}, {:.2})", i, center[0], center[1]);
    }
    println!();

    for algorithm in [
        Algorithm::Lloyd,
        Algorithm::Elkan,
        Algorithm::MacQueen,
        Algorithm::HartiganWong,
    ] {
        let config = KMeansConfig::new(n_clusters)
            .with_algorithm(algorithm)
            .with_init_method(InitMethod::KMeansPlusPlus)
            .with_n_init(4)
            .with_seed(42);

        let mut kmeans = KMeans::with_config(config);
        kmeans.set_data(&data.view())?;
        for warning in kmeans.compute()? {
            println!("  warning: {}", warning);
        }

        let info = kmeans.info()?;
        println!(
            "{:?}: {} iterations, inertia {:.4}",
            algorithm, info.n_iter, info.inertia
        );
        let centres = kmeans.cluster_centres()?;
        for (i, centre) in centres.outer_iter().enumerate() {
            println!("  Centroid {}: ({:.4}, {:.4})", i, centre[0], centre[1]);
        }

        let mut cluster_counts = vec![0usize; n_clusters];
        for &label in kmeans.labels()?.iter() {
            cluster_counts[label] += 1;
        }
        println!("  Cluster sizes: {:?}\n", cluster_counts);
    }

    // Neighbours within a radius of 0.3 of each sample
    let tree = KdTree::build(data.view(), DEFAULT_LEAF_SIZE)?;
    let neighbours = tree.radius_neighbors(None, 0.3, Metric::Euclidean, 2.0)?;
    let isolated = neighbours.iter().filter(|list| list.is_empty()).count();
    let mean = neighbours.iter().map(Vec::len).sum::<usize>() as f64 / n_samples as f64;
    println!(
        "k-d tree: {} nodes, depth {}; {:.2} neighbours within 0.3 on average, {} isolated samples",
        tree.n_nodes(),
        tree.depth(),
        mean,
        isolated
    );

    let (indices, distances) = tree.k_neighbors(None, 3, Metric::Euclidean, 2.0)?;
    println!("Three nearest neighbours of sample 0:");
    for (index, distance) in indices.row(0).iter().zip(distances.row(0).iter()) {
        println!("  sample {} at distance {:.4}", index, distance);
    }

    println!("\n=== Done! ===");
    Ok(())
}
