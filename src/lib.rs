//! # blockmeans-rs
//!
//! Blocked, multi-threaded k-means clustering and exact neighbour searches
//! on ndarray matrices.
//!
//! ## Features
//!
//! - **Four k-means algorithms**: Lloyd (GEMM-based), Elkan (triangle
//!   inequality bounds), MacQueen (online updates) and Hartigan-Wong
//! - **Initialisation**: random samples, random partitions, k-means++ or
//!   user supplied centres, with best-of-`n_init` restarts
//! - **Blocked parallel computation**: rows are processed in fixed-size blocks
//!   spread over rayon tasks
//! - **Vectorised kernels**: the assignment loops are dispatched at runtime to
//!   the widest SIMD width the CPU supports (AVX, AVX2, AVX-512)
//! - **Neighbour searches**: a k-d tree with k-nearest and radius queries, and
//!   brute-force equivalents for every supported [`Metric`]
//! - **Optional BLAS acceleration**: enable `accelerate` (macOS) or `openblas`
//!   to route the matrix products through a BLAS backend
//!
//! ## Example
//!
//! ```rust
//! use blockmeans_rs::{Algorithm, InitMethod, KMeans, KMeansConfig};
//! use ndarray::Array2;
//! use ndarray_rand::RandomExt;
//! use ndarray_rand::rand_distr::Uniform;
//!
//! let data = Array2::random((1000, 16), Uniform::new(-1.0f64, 1.0));
//!
//! let config = KMeansConfig::new(8)
//!     .with_algorithm(Algorithm::Elkan)
//!     .with_init_method(InitMethod::KMeansPlusPlus)
//!     .with_n_init(4)
//!     .with_seed(42);
//!
//! let mut kmeans = KMeans::with_config(config);
//! let labels = kmeans.fit_predict(&data.view()).unwrap();
//! assert_eq!(labels.len(), 1000);
//!
//! let info = kmeans.info().unwrap();
//! assert_eq!(info.n_clusters, 8);
//! ```
//!
//! ## Neighbour searches
//!
//! ```rust
//! use blockmeans_rs::{KdTree, Metric, DEFAULT_LEAF_SIZE};
//! use ndarray::array;
//!
//! let points = array![[0.0f64, 0.0], [0.5, 0.0], [4.0, 4.0], [4.0, 4.5]];
//! let tree = KdTree::build(points.view(), DEFAULT_LEAF_SIZE).unwrap();
//!
//! let neighbours = tree.radius_neighbors(None, 1.0, Metric::Euclidean, 2.0).unwrap();
//! assert_eq!(neighbours[0], vec![1]);
//!
//! let (indices, _distances) = tree.k_neighbors(None, 1, Metric::Euclidean, 2.0).unwrap();
//! assert_eq!(indices[[2, 0]], 3);
//! ```
//!
//! ## BLAS Acceleration
//!
//! ```toml
//! # macOS (uses Apple Accelerate)
//! blockmeans-rs = { version = "0.1", features = ["accelerate"] }
//!
//! # Linux/Windows (requires OpenBLAS installed)
//! blockmeans-rs = { version = "0.1", features = ["openblas"] }
//! ```

// Link BLAS libraries when features are enabled
#[cfg(feature = "accelerate")]
extern crate accelerate_src;

#[cfg(feature = "openblas")]
extern crate openblas_src;

mod algorithm;
mod blocking;
mod config;
mod distance;
mod error;
mod kernels;
mod kmeans;
mod matrix;
mod neighbors;
mod real;

pub use config::{Algorithm, InitMethod, KMeansConfig};
pub use distance::{distance, euclidean_distances, pairwise_distances, squared_norms, Metric};
pub use error::{Error, KMeansWarning, Result};
pub use kernels::{detected_width, KernelWidth};
pub use kmeans::{KMeans, KMeansInfo, KMeansResult};
pub use matrix::{copy_out, to_column_major, view_from_slice, MatrixOrder};
pub use neighbors::{
    k_neighbors_brute, radius_neighbors_brute, radius_neighbors_kdtree, KdTree, DEFAULT_LEAF_SIZE,
};
pub use real::Real;
