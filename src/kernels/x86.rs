//! Instruction-set specific builds of the kernels in `lanes`.
//!
//! These functions are unsafe because they are compiled for CPU features
//! that may be missing. Callers must go through the dispatch functions in
//! the parent module, which only reach them for detected features.

use super::lanes;
use crate::real::Real;

#[target_feature(enable = "avx")]
pub unsafe fn assign_avx<T: Real, const L: usize>(
    work: &[T],
    ldw: usize,
    norms: &[T],
    labels: &mut [usize],
    counts: Option<&mut [usize]>,
    n_clusters: usize,
) {
    lanes::assign::<T, L>(work, ldw, norms, labels, counts, n_clusters)
}

#[target_feature(enable = "avx2")]
pub unsafe fn assign_avx2<T: Real, const L: usize>(
    work: &[T],
    ldw: usize,
    norms: &[T],
    labels: &mut [usize],
    counts: Option<&mut [usize]>,
    n_clusters: usize,
) {
    lanes::assign::<T, L>(work, ldw, norms, labels, counts, n_clusters)
}

#[cfg(feature = "avx512")]
#[target_feature(enable = "avx512f")]
pub unsafe fn assign_avx512<T: Real, const L: usize>(
    work: &[T],
    ldw: usize,
    norms: &[T],
    labels: &mut [usize],
    counts: Option<&mut [usize]>,
    n_clusters: usize,
) {
    lanes::assign::<T, L>(work, ldw, norms, labels, counts, n_clusters)
}

#[target_feature(enable = "avx")]
pub unsafe fn elkan_update_avx<T: Real, const L: usize>(
    lower: &mut [T],
    ldl: usize,
    upper: &mut [T],
    shift: &[T],
    labels: &[usize],
    n_clusters: usize,
) {
    lanes::elkan_update::<T, L>(lower, ldl, upper, shift, labels, n_clusters)
}

#[target_feature(enable = "avx2")]
pub unsafe fn elkan_update_avx2<T: Real, const L: usize>(
    lower: &mut [T],
    ldl: usize,
    upper: &mut [T],
    shift: &[T],
    labels: &[usize],
    n_clusters: usize,
) {
    lanes::elkan_update::<T, L>(lower, ldl, upper, shift, labels, n_clusters)
}

#[cfg(feature = "avx512")]
#[target_feature(enable = "avx512f")]
pub unsafe fn elkan_update_avx512<T: Real, const L: usize>(
    lower: &mut [T],
    ldl: usize,
    upper: &mut [T],
    shift: &[T],
    labels: &[usize],
    n_clusters: usize,
) {
    lanes::elkan_update::<T, L>(lower, ldl, upper, shift, labels, n_clusters)
}

#[target_feature(enable = "avx")]
pub unsafe fn sq_diff_sum_avx<T: Real, const L: usize>(
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    m: usize,
) -> T {
    lanes::sq_diff_sum::<T, L>(x, incx, y, incy, m)
}

#[target_feature(enable = "avx2")]
pub unsafe fn sq_diff_sum_avx2<T: Real, const L: usize>(
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    m: usize,
) -> T {
    lanes::sq_diff_sum::<T, L>(x, incx, y, incy, m)
}

#[cfg(feature = "avx512")]
#[target_feature(enable = "avx512f")]
pub unsafe fn sq_diff_sum_avx512<T: Real, const L: usize>(
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    m: usize,
) -> T {
    lanes::sq_diff_sum::<T, L>(x, incx, y, incy, m)
}
