//! Kernel bodies written over `L` independent lanes.
//!
//! The per-lane accumulators are plain arrays so that the compiler can keep
//! them in vector registers once the body is inlined into a function built
//! with the matching `target_feature`.

use crate::real::Real;

#[inline(always)]
pub fn assign<T: Real, const L: usize>(
    work: &[T],
    ldw: usize,
    norms: &[T],
    labels: &mut [usize],
    mut counts: Option<&mut [usize]>,
    n_clusters: usize,
) {
    let n_chunks = n_clusters.div_ceil(L);
    let width = n_chunks * L;
    let norms = &norms[..width];

    for (i, label) in labels.iter_mut().enumerate() {
        let row = &work[i * ldw..i * ldw + width];
        let mut best = [T::infinity(); L];
        let mut best_idx = [0usize; L];

        for (c, (dist, norm)) in row.chunks_exact(L).zip(norms.chunks_exact(L)).enumerate() {
            for l in 0..L {
                let value = dist[l] + norm[l];
                let closer = value < best[l];
                best[l] = if closer { value } else { best[l] };
                best_idx[l] = if closer { c * L + l } else { best_idx[l] };
            }
        }

        let mut min = best[0];
        let mut min_idx = best_idx[0];
        for l in 1..L {
            if best[l] < min || (best[l] == min && best_idx[l] < min_idx) {
                min = best[l];
                min_idx = best_idx[l];
            }
        }

        *label = min_idx;
        if let Some(counts) = counts.as_deref_mut() {
            counts[min_idx] += 1;
        }
    }
}

#[inline(always)]
pub fn elkan_update<T: Real, const L: usize>(
    lower: &mut [T],
    ldl: usize,
    upper: &mut [T],
    shift: &[T],
    labels: &[usize],
    n_clusters: usize,
) {
    let width = n_clusters.div_ceil(L) * L;
    let shift = &shift[..width];

    for (i, (u, &label)) in upper.iter_mut().zip(labels).enumerate() {
        *u += shift[label];
        let row = &mut lower[i * ldl..i * ldl + width];
        for (bounds, s) in row.chunks_exact_mut(L).zip(shift.chunks_exact(L)) {
            for l in 0..L {
                bounds[l] = (bounds[l] - s[l]).max(T::zero());
            }
        }
    }
}

#[inline(always)]
pub fn sq_diff_sum<T: Real, const L: usize>(
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    m: usize,
) -> T {
    let mut acc = [T::zero(); L];
    let main = m - m % L;

    let mut k = 0;
    while k < main {
        for l in 0..L {
            let d = x[(k + l) * incx] - y[(k + l) * incy];
            acc[l] += d * d;
        }
        k += L;
    }

    let mut sum = T::zero();
    for k in main..m {
        let d = x[k * incx] - y[k * incy];
        sum += d * d;
    }
    acc.iter().fold(sum, |s, &a| s + a)
}
