//! Vector kernels used by the Lloyd and Elkan iterations.
//!
//! Each kernel has one generic body in [`lanes`] written over a fixed number
//! of lanes, and is compiled once per instruction set in `x86`. The width is
//! chosen once per computation from small per-precision threshold tables,
//! then capped by what the running CPU supports. A [`Selected`] width can only
//! be produced by that capping step, which is what makes the `unsafe` calls in
//! the dispatch functions sound.

mod lanes;
#[cfg(target_arch = "x86_64")]
mod x86;

use crate::real::Real;

/// Vector width of a kernel variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KernelWidth {
    /// One element at a time
    Scalar,
    /// 128-bit lanes
    Avx,
    /// 256-bit lanes
    Avx2,
    /// 512-bit lanes (needs the `avx512` cargo feature)
    Avx512,
}

impl KernelWidth {
    /// Number of `T` elements processed together.
    pub fn lanes<T: Real>(self) -> usize {
        match self {
            KernelWidth::Scalar => 1,
            KernelWidth::Avx => 16 / T::BYTES,
            KernelWidth::Avx2 => 32 / T::BYTES,
            KernelWidth::Avx512 => 64 / T::BYTES,
        }
    }

    /// Extra trailing columns needed so the last cluster chunk can be read as
    /// full lanes.
    pub fn padding<T: Real>(self) -> usize {
        match self {
            KernelWidth::Scalar => 0,
            width => width.lanes::<T>(),
        }
    }
}

/// Widest kernel the running CPU can execute.
pub fn detected_width() -> KernelWidth {
    #[cfg(target_arch = "x86_64")]
    {
        #[cfg(feature = "avx512")]
        if is_x86_feature_detected!("avx512f") {
            return KernelWidth::Avx512;
        }
        if is_x86_feature_detected!("avx2") {
            return KernelWidth::Avx2;
        }
        if is_x86_feature_detected!("avx") {
            return KernelWidth::Avx;
        }
    }
    KernelWidth::Scalar
}

/// A width the running CPU is known to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Selected(KernelWidth);

impl Selected {
    pub(crate) fn cap(requested: KernelWidth) -> Self {
        Selected(requested.min(detected_width()))
    }

    pub(crate) fn width(self) -> KernelWidth {
        self.0
    }

    pub(crate) fn padding<T: Real>(self) -> usize {
        self.0.padding::<T>()
    }
}

/// Inclusive upper bound on the keyed parameter, and the width used up to it.
type Table = &'static [(usize, KernelWidth)];

const LLOYD_F32: Table = &[(2, KernelWidth::Scalar), (16, KernelWidth::Avx), (usize::MAX, KernelWidth::Avx2)];
const LLOYD_F64: Table = &[(6, KernelWidth::Avx), (usize::MAX, KernelWidth::Avx2)];
const ELKAN_UPDATE_F32: Table = &[(4, KernelWidth::Avx), (usize::MAX, KernelWidth::Avx2)];
const ELKAN_UPDATE_F64: Table = &[(usize::MAX, KernelWidth::Avx2)];
const ELKAN_REDUCE_F32: Table = &[(usize::MAX, KernelWidth::Scalar)];
const ELKAN_REDUCE_F64: Table = &[(4, KernelWidth::Scalar), (16, KernelWidth::Avx), (usize::MAX, KernelWidth::Avx2)];

// Tables for CPUs with 512-bit registers
const WIDE_LLOYD_F32: Table = &[(4, KernelWidth::Scalar), (16, KernelWidth::Avx), (usize::MAX, KernelWidth::Avx2)];
const WIDE_LLOYD_F64: Table = &[
    (4, KernelWidth::Scalar),
    (6, KernelWidth::Avx),
    (19, KernelWidth::Avx2),
    (usize::MAX, KernelWidth::Avx512),
];
const WIDE_ELKAN_UPDATE_F64: Table = &[(6, KernelWidth::Avx), (15, KernelWidth::Avx2), (usize::MAX, KernelWidth::Avx512)];
const WIDE_ELKAN_REDUCE_F32: Table = &[(usize::MAX, KernelWidth::Avx)];
const WIDE_ELKAN_REDUCE_F64: Table = &[
    (4, KernelWidth::Scalar),
    (8, KernelWidth::Avx),
    (15, KernelWidth::Avx2),
    (usize::MAX, KernelWidth::Avx512),
];

fn lookup(table: Table, param: usize) -> KernelWidth {
    table
        .iter()
        .find(|(threshold, _)| param <= *threshold)
        .map(|&(_, width)| width)
        .unwrap_or(KernelWidth::Scalar)
}

fn is_f32<T: Real>() -> bool {
    T::BYTES == 4
}

fn wide_tables() -> bool {
    detected_width() == KernelWidth::Avx512
}

/// Width and padding for the Lloyd assignment kernel.
pub(crate) fn select_lloyd<T: Real>(n_clusters: usize, pinned: Option<KernelWidth>) -> Selected {
    let width = pinned.unwrap_or_else(|| {
        let table = match (is_f32::<T>(), wide_tables()) {
            (true, false) => LLOYD_F32,
            (false, false) => LLOYD_F64,
            (true, true) => WIDE_LLOYD_F32,
            (false, true) => WIDE_LLOYD_F64,
        };
        lookup(table, n_clusters)
    });
    let selected = Selected::cap(width);
    tracing::debug!(
        width = ?selected.width(),
        padding = selected.padding::<T>(),
        n_clusters,
        "selected Lloyd kernel"
    );
    selected
}

/// Widths for the Elkan bound-update and reduction kernels. The padding of
/// the bound arrays comes from the update kernel.
pub(crate) fn select_elkan<T: Real>(
    n_clusters: usize,
    n_features: usize,
    pinned: Option<KernelWidth>,
) -> (Selected, Selected) {
    let (update, reduce) = match pinned {
        Some(width) => (width, width),
        None => {
            let wide = wide_tables();
            let (update_table, reduce_table) = match (is_f32::<T>(), wide) {
                (true, false) => (ELKAN_UPDATE_F32, ELKAN_REDUCE_F32),
                (false, false) => (ELKAN_UPDATE_F64, ELKAN_REDUCE_F64),
                (true, true) => (ELKAN_UPDATE_F32, WIDE_ELKAN_REDUCE_F32),
                (false, true) => (WIDE_ELKAN_UPDATE_F64, WIDE_ELKAN_REDUCE_F64),
            };
            (lookup(update_table, n_clusters), lookup(reduce_table, n_features))
        }
    };
    let (update, reduce) = (Selected::cap(update), Selected::cap(reduce));
    tracing::debug!(
        update = ?update.width(),
        reduce = ?reduce.width(),
        padding = update.padding::<T>(),
        "selected Elkan kernels"
    );
    (update, reduce)
}

macro_rules! dispatch {
    ($selected:expr, $kernel:ident, $avx:ident, $avx2:ident, $avx512:ident, ($($arg:expr),* $(,)?)) => {{
        let width = $selected.width();
        match (width, width.lanes::<T>()) {
            // SAFETY: `Selected` widths never exceed `detected_width()`.
            #[cfg(target_arch = "x86_64")]
            (KernelWidth::Avx, 2) => unsafe { x86::$avx::<T, 2>($($arg),*) },
            #[cfg(target_arch = "x86_64")]
            (KernelWidth::Avx, 4) => unsafe { x86::$avx::<T, 4>($($arg),*) },
            #[cfg(target_arch = "x86_64")]
            (KernelWidth::Avx2, 4) => unsafe { x86::$avx2::<T, 4>($($arg),*) },
            #[cfg(target_arch = "x86_64")]
            (KernelWidth::Avx2, 8) => unsafe { x86::$avx2::<T, 8>($($arg),*) },
            #[cfg(all(target_arch = "x86_64", feature = "avx512"))]
            (KernelWidth::Avx512, 8) => unsafe { x86::$avx512::<T, 8>($($arg),*) },
            #[cfg(all(target_arch = "x86_64", feature = "avx512"))]
            (KernelWidth::Avx512, 16) => unsafe { x86::$avx512::<T, 16>($($arg),*) },
            _ => lanes::$kernel::<T, 1>($($arg),*),
        }
    }};
}

/// Assign each row of a block to its closest centre.
///
/// `work` holds `labels.len()` rows of `ldw` values, the first `n_clusters`
/// of which are `-2 a·c`; `norms` holds `ldw` centre norms, with `+inf`
/// in the padding. Ties go to the lowest cluster index. When `counts` is
/// given, the chosen cluster's count is incremented.
pub(crate) fn assign<T: Real>(
    selected: Selected,
    work: &[T],
    ldw: usize,
    norms: &[T],
    labels: &mut [usize],
    counts: Option<&mut [usize]>,
    n_clusters: usize,
) {
    dispatch!(
        selected,
        assign,
        assign_avx,
        assign_avx2,
        assign_avx512,
        (work, ldw, norms, labels, counts, n_clusters)
    )
}

/// Shift the Elkan bounds of a block after the centres moved.
///
/// `upper[i] += shift[labels[i]]` and `lower[i, j] = max(0, lower[i, j] - shift[j])`,
/// where `lower` has `ldl` columns and `shift` is zero past `n_clusters`.
pub(crate) fn elkan_update<T: Real>(
    selected: Selected,
    lower: &mut [T],
    ldl: usize,
    upper: &mut [T],
    shift: &[T],
    labels: &[usize],
    n_clusters: usize,
) {
    dispatch!(
        selected,
        elkan_update,
        elkan_update_avx,
        elkan_update_avx2,
        elkan_update_avx512,
        (lower, ldl, upper, shift, labels, n_clusters)
    )
}

/// `Σ (x[k * incx] - y[k * incy])²` for `k < m`.
#[inline]
pub(crate) fn sq_diff_sum<T: Real>(
    selected: Selected,
    x: &[T],
    incx: usize,
    y: &[T],
    incy: usize,
    m: usize,
) -> T {
    dispatch!(
        selected,
        sq_diff_sum,
        sq_diff_sum_avx,
        sq_diff_sum_avx2,
        sq_diff_sum_avx512,
        (x, incx, y, incy, m)
    )
}
