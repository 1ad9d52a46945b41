//! Boundary between caller memory and the internal column-major storage.
//!
//! Callers may hand over a raw slice with an explicit leading dimension in
//! either storage order. Everything is copied into an owned column-major
//! buffer before computation, and results are copied back out in the
//! configured order. Caller memory is never written except for output buffers.

use crate::error::{try_filled, Error, Result};
use crate::real::Real;
use ndarray::{Array2, ArrayView2, ShapeBuilder};

/// Storage order of raw matrix slices passed across the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixOrder {
    /// Element `(i, j)` lives at `i + j * ld`
    #[default]
    ColumnMajor,
    /// Element `(i, j)` lives at `i * ld + j`
    RowMajor,
}

/// Build a strided view over a raw slice without copying.
///
/// # Arguments
/// * `data` - Raw storage
/// * `n_rows`, `n_cols` - Logical shape of the matrix
/// * `ld` - Leading dimension (distance between consecutive columns for
///   column-major, between consecutive rows for row-major)
/// * `order` - Storage order of `data`
pub fn view_from_slice<T>(
    data: &[T],
    n_rows: usize,
    n_cols: usize,
    ld: usize,
    order: MatrixOrder,
) -> Result<ArrayView2<'_, T>> {
    if n_rows == 0 || n_cols == 0 {
        return Err(Error::InvalidInput(format!(
            "matrix dimensions must be positive, got {} x {}",
            n_rows, n_cols
        )));
    }

    let (min_ld, outer, inner) = match order {
        MatrixOrder::ColumnMajor => (n_rows, n_cols, n_rows),
        MatrixOrder::RowMajor => (n_cols, n_rows, n_cols),
    };
    if ld < min_ld {
        return Err(Error::InvalidArrayDimension {
            required: min_ld,
            message: format!("leading dimension {} is smaller than {}", ld, min_ld),
        });
    }

    let required = (outer - 1) * ld + inner;
    if data.len() < required {
        return Err(Error::InvalidArrayDimension {
            required,
            message: format!("matrix storage holds {} elements", data.len()),
        });
    }

    let strides = match order {
        MatrixOrder::ColumnMajor => (1, ld),
        MatrixOrder::RowMajor => (ld, 1),
    };
    Ok(ArrayView2::from_shape(
        (n_rows, n_cols).strides(strides),
        &data[..required],
    )?)
}

/// Copy an arbitrarily strided view into an owned, contiguous column-major array.
pub fn to_column_major<T: Real>(view: &ArrayView2<T>) -> Result<Array2<T>> {
    let (n_rows, n_cols) = view.dim();
    let storage = try_filled(n_rows * n_cols, T::zero())?;
    let mut owned = Array2::from_shape_vec((n_rows, n_cols).f(), storage)?;
    owned.assign(view);
    Ok(owned)
}

/// Raw column-major storage of an array produced by [`to_column_major`].
pub(crate) fn column_major_slice<'a, T>(array: &'a Array2<T>) -> Result<&'a [T]> {
    if array.nrows() > 1 && array.strides()[0] != 1 {
        return Err(Error::InvalidInput(
            "internal matrix is not stored column-major".to_string(),
        ));
    }
    array
        .as_slice_memory_order()
        .ok_or_else(|| Error::InvalidInput("internal matrix is not contiguous".to_string()))
}

/// Raw row-major storage of a standard-layout array.
pub(crate) fn row_major_slice<'a, T>(array: &'a Array2<T>) -> Result<&'a [T]> {
    array
        .as_slice()
        .ok_or_else(|| Error::InvalidInput("internal matrix is not row-major".to_string()))
}

/// Copy `src` into a packed caller buffer using the requested storage order.
///
/// Nothing is written when the buffer is too small; the error carries the
/// required length.
pub fn copy_out<T: Copy>(src: &ArrayView2<T>, out: &mut [T], order: MatrixOrder) -> Result<()> {
    let (n_rows, n_cols) = src.dim();
    let required = n_rows * n_cols;
    if out.len() < required {
        return Err(Error::InvalidArrayDimension {
            required,
            message: format!("output buffer holds {} elements", out.len()),
        });
    }
    for ((i, j), &v) in src.indexed_iter() {
        let idx = match order {
            MatrixOrder::ColumnMajor => i + j * n_rows,
            MatrixOrder::RowMajor => i * n_cols + j,
        };
        out[idx] = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_column_major_view_with_leading_dimension() {
        // 2 x 3 matrix stored with ld = 3, the third row is padding
        let data = [1.0f64, 2.0, -9.0, 3.0, 4.0, -9.0, 5.0, 6.0];
        let view = view_from_slice(&data, 2, 3, 3, MatrixOrder::ColumnMajor).unwrap();
        assert_eq!(view, array![[1.0, 3.0, 5.0], [2.0, 4.0, 6.0]]);
    }

    #[test]
    fn test_row_major_view() {
        let data = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        let view = view_from_slice(&data, 3, 2, 2, MatrixOrder::RowMajor).unwrap();
        assert_eq!(view, array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_invalid_leading_dimension() {
        let data = [0.0f64; 6];
        let err = view_from_slice(&data, 3, 2, 2, MatrixOrder::ColumnMajor).unwrap_err();
        assert!(matches!(err, Error::InvalidArrayDimension { required: 3, .. }));
    }

    #[test]
    fn test_storage_too_short() {
        let data = [0.0f64; 5];
        let err = view_from_slice(&data, 3, 2, 3, MatrixOrder::ColumnMajor).unwrap_err();
        assert!(matches!(err, Error::InvalidArrayDimension { required: 6, .. }));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let data = [0.0f64; 4];
        assert!(matches!(
            view_from_slice(&data, 0, 2, 2, MatrixOrder::ColumnMajor),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_to_column_major_and_back() {
        let a = array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let owned = to_column_major(&a.view()).unwrap();
        assert_eq!(
            column_major_slice(&owned).unwrap(),
            &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]
        );

        let mut out = [0.0; 6];
        copy_out(&owned.view(), &mut out, MatrixOrder::RowMajor).unwrap();
        assert_eq!(out, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_copy_out_too_small() {
        let a = array![[1.0f64, 2.0], [3.0, 4.0]];
        let mut out = [7.0; 3];
        let err = copy_out(&a.view(), &mut out, MatrixOrder::ColumnMajor).unwrap_err();
        assert!(matches!(err, Error::InvalidArrayDimension { required: 4, .. }));
        assert_eq!(out, [7.0; 3]);
    }
}
