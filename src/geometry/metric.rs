use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};

use crate::core::{Error, Result};
use crate::geometry::inverse::{inverse3, inverse3_batch};
use crate::geometry::svd::{svd3, svd3_batch, Svd3};

/// Singular values are clamped to this floor before the logarithm so
/// ill-conditioned inputs shift the result instead of producing -inf.
pub const SV_FLOOR: f64 = 1e-7;

/// Matrix logarithm term of the GL metric between two SPD matrices:
///
/// L = U diag(ln S) V^T  where  X^{-1} Y = U diag(S) V^T
///
/// This linearizes the SPD manifold around X so distances behave like
/// Riemannian geodesic lengths rather than Frobenius differences.
/// X is inverted and Y is not, so the construction is NOT symmetric
/// in its arguments.
pub fn gl_log(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let inner = inverse3(x).dot(y);
    let Svd3 { u, s, vt } = svd3(&inner.view())?;
    let s_log = s.mapv(|v| v.max(SV_FLOOR).ln());
    Ok(u.dot(&Array2::from_diag(&s_log)).dot(&vt))
}

/// Geodesic distance under the GL metric: tr(L L) for L = gl_log(X, Y).
///
/// Non-negative in exact arithmetic; floating error can push it
/// slightly negative, so callers compare with tolerance.
pub fn gl_distance(x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> Result<f64> {
    let log_term = gl_log(x, y)?;
    let squared = log_term.dot(&log_term);
    Ok(squared.diag().sum())
}

/// Elementwise distances between two equal-length batches of SPD
/// matrices, run through the batched inverse and decomposition
/// primitives in one pipeline.
pub fn gl_distance_batch(x: &ArrayView3<f64>, y: &ArrayView3<f64>) -> Result<Array1<f64>> {
    let n = x.len_of(Axis(0));
    if y.len_of(Axis(0)) != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: y.len_of(Axis(0)),
        });
    }

    let x_inv = inverse3_batch(x);
    let mut inner = Array3::zeros((n, 3, 3));
    for i in 0..n {
        let product = x_inv
            .index_axis(Axis(0), i)
            .dot(&y.index_axis(Axis(0), i));
        inner.index_axis_mut(Axis(0), i).assign(&product);
    }

    let (u, s, vt) = svd3_batch(&inner.view())?;
    let mut dists = Array1::zeros(n);
    for i in 0..n {
        let s_log = s.index_axis(Axis(0), i).mapv(|v| v.max(SV_FLOOR).ln());
        let log_term = u
            .index_axis(Axis(0), i)
            .dot(&Array2::from_diag(&s_log))
            .dot(&vt.index_axis(Axis(0), i));
        let squared = log_term.dot(&log_term);
        dists[i] = squared.diag().sum();
    }
    Ok(dists)
}
