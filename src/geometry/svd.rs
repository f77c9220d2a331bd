use ndarray::{Array1, Array2, Array3, ArrayView2, ArrayView3, Axis};
use ndarray_linalg::SVD;

use crate::core::{Error, Result};

/// Singular value decomposition M = U diag(S) V^T of one 3x3 matrix.
///
/// Singular values come back descending and non-negative. The input is
/// a general square matrix, not necessarily symmetric; the factors are
/// real orthogonal.
pub struct Svd3 {
    pub u: Array2<f64>,
    pub s: Array1<f64>,
    pub vt: Array2<f64>,
}

/// Decompose a single matrix.
///
/// Backend failure (LAPACK non-convergence, typically from NaN input)
/// propagates as an error; ill-conditioned but finite input does not.
pub fn svd3(m: &ArrayView2<f64>) -> Result<Svd3> {
    let (u, s, vt) = m.svd(true, true)?;
    let u = u.ok_or_else(|| Error::Linalg("svd did not return U".to_string()))?;
    let vt = vt.ok_or_else(|| Error::Linalg("svd did not return V^T".to_string()))?;
    Ok(Svd3 { u, s, vt })
}

/// Batch decomposition over (N, 3, 3); returns (U, S, V^T) stacked as
/// (N, 3, 3), (N, 3), (N, 3, 3).
pub fn svd3_batch(mats: &ArrayView3<f64>) -> Result<(Array3<f64>, Array2<f64>, Array3<f64>)> {
    let n = mats.len_of(Axis(0));
    let mut u_out = Array3::zeros((n, 3, 3));
    let mut s_out = Array2::zeros((n, 3));
    let mut vt_out = Array3::zeros((n, 3, 3));
    for (i, m) in mats.axis_iter(Axis(0)).enumerate() {
        let Svd3 { u, s, vt } = svd3(&m)?;
        u_out.index_axis_mut(Axis(0), i).assign(&u);
        s_out.index_axis_mut(Axis(0), i).assign(&s);
        vt_out.index_axis_mut(Axis(0), i).assign(&vt);
    }
    Ok((u_out, s_out, vt_out))
}
