use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Axis};
use rayon::prelude::*;

use crate::core::map::sym;
use crate::core::{Error, Result};
use crate::geometry::inverse::inverse3;
use crate::geometry::metric::SV_FLOOR;
use crate::geometry::svd::{svd3, Svd3};

/// Move from A toward B along the manifold geodesic by fraction t:
///
/// interp(A, B, t) = sym(A (A^{-1} B)^t)
///
/// The fractional power goes through the same inverse + SVD pipeline
/// as the metric logarithm: (A^{-1} B)^t ~ U diag(S^t) V^T. The result
/// is explicitly symmetrized; positive definiteness holds only up to
/// the epsilon tolerances of the underlying inverse and decomposition.
pub fn geodesic_interpolate(a: &ArrayView2<f64>, b: &ArrayView2<f64>, t: f64) -> Result<Array2<f64>> {
    let inner = inverse3(a).dot(b);
    let Svd3 { u, s, vt } = svd3(&inner.view())?;
    let s_pow = s.mapv(|v| v.max(SV_FLOOR).powf(t));
    let powered = u.dot(&Array2::from_diag(&s_pow)).dot(&vt);
    let stepped = a.dot(&powered);
    Ok(sym(&stepped.view()))
}

/// Weighted Fréchet mean of a sequence of SPD matrices by online
/// recursive update:
///
/// mean_1 = x_1
/// mean_k = interp(mean_{k-1}, x_k, w_{k-1})   for k = 2..N
///
/// The recursion is order-dependent: the weight at step k sets how far
/// the incoming sample pulls the running mean, and samples are folded
/// in presentation order. This trades exact Fréchet optimality for a
/// single O(N) pass instead of a fixed-point search.
///
/// A sequence of N matrices requires exactly N - 1 weights; any other
/// length is a configuration bug and fails fast. N = 1 returns the
/// single input unchanged without consulting the weights.
pub fn frechet_mean(seq: &ArrayView3<f64>, weights: &ArrayView1<f64>) -> Result<Array2<f64>> {
    let n = seq.len_of(Axis(0));
    if n == 0 {
        return Err(Error::InvalidParameter(
            "cannot average an empty sequence".to_string(),
        ));
    }
    if n == 1 {
        return Ok(seq.index_axis(Axis(0), 0).to_owned());
    }
    if weights.len() != n - 1 {
        return Err(Error::WeightLength {
            sequence: n,
            expected: n - 1,
            got: weights.len(),
        });
    }

    let mut mean = seq.index_axis(Axis(0), 0).to_owned();
    for k in 1..n {
        mean = geodesic_interpolate(&mean.view(), &seq.index_axis(Axis(0), k), weights[k - 1])?;
    }
    Ok(mean)
}

/// Fréchet mean of many independent buckets, (buckets, N, 3, 3) in,
/// (buckets, 3, 3) out. Buckets run in parallel; the recursion inside
/// each bucket is inherently sequential.
pub fn frechet_mean_batch(
    seqs: &ArrayView4<f64>,
    weights: &ArrayView1<f64>,
) -> Result<Array3<f64>> {
    let buckets = seqs.len_of(Axis(0));
    let n = seqs.len_of(Axis(1));
    if n > 1 && weights.len() != n - 1 {
        return Err(Error::WeightLength {
            sequence: n,
            expected: n - 1,
            got: weights.len(),
        });
    }

    let means: Vec<Array2<f64>> = (0..buckets)
        .into_par_iter()
        .map(|i| frechet_mean(&seqs.index_axis(Axis(0), i), weights))
        .collect::<Result<_>>()?;

    let mut out = Array3::zeros((buckets, 3, 3));
    for (i, mean) in means.into_iter().enumerate() {
        out.index_axis_mut(Axis(0), i).assign(&mean);
    }
    Ok(out)
}
