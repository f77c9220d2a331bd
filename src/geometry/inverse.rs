use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

/// Additive stabilizer for the determinant denominator. Near-singular
/// inputs yield large (possibly inf) entries instead of a division by
/// zero; callers accept this bounded-accuracy behavior.
pub const DET_EPS: f64 = 1e-7;

/// Closed-form inverse of a 3x3 matrix via cofactor expansion.
///
/// inv(B) = adj(B)^T-layout cofactors / (det(B) + eps)
///
/// No iterative refinement and no error path: accuracy is bounded by
/// the epsilon in the denominator.
pub fn inverse3(b: &ArrayView2<f64>) -> Array2<f64> {
    debug_assert_eq!(b.shape(), &[3, 3]);

    let b00 = b[[0, 0]];
    let b01 = b[[0, 1]];
    let b02 = b[[0, 2]];
    let b10 = b[[1, 0]];
    let b11 = b[[1, 1]];
    let b12 = b[[1, 2]];
    let b20 = b[[2, 0]];
    let b21 = b[[2, 1]];
    let b22 = b[[2, 2]];

    let det = b00 * (b11 * b22 - b12 * b21) - b01 * (b10 * b22 - b12 * b20)
        + b02 * (b10 * b21 - b11 * b20);
    let denom = det + DET_EPS;

    let mut inv = Array2::zeros((3, 3));
    inv[[0, 0]] = (b11 * b22 - b12 * b21) / denom;
    inv[[0, 1]] = (b02 * b21 - b01 * b22) / denom;
    inv[[0, 2]] = (b01 * b12 - b02 * b11) / denom;
    inv[[1, 0]] = (b12 * b20 - b10 * b22) / denom;
    inv[[1, 1]] = (b00 * b22 - b02 * b20) / denom;
    inv[[1, 2]] = (b02 * b10 - b00 * b12) / denom;
    inv[[2, 0]] = (b10 * b21 - b11 * b20) / denom;
    inv[[2, 1]] = (b01 * b20 - b00 * b21) / denom;
    inv[[2, 2]] = (b00 * b11 - b01 * b10) / denom;
    inv
}

/// Batch variant of [`inverse3`] over (N, 3, 3)
pub fn inverse3_batch(mats: &ArrayView3<f64>) -> Array3<f64> {
    let n = mats.len_of(Axis(0));
    let mut out = Array3::zeros((n, 3, 3));
    for (i, m) in mats.axis_iter(Axis(0)).enumerate() {
        out.index_axis_mut(Axis(0), i).assign(&inverse3(&m));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array3};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn test_inverse3_recovers_identity() {
        let a = arr2(&[[2.0, 0.5, 0.1], [0.5, 1.0, 0.3], [0.1, 0.3, 1.5]]);
        let inv = inverse3(&a.view());
        let prod = inv.dot(&a);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(prod[[i, j]], expected, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_inverse3_batch_random() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut mats = Array3::zeros((8, 3, 3));
        for mut m in mats.axis_iter_mut(ndarray::Axis(0)) {
            // A A^T + I is well away from singular
            let a = arr2(&[
                [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
                [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
                [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
            ]);
            m.assign(&(a.dot(&a.t()) + ndarray::Array2::<f64>::eye(3)));
        }
        let invs = inverse3_batch(&mats.view());
        for (m, inv) in mats
            .axis_iter(ndarray::Axis(0))
            .zip(invs.axis_iter(ndarray::Axis(0)))
        {
            let prod = inv.dot(&m);
            for i in 0..3 {
                for j in 0..3 {
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert_abs_diff_eq!(prod[[i, j]], expected, epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_inverse3_singular_does_not_panic() {
        // rank-deficient input: entries blow up but nothing raises
        let a = arr2(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [1.0, 1.0, 1.0]]);
        let inv = inverse3(&a.view());
        assert!(inv.iter().all(|v| !v.is_nan()));
    }
}
