use ndarray::{Array2, Array6, ArrayView2};
use ndarray_linalg::{Cholesky, UPLO};

use crate::core::{Error, Result};

/// Side length of every matrix element in a feature map
pub const MAT_DIM: usize = 3;

/// A feature map whose "pixels" are 3x3 SPD matrices, indexed as
/// (batch, channel, row, col, 3, 3). Layers change the channel and
/// spatial extents but never the trailing (3, 3) structure.
pub type SpdFeatureMap = Array6<f64>;

/// Symmetrize: sym(A) = (A + A^T) / 2
///
/// Every layer output that denotes an SPD matrix passes through this
/// before it leaves the layer, so floating error accumulated in matrix
/// products cannot break the symmetry invariant.
pub fn sym(a: &ArrayView2<f64>) -> Array2<f64> {
    0.5 * (a + &a.t())
}

/// (batch, channels, rows, cols) extents of a feature map
pub fn map_dims(x: &SpdFeatureMap) -> (usize, usize, usize, usize) {
    let s = x.shape();
    (s[0], s[1], s[2], s[3])
}

/// Check that a feature map carries 3x3 matrix elements
pub fn check_mat_dims(x: &SpdFeatureMap) -> Result<()> {
    let s = x.shape();
    if s[4] != MAT_DIM || s[5] != MAT_DIM {
        return Err(Error::ShapeMismatch {
            expected: format!("(.., .., .., .., {}, {})", MAT_DIM, MAT_DIM),
            got: format!("{:?}", s),
        });
    }
    Ok(())
}

/// Feature map filled with identity matrices, useful as a neutral input
pub fn identity_map(batch: usize, channels: usize, rows: usize, cols: usize) -> SpdFeatureMap {
    Array6::from_shape_fn(
        (batch, channels, rows, cols, MAT_DIM, MAT_DIM),
        |(_, _, _, _, i, j)| if i == j { 1.0 } else { 0.0 },
    )
}

/// Check if a matrix is symmetric positive definite
pub fn is_spd(p: &ArrayView2<f64>, tolerance: f64) -> bool {
    if p.shape() != [MAT_DIM, MAT_DIM] {
        return false;
    }

    // Check symmetry
    for i in 0..MAT_DIM {
        for j in i + 1..MAT_DIM {
            if (p[[i, j]] - p[[j, i]]).abs() > tolerance {
                return false;
            }
        }
    }

    // Check positive definiteness via Cholesky
    p.cholesky(UPLO::Lower).is_ok()
}
