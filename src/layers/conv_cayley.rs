use ndarray::{s, Array1, Array2, Array3, Array6, Axis, Ix1};
use rand::Rng;

use crate::core::map::{check_mat_dims, map_dims, SpdFeatureMap, MAT_DIM};
use crate::core::{Error, Result};
use crate::geometry::inverse::inverse3_batch;
use crate::layers::layer::{take_param, ConvOutput, Layer, StateDict};

/// Spatial convolution over SPD feature maps by per-tap congruence.
///
/// Each kernel tap carries a conjugation matrix G = first^{-1} second
/// built Cayley-style from a skew-symmetric-like generator pair, so G
/// is close to orthogonal and X -> G X G^T keeps the input symmetric
/// and near positive-definite. Per-tap results are overlap-added back
/// onto a grid that grows by k - 1 in each spatial dim, then input
/// channels are mixed into output channels by the squared entries of a
/// learned matrix, entrywise over the 3x3.
///
/// Cheaper than a Fréchet mean per tap, at the cost of geometric
/// fidelity: congruence plus non-negative channel mixing only keeps
/// the output approximately on the manifold, so the result is
/// symmetrized explicitly before it leaves the layer.
pub struct CayleyConv {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    /// (k^2 - 1) * 2 generator scalars followed by in * out channel
    /// mixing entries, packed flat
    generator: Array1<f64>,
}

impl CayleyConv {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: usize, stride: usize) -> Result<Self> {
        for (value, label) in [
            (in_channels, "in_channels"),
            (out_channels, "out_channels"),
            (kernel_size, "kernel_size"),
        ] {
            if value == 0 {
                return Err(Error::InvalidParameter(format!("{} must be positive", label)));
            }
        }
        if stride != 1 {
            return Err(Error::InvalidParameter(
                "congruence convolution supports stride 1 only".to_string(),
            ));
        }
        let len = Self::param_len(in_channels, out_channels, kernel_size);
        let mut rng = rand::thread_rng();
        let generator = Array1::from_shape_fn(len, |_| rng.gen::<f64>() - 0.5);
        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            generator,
        })
    }

    pub fn param_len(in_channels: usize, out_channels: usize, kernel_size: usize) -> usize {
        (kernel_size * kernel_size - 1) * 2 + in_channels * out_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Overlap-add output extents: dim + k - 1
    pub fn output_hw(&self, rows: usize, cols: usize) -> (usize, usize) {
        (rows + self.kernel_size - 1, cols + self.kernel_size - 1)
    }

    /// Build the (first, second) generator pair for every tap in one
    /// precomputed tensor indexed by tap position. The center tap is
    /// the identity; the last tap reuses generator slot k/2; every
    /// other tap i reads slot i. Within a slot the two off-diagonal
    /// magnitudes share one scalar.
    fn tap_generators(&self) -> (Array3<f64>, Array3<f64>) {
        let k = self.kernel_size;
        let full_kernel = k * k;
        let kernel = self.generator.slice(s![..(full_kernel - 1) * 2]);
        let slot = |i: usize| if i == full_kernel - 1 { k / 2 } else { i };

        let first = Array3::from_shape_fn((full_kernel, MAT_DIM, MAT_DIM), |(i, r, c)| {
            if i == full_kernel / 2 {
                return if r == c { 1.0 } else { 0.0 };
            }
            let a = kernel[2 * slot(i)];
            let cc = kernel[2 * slot(i) + 1];
            match (r, c) {
                (0, 0) | (1, 1) | (2, 2) => 1.0,
                (0, 1) | (0, 2) => -a,
                (1, 0) | (2, 0) => a,
                (1, 2) => -cc,
                (2, 1) => cc,
                _ => unreachable!(),
            }
        });
        let second = Array3::from_shape_fn((full_kernel, MAT_DIM, MAT_DIM), |(i, r, c)| {
            if i == full_kernel / 2 {
                return if r == c { 1.0 } else { 0.0 };
            }
            let a = kernel[2 * slot(i)];
            let cc = kernel[2 * slot(i) + 1];
            match (r, c) {
                (0, 0) | (1, 1) | (2, 2) => 1.0,
                (0, 1) | (0, 2) => a,
                (1, 0) | (2, 0) => -a,
                (1, 2) => cc,
                (2, 1) => -cc,
                _ => unreachable!(),
            }
        });
        (first, second)
    }

    /// Squared entries of the channel-mixing block, (in, out)
    fn channel_mixing(&self) -> Array2<f64> {
        let k = self.kernel_size;
        let flat = self
            .generator
            .slice(s![(k * k - 1) * 2..])
            .mapv(|v| v * v);
        flat.into_shape((self.in_channels, self.out_channels))
            .expect("mixing block length is in * out by construction")
    }
}

impl Layer for CayleyConv {
    type Input = SpdFeatureMap;
    type Output = ConvOutput;

    fn forward(&self, x: &SpdFeatureMap) -> Result<ConvOutput> {
        check_mat_dims(x)?;
        let (batch, channels, rows, cols) = map_dims(x);
        if channels != self.in_channels {
            return Err(Error::DimensionMismatch {
                expected: self.in_channels,
                got: channels,
            });
        }
        let k = self.kernel_size;
        let (out_rows, out_cols) = self.output_hw(rows, cols);

        let (first, second) = self.tap_generators();
        let inversed = inverse3_batch(&first.view());
        let mut conjugators = Array3::zeros((k * k, MAT_DIM, MAT_DIM));
        for tap in 0..k * k {
            let g = inversed
                .index_axis(Axis(0), tap)
                .dot(&second.index_axis(Axis(0), tap));
            conjugators.index_axis_mut(Axis(0), tap).assign(&g);
        }

        // Conjugate every pixel by every tap and overlap-add the
        // contributions onto the grown output grid.
        let mut folded = Array6::zeros((batch, channels, out_rows, out_cols, MAT_DIM, MAT_DIM));
        for bi in 0..batch {
            for ch in 0..channels {
                for r in 0..rows {
                    for c in 0..cols {
                        let x_mat = x.slice(s![bi, ch, r, c, .., ..]);
                        for wr in 0..k {
                            for wc in 0..k {
                                let g = conjugators.index_axis(Axis(0), wr * k + wc);
                                let conjugated = g.dot(&x_mat).dot(&g.t());
                                let mut cell =
                                    folded.slice_mut(s![bi, ch, r + wr, c + wc, .., ..]);
                                cell += &conjugated;
                            }
                        }
                    }
                }
            }
        }

        // Mix input channels into output channels, independently for
        // each of the nine matrix entries.
        let mixing = self.channel_mixing();
        let mut out = Array6::zeros((batch, self.out_channels, out_rows, out_cols, MAT_DIM, MAT_DIM));
        for bi in 0..batch {
            for orow in 0..out_rows {
                for ocol in 0..out_cols {
                    for i in 0..MAT_DIM {
                        for j in 0..MAT_DIM {
                            for oc in 0..self.out_channels {
                                let mut acc = 0.0;
                                for ch in 0..channels {
                                    acc += folded[[bi, ch, orow, ocol, i, j]] * mixing[[ch, oc]];
                                }
                                out[[bi, oc, orow, ocol, i, j]] = acc;
                            }
                        }
                    }
                }
            }
        }

        let transposed = out.clone().permuted_axes([0, 1, 2, 3, 5, 4]);
        let result = 0.5 * (&out + &transposed);
        Ok(ConvOutput {
            features: result,
            aux: 0.0,
        })
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("generator".to_string(), self.generator.clone().into_dyn());
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let value = take_param(state, "generator", self.generator.shape())?;
        self.generator = value
            .into_dimensionality::<Ix1>()
            .map_err(|e| Error::ShapeMismatch {
                expected: format!("{:?}", self.generator.shape()),
                got: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::map::identity_map;
    use approx::assert_abs_diff_eq;
    use ndarray::ArrayD;

    #[test]
    fn test_output_grows_by_kernel_minus_one() {
        let layer = CayleyConv::new(2, 3, 3, 1).unwrap();
        let x = identity_map(1, 2, 4, 4);
        let out = layer.forward(&x).unwrap();
        assert_eq!(out.features.shape(), &[1, 3, 6, 6, 3, 3]);
        assert_eq!(out.aux, 0.0);
    }

    #[test]
    fn test_param_len() {
        assert_eq!(CayleyConv::param_len(2, 3, 3), 16 + 6);
        let layer = CayleyConv::new(2, 3, 3, 1).unwrap();
        assert_eq!(layer.state_dict()["generator"].len(), 22);
    }

    #[test]
    fn test_stride_other_than_one_rejected() {
        assert!(CayleyConv::new(1, 1, 3, 2).is_err());
    }

    #[test]
    fn test_output_is_symmetric() {
        let layer = CayleyConv::new(1, 1, 3, 1).unwrap();
        let mut x = identity_map(2, 1, 4, 4);
        for r in 0..4 {
            for c in 0..4 {
                x[[0, 0, r, c, 0, 0]] = 2.0;
                x[[0, 0, r, c, 0, 1]] = 0.3;
                x[[0, 0, r, c, 1, 0]] = 0.3;
            }
        }
        let out = layer.forward(&x).unwrap().features;
        for bi in 0..2 {
            for orow in 0..6 {
                for ocol in 0..6 {
                    for i in 0..3 {
                        for j in 0..3 {
                            assert_abs_diff_eq!(
                                out[[bi, 0, orow, ocol, i, j]],
                                out[[bi, 0, orow, ocol, j, i]],
                                epsilon = 1e-12
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_zero_generator_passes_corner_through() {
        // zero generators make every tap the (near) identity; with a
        // unit mixing entry the (0, 0) output corner receives exactly
        // one contribution, the top-left pixel through tap (0, 0)
        let mut layer = CayleyConv::new(1, 1, 3, 1).unwrap();
        let mut params = vec![0.0; CayleyConv::param_len(1, 1, 3)];
        *params.last_mut().unwrap() = 1.0;
        let mut state = StateDict::new();
        state.insert(
            "generator".to_string(),
            ArrayD::from_shape_vec(ndarray::IxDyn(&[params.len()]), params).unwrap(),
        );
        layer.load_state_dict(&state).unwrap();

        let x = identity_map(1, 1, 4, 4);
        let out = layer.forward(&x).unwrap().features;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(out[[0, 0, 0, 0, i, j]], expected, epsilon = 1e-4);
            }
        }
    }
}
