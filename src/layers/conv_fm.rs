use ndarray::{s, Array2, Array4, Array6, Ix2};
use rand::Rng;

use crate::core::map::{check_mat_dims, map_dims, SpdFeatureMap, MAT_DIM};
use crate::core::{Error, Result};
use crate::geometry::frechet::frechet_mean_batch;
use crate::layers::layer::{take_param, weight_normalize, ConvOutput, Layer, StateDict};

/// Spatial convolution over SPD feature maps by windowed Fréchet-mean
/// aggregation.
///
/// Every k x k window (valid-only, no padding) is flattened into one
/// sequence of in_channels * k^2 matrices per output location, ordered
/// tap-position major and input-channel minor. Each output channel owns
/// one learned weight row that drives the manifold-mean recursion over
/// that sequence, so spatial aggregation and soft channel selection
/// happen in a single step; there is no separate channel projection.
pub struct SpdConv2d {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    /// (out_channels, in_channels * k^2 - 1), one interpolation weight
    /// per recursion step
    weights: Array2<f64>,
}

impl SpdConv2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
    ) -> Result<Self> {
        for (value, label) in [
            (in_channels, "in_channels"),
            (out_channels, "out_channels"),
            (kernel_size, "kernel_size"),
            (stride, "stride"),
        ] {
            if value == 0 {
                return Err(Error::InvalidParameter(format!("{} must be positive", label)));
            }
        }
        let seq_len = in_channels * kernel_size * kernel_size;
        if seq_len < 2 {
            return Err(Error::InvalidParameter(
                "window sequence needs at least two matrices".to_string(),
            ));
        }
        let mut rng = rand::thread_rng();
        let weights = Array2::from_shape_fn((out_channels, seq_len - 1), |_| rng.gen::<f64>());
        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            stride,
            weights,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Valid-convolution output extents: (dim - k) / stride + 1
    pub fn output_hw(&self, rows: usize, cols: usize) -> Result<(usize, usize)> {
        if rows < self.kernel_size || cols < self.kernel_size {
            return Err(Error::ShapeMismatch {
                expected: format!("spatial dims >= {}", self.kernel_size),
                got: format!("({}, {})", rows, cols),
            });
        }
        Ok((
            (rows - self.kernel_size) / self.stride + 1,
            (cols - self.kernel_size) / self.stride + 1,
        ))
    }

    /// Gather every window into (buckets, seq_len, 3, 3), bucket order
    /// (batch, out_row, out_col)
    fn window_sequences(
        &self,
        x: &SpdFeatureMap,
        out_rows: usize,
        out_cols: usize,
    ) -> Array4<f64> {
        let (batch, channels, _, _) = map_dims(x);
        let k = self.kernel_size;
        let seq_len = channels * k * k;
        let mut seqs = Array4::zeros((batch * out_rows * out_cols, seq_len, MAT_DIM, MAT_DIM));
        for bi in 0..batch {
            for orow in 0..out_rows {
                for ocol in 0..out_cols {
                    let bucket = (bi * out_rows + orow) * out_cols + ocol;
                    for wr in 0..k {
                        for wc in 0..k {
                            let tap = wr * k + wc;
                            for ch in 0..channels {
                                let row = orow * self.stride + wr;
                                let col = ocol * self.stride + wc;
                                seqs.slice_mut(s![bucket, tap * channels + ch, .., ..])
                                    .assign(&x.slice(s![bi, ch, row, col, .., ..]));
                            }
                        }
                    }
                }
            }
        }
        seqs
    }
}

impl Layer for SpdConv2d {
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
        let (out_rows, out_cols) = self.output_hw(rows, cols)?;
        let seqs = self.window_sequences(x, out_rows, out_cols);
        let normalized = weight_normalize(&self.weights.view());

        let mut out = Array6::zeros((batch, self.out_channels, out_rows, out_cols, MAT_DIM, MAT_DIM));
        for oc in 0..self.out_channels {
            let means = frechet_mean_batch(&seqs.view(), &normalized.row(oc))?;
            for bi in 0..batch {
                for orow in 0..out_rows {
                    for ocol in 0..out_cols {
                        let bucket = (bi * out_rows + orow) * out_cols + ocol;
                        out.slice_mut(s![bi, oc, orow, ocol, .., ..])
                            .assign(&means.slice(s![bucket, .., ..]));
                    }
                }
            }
        }
        Ok(ConvOutput {
            features: out,
            aux: 0.0,
        })
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        state.insert("weights".to_string(), self.weights.clone().into_dyn());
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let value = take_param(state, "weights", self.weights.shape())?;
        self.weights = value
            .into_dimensionality::<Ix2>()
            .map_err(|e| Error::ShapeMismatch {
                expected: format!("{:?}", self.weights.shape()),
                got: e.to_string(),
            })?;
        Ok(())
    }
}
