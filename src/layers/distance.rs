use ndarray::{s, Array1, Array2, Array3};
use rayon::prelude::*;

use crate::core::map::{check_mat_dims, map_dims, SpdFeatureMap, MAT_DIM};
use crate::core::Result;
use crate::geometry::frechet::frechet_mean;
use crate::geometry::metric::gl_distance_batch;
use crate::layers::layer::{Layer, StateDict};

/// Terminal layer mapping an SPD feature map to a manifold-aware
/// scalar embedding.
///
/// Per (batch, channel) it aggregates all spatial positions into one
/// global Fréchet mean under fixed harmonic-decay weights 1/(i + 2),
/// then emits the GL-metric distance from every sample to its
/// channel's mean. The harmonic schedule makes the recursion an
/// unweighted running mean: step k folds the k-th sample in with
/// fraction 1/(k + 1).
///
/// Output is (batch, channels * rows * cols), suitable as a feature
/// vector for a downstream classifier or regressor. The layer has no
/// trainable parameters.
pub struct SpdDistance;

impl SpdDistance {
    pub fn new() -> Self {
        SpdDistance
    }

    /// Harmonic interpolation weights for a sequence of n samples
    fn harmonic_weights(n: usize) -> Array1<f64> {
        Array1::from_shape_fn(n.saturating_sub(1), |i| 1.0 / (i as f64 + 2.0))
    }
}

impl Default for SpdDistance {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for SpdDistance {
    type Input = SpdFeatureMap;
    type Output = Array2<f64>;

    fn forward(&self, x: &SpdFeatureMap) -> Result<Array2<f64>> {
        check_mat_dims(x)?;
        let (batch, channels, rows, cols) = map_dims(x);
        let n = rows * cols;
        let weights = Self::harmonic_weights(n);

        let per_bucket: Vec<Vec<f64>> = (0..batch * channels)
            .into_par_iter()
            .map(|bucket| {
                let bi = bucket / channels;
                let ch = bucket % channels;

                let mut seq = Array3::zeros((n, MAT_DIM, MAT_DIM));
                for r in 0..rows {
                    for c in 0..cols {
                        seq.slice_mut(s![r * cols + c, .., ..])
                            .assign(&x.slice(s![bi, ch, r, c, .., ..]));
                    }
                }

                // broadcast the channel mean against every sample and
                // run the batched metric over the whole bucket
                let mean = frechet_mean(&seq.view(), &weights.view())?;
                let mut means = Array3::zeros((n, MAT_DIM, MAT_DIM));
                for j in 0..n {
                    means.slice_mut(s![j, .., ..]).assign(&mean);
                }
                let dists = gl_distance_batch(&seq.view(), &means.view())?;
                Ok(dists.to_vec())
            })
            .collect::<Result<_>>()?;

        let mut out = Array2::zeros((batch, channels * n));
        for (bucket, dists) in per_bucket.into_iter().enumerate() {
            let bi = bucket / channels;
            let ch = bucket % channels;
            for (j, d) in dists.into_iter().enumerate() {
                out[[bi, ch * n + j]] = d;
            }
        }
        Ok(out)
    }

    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }
}
