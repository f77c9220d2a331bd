use ndarray::{s, Array2, Array6};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::core::map::{SpdFeatureMap, MAT_DIM};
use crate::core::{Error, Result};

/// Configuration for the synthetic diffusion-tensor dataset
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub num_samples: usize,
    pub channels: usize,
    pub rows: usize,
    pub cols: usize,
    /// Diagonal shift added to every generated tensor; keeps the
    /// smallest eigenvalue away from zero
    pub diag_shift: f64,
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            num_samples: 120,
            channels: 1,
            rows: 8,
            cols: 8,
            diag_shift: 0.5,
            seed: 42,
        }
    }
}

/// Synthetic SPD feature-map dataset.
///
/// Every 3x3 slice is generated as L L^T + shift * I from a random
/// factor L, so the SPD invariant holds by construction and the
/// tensors stay well conditioned for the closed-form inverse.
pub struct SyntheticSpdDataset {
    config: DatasetConfig,
    samples: Array6<f64>,
}

impl SyntheticSpdDataset {
    pub fn generate(config: DatasetConfig) -> Result<Self> {
        if config.num_samples == 0 {
            return Err(Error::InvalidParameter(
                "dataset needs at least one sample".to_string(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut samples = Array6::zeros((
            config.num_samples,
            config.channels,
            config.rows,
            config.cols,
            MAT_DIM,
            MAT_DIM,
        ));
        for si in 0..config.num_samples {
            for ch in 0..config.channels {
                for r in 0..config.rows {
                    for c in 0..config.cols {
                        let factor =
                            Array2::from_shape_fn((MAT_DIM, MAT_DIM), |_| rng.gen::<f64>() - 0.5);
                        let mut spd = factor.dot(&factor.t());
                        for d in 0..MAT_DIM {
                            spd[[d, d]] += config.diag_shift;
                        }
                        samples.slice_mut(s![si, ch, r, c, .., ..]).assign(&spd);
                    }
                }
            }
        }
        Ok(Self { config, samples })
    }

    pub fn len(&self) -> usize {
        self.config.num_samples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assemble mini-batches for one epoch, optionally shuffled. The
    /// final batch keeps whatever samples remain.
    pub fn batches(&self, batch_size: usize, shuffle: bool, rng: &mut StdRng) -> Vec<SpdFeatureMap> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if shuffle {
            order.shuffle(rng);
        }
        order
            .chunks(batch_size.max(1))
            .map(|chunk| {
                let mut batch = Array6::zeros((
                    chunk.len(),
                    self.config.channels,
                    self.config.rows,
                    self.config.cols,
                    MAT_DIM,
                    MAT_DIM,
                ));
                for (bi, &si) in chunk.iter().enumerate() {
                    batch
                        .slice_mut(s![bi, .., .., .., .., ..])
                        .assign(&self.samples.slice(s![si, .., .., .., .., ..]));
                }
                batch
            })
            .collect()
    }
}
