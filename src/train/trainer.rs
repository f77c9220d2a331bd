use std::path::PathBuf;

use ndarray::ArrayD;
use rand::{rngs::StdRng, SeedableRng};

use crate::core::map::SpdFeatureMap;
use crate::core::Result;
use crate::io;
use crate::layers::StateDict;
use crate::model::Model;
use crate::train::dataset::SyntheticSpdDataset;
use crate::train::optimizer::Adam;

/// Training-loop configuration
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Half-width of the central difference used to estimate gradients
    pub fd_step: f64,
    pub shuffle: bool,
    pub seed: u64,
    /// Where to write the state dict after each epoch; None disables
    /// checkpointing
    pub checkpoint: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 150,
            batch_size: 30,
            learning_rate: 0.01,
            fd_step: 1e-4,
            shuffle: true,
            seed: 42,
            checkpoint: None,
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }
}

/// Reconstruction loss: Frobenius norm of (target - output) over the
/// whole batch tensor
pub fn reconstruction_loss(target: &SpdFeatureMap, output: &SpdFeatureMap) -> f64 {
    target
        .iter()
        .zip(output.iter())
        .map(|(t, o)| (t - o) * (t - o))
        .sum::<f64>()
        .sqrt()
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub epochs_run: usize,
    pub epoch_losses: Vec<f64>,
    pub final_loss: f64,
}

/// Fits a model to reconstruct its own input.
///
/// A forward pass is a pure function of the input and the parameters,
/// so gradients are estimated by central finite differences over the
/// state dict and applied with Adam between passes. Nothing touches
/// the parameters concurrently with a forward evaluation.
pub struct Trainer {
    config: TrainConfig,
    optimizer: Adam,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        let optimizer = Adam::new(config.learning_rate);
        Self { config, optimizer }
    }

    pub fn train<M: Model>(
        &mut self,
        model: &mut M,
        dataset: &SyntheticSpdDataset,
    ) -> Result<TrainReport> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut epoch_losses = Vec::with_capacity(self.config.epochs);

        for epoch in 0..self.config.epochs {
            let batches = dataset.batches(self.config.batch_size, self.config.shuffle, &mut rng);
            let mut total = 0.0;
            for batch in &batches {
                let grads = self.numeric_gradient(model, batch)?;
                let mut params = model.state_dict();
                self.optimizer.step(&mut params, &grads)?;
                model.load_state_dict(&params)?;

                let out = model.forward(batch)?;
                let loss = reconstruction_loss(batch, &out);
                tracing::debug!(epoch, loss, "batch complete");
                total += loss;
            }
            let average = total / batches.len() as f64;
            tracing::info!(epoch, average_loss = average, "epoch complete");
            epoch_losses.push(average);

            if let Some(path) = &self.config.checkpoint {
                io::save_state_dict_json(&model.state_dict(), path)?;
            }
        }

        let final_loss = epoch_losses.last().copied().unwrap_or(f64::NAN);
        Ok(TrainReport {
            epochs_run: self.config.epochs,
            epoch_losses,
            final_loss,
        })
    }

    /// Central-difference gradient of the reconstruction loss with
    /// respect to every parameter scalar. The model's parameters are
    /// restored before returning.
    fn numeric_gradient<M: Model>(
        &self,
        model: &mut M,
        batch: &SpdFeatureMap,
    ) -> Result<StateDict> {
        let base = model.state_dict();
        let mut work = base.clone();
        let mut grads = StateDict::new();
        let h = self.config.fd_step;

        for (name, value) in &base {
            let mut grad = ArrayD::zeros(value.raw_dim());
            for (ix, &center) in value.indexed_iter() {
                if let Some(entry) = work.get_mut(name) {
                    entry[ix.clone()] = center + h;
                }
                let loss_plus = eval_loss(model, &work, batch)?;
                if let Some(entry) = work.get_mut(name) {
                    entry[ix.clone()] = center - h;
                }
                let loss_minus = eval_loss(model, &work, batch)?;
                if let Some(entry) = work.get_mut(name) {
                    entry[ix.clone()] = center;
                }
                grad[ix] = (loss_plus - loss_minus) / (2.0 * h);
            }
            grads.insert(name.clone(), grad);
        }

        model.load_state_dict(&base)?;
        Ok(grads)
    }
}

fn eval_loss<M: Model>(model: &mut M, state: &StateDict, batch: &SpdFeatureMap) -> Result<f64> {
    model.load_state_dict(state)?;
    let out = model.forward(batch)?;
    Ok(reconstruction_loss(batch, &out))
}
