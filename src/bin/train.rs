use tracing_subscriber::EnvFilter;

use spdnet::model::{Model, SpdAutoencoder};
use spdnet::train::{DatasetConfig, SyntheticSpdDataset, TrainConfig, Trainer};
use spdnet::{io, Result};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let dataset = SyntheticSpdDataset::generate(DatasetConfig::default())?;
    let mut model = SpdAutoencoder::new(1, 4, 3)?;
    tracing::info!(parameters = model.num_parameters(), "model built");

    let config = TrainConfig::new()
        .with_epochs(20)
        .with_batch_size(30)
        .with_learning_rate(0.01)
        .with_checkpoint("checkpoint.json");
    let mut trainer = Trainer::new(config);

    let report = trainer.train(&mut model, &dataset)?;
    tracing::info!(
        epochs = report.epochs_run,
        final_loss = report.final_loss,
        "training finished"
    );

    io::save_state_dict_json(&model.state_dict(), "model.json")?;
    Ok(())
}
