pub mod dataset;
pub mod optimizer;
pub mod trainer;

pub use dataset::{DatasetConfig, SyntheticSpdDataset};
pub use optimizer::Adam;
pub use trainer::{reconstruction_loss, TrainConfig, TrainReport, Trainer};
