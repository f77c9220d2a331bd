pub mod core;
pub mod geometry;
pub mod io;
pub mod layers;
pub mod model;
pub mod train;

// Flat re-exports for convenience
pub use crate::core::{Error, Result, SpdFeatureMap};

// Re-export layer types
pub use crate::layers::{CayleyConv, ConvOutput, Layer, SpdConv2d, SpdDistance};

// Re-export model and training types
pub use crate::model::{Model, SpdAutoencoder, SpdEmbedding};
pub use crate::train::{DatasetConfig, SyntheticSpdDataset, TrainConfig, Trainer};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::core::{Error, Result, SpdFeatureMap};
    pub use crate::geometry::{frechet_mean, geodesic_interpolate, gl_distance};
    pub use crate::layers::{CayleyConv, ConvOutput, Layer, SpdConv2d, SpdDistance};
    pub use crate::model::{Model, SpdAutoencoder, SpdEmbedding};
    pub use crate::train::{
        DatasetConfig, SyntheticSpdDataset, TrainConfig, TrainReport, Trainer,
    };
}
