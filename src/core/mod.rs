pub mod error;
pub mod map;

pub use error::{Error, Result};
pub use map::{identity_map, is_spd, map_dims, sym, SpdFeatureMap, MAT_DIM};
