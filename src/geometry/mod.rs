pub mod frechet;
pub mod inverse;
pub mod metric;
pub mod svd;

pub use frechet::{frechet_mean, frechet_mean_batch, geodesic_interpolate};
pub use inverse::{inverse3, inverse3_batch};
pub use metric::{gl_distance, gl_distance_batch, gl_log};
pub use svd::{svd3, svd3_batch, Svd3};
