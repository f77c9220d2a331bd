pub mod conv_cayley;
pub mod conv_fm;
pub mod distance;
pub mod layer;

pub use conv_cayley::CayleyConv;
pub use conv_fm::SpdConv2d;
pub use distance::SpdDistance;
pub use layer::{weight_normalize, ConvOutput, Layer, StateDict};
