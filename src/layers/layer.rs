use std::collections::BTreeMap;

use ndarray::{Array, ArrayD, ArrayView, Dimension};

use crate::core::map::SpdFeatureMap;
use crate::core::{Error, Result};

/// Lower clamp for interpolation weights
pub const WEIGHT_MIN: f64 = 0.001;
/// Upper clamp for interpolation weights
pub const WEIGHT_MAX: f64 = 0.999;

/// Named trainable parameters, exported as dynamic-dimensional arrays
/// so any serializer that round-trips floats by name can persist them.
pub type StateDict = BTreeMap<String, ArrayD<f64>>;

/// Clamp every weight into [0.001, 0.999], out of place. The raw
/// parameter stays untouched so gradient updates see the unclamped
/// values.
pub fn weight_normalize<D: Dimension>(weights: &ArrayView<f64, D>) -> Array<f64, D> {
    weights.mapv(|w| w.clamp(WEIGHT_MIN, WEIGHT_MAX))
}

/// Forward output of a convolution layer: the transformed feature map
/// plus a constant auxiliary scalar. No auxiliary loss term consumes
/// it in the reconstruction configuration; it is part of the layer
/// interface and stays zero.
pub struct ConvOutput {
    pub features: SpdFeatureMap,
    pub aux: f64,
}

/// A layer in an SPD network.
///
/// Forward passes are pure functions of the input and the parameters;
/// parameters are only mutated between passes through
/// [`Layer::load_state_dict`].
pub trait Layer {
    type Input;
    type Output;

    fn forward(&self, input: &Self::Input) -> Result<Self::Output>;

    /// Snapshot of the trainable parameters, keyed by name. Layers
    /// without parameters return an empty map.
    fn state_dict(&self) -> StateDict {
        StateDict::new()
    }

    /// Restore parameters from a snapshot. Shapes must match exactly.
    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        let _ = state;
        Ok(())
    }
}

/// Pull one named array out of a state dict and check its shape
pub fn take_param(state: &StateDict, name: &str, shape: &[usize]) -> Result<ArrayD<f64>> {
    let value = state
        .get(name)
        .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;
    if value.shape() != shape {
        return Err(Error::ShapeMismatch {
            expected: format!("{:?}", shape),
            got: format!("{:?}", value.shape()),
        });
    }
    Ok(value.clone())
}
