use ndarray::Array2;

use crate::core::map::SpdFeatureMap;
use crate::core::{Error, Result};
use crate::layers::{CayleyConv, Layer, SpdConv2d, SpdDistance, StateDict};

/// A trainable network over SPD feature maps. Composition only: a
/// model wires layers into a sequence and merges their parameter
/// dictionaries under prefixed names; all geometry lives in the
/// layers.
pub trait Model {
    fn forward(&self, input: &SpdFeatureMap) -> Result<SpdFeatureMap>;

    fn state_dict(&self) -> StateDict;

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()>;

    fn num_parameters(&self) -> usize {
        self.state_dict().values().map(|v| v.len()).sum()
    }
}

fn with_prefix(prefix: &str, state: StateDict) -> StateDict {
    state
        .into_iter()
        .map(|(name, value)| (format!("{}.{}", prefix, name), value))
        .collect()
}

fn strip_prefix(prefix: &str, state: &StateDict) -> Result<StateDict> {
    let needle = format!("{}.", prefix);
    let sub: StateDict = state
        .iter()
        .filter(|(name, _)| name.starts_with(&needle))
        .map(|(name, value)| (name[needle.len()..].to_string(), value.clone()))
        .collect();
    if sub.is_empty() {
        return Err(Error::UnknownParameter(format!("{}.*", prefix)));
    }
    Ok(sub)
}

/// Reconstruction autoencoder: a windowed Fréchet-mean convolution
/// shrinks each spatial dim by k - 1 and a congruence convolution
/// grows it back, so the output shape equals the input shape and the
/// network can be fit against its own input.
pub struct SpdAutoencoder {
    encoder: SpdConv2d,
    decoder: CayleyConv,
}

impl SpdAutoencoder {
    pub fn new(channels: usize, hidden_channels: usize, kernel_size: usize) -> Result<Self> {
        Ok(Self {
            encoder: SpdConv2d::new(channels, hidden_channels, kernel_size, 1)?,
            decoder: CayleyConv::new(hidden_channels, channels, kernel_size, 1)?,
        })
    }
}

impl Model for SpdAutoencoder {
    fn forward(&self, input: &SpdFeatureMap) -> Result<SpdFeatureMap> {
        let encoded = self.encoder.forward(input)?;
        let decoded = self.decoder.forward(&encoded.features)?;
        Ok(decoded.features)
    }

    fn state_dict(&self) -> StateDict {
        let mut state = with_prefix("encoder", self.encoder.state_dict());
        state.extend(with_prefix("decoder", self.decoder.state_dict()));
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.encoder.load_state_dict(&strip_prefix("encoder", state)?)?;
        self.decoder.load_state_dict(&strip_prefix("decoder", state)?)?;
        Ok(())
    }
}

/// Embedding pipeline: convolve, then collapse each channel to its
/// distance-to-mean profile. Produces one scalar per (channel,
/// position) rather than a feature map.
pub struct SpdEmbedding {
    conv: SpdConv2d,
    distance: SpdDistance,
}

impl SpdEmbedding {
    pub fn new(channels: usize, out_channels: usize, kernel_size: usize, stride: usize) -> Result<Self> {
        Ok(Self {
            conv: SpdConv2d::new(channels, out_channels, kernel_size, stride)?,
            distance: SpdDistance::new(),
        })
    }

    pub fn forward(&self, input: &SpdFeatureMap) -> Result<Array2<f64>> {
        let convolved = self.conv.forward(input)?;
        self.distance.forward(&convolved.features)
    }

    pub fn state_dict(&self) -> StateDict {
        with_prefix("conv", self.conv.state_dict())
    }

    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<()> {
        self.conv.load_state_dict(&strip_prefix("conv", state)?)
    }
}
