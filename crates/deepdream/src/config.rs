use std::collections::BTreeMap;

use burn::prelude::*;

use crate::ascent::AscentParams;
use crate::error::InputError;
use crate::network::VggConfig;
use crate::pyramid::PyramidParams;

/// Configuration of a dream run.
///
/// Values are only checked when turned into [`AscentParams`] and [`PyramidParams`].
#[derive(Config, Debug)]
pub struct DreamConfig {
    /// Layer contribution map: weight of each network layer in the loss.
    #[config(default = "default_layers()")]
    pub layers: BTreeMap<String, f64>,
    /// Gradient ascent step size.
    #[config(default = 0.01)]
    pub step: f64,
    /// Ascent iterations per octave.
    #[config(default = 20)]
    pub iterations: usize,
    /// Number of octaves below the original resolution.
    #[config(default = 3)]
    pub num_octaves: usize,
    /// Size ratio between two successive octaves.
    #[config(default = 1.4)]
    pub octave_scale: f64,
    /// Loss above which an octave stops early.
    pub max_loss: Option<f32>,
    /// Activation pixels ignored on each spatial side when computing the loss.
    #[config(default = 0)]
    pub border: usize,
    #[config(default = "VggConfig::new()")]
    pub network: VggConfig,
}

/// Deeper VGG convolutions, weighted more heavily the deeper they sit.
pub fn default_layers() -> BTreeMap<String, f64> {
    [
        ("conv4_2", 1.0),
        ("conv4_3", 1.5),
        ("conv5_1", 2.0),
        ("conv5_2", 2.5),
    ]
    .into_iter()
    .map(|(name, weight)| (name.to_string(), weight))
    .collect()
}

impl DreamConfig {
    pub fn ascent_params(&self) -> Result<AscentParams, InputError> {
        AscentParams::new(self.step, self.iterations, self.max_loss)
    }

    pub fn pyramid_params(&self) -> Result<PyramidParams, InputError> {
        PyramidParams::new(self.num_octaves, self.octave_scale)
    }
}
