use std::collections::BTreeMap;
use std::marker::PhantomData;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::error::OracleError;
use crate::network::FeatureNetwork;

/// Floor applied to the gradient scale so near-zero gradients are not blown up.
pub const GRADIENT_EPSILON: f32 = 1e-7;

/// Result of one oracle evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation<B: Backend> {
    pub loss: f32,
    /// Normalized gradient of the loss with respect to the image, same shape as the image.
    pub gradient: Tensor<B, 3>,
}

/// Computes a scalar loss for an image tensor together with its gradient.
pub trait GradientOracle<B: Backend> {
    fn evaluate(&self, image: Tensor<B, 3>) -> Evaluation<B>;
}

/// Scales a gradient so that its mean absolute value is one.
pub fn normalize_gradient<B: Backend, const D: usize>(gradient: Tensor<B, D>) -> Tensor<B, D> {
    let scale = gradient.clone().abs().mean().into_scalar().elem::<f32>();
    gradient.div_scalar(scale.max(GRADIENT_EPSILON))
}

#[derive(Debug, Clone)]
struct LayerContribution {
    name: String,
    index: usize,
    weight: f64,
}

/// Oracle maximizing the weighted energy of a set of network activations.
///
/// For every configured layer the loss accumulates `weight * sum(activation^2) / len(activation)`.
/// The network is frozen on construction; only the input image receives gradients.
#[derive(Debug, Clone)]
pub struct ActivationOracle<B: AutodiffBackend, N> {
    network: N,
    contributions: Vec<LayerContribution>,
    border: usize,
    _backend: PhantomData<B>,
}

impl<B: AutodiffBackend, N: FeatureNetwork<B>> ActivationOracle<B, N> {
    /// Binds a layer contribution map to `network`.
    ///
    /// Every layer name must be addressable in the network and every weight must be finite and
    /// non-negative.
    pub fn new(network: N, layers: &BTreeMap<String, f64>) -> Result<Self, OracleError> {
        if layers.is_empty() {
            return Err(OracleError::NoLayers);
        }

        let names = network.layer_names();
        let contributions = layers
            .iter()
            .map(|(name, &weight)| {
                let index = names.iter().position(|n| n == name).ok_or_else(|| {
                    OracleError::UnknownLayer {
                        name: name.clone(),
                        available: names.join(", "),
                    }
                })?;
                if !weight.is_finite() || weight < 0.0 {
                    return Err(OracleError::InvalidWeight {
                        name: name.clone(),
                        weight,
                    });
                }

                Ok(LayerContribution {
                    name: name.clone(),
                    index,
                    weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for contribution in contributions.iter() {
            log::info!(
                "Loss layer {} (weight {})",
                contribution.name,
                contribution.weight
            );
        }

        Ok(Self {
            network: network.freeze(),
            contributions,
            border: 0,
            _backend: PhantomData,
        })
    }

    /// Ignores `border` activation pixels on every spatial side when they fit.
    pub fn with_border(mut self, border: usize) -> Self {
        self.border = border;
        self
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Differentiable loss for a `[1, 3, height, width]` input.
    pub fn loss(&self, input: Tensor<B, 4>) -> Tensor<B, 1> {
        let device = input.device();
        let indices = self
            .contributions
            .iter()
            .map(|contribution| contribution.index)
            .collect::<Vec<_>>();

        self.network
            .activations(input, &indices)
            .into_iter()
            .zip(self.contributions.iter())
            .map(|(activation, contribution)| {
                let activation = crop_border(activation, self.border);
                let num_elements = activation.shape().num_elements() as f64;

                activation
                    .clone()
                    .mul(activation)
                    .sum()
                    .div_scalar(num_elements)
                    .mul_scalar(contribution.weight)
            })
            .fold(Tensor::zeros([1], &device), |loss, term| loss + term)
    }
}

impl<B: AutodiffBackend, N: FeatureNetwork<B>> GradientOracle<B::InnerBackend>
    for ActivationOracle<B, N>
{
    fn evaluate(&self, image: Tensor<B::InnerBackend, 3>) -> Evaluation<B::InnerBackend> {
        let image = Tensor::<B, 3>::from_inner(image).require_grad();
        // [H, W, C] -> [1, C, H, W]
        let input = image.clone().permute([2, 0, 1]).unsqueeze::<4>();

        let loss = self.loss(input);
        let value = loss.clone().inner().into_scalar().elem::<f32>();

        let grads = loss.backward();
        let gradient = image
            .grad(&grads)
            .unwrap_or_else(|| image.inner().zeros_like());

        Evaluation {
            loss: value,
            gradient: normalize_gradient(gradient),
        }
    }
}

fn crop_border<B: Backend>(activation: Tensor<B, 4>, border: usize) -> Tensor<B, 4> {
    let [batch, channels, height, width] = activation.dims();
    if border == 0 || height <= 2 * border || width <= 2 * border {
        return activation;
    }

    activation.slice([
        0..batch,
        0..channels,
        border..height - border,
        border..width - border,
    ])
}
