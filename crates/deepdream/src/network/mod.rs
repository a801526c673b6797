mod vgg;

pub use vgg::*;

use burn::prelude::*;

/// A frozen, pretrained convolutional backbone whose internal activations can be addressed by
/// name.
pub trait FeatureNetwork<B: Backend>: Module<B> {
    /// Names of the addressable layers, in forward order.
    fn layer_names(&self) -> Vec<String>;

    /// Runs the network on `input` (`[batch, 3, height, width]`, values in `[-1, 1]`) and
    /// returns the activation of every requested layer, in request order.
    ///
    /// Layers are identified by their position in [`layer_names`](Self::layer_names); the
    /// forward pass stops after the deepest requested layer.
    fn activations(&self, input: Tensor<B, 4>, layers: &[usize]) -> Vec<Tensor<B, 4>>;

    /// Switches every parameter to inference-only mode.
    fn freeze(self) -> Self;

    fn is_frozen(&self) -> bool;
}
