//! VGG convolutional backbone.
//!
//! Reference: "Very Deep Convolutional Networks for Large-Scale Image Recognition"
//! https://arxiv.org/abs/1409.1556

use std::path::Path;

use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::relu;
use burn_import::pytorch::PyTorchFileRecorder;
use burn_import::safetensors::SafetensorsFileRecorder;

use super::FeatureNetwork;
use crate::error::OracleError;

/// ImageNet statistics the torchvision checkpoints were trained with.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Output channels of each of the five VGG blocks.
const BLOCK_CHANNELS: [usize; 5] = [64, 128, 256, 512, 512];

/// VGG variant.
#[derive(Config, Debug, Copy, PartialEq, Eq)]
pub enum VggDepth {
    /// 13 convolutions (default).
    Vgg16,
    /// 16 convolutions.
    Vgg19,
}

impl VggDepth {
    fn convs_per_block(&self) -> [usize; 5] {
        match self {
            VggDepth::Vgg16 => [2, 2, 3, 3, 3],
            VggDepth::Vgg19 => [2, 2, 4, 4, 4],
        }
    }
}

/// Configuration to create a [VGG](Vgg) feature backbone.
#[derive(Config, Debug)]
pub struct VggConfig {
    #[config(default = "VggDepth::Vgg16")]
    pub depth: VggDepth,
}

impl VggConfig {
    /// Initializes a backbone with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg<B> {
        let conv_config = |in_ch, out_ch| {
            Conv2dConfig::new([in_ch, out_ch], [3, 3])
                .with_padding(PaddingConfig2d::Same)
                .with_bias(true)
        };

        let mut blocks = Vec::with_capacity(BLOCK_CHANNELS.len());
        let mut in_channels = 3;

        let layout = BLOCK_CHANNELS
            .into_iter()
            .zip(self.depth.convs_per_block());

        for (out_channels, num_convs) in layout {
            let mut convs = Vec::with_capacity(num_convs);
            for _ in 0..num_convs {
                convs.push(conv_config(in_channels, out_channels).init(device));
                in_channels = out_channels;
            }
            blocks.push(VggBlock { convs });
        }

        Vgg {
            blocks,
            frozen: false,
        }
    }

    /// Initializes a backbone from a torchvision checkpoint.
    ///
    /// Files ending in `.safetensors` are read as SafeTensors, anything else as a PyTorch
    /// pickle (`.pt`/`.pth`). Classifier weights present in the file are ignored.
    pub fn init_pretrained<B: Backend>(
        &self,
        weights: &Path,
        device: &B::Device,
    ) -> Result<Vgg<B>, OracleError> {
        let remaps = self.key_remaps();

        let record: VggRecord<B> = match weights.extension().and_then(|ext| ext.to_str()) {
            Some("safetensors") => {
                let mut load_args = burn_import::safetensors::LoadArgs::new(weights.into());
                for (pattern, replacement) in &remaps {
                    load_args = load_args.with_key_remap(pattern, replacement);
                }
                SafetensorsFileRecorder::<FullPrecisionSettings>::default()
                    .load(load_args, device)?
            }
            _ => {
                let mut load_args = burn_import::pytorch::LoadArgs::new(weights.into());
                for (pattern, replacement) in &remaps {
                    load_args = load_args.with_key_remap(pattern, replacement);
                }
                PyTorchFileRecorder::<FullPrecisionSettings>::default().load(load_args, device)?
            }
        };

        log::info!(
            "Loaded {:?} weights from {}",
            self.depth,
            weights.display()
        );

        Ok(self.init(device).load_record(record))
    }

    /// Names of the addressable layers: `conv{block}_{index}`, both starting at 1.
    pub fn layer_names(&self) -> Vec<String> {
        conv_names(self.depth.convs_per_block())
    }

    /// Key remapping rules from torchvision's `features.{index}` keys to this module's keys.
    ///
    /// torchvision interleaves every convolution with a ReLU and closes each block with a max
    /// pooling layer, which is why the source indices skip.
    pub fn key_remaps(&self) -> Vec<(String, String)> {
        let mut remaps = Vec::new();
        let mut index = 0;

        for (block, num_convs) in self.depth.convs_per_block().into_iter().enumerate() {
            for conv in 0..num_convs {
                remaps.push((
                    format!("^features\\.{index}\\.(.*)$"),
                    format!("blocks.{block}.convs.{conv}.$1"),
                ));
                index += 2;
            }
            index += 1;
        }

        remaps
    }
}

#[derive(Module, Debug)]
pub struct VggBlock<B: Backend> {
    convs: Vec<Conv2d<B>>,
}

/// VGG feature backbone without the classification head.
#[derive(Module, Debug)]
pub struct Vgg<B: Backend> {
    blocks: Vec<VggBlock<B>>,
    frozen: bool,
}

impl<B: Backend> Vgg<B> {
    /// Maps `[-1, 1]` inputs to the ImageNet-normalized range the weights expect.
    fn normalize(input: Tensor<B, 4>) -> Tensor<B, 4> {
        let device = input.device();
        let mean = Tensor::<B, 1>::from_floats(MEAN, &device).reshape([1, 3, 1, 1]);
        let std = Tensor::<B, 1>::from_floats(STD, &device).reshape([1, 3, 1, 1]);

        (input.add_scalar(1.0).div_scalar(2.0) - mean) / std
    }
}

impl<B: Backend> FeatureNetwork<B> for Vgg<B> {
    fn layer_names(&self) -> Vec<String> {
        conv_names(self.blocks.iter().map(|block| block.convs.len()))
    }

    fn activations(&self, input: Tensor<B, 4>, layers: &[usize]) -> Vec<Tensor<B, 4>> {
        let Some(&deepest) = layers.iter().max() else {
            return Vec::new();
        };

        let mut captured: Vec<Option<Tensor<B, 4>>> = vec![None; layers.len()];
        let mut x = Self::normalize(input);
        let mut index = 0;

        'blocks: for (block, b) in self.blocks.iter().enumerate() {
            if block > 0 {
                x = max_pool2d(x);
            }

            for conv in b.convs.iter() {
                x = relu(conv.forward(x));

                for (slot, &layer) in layers.iter().enumerate() {
                    if layer == index {
                        captured[slot] = Some(x.clone());
                    }
                }

                if index == deepest {
                    break 'blocks;
                }
                index += 1;
            }
        }

        captured.into_iter().flatten().collect()
    }

    fn freeze(self) -> Self {
        let mut vgg = self.no_grad();
        vgg.frozen = true;
        vgg
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// `conv{block}_{index}` for every convolution of a block layout.
fn conv_names(convs_per_block: impl IntoIterator<Item = usize>) -> Vec<String> {
    convs_per_block
        .into_iter()
        .enumerate()
        .flat_map(|(block, num_convs)| {
            (1..=num_convs).map(move |conv| format!("conv{}_{}", block + 1, conv))
        })
        .collect()
}

/// 2x2 max pooling with stride 2, skipped once a spatial dimension is down to a single pixel.
fn max_pool2d<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, height, width] = x.dims();
    if height < 2 || width < 2 {
        return x;
    }

    burn::tensor::module::max_pool2d(x, [2, 2], [2, 2], [0, 0], [1, 1], false)
}
