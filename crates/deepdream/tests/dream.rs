use std::collections::BTreeMap;

use burn::backend::{Autodiff, NdArray};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;
use deepdream::network::{FeatureNetwork, VggConfig};
use deepdream::raster::{from_raster, load_image, save_image};
use deepdream::{
    ActivationOracle, AscentParams, DreamContext, DreamError, Evaluation, GradientOracle,
    ImageShape, Interrupter, LossHistory, PyramidParams, dream,
};
use image::{Rgb, RgbImage};

type TestBackend = NdArray<f32>;
type TestAutodiffBackend = Autodiff<TestBackend>;

/// Copies its input through a 1x1 convolution, exposed as the single layer `copy`.
#[derive(Module, Debug)]
struct CopyNetwork<B: Backend> {
    conv: Conv2d<B>,
    frozen: bool,
}

impl<B: Backend> CopyNetwork<B> {
    fn new(device: &B::Device) -> Self {
        let mut conv = Conv2dConfig::new([3, 3], [1, 1])
            .with_bias(false)
            .init(device);
        conv.weight = conv
            .weight
            .map(|_| Tensor::<B, 2>::eye(3, device).reshape([3, 3, 1, 1]));

        Self {
            conv,
            frozen: false,
        }
    }
}

impl<B: Backend> FeatureNetwork<B> for CopyNetwork<B> {
    fn layer_names(&self) -> Vec<String> {
        vec!["copy".to_string()]
    }

    fn activations(&self, input: Tensor<B, 4>, layers: &[usize]) -> Vec<Tensor<B, 4>> {
        let output = self.conv.forward(input);
        layers.iter().map(|_| output.clone()).collect()
    }

    fn freeze(self) -> Self {
        let mut network = self.no_grad();
        network.frozen = true;
        network
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

struct FixedOracle;

impl<B: Backend> GradientOracle<B> for FixedOracle {
    fn evaluate(&self, image: Tensor<B, 3>) -> Evaluation<B> {
        Evaluation {
            loss: 1.0,
            gradient: image.ones_like(),
        }
    }
}

fn gradient_raster(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width) as u8,
            (y * 255 / height) as u8,
            ((x + y) * 7 % 256) as u8,
        ])
    })
}

fn single_layer(name: &str) -> BTreeMap<String, f64> {
    BTreeMap::from([(name.to_string(), 1.0)])
}

#[test]
fn flat_image_with_fixed_gradient() {
    let device = Default::default();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("gray.png");
    let output = dir.path().join("dream.png");
    RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]))
        .save(&input)
        .unwrap();

    let image = load_image::<TestBackend>(&input, &device).unwrap();
    let pyramid = PyramidParams::new(1, 1.4).unwrap();
    let ascent = AscentParams::new(0.5, 1, None).unwrap();
    let interrupter = Interrupter::new();
    let mut history = LossHistory::default();
    let mut context = DreamContext::new(&interrupter, &mut history);

    let dreamed = dream(&FixedOracle, image, &pyramid, &ascent, &mut context).unwrap();
    save_image(dreamed, &output).unwrap();

    // 128 maps to ~0.004, two steps of 0.5 push it past 1 which saturates to white.
    let written = image::open(&output).unwrap().into_rgb8();
    assert_eq!(written.dimensions(), (100, 100));
    assert!(written.pixels().all(|pixel| pixel.0 == [255, 255, 255]));
    assert_eq!(
        history.octaves,
        vec![ImageShape::new(71, 71), ImageShape::new(100, 100)]
    );
}

#[test]
fn activation_oracle_amplifies_the_image() {
    let device = Default::default();
    let raster = gradient_raster(40, 30);
    let original = from_raster::<TestBackend>(&raster, &device);
    let oracle = ActivationOracle::<TestAutodiffBackend, _>::new(
        CopyNetwork::new(&device),
        &single_layer("copy"),
    )
    .unwrap();
    let pyramid = PyramidParams::new(2, 1.4).unwrap();
    let ascent = AscentParams::new(0.01, 5, None).unwrap();
    let interrupter = Interrupter::new();
    let mut history = LossHistory::default();
    let mut context = DreamContext::new(&interrupter, &mut history);

    let dreamed = dream(&oracle, original.clone(), &pyramid, &ascent, &mut context).unwrap();

    assert_eq!(dreamed.dims(), [30, 40, 3]);
    let energy = |image: Tensor<TestBackend, 3>| image.powf_scalar(2.0).mean().into_scalar();
    assert!(energy(dreamed) > energy(original));
    assert_eq!(history.steps.len(), 15);
    for octave in 0..3 {
        let losses = history
            .steps
            .iter()
            .filter(|step| step.octave == octave)
            .map(|step| step.loss)
            .collect::<Vec<_>>();
        assert!(losses.windows(2).all(|pair| pair[1] > pair[0]), "{losses:?}");
    }
}

#[test]
fn loss_ceiling_leaves_the_image_untouched() {
    let device = Default::default();
    let original = from_raster::<TestBackend>(&gradient_raster(20, 20), &device);
    let oracle = ActivationOracle::<TestAutodiffBackend, _>::new(
        CopyNetwork::new(&device),
        &single_layer("copy"),
    )
    .unwrap();
    let pyramid = PyramidParams::new(1, 1.4).unwrap();
    let ascent = AscentParams::new(0.01, 5, Some(0.0)).unwrap();
    let interrupter = Interrupter::new();
    let mut history = LossHistory::default();
    let mut context = DreamContext::new(&interrupter, &mut history);

    let dreamed = dream(&oracle, original.clone(), &pyramid, &ascent, &mut context).unwrap();

    // Every octave stops on its first evaluation, only the resize round trip remains.
    assert!(history.steps.is_empty());
    assert_eq!(history.early_stops.len(), 2);
    let expected = original.into_data().to_vec::<f32>().unwrap();
    let actual = dreamed.into_data().to_vec::<f32>().unwrap();
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "{a} != {e}");
    }
}

#[test]
fn random_vgg_keeps_the_image_shape() {
    let device = Default::default();
    let network = VggConfig::new().init::<TestAutodiffBackend>(&device);
    let layers = BTreeMap::from([("conv2_1".to_string(), 1.0), ("conv3_2".to_string(), 0.5)]);
    let oracle = ActivationOracle::<TestAutodiffBackend, _>::new(network, &layers)
        .unwrap()
        .with_border(1);
    let original = from_raster::<TestBackend>(&gradient_raster(24, 18), &device);
    let pyramid = PyramidParams::new(1, 1.5).unwrap();
    let ascent = AscentParams::new(0.01, 2, None).unwrap();
    let interrupter = Interrupter::new();
    let mut history = LossHistory::default();
    let mut context = DreamContext::new(&interrupter, &mut history);

    let dreamed = dream(&oracle, original, &pyramid, &ascent, &mut context).unwrap();

    assert_eq!(dreamed.dims(), [18, 24, 3]);
    let values = dreamed.into_data().to_vec::<f32>().unwrap();
    assert!(values.iter().all(|value| value.is_finite()));
    assert_eq!(history.steps.len(), 4);
    assert_eq!(
        history.octaves,
        vec![ImageShape::new(12, 16), ImageShape::new(18, 24)]
    );
}

#[test]
fn unknown_layers_fail_before_dreaming() {
    let device = Default::default();
    let network = VggConfig::new().init::<TestAutodiffBackend>(&device);

    let result =
        ActivationOracle::<TestAutodiffBackend, _>::new(network, &single_layer("mixed4"));

    assert!(matches!(
        result.map_err(DreamError::from),
        Err(DreamError::Oracle(_))
    ));
}
