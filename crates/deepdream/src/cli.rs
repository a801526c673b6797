use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use clap::{Parser, ValueEnum};
use log::LevelFilter;

use crate::ascent::DreamObserver;
use crate::config::DreamConfig;
use crate::error::DreamError;
use crate::network::VggDepth;
use crate::pyramid::ImageShape;
use crate::raster::save_image;

#[derive(Parser, Debug)]
#[command(version, about = "Amplify the patterns a pretrained network sees in a photograph.")]
pub struct Cli {
    /// Source image.
    pub input: PathBuf,

    /// Where to write the dream, as PNG.
    pub output: PathBuf,

    /// JSON dream configuration; command line options override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Pretrained torchvision VGG weights (`.pth`, `.pt` or `.safetensors`).
    #[arg(long)]
    pub weights: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub depth: Option<DepthArg>,

    /// Loss layer as `NAME=WEIGHT`, repeat for several layers. Replaces the configured layers.
    #[arg(long = "layer", value_parser = parse_layer)]
    pub layers: Vec<(String, f64)>,

    #[arg(long)]
    pub octaves: Option<usize>,

    #[arg(long)]
    pub octave_scale: Option<f64>,

    /// Ascent iterations per octave.
    #[arg(long)]
    pub iterations: Option<usize>,

    #[arg(long)]
    pub step: Option<f64>,

    /// Stop an octave early once the loss goes above this value.
    #[arg(long)]
    pub max_loss: Option<f32>,

    /// Activation pixels ignored on each side when computing the loss.
    #[arg(long)]
    pub border: Option<usize>,

    /// Directory receiving the image reached at the end of every octave.
    #[arg(long)]
    pub snapshots: Option<PathBuf>,

    /// Write the effective configuration to this file.
    #[arg(long)]
    pub save_config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthArg {
    Vgg16,
    Vgg19,
}

impl From<DepthArg> for VggDepth {
    fn from(depth: DepthArg) -> Self {
        match depth {
            DepthArg::Vgg16 => VggDepth::Vgg16,
            DepthArg::Vgg19 => VggDepth::Vgg19,
        }
    }
}

impl Cli {
    /// Overrides `config` with every option given on the command line.
    pub fn apply(&self, mut config: DreamConfig) -> DreamConfig {
        if !self.layers.is_empty() {
            config.layers = self.layers.iter().cloned().collect();
        }
        if let Some(depth) = self.depth {
            config.network.depth = depth.into();
        }
        if let Some(octaves) = self.octaves {
            config.num_octaves = octaves;
        }
        if let Some(octave_scale) = self.octave_scale {
            config.octave_scale = octave_scale;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(step) = self.step {
            config.step = step;
        }
        if self.max_loss.is_some() {
            config.max_loss = self.max_loss;
        }
        if let Some(border) = self.border {
            config.border = border;
        }

        config
    }
}

fn parse_layer(value: &str) -> Result<(String, f64), String> {
    let (name, weight) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=WEIGHT, got `{value}`"))?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid weight `{weight}`: {err}"))?;

    Ok((name.trim().to_string(), weight))
}

/// Writes the image reached at the end of every octave as `octave-{index}-{shape}.png`.
pub struct SnapshotWriter {
    directory: PathBuf,
}

impl SnapshotWriter {
    pub fn new(directory: impl AsRef<Path>) -> Result<Self, DreamError> {
        let directory = directory.as_ref().to_path_buf();
        fs::create_dir_all(&directory)?;

        Ok(Self { directory })
    }

    fn path(&self, octave: usize, shape: ImageShape) -> PathBuf {
        self.directory.join(format!("octave-{octave}-{shape}.png"))
    }
}

impl<B: Backend> DreamObserver<B> for SnapshotWriter {
    fn on_octave(&mut self, octave: usize, shape: ImageShape, image: &Tensor<B, 3>) {
        let path = self.path(octave, shape);
        if let Err(err) = save_image(image.clone(), &path) {
            log::warn!("Could not write octave snapshot: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn command_line_overrides_config() {
        let cli = Cli::parse_from([
            "deepdream",
            "in.jpg",
            "out.png",
            "--layer",
            "conv3_3=0.5",
            "--layer",
            "conv4_1 = 2",
            "--depth",
            "vgg19",
            "--octaves",
            "5",
            "--max-loss",
            "10",
        ]);

        let config = cli.apply(DreamConfig::new().with_iterations(7));

        assert_eq!(config.layers.len(), 2);
        assert_eq!(config.layers["conv3_3"], 0.5);
        assert_eq!(config.layers["conv4_1"], 2.0);
        assert_eq!(config.network.depth, VggDepth::Vgg19);
        assert_eq!(config.num_octaves, 5);
        assert_eq!(config.iterations, 7);
        assert_eq!(config.max_loss, Some(10.0));
        assert_eq!(cli.log_level, LevelFilter::Info);
    }

    #[test]
    fn missing_options_keep_config_values() {
        let cli = Cli::parse_from(["deepdream", "in.jpg", "out.png"]);
        let config = cli.apply(DreamConfig::new().with_max_loss(Some(3.0)));

        assert_eq!(config.layers, crate::config::default_layers());
        assert_eq!(config.max_loss, Some(3.0));
        assert_eq!(config.step, 0.01);
    }

    #[test]
    fn layer_arguments_need_a_weight() {
        assert!(parse_layer("conv4_3").is_err());
        assert!(parse_layer("conv4_3=heavy").is_err());
        assert_eq!(parse_layer("conv4_3=1.5"), Ok(("conv4_3".to_string(), 1.5)));
    }

    #[test]
    fn snapshots_are_written_per_octave() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SnapshotWriter::new(dir.path().join("octaves")).unwrap();
        let device = Default::default();
        let image = Tensor::<NdArray<f32>, 3>::zeros([4, 6, 3], &device);

        DreamObserver::<NdArray<f32>>::on_octave(&mut writer, 1, ImageShape::new(4, 6), &image);

        let written = dir.path().join("octaves").join("octave-1-4x6.png");
        assert_eq!(image::open(written).unwrap().into_rgb8().dimensions(), (6, 4));
    }
}
