//! # Deep dream
//!
//! Iteratively perturbs a photograph so that chosen activations of a frozen, pretrained
//! convolutional network grow, producing hallucinated patterns on top of the image's structure.
//!
//! The optimization runs over a pyramid of octaves, smallest first:
//!
//! - [`pyramid`]: octave shapes for an image.
//! - [`oracle`]: loss over weighted layer activations and its gradient with respect to the image.
//! - [`ascent`]: bounded gradient ascent at one octave, with the `max_loss` early stop.
//! - [`dream`]: the octave loop, reinjecting the detail lost by resizing.
//!
//! Images enter and leave through [`raster`]; the network is any [`network::FeatureNetwork`],
//! VGG16/VGG19 with torchvision weights being provided.

pub mod ascent;
pub mod backend;
pub mod cli;
pub mod config;
pub mod dream;
pub mod error;
pub mod interrupt;
pub mod logger;
pub mod network;
pub mod oracle;
pub mod pyramid;
pub mod raster;

pub use ascent::{AscentParams, AscentStep, DreamContext, DreamObserver, LossHistory, ascend};
pub use config::DreamConfig;
pub use dream::dream;
pub use error::{DreamError, InputError, OracleError};
pub use interrupt::Interrupter;
pub use oracle::{ActivationOracle, Evaluation, GradientOracle};
pub use pyramid::{ImageShape, PyramidParams};
