use std::path::PathBuf;

use burn::config::ConfigError;
use burn::record::RecorderError;

/// Errors caused by what the caller handed in: the source image or the run parameters.
///
/// They are detected before any optimization starts.
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("Failed to read image `{}`: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

impl InputError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Errors raised while building the loss/gradient oracle.
///
/// These are integration bugs (a layer map that does not match the network, unreadable
/// weights) and are fatal for every request.
#[derive(thiserror::Error, Debug)]
pub enum OracleError {
    #[error("The layer contribution map must contain at least one layer")]
    NoLayers,

    #[error("Layer `{name}` does not exist in the network, available layers: {available}")]
    UnknownLayer { name: String, available: String },

    #[error("Layer `{name}` has weight {weight}, expected a finite non-negative value")]
    InvalidWeight { name: String, weight: f64 },

    #[error("Failed to load network weights: {0}")]
    Weights(#[from] RecorderError),
}

/// Any failure of a dream run, from configuration loading to writing the result.
#[derive(thiserror::Error, Debug)]
pub enum DreamError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("Failed to write image `{}`: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tensor data error: {0}")]
    Data(String),

    #[error("The dream was interrupted")]
    Interrupted,
}
