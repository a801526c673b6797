use core::fmt;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Spatial size of an image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    pub height: usize,
    pub width: usize,
}

impl ImageShape {
    /// Shape of `height` rows by `width` columns.
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Shape of an image tensor laid out as `[height, width, channels]`.
    pub fn of<B: Backend>(image: &Tensor<B, 3>) -> Self {
        let [height, width, _] = image.dims();
        Self { height, width }
    }

    /// Divides both axes by `factor`, flooring each one and never going below one pixel.
    pub fn shrink(&self, factor: f64) -> Self {
        let scale = |dim: usize| ((dim as f64 / factor).floor() as usize).max(1);

        Self {
            height: scale(self.height),
            width: scale(self.width),
        }
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.height, self.width)
    }
}

/// Validated octave parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidParams {
    num_octaves: usize,
    octave_scale: f64,
}

impl PyramidParams {
    pub fn new(num_octaves: usize, octave_scale: f64) -> Result<Self, InputError> {
        if num_octaves < 1 {
            return Err(InputError::invalid(
                "num_octaves",
                "at least one octave is required",
            ));
        }
        if !octave_scale.is_finite() || octave_scale <= 1.0 {
            return Err(InputError::invalid(
                "octave_scale",
                format!("must be a finite value greater than 1.0, got {octave_scale}"),
            ));
        }

        Ok(Self {
            num_octaves,
            octave_scale,
        })
    }

    /// Number of octaves below the original resolution.
    pub fn num_octaves(&self) -> usize {
        self.num_octaves
    }

    /// Size ratio between two successive octaves.
    pub fn octave_scale(&self) -> f64 {
        self.octave_scale
    }

    /// Computes the octave shapes for `original`, smallest first.
    ///
    /// The returned plan has `num_octaves + 1` entries and always ends with `original`.
    /// Octaves whose shapes collapse onto the same integer size are kept as repeated steps.
    pub fn plan(&self, original: ImageShape) -> Vec<ImageShape> {
        let mut shapes = Vec::with_capacity(self.num_octaves + 1);
        shapes.push(original);

        for octave in 1..=self.num_octaves {
            shapes.push(original.shrink(self.octave_scale.powi(octave as i32)));
        }

        shapes.reverse();
        shapes
    }
}
