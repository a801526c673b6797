use burn::prelude::*;

use crate::ascent::{AscentParams, DreamContext, ascend};
use crate::error::{DreamError, InputError};
use crate::oracle::GradientOracle;
use crate::pyramid::{ImageShape, PyramidParams};
use crate::raster::{CHANNELS, resize};

/// Runs gradient ascent over the octave pyramid of `original`, smallest octave first.
///
/// After each octave the detail lost by shrinking and re-enlarging the original is added back,
/// so the dream keeps the structure of the source image as the resolution grows. The returned
/// image has the shape of `original`.
pub fn dream<B: Backend, O: GradientOracle<B> + ?Sized>(
    oracle: &O,
    original: Tensor<B, 3>,
    pyramid: &PyramidParams,
    ascent: &AscentParams,
    context: &mut DreamContext<'_, B>,
) -> Result<Tensor<B, 3>, DreamError> {
    let [height, width, channels] = original.dims();
    if height == 0 || width == 0 || channels != CHANNELS {
        return Err(InputError::invalid(
            "image",
            format!("expected a non-empty {CHANNELS}-channel image, got {height}x{width}x{channels}"),
        )
        .into());
    }

    let shapes = pyramid.plan(ImageShape::new(height, width));
    log::info!(
        "Dreaming over {} octaves: {}",
        shapes.len(),
        shapes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let mut shrunk_original = resize(original.clone(), shapes[0]);
    let mut image = original.clone();

    for (octave, &shape) in shapes.iter().enumerate() {
        context.interrupter.check()?;
        log::info!("Octave {octave}: {shape}");

        image = resize(image, shape);
        image = ascend(oracle, image, ascent, octave, context)?;

        let upscaled_shrunk = resize(shrunk_original, shape);
        let same_size_original = resize(original.clone(), shape);
        let lost_detail = same_size_original.clone() - upscaled_shrunk;
        image = image + lost_detail;
        shrunk_original = same_size_original;

        context.observer.on_octave(octave, shape, &image);
    }

    Ok(image)
}
