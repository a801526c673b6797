//! Conversions between raster images and the normalized tensors the dream works on.
//!
//! Image tensors are laid out as `[height, width, channels]` with three channels and values
//! roughly in `[-1, 1]`.

use std::path::Path;

use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use image::{ImageFormat, RgbImage};

use crate::error::{DreamError, InputError};
use crate::pyramid::ImageShape;

/// Number of color channels of an image tensor.
pub const CHANNELS: usize = 3;

/// Reads an image file at its original resolution and maps it to the `[-1, 1]` range.
pub fn load_image<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<Tensor<B, 3>, DreamError> {
    let path = path.as_ref();
    let raster = image::open(path)
        .map_err(|source| InputError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();

    log::info!(
        "Loaded {} ({}x{})",
        path.display(),
        raster.height(),
        raster.width()
    );

    Ok(from_raster(&raster, device))
}

/// Maps 8-bit RGB pixels to an image tensor.
pub fn from_raster<B: Backend>(raster: &RgbImage, device: &B::Device) -> Tensor<B, 3> {
    let (width, height) = raster.dimensions();
    let data = TensorData::new(
        raster.as_raw().clone(),
        Shape::new([height as usize, width as usize, CHANNELS]),
    )
    .convert::<B::FloatElem>();

    Tensor::<B, 3>::from_data(data, device)
        .div_scalar(127.5)
        .sub_scalar(1.0)
}

/// Undoes the normalization of an image tensor and quantizes it to 8-bit RGB.
///
/// Values falling outside the displayable range saturate to 0 or 255.
pub fn to_displayable<B: Backend>(image: Tensor<B, 3>) -> Result<RgbImage, DreamError> {
    let [height, width, channels] = image.dims();
    if channels != CHANNELS {
        return Err(DreamError::Data(format!(
            "expected {CHANNELS} channels, got {channels}"
        )));
    }

    let pixels = image
        .div_scalar(2.0)
        .add_scalar(0.5)
        .mul_scalar(255.0)
        .clamp(0.0, 255.0)
        .round()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|err| DreamError::Data(format!("{err:?}")))?
        .into_iter()
        .map(|value| value as u8)
        .collect::<Vec<_>>();

    RgbImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
        DreamError::Data(format!(
            "pixel buffer does not match a {height}x{width} image"
        ))
    })
}

/// Writes an image tensor as a PNG file.
pub fn save_image<B: Backend>(
    image: Tensor<B, 3>,
    path: impl AsRef<Path>,
) -> Result<(), DreamError> {
    let path = path.as_ref();

    to_displayable(image)?
        .save_with_format(path, ImageFormat::Png)
        .map_err(|source| DreamError::Output {
            path: path.to_path_buf(),
            source,
        })?;

    log::info!("Saved {}", path.display());
    Ok(())
}

/// Resamples an image tensor to exactly `shape` with bicubic interpolation.
pub fn resize<B: Backend>(image: Tensor<B, 3>, shape: ImageShape) -> Tensor<B, 3> {
    let [height, width, channels] = image.dims();
    if height == shape.height && width == shape.width {
        return image;
    }

    // [H, W, C] -> [1, C, H, W]
    let batch = image.permute([2, 0, 1]).unsqueeze::<4>();
    let resized = interpolate(
        batch,
        [shape.height, shape.width],
        InterpolateOptions::new(InterpolateMode::Bicubic),
    );

    resized
        .reshape([channels, shape.height, shape.width])
        .permute([1, 2, 0])
}
