//! Backend selected through cargo features.

#[cfg(not(any(feature = "ndarray", feature = "wgpu")))]
compile_error!("At least one backend feature must be enabled: `ndarray` or `wgpu`.");

#[cfg(feature = "wgpu")]
pub type DreamBackend = burn::backend::wgpu::Wgpu;

#[cfg(all(feature = "ndarray", not(feature = "wgpu")))]
pub type DreamBackend = burn::backend::ndarray::NdArray<f32>;

/// Backend the oracle differentiates on.
pub type DreamAutodiffBackend = burn::backend::Autodiff<DreamBackend>;
