use burn::prelude::*;

use crate::error::{DreamError, InputError};
use crate::interrupt::Interrupter;
use crate::oracle::{Evaluation, GradientOracle};
use crate::pyramid::ImageShape;

/// Validated gradient ascent parameters, fixed for a whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AscentParams {
    step: f64,
    iterations: usize,
    max_loss: Option<f32>,
}

impl AscentParams {
    pub fn new(step: f64, iterations: usize, max_loss: Option<f32>) -> Result<Self, InputError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(InputError::invalid(
                "step",
                format!("must be a finite positive value, got {step}"),
            ));
        }
        if iterations < 1 {
            return Err(InputError::invalid(
                "iterations",
                "at least one iteration is required",
            ));
        }
        if let Some(max_loss) = max_loss.filter(|max_loss| !max_loss.is_finite()) {
            return Err(InputError::invalid(
                "max_loss",
                format!("must be finite, got {max_loss}"),
            ));
        }

        Ok(Self {
            step,
            iterations,
            max_loss,
        })
    }

    /// Multiplier applied to the normalized gradient at every iteration.
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Maximum number of iterations per octave.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Loss above which an octave stops early, if any.
    pub fn max_loss(&self) -> Option<f32> {
        self.max_loss
    }
}

/// One evaluated ascent iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AscentStep {
    pub octave: usize,
    pub iteration: usize,
    pub loss: f32,
}

/// Receives progress notifications from a running dream.
pub trait DreamObserver<B: Backend> {
    /// An iteration updated the image.
    fn on_step(&mut self, _step: AscentStep) {}

    /// The loss went over `max_loss`; the octave ends without applying this step.
    fn on_early_stop(&mut self, _step: AscentStep) {}

    /// An octave is done, `image` already carries the reinjected detail.
    fn on_octave(&mut self, _octave: usize, _shape: ImageShape, _image: &Tensor<B, 3>) {}
}

impl<B: Backend> DreamObserver<B> for () {}

/// Observer keeping every reported loss.
#[derive(Debug, Clone, Default)]
pub struct LossHistory {
    pub steps: Vec<AscentStep>,
    pub early_stops: Vec<AscentStep>,
    pub octaves: Vec<ImageShape>,
}

impl<B: Backend> DreamObserver<B> for LossHistory {
    fn on_step(&mut self, step: AscentStep) {
        self.steps.push(step);
    }

    fn on_early_stop(&mut self, step: AscentStep) {
        self.early_stops.push(step);
    }

    fn on_octave(&mut self, _octave: usize, shape: ImageShape, _image: &Tensor<B, 3>) {
        self.octaves.push(shape);
    }
}

/// Cancellation and progress reporting for one run.
pub struct DreamContext<'a, B: Backend> {
    pub interrupter: &'a Interrupter,
    pub observer: &'a mut dyn DreamObserver<B>,
}

impl<'a, B: Backend> DreamContext<'a, B> {
    pub fn new(interrupter: &'a Interrupter, observer: &'a mut dyn DreamObserver<B>) -> Self {
        Self {
            interrupter,
            observer,
        }
    }
}

/// Moves `image` along the oracle's gradient for up to `params.iterations()` steps.
///
/// The run stops silently, returning the image as it was before the offending step, as soon as
/// the loss exceeds `params.max_loss()`. The shape of the image never changes.
pub fn ascend<B: Backend, O: GradientOracle<B> + ?Sized>(
    oracle: &O,
    image: Tensor<B, 3>,
    params: &AscentParams,
    octave: usize,
    context: &mut DreamContext<'_, B>,
) -> Result<Tensor<B, 3>, DreamError> {
    let mut image = image;

    for iteration in 0..params.iterations {
        context.interrupter.check()?;

        let Evaluation { loss, gradient } = oracle.evaluate(image.clone());
        let step = AscentStep {
            octave,
            iteration,
            loss,
        };

        if params.max_loss.is_some_and(|max_loss| loss > max_loss) {
            log::info!(
                "Octave {octave}: loss {loss:.4} exceeds the maximum after {iteration} steps, stopping early"
            );
            context.observer.on_early_stop(step);
            return Ok(image);
        }

        image = image + gradient.mul_scalar(params.step);

        log::debug!("Octave {octave} iteration {iteration}: loss {loss:.4}");
        context.observer.on_step(step);
    }

    Ok(image)
}
