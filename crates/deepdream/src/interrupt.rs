use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::DreamError;

/// Cancellation token for a running dream.
///
/// Clones share one flag: a UI or server thread keeps a clone and calls [`stop`](Self::stop),
/// the ascent loop calls [`check`](Self::check) at every iteration and octave boundary.
#[derive(Clone, Default, Debug)]
pub struct Interrupter {
    requested: Arc<AtomicBool>,
}

impl Interrupter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the dream to stop at its next boundary.
    pub fn stop(&self) {
        self.requested.store(true, Ordering::Release);
    }

    /// Clears a pending request so the token can drive another dream.
    pub fn reset(&self) {
        self.requested.store(false, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Fails with [`DreamError::Interrupted`] once a stop was requested.
    pub fn check(&self) -> Result<(), DreamError> {
        if self.is_stopped() {
            log::warn!("Dream interrupted");
            return Err(DreamError::Interrupted);
        }

        Ok(())
    }
}
