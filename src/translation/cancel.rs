/*!
 * Cooperative stop signal shared between a caller and a translation run.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag.
///
/// Workers look at it only before starting a remote call; calls already in
/// flight always run to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    stop_requested: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop after the batches already in flight
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Clear the flag so the same handle can drive another run
    pub fn reset(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }
}
