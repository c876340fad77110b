use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::error::{AppError, AppResult};

/// Request-scoped cancellation flag, checked by the pipeline at stage boundaries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails with [`AppError::Cancelled`] naming `stage` once cancelled
    pub fn check(&self, stage: impl std::fmt::Display) -> AppResult<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled(stage.to_string()))
        } else {
            Ok(())
        }
    }

    /// Returns a guard that cancels this token when dropped
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

/// Cancels its token on drop unless disarmed
///
/// Held by the HTTP handler so an abandoned request stops the blocking work it started.
#[derive(Debug)]
pub struct CancelOnDrop {
    token: Option<CancellationToken>,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}
