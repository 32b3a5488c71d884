//! The controlled device, as seen by the emulation layer.
//!
//! Anything that can report and change an on/off state can be exposed as an
//! emulated WeMo socket by implementing [`Switch`].

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

/// Failure reported by a [`Switch`] implementation.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SwitchError(pub String);

impl SwitchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Convenient Result alias for switch operations.
pub type SwitchResult<T> = Result<T, SwitchError>;

/// A device with a single boolean state.
///
/// Both calls may block (hardware access, upstream HTTP APIs); the HTTP layer
/// runs them on the blocking thread pool.
pub trait Switch: Send + Sync {
    /// Returns the current state (`true` = on).
    fn status(&self) -> SwitchResult<bool>;

    /// Requests a state change.
    fn set(&self, on: bool) -> SwitchResult<()>;
}

/// In-memory switch. Useful for demos and tests.
#[derive(Debug, Default)]
pub struct MemorySwitch {
    on: AtomicBool,
}

impl MemorySwitch {
    pub fn new(initial: bool) -> Self {
        Self {
            on: AtomicBool::new(initial),
        }
    }
}

impl Switch for MemorySwitch {
    fn status(&self) -> SwitchResult<bool> {
        Ok(self.on.load(Ordering::SeqCst))
    }

    fn set(&self, on: bool) -> SwitchResult<()> {
        let previous = self.on.swap(on, Ordering::SeqCst);
        if previous != on {
            log::info!("[Switch] State changed: {} -> {}", previous, on);
        }
        Ok(())
    }
}
