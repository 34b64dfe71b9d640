//! One-shot gates.
//!
//! A gate is settable exactly once and can be waited on any number of times,
//! before and after it opens. It opens when the [`GateSetter`] is consumed by
//! [`GateSetter::set`] or dropped; a dropped setter opens the gate empty.
//!
//! The open signal is the disconnection of a zero-capacity channel, so every
//! waiter (including clones made after opening) observes it without locks.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::{Arc, OnceLock};

/// Read side of a one-shot gate.
#[derive(Debug)]
pub(crate) struct Gate<T> {
    value: Arc<OnceLock<T>>,
    opened: Receiver<()>,
}

// Derived Clone would require T: Clone.
impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            opened: self.opened.clone(),
        }
    }
}

/// Write side of a one-shot gate.
#[derive(Debug)]
pub(crate) struct GateSetter<T> {
    value: Arc<OnceLock<T>>,
    _open: Sender<()>,
}

/// Create a closed gate and its setter.
pub(crate) fn gate<T>() -> (GateSetter<T>, Gate<T>) {
    let (tx, rx) = bounded(0);
    let value = Arc::new(OnceLock::new());
    (
        GateSetter { value: Arc::clone(&value), _open: tx },
        Gate { value, opened: rx },
    )
}

impl<T> GateSetter<T> {
    /// Store `value` and open the gate.
    pub(crate) fn set(self, value: T) {
        // The setter is consumed, so the cell is always empty here.
        let _ = self.value.set(value);
    }
}

impl<T> Gate<T> {
    /// Block until the gate opens; `None` if the setter was dropped unset.
    pub(crate) fn wait(&self) -> Option<&T> {
        // Nothing is ever sent; recv returns once the setter is gone.
        let _ = self.opened.recv();
        self.value.get()
    }

    /// Non-blocking probe used by tests and diagnostics.
    pub(crate) fn is_open(&self) -> bool {
        matches!(
            self.opened.try_recv(),
            Err(crossbeam_channel::TryRecvError::Disconnected)
        )
    }
}
