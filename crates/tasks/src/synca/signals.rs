use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// `CancellationSignal` is a one-way flag shared between a run and the
/// tasks it executes. Tasks poll it cooperatively; nothing is ever
/// interrupted forcefully.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    state: Arc<AtomicBool>,
}

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// cancel raises the signal, returning true only for the call
    /// that actually flipped it.
    #[inline]
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
    }

    /// `is_cancelled` returns true once any clone called [`Self::cancel`].
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }
}
