use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set from the Ctrl+C handler thread, polled by the card reading loop
#[derive(Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new cancelation token.  Clone it to pass it to another thread
    pub fn new() -> CancellationToken {
        CancellationToken::default()
    }

    #[inline]
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}
