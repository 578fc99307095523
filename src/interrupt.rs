use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One-shot cancellation flag shared between an interrupt listener and the
/// poll loops.
///
/// Setting the flag is the only thing an interrupt does. A poll loop that
/// observes it clears it in the same atomic step, so the next wait starts
/// uncancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Test-and-clear. Returns true at most once per `cancel`.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

/// Install a listener that raises the returned flag on every SIGINT.
///
/// Interrupts only cancel the wait in progress; they never touch the jobs
/// being waited on.
pub fn install_interrupt_handler() -> CancelFlag {
    let flag = CancelFlag::new();
    let flag_clone = flag.clone();

    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for SIGINT, waits cannot be interrupted");
                break;
            }
            tracing::info!("Received SIGINT, cancelling current wait");
            flag_clone.cancel();
        }
    });

    flag
}
