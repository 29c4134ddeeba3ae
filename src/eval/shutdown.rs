//! Cooperative shutdown flag shared between the CLI and the runner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable flag; once requested it stays set.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag on the first Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let signal = self.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Interrupt received, finishing the current step before stopping");
                    signal.request();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_requested());
        signal.request();
        assert!(other.is_requested());
    }
}
