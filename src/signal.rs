//! Ctrl+C handling.
//!
//! The handler only raises a shared flag. The scan's cancellation state
//! polls that flag and turns it into an `Interrupted` cancellation, so the
//! pipeline stops dispatching, drains in-flight work, and the process exits
//! with code 130.
//!
//! ```rust,no_run
//! use dupsweep::duplicates::FinderConfig;
//! use dupsweep::signal::install_handler;
//!
//! let handler = install_handler().unwrap();
//! let config = FinderConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Shared shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to [`FinderConfig::with_shutdown_flag`](crate::duplicates::FinderConfig::with_shutdown_flag).
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag so the handler can be reused by another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler, or reuse the installed one.
///
/// `ctrlc` allows one handler per process; repeated calls (several
/// `run_app` invocations in one test binary) get the same flag, reset.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the OS refuses the handler
/// and none was installed earlier by this module.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone();
    let flag = handler.flag();
    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => Ok(handler),
        // Another thread won the race and installed the hook on the same flag.
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered");
            Ok(handler)
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
