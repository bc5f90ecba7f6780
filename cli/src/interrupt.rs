//! # Interrupt Handling
//!
//! SIGINT/SIGTERM set a shared flag that the pipeline checks between
//! methods; a second signal exits immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when a second signal arrives (128 + SIGINT).
const FORCED_EXIT: i32 = 130;

/// Sets `flag` on the first signal. Returns whether the flag was already set.
fn on_signal(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}

/// Installs the process-wide handler and returns its flag.
pub fn install() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    let installed = ctrlc::set_handler(move || {
        if on_signal(&handler_flag) {
            eprintln!("Interrupted again, exiting.");
            std::process::exit(FORCED_EXIT);
        }
        eprintln!("Interrupt received, finishing the current method (press again to abort).");
    });
    if let Err(e) = installed {
        tracing::warn!(error = %e, "Could not install interrupt handler");
    }
    flag
}
