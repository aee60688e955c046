//! Glue: builds a `Traversal` for the given root, wires up the cancellation
//! flag, and runs it to completion. Mirrors the shape of
//! `nefaxer::pipeline::orchestrator::run_pipeline` — construct, run, report —
//! but the scan here is single-threaded by design from the hash-scan phase
//! onward (see spec.md sec 1, Non-goals: parallel hashing).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traversal::{ScanStats, Traversal};

/// Runs the extent-aware scan over `root`. `cancel` is shared with the
/// caller's signal handler: setting it to `true` aborts the scan at the next
/// phase boundary or hash-scan iteration, per spec.md sec 5.
pub fn run(root: &Path, cancel: Arc<AtomicBool>) -> ScanStats {
    let traversal = Traversal::new(root.to_path_buf(), cancel);
    traversal.run()
}

/// Installs a `ctrlc` handler that flips `cancel` to true on SIGINT/SIGTERM,
/// the way a CLI driver is expected to honor a cancellation signal per
/// spec.md sec 6. Returns the flag for the caller to pass into [`run`].
pub fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Release);
    }) {
        log::warn!("could not install signal handler: {}", e);
    }
    cancel
}
