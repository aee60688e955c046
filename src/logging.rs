//! Logging setup, in the shape of `nefaxer::utils::logger::setup_logging`:
//! one call from `main`, writing to stderr, with our own crate's target
//! filtered by verbosity and dependencies kept at `warn`.
//!
//! The scanner logs under named targets (`"DirectoryScanner"`,
//! `"performance.FileInfo"`, `"performance.DirectoryInfo"`) rather than the
//! default module-path target, so those names are filtered explicitly
//! alongside the crate's own module path.

use env_logger::Builder;
use log::LevelFilter;

pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .filter_module("DirectoryScanner", level)
        .filter_module("performance", level)
        .init();
}
