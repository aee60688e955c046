//! Command-line surface. Deliberately thin: the core takes a single root
//! path and a cancellation signal (spec.md sec 1); everything else here is
//! ambient plumbing modeled on `nefaxer::engine::arg_parser::Cli`.

use std::path::PathBuf;

use clap::Parser;

/// Scan a media tree, hashing every regular file while sweeping the disk
/// head in physical-block order.
#[derive(Parser)]
#[command(name = "medialibchecker")]
pub struct Cli {
    /// Root of the media tree to scan.
    #[arg(value_name = "MEDIA-ROOT-PATH")]
    pub root: PathBuf,

    /// Verbose output (debug-level logging).
    #[arg(long, short)]
    pub verbose: bool,
}
