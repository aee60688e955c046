//! Tuning constants and fixed external-collaborator names, centralized the
//! way `nefaxer::utils::config` keeps its thresholds in one place rather
//! than scattered through call sites.

/// Seed for the streaming xxhash64 accumulator used by every file hash.
pub const XXHASH_SEED: u64 = 0x0974_7B28_4209_3420;

/// Name of the external extent-query utility (must be on `PATH`).
pub const FILEFRAG_BIN: &str = "filefrag";

/// Append-mode, process-lifetime capture of the extent-query utility's stderr.
pub const FILEFRAG_ERROR_LOG: &str = "logs/filefrag.error.log";

/// Literal header row the extent-query utility prints before the extent
/// rows of a `filefrag -e` block.
pub const EXTENTS_HEADER_LINE: &str =
    " ext:     logical_offset:        physical_offset: length:   expected: flags:";
