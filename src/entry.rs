//! The per-path state the scanner carries through its three phases.
//!
//! `spec.md` models `FileEntry` and `DirEntry` as a base type and a
//! subclass that adds a child list. Per the "Inheritance of `DirEntry` from
//! `FileEntry`" design note, that's expressed here as one struct with a
//! tagged `EntryKind`, composed rather than inherited: the directory-only
//! `children` field simply doesn't exist on the `File` variant.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use memmap2::MmapOptions;
use xxhash_rust::xxh64::Xxh64;

use crate::config::XXHASH_SEED;
use crate::extent::Extent;

#[derive(Debug)]
pub enum EntryKind {
    File,
    /// `None` means "not yet read"; `Some(vec![])` means "read, empty".
    Dir { children: Option<Vec<Entry>> },
}

/// A regular file or directory discovered during the walk.
///
/// Lifecycle: created by the directory reader, mutated by the extent-query
/// worker (extents, block size) and then, for regular files, by the
/// single-threaded hash scanner. A directory's own extents are assigned by
/// whichever `ExtentQueryWorker` pass processed *its parent's* child batch.
pub struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub block_size: u64,
    /// Sorted in descending `logical_offset` once [`Entry::set_extents`] has run.
    pub extents: Vec<Extent>,
    /// Index into `extents` of the next extent to hash (descending toward 0).
    cursor: usize,
    bytes_remaining: u64,
    hash_state: Option<Xxh64>,
    file: Option<File>,
    pub final_hash: Option<u64>,
}

impl Entry {
    pub fn new_file(path: PathBuf) -> Self {
        Entry {
            path,
            kind: EntryKind::File,
            block_size: 0,
            extents: Vec::new(),
            cursor: 0,
            bytes_remaining: 0,
            hash_state: None,
            file: None,
            final_hash: None,
        }
    }

    pub fn new_dir(path: PathBuf) -> Self {
        Entry {
            path,
            kind: EntryKind::Dir { children: None },
            block_size: 0,
            extents: Vec::new(),
            cursor: 0,
            bytes_remaining: 0,
            hash_state: None,
            file: None,
            final_hash: None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Dir { .. })
    }

    pub fn children(&self) -> Option<&[Entry]> {
        match &self.kind {
            EntryKind::Dir { children } => children.as_deref(),
            EntryKind::File => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Entry>> {
        match &mut self.kind {
            EntryKind::Dir { children } => children.as_mut(),
            EntryKind::File => None,
        }
    }

    /// Records extents, sorts by descending `logical_offset`, and resets the
    /// scan cursor to the smallest logical offset. Called at most once.
    pub fn set_extents(&mut self, block_size: u64, mut extents: Vec<Extent>) {
        extents.sort_by(|a, b| b.logical_offset.cmp(&a.logical_offset));
        self.cursor = extents.len().saturating_sub(1);
        self.block_size = block_size;
        self.extents = extents;
    }

    /// Largest `block_count * block_size` across extents; 0 if none.
    pub fn max_extent_bytes(&self) -> u64 {
        self.extents
            .iter()
            .map(|e| e.block_count * self.block_size)
            .max()
            .unwrap_or(0)
    }

    /// True iff the currently-pointed extent's physical offset matches.
    /// Used by the hash scan to decide whether the map key it is visiting
    /// is this file's next-in-logical-order extent.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_next_physical_extent(&self, physical_offset: u64) -> bool {
        self.extents
            .get(self.cursor)
            .map(|e| e.physical_offset == physical_offset)
            .unwrap_or(false)
    }

    /// Enumerates immediate directory entries (non-recursive). Symlinks and
    /// other non-directory types are treated as regular files. A directory
    /// that can't be read is treated as empty, not a fatal error.
    pub fn read_content(&mut self) {
        debug_assert!(self.is_dir());
        let start = Instant::now();

        let listing = (|| -> io::Result<Vec<Entry>> {
            let mut kids = Vec::new();
            for dent in std::fs::read_dir(&self.path)? {
                let dent = dent?;
                let file_type = dent.file_type()?;
                let child = if file_type.is_dir() {
                    Entry::new_dir(dent.path())
                } else {
                    Entry::new_file(dent.path())
                };
                kids.push(child);
            }
            Ok(kids)
        })();

        let kids = match listing {
            Ok(kids) => kids,
            Err(e) => {
                log::warn!(
                    target: "performance.DirectoryInfo",
                    "could not read directory {}: {}", self.path.display(), e
                );
                Vec::new()
            }
        };

        log::debug!(
            target: "performance.DirectoryInfo",
            "read {} ({} entries) in {:?}",
            self.path.display(),
            kids.len(),
            start.elapsed()
        );

        if let EntryKind::Dir { children } = &mut self.kind {
            *children = Some(kids);
        }
    }

    /// Performs exactly one extent's worth of hashing and advances the
    /// cursor. Returns `Ok(true)` once the file is fully hashed.
    ///
    /// I/O errors are the caller's responsibility to log and swallow — per
    /// the error-handling design this is a scan, not a transaction, and one
    /// bad file must not stop the others.
    pub fn hash_step(&mut self) -> io::Result<bool> {
        if self.hash_state.is_none() {
            let file = File::open(&self.path)?;
            self.bytes_remaining = file.metadata()?.len();
            self.hash_state = Some(Xxh64::new(XXHASH_SEED));
            self.file = Some(file);
        }

        let extent = self.extents[self.cursor];
        let extent_bytes = extent.block_count * self.block_size;
        let to_read = self.bytes_remaining.min(extent_bytes);

        if to_read > 0 {
            let file = self.file.as_ref().expect("opened above");
            let start = extent.logical_offset * self.block_size;
            let mmap = unsafe {
                MmapOptions::new()
                    .offset(start)
                    .len(to_read as usize)
                    .map(file)?
            };
            // Best-effort prefetch hint; a failure here must not fail the scan.
            let _ = mmap.advise(memmap2::Advice::WillNeed);
            self.hash_state
                .as_mut()
                .expect("created above")
                .update(&mmap[..]);
        }

        self.bytes_remaining -= to_read;
        self.cursor = self.cursor.saturating_sub(1);

        if self.bytes_remaining == 0 {
            let hasher = self.hash_state.take().expect("created above");
            self.final_hash = Some(hasher.digest());
            self.file = None;
            return Ok(true);
        }

        Ok(false)
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("path", &self.path)
            .field("is_dir", &self.is_dir())
            .field("block_size", &self.block_size)
            .field("extents", &self.extents)
            .field("cursor", &self.cursor)
            .field("final_hash", &self.final_hash)
            .finish()
    }
}

pub fn bare_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(logical: u64, physical: u64, blocks: u64) -> Extent {
        Extent::new(logical, physical, blocks)
    }

    #[test]
    fn set_extents_sorts_descending_and_resets_cursor() {
        let mut e = Entry::new_file("a".into());
        e.set_extents(4096, vec![ext(0, 500, 1), ext(1, 200, 1), ext(2, 900, 1)]);
        let logicals: Vec<u64> = e.extents.iter().map(|x| x.logical_offset).collect();
        assert_eq!(logicals, vec![2, 1, 0]);
        assert!(e.is_next_physical_extent(900));
    }

    #[test]
    fn max_extent_bytes_picks_largest() {
        let mut e = Entry::new_file("a".into());
        e.set_extents(4096, vec![ext(0, 100, 1), ext(1, 200, 3)]);
        assert_eq!(e.max_extent_bytes(), 3 * 4096);
    }

    #[test]
    fn dir_defaults_to_children_absent() {
        let e = Entry::new_dir("d".into());
        assert!(e.children().is_none());
    }
}
