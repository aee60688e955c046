//! The producer: seeds the scan with the root, walks directories in
//! physical-nearest-next order, and finally drives the hash scan.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::entry::Entry;
use crate::maps::{nearest_key, SharedMaps};
use crate::worker::{ExtentQueryWorker, IdleSignal};

#[derive(Default, Debug)]
pub struct ScanStats {
    pub directories: u64,
    pub files: u64,
    pub total_bytes: u64,
    pub max_extent_bytes: u64,
}

pub struct Traversal {
    root: PathBuf,
    maps: Arc<SharedMaps>,
    idle: Arc<IdleSignal>,
    pending_tx: Option<Sender<Entry>>,
    worker_handle: Option<JoinHandle<()>>,
    cancel: Arc<AtomicBool>,
    stats: ScanStats,
    passes: u64,
}

impl Traversal {
    pub fn new(root: PathBuf, cancel: Arc<AtomicBool>) -> Self {
        let maps = SharedMaps::new();
        let idle = Arc::new(IdleSignal::new());
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker = ExtentQueryWorker::new(rx, Arc::clone(&maps), Arc::clone(&idle));
        let worker_handle = std::thread::spawn(move || worker.run());

        Traversal {
            root,
            maps,
            idle,
            pending_tx: Some(tx),
            worker_handle: Some(worker_handle),
            cancel,
            stats: ScanStats::default(),
            passes: 0,
        }
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn enqueue(&mut self, dir: Entry) -> bool {
        self.idle.mark_enqueued();
        match &self.pending_tx {
            Some(tx) => tx.send(dir).is_ok(),
            None => false,
        }
    }

    fn account(&mut self, dir: &Entry) {
        self.stats.directories += 1;
        if let Some(children) = dir.children() {
            for child in children {
                if child.is_dir() {
                    continue;
                }
                self.stats.files += 1;
                if let Ok(meta) = std::fs::metadata(&child.path) {
                    self.stats.total_bytes += meta.len();
                }
            }
        }
    }

    /// Largest extent among the regular files queued for the hash scan, in
    /// bytes. Called once Phase A has drained: every file's extents have by
    /// then been deposited into `file_map` by the worker (see `worker::process`),
    /// so this is the only point stats can read them back from.
    fn compute_max_extent_bytes(&mut self) {
        let file_map = self.maps.file_map.lock().unwrap();
        let mut max = 0u64;
        for shared in file_map.values() {
            let entry = shared.lock().unwrap();
            max = max.max(entry.max_extent_bytes());
        }
        self.stats.max_extent_bytes = max;
    }

    /// Phase A: gather. Seeds with the root, then nearest-next walks the
    /// directory extent map until it drains and the worker goes idle.
    fn gather(&mut self) {
        let mut root_entry = Entry::new_dir(self.root.clone());
        root_entry.read_content();
        self.account(&root_entry);
        if !self.enqueue(root_entry) {
            return;
        }

        let mut current_block: u64 = 0;

        loop {
            if self.cancelled() {
                return;
            }

            let next_key = {
                let dir_map = self.maps.dir_map.lock().unwrap();
                nearest_key(&dir_map, current_block)
            };

            let chosen = match next_key {
                Some(k) => k,
                None => {
                    let guard = self.idle.lock.lock().unwrap();
                    let cancel = &self.cancel;
                    let (_guard, _timeout) = self
                        .idle
                        .cond
                        .wait_timeout_while(guard, Duration::from_millis(200), |is_idle| {
                            !*is_idle && !cancel.load(Ordering::Acquire)
                        })
                        .unwrap();

                    if self.cancelled() {
                        return;
                    }

                    let still_empty = self.maps.dir_map.lock().unwrap().is_empty();
                    if still_empty && self.idle.is_idle() {
                        return; // Phase A complete: queue drained, worker idle
                    }
                    continue;
                }
            };

            let mut dir_entry = {
                let mut dir_map = self.maps.dir_map.lock().unwrap();
                match dir_map.remove(&chosen) {
                    Some(e) => e,
                    None => continue,
                }
            };

            dir_entry.read_content();
            self.account(&dir_entry);

            // Per spec.md sec 4.5/9: the cursor advances to the largest
            // physical offset among the directory's own extents, not
            // necessarily the key that was just chosen.
            current_block = dir_entry
                .extents
                .first()
                .map(|e| e.physical_offset)
                .unwrap_or(current_block);

            if !self.enqueue(dir_entry) {
                return;
            }
        }
    }

    /// Phase B: report. One informational summary line over the directories
    /// prepared during Phase A.
    fn report(&self) {
        log::info!(
            target: "DirectoryScanner",
            "prepared {} directories, {} files, {} bytes total, max extent {} bytes",
            self.stats.directories,
            self.stats.files,
            self.stats.total_bytes,
            self.stats.max_extent_bytes,
        );
    }

    /// Phase C: hash scan. Ascending sweeps over `fileExtentMap` until it's
    /// empty or cancellation fires; each sweep advances every file whose
    /// cursor currently points at the key being visited.
    fn hash_scan(&mut self) {
        loop {
            if self.cancelled() {
                return;
            }

            let keys: Vec<u64> = {
                let file_map = self.maps.file_map.lock().unwrap();
                if file_map.is_empty() {
                    return;
                }
                file_map.keys().copied().collect()
            };

            self.passes += 1;
            log::info!(target: "DirectoryScanner", "File map checksum scan #{}...", self.passes);

            for key in keys {
                if self.cancelled() {
                    return;
                }

                let shared = {
                    let file_map = self.maps.file_map.lock().unwrap();
                    file_map.get(&key).cloned()
                };
                let shared = match shared {
                    Some(s) => s,
                    None => continue, // already consumed earlier in this sweep
                };

                let mut entry = shared.lock().unwrap();
                if !entry.is_next_physical_extent(key) {
                    continue;
                }

                let cursor_before = entry.cursor();
                let path = entry.path.clone();
                let result = entry.hash_step();
                drop(entry);

                match result {
                    Ok(done) => {
                        self.maps.file_map.lock().unwrap().remove(&key);
                        if done {
                            log::info!(target: "performance.FileInfo", "hashed {}", path.display());
                        }
                    }
                    Err(e) => {
                        log::warn!(
                            target: "performance.FileInfo",
                            "hash step failed for {}: {} (dropping from scan)",
                            path.display(),
                            e
                        );
                        let guard = shared.lock().unwrap();
                        let remaining: Vec<u64> = guard.extents[..=cursor_before]
                            .iter()
                            .map(|e| e.physical_offset)
                            .collect();
                        drop(guard);
                        let mut file_map = self.maps.file_map.lock().unwrap();
                        for k in remaining {
                            file_map.remove(&k);
                        }
                    }
                }
            }
        }
    }

    /// Runs the full pipeline: gather, report, hash scan.
    pub fn run(mut self) -> ScanStats {
        self.gather();
        if !self.cancelled() {
            self.compute_max_extent_bytes();
            self.report();
        }

        self.pending_tx.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }

        if !self.cancelled() {
            self.hash_scan();
        }

        self.stats
    }
}
