//! The extent-query consumer: a long-running thread that dequeues
//! directories, shells out to `filefrag -e` for their children, and parses
//! the result into the shared extent maps.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crossbeam_channel::{Receiver, RecvError, TryRecvError};

use crate::config::{EXTENTS_HEADER_LINE, FILEFRAG_BIN, FILEFRAG_ERROR_LOG};
use crate::entry::{bare_name, Entry, EntryKind};
use crate::error::ScanError;
use crate::extent::Extent;
use crate::maps::SharedMaps;

/// Handshake the worker uses to tell the producer "my queue is drained".
/// `outstanding` is the count of directories enqueued but not yet processed;
/// the bool behind `lock` mirrors `outstanding == 0` so the producer can
/// wait on the condvar without racing a plain integer read.
pub struct IdleSignal {
    pub lock: Mutex<bool>,
    pub cond: Condvar,
    pub outstanding: AtomicUsize,
}

impl IdleSignal {
    pub fn new() -> Self {
        IdleSignal {
            lock: Mutex::new(true),
            cond: Condvar::new(),
            outstanding: AtomicUsize::new(0),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding.load(Ordering::Acquire) == 0
    }

    /// Called by the producer right before sending a directory down the
    /// channel, so `outstanding` never reads zero while work is in flight.
    pub fn mark_enqueued(&self) {
        self.outstanding.fetch_add(1, Ordering::Release);
        *self.lock.lock().unwrap() = false;
    }

    fn mark_processed(&self) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining == 0 {
            let mut guard = self.lock.lock().unwrap();
            *guard = true;
            self.cond.notify_all();
        }
    }
}

impl Default for IdleSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ExtentQueryWorker {
    pending_rx: Receiver<Entry>,
    maps: Arc<SharedMaps>,
    idle: Arc<IdleSignal>,
    error_log: Option<File>,
}

impl ExtentQueryWorker {
    pub fn new(pending_rx: Receiver<Entry>, maps: Arc<SharedMaps>, idle: Arc<IdleSignal>) -> Self {
        if let Some(parent) = Path::new(FILEFRAG_ERROR_LOG).parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let error_log = match OpenOptions::new()
            .create(true)
            .append(true)
            .open(FILEFRAG_ERROR_LOG)
        {
            Ok(f) => Some(f),
            Err(e) => {
                log::warn!(
                    "could not open {}: {} (filefrag stderr will be discarded)",
                    FILEFRAG_ERROR_LOG,
                    e
                );
                None
            }
        };
        ExtentQueryWorker {
            pending_rx,
            maps,
            idle,
            error_log,
        }
    }

    /// Runs until the channel is disconnected (the producer dropped its
    /// sender). Rust has no portable "interrupt a blocked thread"; dropping
    /// the sender and letting `recv` return `Err` is the channel-shaped
    /// stand-in for `spec.md`'s thread-interruption (see `DESIGN.md`).
    pub fn run(mut self) {
        loop {
            match self.pending_rx.try_recv() {
                Ok(dir) => {
                    self.process(dir);
                    self.idle.mark_processed();
                }
                Err(TryRecvError::Empty) => {
                    {
                        let _guard = self.idle.lock.lock().unwrap();
                        self.idle.cond.notify_all();
                    }
                    match self.pending_rx.recv() {
                        Ok(dir) => {
                            self.process(dir);
                            self.idle.mark_processed();
                        }
                        Err(RecvError) => break,
                    }
                }
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn process(&mut self, mut dir: Entry) {
        let children = match &mut dir.kind {
            EntryKind::Dir {
                children: Some(kids),
            } if !kids.is_empty() => std::mem::take(kids),
            _ => return,
        };

        let names: Vec<String> = children
            .iter()
            .filter_map(|c| bare_name(&c.path).map(str::to_string))
            .collect();
        if names.is_empty() {
            return;
        }

        let output = match self.run_filefrag(&dir.path, &names) {
            Ok(out) => out,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };

        let parsed = match parse_filefrag_output(&output) {
            Ok(p) => p,
            Err(reason) => {
                log::warn!(
                    "{}",
                    ScanError::InvalidExtentOutput {
                        dir: dir.path.clone(),
                        reason,
                    }
                );
                return;
            }
        };

        let mut by_name: HashMap<String, Entry> = children
            .into_iter()
            .filter_map(|c| bare_name(&c.path).map(|n| (n.to_string(), c)))
            .collect();

        for file in parsed {
            let mut child = match by_name.remove(&file.name) {
                Some(c) => c,
                None => {
                    log::warn!(
                        "{}",
                        ScanError::InvalidExtentOutput {
                            dir: dir.path.clone(),
                            reason: format!("filefrag reported unknown file {:?}", file.name),
                        }
                    );
                    continue;
                }
            };

            child.set_extents(file.block_size, file.extents);

            if child.is_dir() {
                let key = child.extents.last().map(|e| e.physical_offset).unwrap_or(0);
                self.maps.dir_map.lock().unwrap().insert(key, child);
            } else {
                let keys: Vec<u64> = child.extents.iter().map(|e| e.physical_offset).collect();
                let shared = Arc::new(Mutex::new(child));
                let mut file_map = self.maps.file_map.lock().unwrap();
                for key in keys {
                    file_map.insert(key, Arc::clone(&shared));
                }
            }
        }
    }

    fn run_filefrag(&mut self, dir: &Path, names: &[String]) -> Result<String, ScanError> {
        let mut cmd = Command::new(FILEFRAG_BIN);
        cmd.arg("-e")
            .args(names)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().map_err(|e| ScanError::LaunchFailure {
            dir: dir.to_path_buf(),
            source: e,
        })?;

        if let Some(log) = self.error_log.as_mut() {
            let _ = log.write_all(&output.stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct ParsedFile {
    pub name: String,
    pub block_size: u64,
    pub extents: Vec<Extent>,
}

enum State {
    Header,
    ExtentsHeader {
        name: String,
        block_size: u64,
    },
    ExtentsBody {
        name: String,
        block_size: u64,
        segments: Vec<Extent>,
    },
}

/// Parses the concatenated `filefrag -e` output for a batch of files. Any
/// deviation from the grammar aborts the whole batch with one error; the
/// caller skips the directory but keeps the worker running (spec.md sec 4.4).
pub fn parse_filefrag_output(output: &str) -> Result<Vec<ParsedFile>, String> {
    let mut state = State::Header;
    let mut results = Vec::new();

    for line in output.lines() {
        state = match state {
            State::Header => {
                if line.trim().is_empty() {
                    State::Header
                } else {
                    let (name, block_size) = parse_header_line(line)?;
                    State::ExtentsHeader { name, block_size }
                }
            }
            State::ExtentsHeader { name, block_size } => {
                if line != EXTENTS_HEADER_LINE {
                    return Err(format!("expected literal extents header, got {:?}", line));
                }
                State::ExtentsBody {
                    name,
                    block_size,
                    segments: Vec::new(),
                }
            }
            State::ExtentsBody {
                name,
                block_size,
                mut segments,
            } => {
                let terminal_prefix = format!("{}: ", name);
                if line.starts_with(&terminal_prefix) && line.trim_end().ends_with("found") {
                    results.push(ParsedFile {
                        name,
                        block_size,
                        extents: segments,
                    });
                    State::Header
                } else {
                    segments.push(parse_extent_row(line)?);
                    State::ExtentsBody {
                        name,
                        block_size,
                        segments,
                    }
                }
            }
        };
    }

    Ok(results)
}

/// `File size of <name> is <size> (<N> blocks of <B> bytes)`
fn parse_header_line(line: &str) -> Result<(String, u64), String> {
    let rest = line
        .strip_prefix("File size of ")
        .ok_or_else(|| format!("expected 'File size of ...' header, got {:?}", line))?;
    let is_idx = rest
        .find(" is ")
        .ok_or_else(|| format!("malformed header line {:?}", line))?;
    let name = rest[..is_idx].to_string();
    let tail = &rest[is_idx + 4..];
    let open = tail
        .find('(')
        .ok_or_else(|| format!("malformed header line {:?}", line))?;
    let close = tail
        .find(')')
        .ok_or_else(|| format!("malformed header line {:?}", line))?;
    let inside = &tail[open + 1..close];
    // "<N> blocks of <B> bytes"
    let tokens: Vec<&str> = inside.split_whitespace().collect();
    let block_size = tokens
        .get(3)
        .ok_or_else(|| format!("malformed header line {:?}", line))?
        .parse::<u64>()
        .map_err(|e| format!("bad block size in {:?}: {}", line, e))?;
    Ok((name, block_size))
}

/// An extent row split on runs of `[ :.]`, yielding six fields:
/// `[ext, log_start, log_end, phys_start, phys_end, length]`. The starts and
/// the length, at indices 1, 3, 5, are what `Extent` needs; the `_end`
/// fields at 2 and 4 are redundant with `start + length` and unused.
fn parse_extent_row(line: &str) -> Result<Extent, String> {
    let tokens: Vec<&str> = line
        .split(|c: char| c == ' ' || c == ':' || c == '.')
        .filter(|s| !s.is_empty())
        .collect();
    if tokens.len() < 6 {
        return Err(format!("malformed extent row {:?}", line));
    }
    let logical_offset = tokens[1]
        .parse::<u64>()
        .map_err(|e| format!("bad logical_offset in {:?}: {}", line, e))?;
    let physical_offset = tokens[3]
        .parse::<u64>()
        .map_err(|e| format!("bad physical_offset in {:?}: {}", line, e))?;
    let block_count = tokens[5]
        .parse::<u64>()
        .map_err(|e| format!("bad length in {:?}: {}", line, e))?;
    Ok(Extent::new(logical_offset, physical_offset, block_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_file_block() {
        let out = "File size of a is 5120 (2 blocks of 4096 bytes)\n\
                    \x20ext:     logical_offset:        physical_offset: length:   expected: flags:\n\
                    \x20  0:        0..    2047:     100..     2147:     2048:             \n\
                    a: 1 extent found\n";
        let parsed = parse_filefrag_output(out).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "a");
        assert_eq!(parsed[0].block_size, 4096);
        assert_eq!(parsed[0].extents.len(), 1);
        assert_eq!(parsed[0].extents[0].physical_offset, 100);
    }

    #[test]
    fn parses_multiple_files_in_one_batch() {
        let out = "File size of a is 5120 (2 blocks of 4096 bytes)\n\
                    \x20ext:     logical_offset:        physical_offset: length:   expected: flags:\n\
                    \x20  0:        0..    2047:     100..     2147:     2048:             \n\
                    a: 1 extent found\n\
                    File size of b is 8192 (2 blocks of 4096 bytes)\n\
                    \x20ext:     logical_offset:        physical_offset: length:   expected: flags:\n\
                    \x20  0:        0..    2047:     500..     2547:     2048:             \n\
                    \x20  1:     2048..    4095:     200..     2247:     2048:             \n\
                    b: 2 extents found\n";
        let parsed = parse_filefrag_output(out).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].name, "b");
        assert_eq!(parsed[1].extents.len(), 2);
    }

    #[test]
    fn rejects_malformed_extents_header() {
        let out = "File size of a is 5120 (2 blocks of 4096 bytes)\nnot the expected header\n";
        assert!(parse_filefrag_output(out).is_err());
    }
}
