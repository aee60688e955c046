//! The two ordered maps `Traversal` and `ExtentQueryWorker` share.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::entry::Entry;

/// `directoryExtentMap` / `fileExtentMap` from spec.md sec 3, guarded by a
/// mutex each per the design note "if the target runtime lacks a concurrent
/// ordered map, guard an ordinary ordered map with a mutex".
///
/// A regular file contributes one key per extent, and all of those keys
/// must observe the same mutable scan state (cursor, streaming hash) as the
/// hash scan consumes extents one at a time — so `file_map` stores
/// `Arc<Mutex<Entry>>` rather than owned `Entry` values, letting several
/// keys alias the same file.
pub struct SharedMaps {
    pub dir_map: Mutex<BTreeMap<u64, Entry>>,
    pub file_map: Mutex<BTreeMap<u64, Arc<Mutex<Entry>>>>,
}

impl SharedMaps {
    pub fn new() -> Arc<Self> {
        Arc::new(SharedMaps {
            dir_map: Mutex::new(BTreeMap::new()),
            file_map: Mutex::new(BTreeMap::new()),
        })
    }
}

/// Picks the key in `map` physically nearest `current`: whichever of the
/// ceiling-key or floor-key has the smaller absolute distance, ties going
/// to the ceiling.
pub fn nearest_key<V>(map: &BTreeMap<u64, V>, current: u64) -> Option<u64> {
    let ceil = map.range(current..).next().map(|(k, _)| *k);
    let floor = map.range(..current).next_back().map(|(k, _)| *k);
    match (ceil, floor) {
        (Some(c), Some(f)) => {
            let dc = c - current;
            let df = current - f;
            Some(if dc <= df { c } else { f })
        }
        (Some(c), None) => Some(c),
        (None, Some(f)) => Some(f),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_key_ties_go_to_ceiling() {
        let mut m: BTreeMap<u64, ()> = BTreeMap::new();
        m.insert(10, ());
        m.insert(20, ());
        assert_eq!(nearest_key(&m, 15), Some(20));
    }

    #[test]
    fn nearest_key_picks_closer_side() {
        let mut m: BTreeMap<u64, ()> = BTreeMap::new();
        m.insert(1000, ());
        m.insert(50, ());
        assert_eq!(nearest_key(&m, 0), Some(50));
    }

    #[test]
    fn nearest_key_empty_map() {
        let m: BTreeMap<u64, ()> = BTreeMap::new();
        assert_eq!(nearest_key(&m, 5), None);
    }
}
